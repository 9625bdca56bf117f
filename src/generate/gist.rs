//! GitHub gist publishing.
//!
//! Each concept is added to an existing gist as a new file via
//! `PATCH /gists/{id}`. Existing files in the gist are left alone.

use super::{GenerateError, PromptStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const API_BASE: &str = "https://api.github.com";

const SERVICE: &str = "github";

#[derive(Debug, Serialize)]
struct GistUpdate<'a> {
    files: BTreeMap<&'a str, GistFile<'a>>,
}

#[derive(Debug, Serialize)]
struct GistFile<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GistResponse {
    #[serde(default)]
    owner: Option<GistOwner>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GistOwner {
    login: String,
}

/// Link to one file of a gist.
pub fn gist_file_url(login: &str, gist_id: &str, filename: &str) -> String {
    format!("https://gist.github.com/{login}/{gist_id}#{filename}")
}

/// Resolve the public link for `filename` from an update response.
pub fn published_url(response: &GistResponse, gist_id: &str, filename: &str) -> String {
    match (&response.owner, &response.html_url) {
        (Some(owner), _) => gist_file_url(&owner.login, gist_id, filename),
        (None, Some(html)) => format!("{html}#{filename}"),
        (None, None) => format!("https://gist.github.com/{gist_id}#{filename}"),
    }
}

pub struct GistClient {
    client: reqwest::blocking::Client,
    token: String,
    gist_id: String,
    api_base: String,
}

impl std::fmt::Debug for GistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GistClient")
            .field("gist_id", &self.gist_id)
            .finish_non_exhaustive()
    }
}

impl GistClient {
    pub fn new(token: impl Into<String>, gist_id: impl Into<String>) -> Result<Self, GenerateError> {
        Ok(Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(60))
                .user_agent(concat!("artgal/", env!("CARGO_PKG_VERSION")))
                .build()?,
            token: token.into(),
            gist_id: gist_id.into(),
            api_base: API_BASE.to_string(),
        })
    }
}

impl PromptStore for GistClient {
    fn publish(&self, filename: &str, content: &str) -> Result<String, GenerateError> {
        let url = format!("{}/gists/{}", self.api_base, self.gist_id);
        let body = GistUpdate {
            files: BTreeMap::from([(filename, GistFile { content })]),
        };
        log::info!("saving prompt to gist {} as {filename}", self.gist_id);

        let resp = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GenerateError::Api {
                service: SERVICE,
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }
        let response: GistResponse = resp.json()?;
        Ok(published_url(&response, &self.gist_id, filename))
    }
}
