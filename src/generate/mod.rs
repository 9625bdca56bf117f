//! Content generation job.
//!
//! Produces one new gallery entry per run:
//!
//! ```text
//! 1. Select   art_styles.json ──random──▶ style
//! 2. Concept  style ──text model──▶ concept paragraph
//! 3. Publish  concept ──gist──▶ art_prompt_{timestamp}.md
//! 4. Image    concept ──image model──▶ images/{timestamp}.png + _metadata.json
//! ```
//!
//! Steps 1–3 are fatal on failure. Step 4 is best effort: when it fails the
//! concept is already published, so the job reports a warning and still
//! succeeds. Step 4 is skipped entirely when `SKIP_IMAGE_GENERATION=true` or
//! `generate.skip_images` is set.
//!
//! The external services sit behind [`ConceptProvider`], [`ImageProvider`]
//! and [`PromptStore`] so the job itself can be exercised without a network.
//! HTTP implementations live in [`gemini`] and [`gist`].

pub mod gemini;
pub mod gist;
pub mod styles;

use crate::config::{FeedConfig, GenerateConfig};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "GEMINI_MODEL";
pub const GIST_TOKEN_ENV: &str = "GIST_TOKEN";
pub const SKIP_IMAGES_ENV: &str = "SKIP_IMAGE_GENERATION";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("{0} environment variable is not set")]
    MissingEnv(String),
    #[error("art styles file not found: {0}")]
    StylesNotFound(PathBuf),
    #[error("could not parse art styles in {path}: {source}")]
    StylesParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("art styles list is empty: {0}")]
    NoStyles(PathBuf),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{0} response contained no usable content")]
    EmptyResponse(&'static str),
    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("generated data is not a recognized image")]
    NotAnImage,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes an art concept for a style.
pub trait ConceptProvider {
    fn generate_concept(&self, art_style: &str) -> Result<String, GenerateError>;
}

/// Renders an image from a concept; returns the encoded image bytes.
pub trait ImageProvider {
    fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, GenerateError>;
}

/// Publishes a document and returns a URL pointing at it.
pub trait PromptStore {
    fn publish(&self, filename: &str, content: &str) -> Result<String, GenerateError>;
}

/// Credentials and switches read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSettings {
    pub api_key: String,
    pub text_model: String,
    pub gist_token: String,
    pub gist_id: String,
    pub skip_images: bool,
}

impl GenerateSettings {
    /// Read settings through `lookup`, failing on the first missing credential.
    ///
    /// The gist id shares its variable with the feed URL (`feed.id_env`).
    pub fn from_env<F>(
        config: &GenerateConfig,
        feed: &FeedConfig,
        lookup: F,
    ) -> Result<Self, GenerateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| GenerateError::MissingEnv(name.to_string()))
        };
        let api_key = required(API_KEY_ENV)?;
        let gist_token = required(GIST_TOKEN_ENV)?;
        let gist_id = required(feed.id_env.as_str())?;
        let text_model = lookup(MODEL_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| config.text_model.clone());
        let skip_images = config.skip_images
            || lookup(SKIP_IMAGES_ENV).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        Ok(Self {
            api_key,
            text_model,
            gist_token,
            gist_id,
            skip_images,
        })
    }
}

/// Filesystem inputs and outputs of a run.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub styles_file: PathBuf,
    pub images_dir: PathBuf,
}

/// Services used by a run. `image: None` skips step 4.
pub struct Providers<'a> {
    pub concept: &'a dyn ConceptProvider,
    pub image: Option<&'a dyn ImageProvider>,
    pub store: &'a dyn PromptStore,
}

/// Progress notifications emitted while the job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateEvent {
    StyleSelected(String),
    ConceptGenerated(String),
    PromptPublished(String),
    ImageSkipped,
    ImageSaved(PathBuf),
    ImageFailed(String),
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSummary {
    pub art_style: String,
    pub art_concept: String,
    pub gist_url: String,
    pub image_path: Option<PathBuf>,
}

/// Sidecar written next to each generated image.
#[derive(Debug, Serialize)]
pub struct ImageMetadata<'a> {
    pub art_style: &'a str,
    pub art_concept: &'a str,
    pub gist_url: &'a str,
    pub image_file: String,
    pub generated_at: String,
    pub gemini_model: &'a str,
    pub sha256: String,
}

/// Run the four steps. `now` stamps every file name the run creates.
pub fn run<R: Rng + ?Sized>(
    paths: &JobPaths,
    providers: &Providers<'_>,
    text_model: &str,
    rng: &mut R,
    now: DateTime<Utc>,
    on_event: &mut dyn FnMut(&GenerateEvent),
) -> Result<GenerateSummary, GenerateError> {
    let all_styles = styles::load_styles(&paths.styles_file)?;
    let art_style = styles::choose_style(&all_styles, rng).to_string();
    on_event(&GenerateEvent::StyleSelected(art_style.clone()));

    let art_concept = providers.concept.generate_concept(&art_style)?.trim().to_string();
    if art_concept.is_empty() {
        return Err(GenerateError::EmptyResponse("concept"));
    }
    on_event(&GenerateEvent::ConceptGenerated(art_concept.clone()));

    let filename = prompt_filename(now);
    let document = prompt_document(&art_style, &art_concept, now);
    let gist_url = providers.store.publish(&filename, &document)?;
    on_event(&GenerateEvent::PromptPublished(gist_url.clone()));

    let image_path = match providers.image {
        None => {
            on_event(&GenerateEvent::ImageSkipped);
            None
        }
        Some(provider) => {
            let saved = save_image(
                provider,
                &paths.images_dir,
                &art_style,
                &art_concept,
                &gist_url,
                text_model,
                now,
            );
            match saved {
                Ok(path) => {
                    on_event(&GenerateEvent::ImageSaved(path.clone()));
                    Some(path)
                }
                Err(e) => {
                    log::warn!("image generation failed, continuing with prompt only: {e}");
                    on_event(&GenerateEvent::ImageFailed(e.to_string()));
                    None
                }
            }
        }
    };

    Ok(GenerateSummary {
        art_style,
        art_concept,
        gist_url,
        image_path,
    })
}

/// `art_prompt_YYYYmmdd_HHMMSS.md`
pub fn prompt_filename(now: DateTime<Utc>) -> String {
    format!("art_prompt_{}.md", now.format("%Y%m%d_%H%M%S"))
}

fn generated_at(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Markdown document published for each concept.
pub fn prompt_document(art_style: &str, art_concept: &str, now: DateTime<Utc>) -> String {
    format!(
        "# Art Concept: {art_style}\n\
         \n\
         **Generated:** {generated}\n\
         \n\
         **Art Style:** {art_style}\n\
         \n\
         ## Art Concept Prompt\n\
         \n\
         {art_concept}\n\
         \n\
         ---\n\
         \n\
         *This prompt was generated using Gemini AI and is used to create AI-generated artwork.*\n",
        generated = generated_at(now),
    )
}

/// Extension for a sniffed image payload, or `NotAnImage`.
fn image_extension(bytes: &[u8]) -> Result<&'static str, GenerateError> {
    use image::ImageFormat;
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok("png"),
        Ok(ImageFormat::Jpeg) => Ok("jpg"),
        Ok(ImageFormat::WebP) => Ok("webp"),
        Ok(ImageFormat::Gif) => Ok("gif"),
        Ok(other) => {
            log::debug!("unexpected image format {other:?}, saving as png");
            Ok("png")
        }
        Err(_) => Err(GenerateError::NotAnImage),
    }
}

fn save_image(
    provider: &dyn ImageProvider,
    images_dir: &Path,
    art_style: &str,
    art_concept: &str,
    gist_url: &str,
    text_model: &str,
    now: DateTime<Utc>,
) -> Result<PathBuf, GenerateError> {
    let bytes = provider.generate_image(art_concept)?;
    let ext = image_extension(&bytes)?;

    let stem = now.format("%Y%m%d%H%M%S").to_string();
    let image_file = format!("{stem}.{ext}");
    let image_path = images_dir.join(&image_file);
    let metadata = ImageMetadata {
        art_style,
        art_concept,
        gist_url,
        image_file,
        generated_at: generated_at(now),
        gemini_model: text_model,
        sha256: format!("{:x}", Sha256::digest(&bytes)),
    };
    let metadata_json = serde_json::to_string_pretty(&metadata)?;

    fs::create_dir_all(images_dir)?;
    fs::write(&image_path, &bytes)?;

    // An image without its sidecar would still be picked up by the next build.
    let metadata_path = images_dir.join(format!("{stem}_metadata.json"));
    if let Err(e) = fs::write(&metadata_path, metadata_json) {
        if let Err(cleanup) = fs::remove_file(&image_path) {
            log::warn!(
                "could not remove {} after failed metadata write: {cleanup}",
                image_path.display()
            );
        }
        return Err(e.into());
    }
    log::info!("metadata saved to {}", metadata_path.display());

    Ok(image_path)
}
