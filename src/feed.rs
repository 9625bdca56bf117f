//! Gist feed URL construction.
//!
//! The gallery page can pull prompt data from a public gist. Its raw URL is
//! `https://gist.githubusercontent.com/{owner}/{id}/raw/{file}`; the id comes
//! from the environment, so a build without it simply has no feed.

use crate::config::FeedConfig;

/// Gist owner used when no override is supplied.
pub const DEFAULT_OWNER: &str = "pappater";

/// Build the raw gist URL for an owner, gist id and file name.
pub fn feed_url(owner: &str, id: &str, file: &str) -> String {
    format!("https://gist.githubusercontent.com/{owner}/{id}/raw/{file}")
}

/// Resolve the feed URL through an environment lookup.
///
/// Returns `None` when the id variable is unset or blank. A blank owner
/// override falls back to the configured owner.
pub fn feed_url_from_env<F>(config: &FeedConfig, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let id = lookup(&config.id_env).filter(|v| !v.trim().is_empty())?;
    let owner = lookup(&config.owner_env)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.owner.clone());
    Some(feed_url(owner.trim(), id.trim(), &config.file))
}
