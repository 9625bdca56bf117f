//! Site build: discover images, resolve the feed URL, inject both into the
//! template.
//!
//! ```text
//! images/  ──discover──▶  ["a.png", "b.png"]  ─┐
//! $FISH_GIST_ID ──feed──▶  Some(url) | None   ─┼─inject──▶  index.html
//! ```
//!
//! Discovery and template validation both finish before anything is written,
//! so a fatal error leaves the template exactly as it was. Two conditions
//! are soft: an empty images directory (the list renders as `[]`) and an
//! unset feed id (the feed region is left alone). Both are logged and
//! returned as [`BuildWarning`]s.

use crate::config::{Config, ConfigError};
use crate::discover::{self, DiscoverError};
use crate::feed;
use crate::inject::{self, FeedOutcome, InjectError, InjectOptions};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("image discovery failed: {0}")]
    Discover(#[from] DiscoverError),
    #[error("template injection failed: {0}")]
    Inject(#[from] InjectError),
}

/// Whether the template is rewritten or only validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Write,
    Check,
}

/// Resolved filesystem locations for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub images_dir: PathBuf,
    pub template: PathBuf,
}

impl SitePaths {
    /// Paths from config, relative to `root`, with optional overrides.
    ///
    /// Overrides are used as given (relative to the working directory).
    pub fn resolve(
        root: &Path,
        config: &Config,
        images_override: Option<&Path>,
        template_override: Option<&Path>,
    ) -> Self {
        Self {
            images_dir: images_override
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.join(&config.site.images_dir)),
            template: template_override
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.join(&config.site.template)),
        }
    }
}

/// Non-fatal conditions reported by a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// The images directory has no matching files.
    NoImages(PathBuf),
    /// The feed id variable is unset; the feed region was not touched.
    NoFeedId(String),
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::NoImages(dir) => {
                write!(f, "no images found in {}", dir.display())
            }
            BuildWarning::NoFeedId(var) => {
                write!(f, "{var} is not set; feed URL not injected")
            }
        }
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub images: Vec<String>,
    pub feed_url: Option<String>,
    pub feed: FeedOutcome,
    pub template: PathBuf,
    /// Template content differs (or, in check mode, would differ).
    pub changed: bool,
    pub mode: BuildMode,
    pub warnings: Vec<BuildWarning>,
}

/// Run discover → feed → inject.
///
/// `env` looks up environment variables; pass `|k| std::env::var(k).ok()`
/// for the process environment.
pub fn build<F>(
    config: &Config,
    paths: &SitePaths,
    mode: BuildMode,
    env: F,
) -> Result<BuildReport, BuildError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut warnings = Vec::new();

    log::info!("scanning {}", paths.images_dir.display());
    let images = discover::discover(&paths.images_dir)?;
    if images.is_empty() {
        warnings.push(BuildWarning::NoImages(paths.images_dir.clone()));
    } else {
        log::info!("found {} images", images.len());
    }

    let feed_url = feed::feed_url_from_env(&config.feed, &env);
    if feed_url.is_none() {
        warnings.push(BuildWarning::NoFeedId(config.feed.id_env.clone()));
    }

    let options = InjectOptions::from_config(config);
    let (feed, changed) = match mode {
        BuildMode::Write => {
            let report =
                inject::inject_file(&paths.template, &images, feed_url.as_deref(), &options)?;
            (report.feed, report.changed)
        }
        BuildMode::Check => {
            let (original, injection) =
                inject::render_file(&paths.template, &images, feed_url.as_deref(), &options)?;
            (injection.feed, injection.content != original)
        }
    };

    if feed_url.is_some() && feed == FeedOutcome::NoMarkers {
        log::debug!(
            "{} has no feed markers; skipping feed URL",
            paths.template.display()
        );
    }
    for warning in &warnings {
        log::warn!("{warning}");
    }

    Ok(BuildReport {
        images,
        feed_url,
        feed,
        template: paths.template.clone(),
        changed,
        mode,
        warnings,
    })
}
