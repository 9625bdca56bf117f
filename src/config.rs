//! Site configuration module.
//!
//! Handles loading and validating `artgal.toml`. The file is optional and
//! sparse: stock defaults are serialized to a TOML table, the user file is
//! merged on top key by key, and the result is deserialized and validated.
//!
//! ## Config File Location
//!
//! ```text
//! site/
//! ├── artgal.toml          # Optional overrides
//! ├── art_styles.json      # Style list for `artgal generate`
//! ├── index.html           # Template with injection markers
//! └── images/              # Gallery images
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! images_dir = "images"
//! template = "index.html"
//! list_name = "images"        # JS identifier of the injected list
//! feed_name = "GIST_URL"      # JS identifier of the injected feed URL
//!
//! [markers]
//! images_start = "// IMAGES_LIST_START"
//! images_end = "// IMAGES_LIST_END"
//! feed_start = "// GIST_URL_START"
//! feed_end = "// GIST_URL_END"
//!
//! [feed]
//! owner = "pappater"
//! file = "art_prompts.json"
//! id_env = "FISH_GIST_ID"
//! owner_env = "GIST_OWNER"
//!
//! [generate]
//! styles_file = "art_styles.json"
//! text_model = "gemini-2.0-flash-exp"
//! image_model = "imagen-3.0-generate-001"
//! image_provider = "gemini"   # or "imagen"
//! skip_images = false
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the site root.
pub const CONFIG_FILENAME: &str = "artgal.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `artgal.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Site layout: where images and the template live.
    pub site: SiteConfig,
    /// Literal marker lines delimiting the injection regions.
    pub markers: MarkerConfig,
    /// Gist feed URL construction.
    pub feed: FeedConfig,
    /// Content generation settings.
    pub generate: GenerateConfig,
}

impl Config {
    /// Validate values that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.images_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.images_dir must not be empty".into(),
            ));
        }
        if self.site.template.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.template must not be empty".into(),
            ));
        }
        for (key, name) in [
            ("site.list_name", &self.site.list_name),
            ("site.feed_name", &self.site.feed_name),
        ] {
            if !is_identifier(name) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a valid identifier, got {name:?}"
                )));
            }
        }
        self.markers.validate()
    }
}

/// A JS-style identifier: letters, digits, `_` or `$`, not starting with a digit.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Site layout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Directory holding gallery images, relative to the site root.
    pub images_dir: String,
    /// Template file rewritten in place, relative to the site root.
    pub template: String,
    /// Identifier of the injected image list.
    pub list_name: String,
    /// Identifier of the injected feed URL.
    pub feed_name: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            images_dir: "images".to_string(),
            template: "index.html".to_string(),
            list_name: "images".to_string(),
            feed_name: "GIST_URL".to_string(),
        }
    }
}

/// Marker lines for both injection regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerConfig {
    pub images_start: String,
    pub images_end: String,
    pub feed_start: String,
    pub feed_end: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            images_start: "// IMAGES_LIST_START".to_string(),
            images_end: "// IMAGES_LIST_END".to_string(),
            feed_start: "// GIST_URL_START".to_string(),
            feed_end: "// GIST_URL_END".to_string(),
        }
    }
}

impl MarkerConfig {
    /// Markers are matched by substring, so none may be empty and none may
    /// contain another; otherwise a single line could match two markers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("markers.images_start", &self.images_start),
            ("markers.images_end", &self.images_end),
            ("markers.feed_start", &self.feed_start),
            ("markers.feed_end", &self.feed_end),
        ];
        for (key, marker) in all {
            if marker.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        for (i, (key_a, a)) in all.iter().enumerate() {
            for (key_b, b) in all.iter().skip(i + 1) {
                if a.contains(b.as_str()) || b.contains(a.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "{key_a} and {key_b} overlap ({a:?} / {b:?})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Feed URL settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Gist owner used when `owner_env` is unset.
    pub owner: String,
    /// Raw file name inside the gist.
    pub file: String,
    /// Environment variable carrying the gist identifier.
    pub id_env: String,
    /// Environment variable overriding the owner.
    pub owner_env: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            owner: crate::feed::DEFAULT_OWNER.to_string(),
            file: "art_prompts.json".to_string(),
            id_env: "FISH_GIST_ID".to_string(),
            owner_env: "GIST_OWNER".to_string(),
        }
    }
}

/// Which image endpoint to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProviderKind {
    /// `generateContent` returning base64 `inlineData` parts.
    #[default]
    Gemini,
    /// `predict` returning `bytesBase64Encoded` predictions.
    Imagen,
}

/// Content generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateConfig {
    /// JSON file with an `art_styles` array, relative to the site root.
    pub styles_file: String,
    /// Text model; `GEMINI_MODEL` overrides it.
    pub text_model: String,
    /// Image model.
    pub image_model: String,
    pub image_provider: ImageProviderKind,
    /// Skip image rendering; `SKIP_IMAGE_GENERATION=true` also enables this.
    pub skip_images: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            styles_file: "art_styles.json".to_string(),
            text_model: "gemini-2.0-flash-exp".to_string(),
            image_model: "imagen-3.0-generate-001".to_string(),
            image_provider: ImageProviderKind::default(),
            skip_images: false,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(Config::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `artgal.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config for a site root, falling back to stock defaults.
pub fn load_config(root: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `artgal.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# artgal configuration
# ====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Site layout (paths are relative to the site root)
# ---------------------------------------------------------------------------
[site]
images_dir = "images"
template = "index.html"

# Identifiers used in the generated declarations:
#   const images = [ ... ];
#   const GIST_URL = '...';
list_name = "images"
feed_name = "GIST_URL"

# ---------------------------------------------------------------------------
# Injection markers
# ---------------------------------------------------------------------------
# Matched as substrings of whole lines. Marker lines are kept verbatim;
# everything between a start and its end is replaced on every build.
[markers]
images_start = "// IMAGES_LIST_START"
images_end = "// IMAGES_LIST_END"
feed_start = "// GIST_URL_START"
feed_end = "// GIST_URL_END"

# ---------------------------------------------------------------------------
# Feed URL
# ---------------------------------------------------------------------------
# https://gist.githubusercontent.com/{owner}/{id}/raw/{file}
# The id comes from the environment; without it the feed region is left as is.
[feed]
owner = "pappater"
file = "art_prompts.json"
id_env = "FISH_GIST_ID"
owner_env = "GIST_OWNER"

# ---------------------------------------------------------------------------
# Content generation (`artgal generate`)
# ---------------------------------------------------------------------------
[generate]
styles_file = "art_styles.json"

# GEMINI_MODEL overrides the text model.
text_model = "gemini-2.0-flash-exp"
image_model = "imagen-3.0-generate-001"

# "gemini" reads inline image data from generateContent,
# "imagen" calls the predict endpoint.
image_provider = "gemini"

# SKIP_IMAGE_GENERATION=true has the same effect.
skip_images = false
"##
}
