//! # artgal
//!
//! Build and content tooling for a static AI-art gallery. The site itself is a
//! single hand-written HTML page; artgal keeps it in sync with the `images/`
//! directory and feeds it new artwork.
//!
//! # Commands
//!
//! ```text
//! artgal build      images/ + $FISH_GIST_ID  →  index.html (rewritten in place)
//! artgal check      same as build, but only validates and reports
//! artgal scan       list the images a build would inject
//! artgal generate   style → concept → gist → images/{timestamp}.png
//! ```
//!
//! A typical automation run is `generate` followed by `build`: the new image
//! lands in `images/`, and the next build picks it up.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`discover`] | Lists gallery images: top level only, allowed extensions, sorted |
//! | [`inject`] | Marker-region state machine and atomic template rewrite |
//! | [`feed`] | Gist feed URL built from the environment |
//! | [`build`] | Runs discover → feed → inject and collects warnings |
//! | [`generate`] | Content generation job and its Gemini / gist clients |
//! | [`config`] | Optional `artgal.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Markers Over Templating
//!
//! The page is edited by hand, so artgal never owns it. Two comment marker
//! pairs fence off the only lines the tool may touch; everything else is
//! copied byte for byte. A template with broken markers is rejected before
//! anything is written.
//!
//! ## Fatal vs Soft
//!
//! A missing images directory or broken markers fail the run with a non-zero
//! exit. An empty gallery or a missing gist id only warn: the page still
//! builds, with an empty list or without a feed. In `generate`, losing the
//! image step is also soft because the concept has already been published.

pub mod build;
pub mod config;
pub mod discover;
pub mod feed;
pub mod generate;
pub mod inject;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
