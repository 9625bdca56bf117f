//! Marker-delimited template injection.
//!
//! The site template carries two marker pairs. Each build replaces whatever
//! sits between a start marker line and its end marker line with a freshly
//! rendered declaration; every other byte of the file is copied through.
//!
//! ```text
//! <script>
//!   // IMAGES_LIST_START          ← kept verbatim
//!   const images = [              ┐
//!     '20241201.png',             │ regenerated
//!     '20241202.png'              │
//!   ];                            ┘
//!   // IMAGES_LIST_END            ← kept verbatim
//!
//!   // GIST_URL_START
//!   const GIST_URL = 'https://gist.githubusercontent.com/...';
//!   // GIST_URL_END
//! </script>
//! ```
//!
//! ## Region State Machine
//!
//! Each pair is handled in one pass over the lines:
//!
//! ```text
//! Before ──start──▶ Inside ──end──▶ After
//! ```
//!
//! Lines in `Before` and `After` are copied. The start line is copied on the
//! transition and the rendered block follows it; lines in `Inside` are
//! dropped. A start with no end, an end before any start, or a second
//! occurrence of either marker is a [`TemplateError`]. Markers match as
//! substrings of a line.
//!
//! The image pair is mandatory. The feed pair is optional: when it is absent
//! from the template the feed step is a no-op.
//!
//! ## Writing
//!
//! [`inject_file`] renders the complete output in memory, writes it to a
//! scratch file next to the target and renames it over the original. Any
//! failure drops the scratch file, so the template is either the old bytes or
//! the new bytes, never a partial write.

use crate::config::{Config, MarkerConfig};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Structural problems with the marker lines of a template.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("marker {start:?} not found")]
    MissingMarkers { start: String },
    #[error("marker {start:?} on line {line} has no matching {end:?}")]
    UnclosedRegion {
        start: String,
        end: String,
        line: usize,
    },
    #[error("marker {end:?} on line {line} appears before any {start:?}")]
    UnopenedRegion {
        start: String,
        end: String,
        line: usize,
    },
    #[error("marker {marker:?} repeated on line {line}; only one region is allowed")]
    DuplicateMarker { marker: String, line: usize },
    #[error("markers {start:?} and {end:?} share line {line}; each needs its own line")]
    SingleLineRegion {
        start: String,
        end: String,
        line: usize,
    },
}

#[derive(Error, Debug)]
pub enum InjectError {
    #[error("template not found: {0}")]
    NotFound(PathBuf),
    #[error("malformed template {path}: {source}")]
    MalformedTemplate {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A start/end marker pair.
#[derive(Debug, Clone, Copy)]
pub struct MarkerPair<'a> {
    pub start: &'a str,
    pub end: &'a str,
}

/// Markers and identifiers needed to render both regions.
#[derive(Debug, Clone, Copy)]
pub struct InjectOptions<'a> {
    pub images: MarkerPair<'a>,
    pub feed: MarkerPair<'a>,
    pub list_name: &'a str,
    pub feed_name: &'a str,
}

impl<'a> InjectOptions<'a> {
    pub fn from_config(config: &'a Config) -> Self {
        let MarkerConfig {
            images_start,
            images_end,
            feed_start,
            feed_end,
        } = &config.markers;
        Self {
            images: MarkerPair {
                start: images_start,
                end: images_end,
            },
            feed: MarkerPair {
                start: feed_start,
                end: feed_end,
            },
            list_name: &config.site.list_name,
            feed_name: &config.site.feed_name,
        }
    }
}

/// What happened to the feed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The region now holds the feed URL.
    Injected,
    /// No URL was supplied; the region was left as is.
    NoUrl,
    /// The template has no feed markers.
    NoMarkers,
}

/// Result of rendering a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub content: String,
    pub feed: FeedOutcome,
}

/// Result of [`inject_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectReport {
    pub path: PathBuf,
    pub image_count: usize,
    pub feed: FeedOutcome,
    /// False when the rendered output matched the file and nothing was written.
    pub changed: bool,
}

enum RegionState {
    Before,
    Inside { start_line: usize },
    After,
}

/// Rewrite the single region delimited by `pair`.
///
/// `render` receives the start line's indentation and line ending and
/// returns the replacement block. Returns `Ok(None)` when neither marker
/// occurs in `content`. A line carrying both markers has no room for a
/// region and is rejected with [`TemplateError::SingleLineRegion`].
fn rewrite_region<F>(
    content: &str,
    pair: MarkerPair<'_>,
    render: F,
) -> Result<Option<String>, TemplateError>
where
    F: Fn(&str, &str) -> String,
{
    let mut out = String::with_capacity(content.len());
    let mut state = RegionState::Before;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let is_start = line.contains(pair.start);
        let is_end = line.contains(pair.end);
        if is_start && is_end {
            return Err(TemplateError::SingleLineRegion {
                start: pair.start.to_string(),
                end: pair.end.to_string(),
                line: line_no,
            });
        }

        state = match state {
            RegionState::Before if is_start => {
                out.push_str(line);
                out.push_str(&render(indentation(line), line_ending(line)));
                RegionState::Inside {
                    start_line: line_no,
                }
            }
            RegionState::Before if is_end => {
                return Err(TemplateError::UnopenedRegion {
                    start: pair.start.to_string(),
                    end: pair.end.to_string(),
                    line: line_no,
                });
            }
            RegionState::Before => {
                out.push_str(line);
                RegionState::Before
            }
            RegionState::Inside { .. } if is_start => {
                return Err(TemplateError::DuplicateMarker {
                    marker: pair.start.to_string(),
                    line: line_no,
                });
            }
            RegionState::Inside { .. } if is_end => {
                out.push_str(line);
                RegionState::After
            }
            inside @ RegionState::Inside { .. } => inside,
            RegionState::After if is_start || is_end => {
                let marker = if is_start { pair.start } else { pair.end };
                return Err(TemplateError::DuplicateMarker {
                    marker: marker.to_string(),
                    line: line_no,
                });
            }
            RegionState::After => {
                out.push_str(line);
                RegionState::After
            }
        };
    }

    match state {
        RegionState::Before => Ok(None),
        RegionState::Inside { start_line } => Err(TemplateError::UnclosedRegion {
            start: pair.start.to_string(),
            end: pair.end.to_string(),
            line: start_line,
        }),
        RegionState::After => Ok(Some(out)),
    }
}

fn indentation(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

fn line_ending(line: &str) -> &'static str {
    if line.ends_with("\r\n") { "\r\n" } else { "\n" }
}

/// Render the image list declaration.
///
/// Names are wrapped in single quotes without escaping; filenames containing
/// `'` would produce invalid script.
pub fn render_image_list(name: &str, images: &[String], indent: &str, eol: &str) -> String {
    if images.is_empty() {
        return format!("{indent}const {name} = [];{eol}");
    }
    let mut block = format!("{indent}const {name} = [{eol}");
    let last = images.len() - 1;
    for (i, image) in images.iter().enumerate() {
        let sep = if i == last { "" } else { "," };
        block.push_str(&format!("{indent}  '{image}'{sep}{eol}"));
    }
    block.push_str(&format!("{indent}];{eol}"));
    block
}

/// Render the feed URL declaration.
pub fn render_feed_url(name: &str, url: &str, indent: &str, eol: &str) -> String {
    format!("{indent}const {name} = '{url}';{eol}")
}

/// Render both regions of `content` without touching the filesystem.
///
/// The feed pair is validated even when `feed_url` is `None`, so a broken
/// template is reported regardless of the environment.
pub fn inject_str(
    content: &str,
    images: &[String],
    feed_url: Option<&str>,
    options: &InjectOptions<'_>,
) -> Result<Injection, TemplateError> {
    let with_images = rewrite_region(content, options.images, |indent, eol| {
        render_image_list(options.list_name, images, indent, eol)
    })?
    .ok_or_else(|| TemplateError::MissingMarkers {
        start: options.images.start.to_string(),
    })?;

    match feed_url {
        Some(url) => {
            let rendered = rewrite_region(&with_images, options.feed, |indent, eol| {
                render_feed_url(options.feed_name, url, indent, eol)
            })?;
            Ok(match rendered {
                Some(content) => Injection {
                    content,
                    feed: FeedOutcome::Injected,
                },
                None => Injection {
                    content: with_images,
                    feed: FeedOutcome::NoMarkers,
                },
            })
        }
        None => {
            let present = rewrite_region(&with_images, options.feed, |_, _| String::new())?;
            Ok(Injection {
                content: with_images,
                feed: if present.is_some() {
                    FeedOutcome::NoUrl
                } else {
                    FeedOutcome::NoMarkers
                },
            })
        }
    }
}

/// Read a template and render it. Nothing is written.
pub fn render_file(
    path: &Path,
    images: &[String],
    feed_url: Option<&str>,
    options: &InjectOptions<'_>,
) -> Result<(String, Injection), InjectError> {
    let original = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => InjectError::NotFound(path.to_path_buf()),
        _ => InjectError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    let injection = inject_str(&original, images, feed_url, options).map_err(|source| {
        InjectError::MalformedTemplate {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok((original, injection))
}

/// Inject the image list and feed URL into the template at `path`.
///
/// The file is replaced atomically and only when its content changes.
pub fn inject_file(
    path: &Path,
    images: &[String],
    feed_url: Option<&str>,
    options: &InjectOptions<'_>,
) -> Result<InjectReport, InjectError> {
    let (original, injection) = render_file(path, images, feed_url, options)?;
    let changed = injection.content != original;
    if changed {
        write_atomic(path, &injection.content).map_err(|source| InjectError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(InjectReport {
        path: path.to_path_buf(),
        image_count: images.len(),
        feed: injection.feed,
        changed,
    })
}

/// Write `content` to a scratch file beside `path`, then rename it into place.
///
/// A symlinked `path` is resolved first so the link stays and its target is
/// replaced. The scratch file is deleted if any step fails before the rename.
pub fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    let target = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(e),
    };
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut scratch = NamedTempFile::new_in(dir)?;
    if let Ok(meta) = fs::metadata(&target) {
        fs::set_permissions(scratch.path(), meta.permissions())?;
    }
    scratch.write_all(content.as_bytes())?;
    scratch.flush()?;
    scratch.as_file().sync_all()?;
    scratch.persist(&target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn inject(content: &str, images: &[&str], feed: Option<&str>) -> Injection {
        let config = Config::default();
        inject_str(
            content,
            &names(images),
            feed,
            &InjectOptions::from_config(&config),
        )
        .unwrap()
    }

    fn inject_err(content: &str) -> TemplateError {
        let config = Config::default();
        inject_str(
            content,
            &names(&["a.png"]),
            Some("https://example.com/feed.json"),
            &InjectOptions::from_config(&config),
        )
        .unwrap_err()
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[test]
    fn render_list_quotes_each_name() {
        let block = render_image_list("images", &names(&["A.JPG", "b.png"]), "  ", "\n");
        assert_eq!(block, "  const images = [\n    'A.JPG',\n    'b.png'\n  ];\n");
    }

    #[test]
    fn render_empty_list() {
        assert_eq!(
            render_image_list("images", &[], "", "\n"),
            "const images = [];\n"
        );
    }

    #[test]
    fn render_feed_declaration() {
        assert_eq!(
            render_feed_url("GIST_URL", "https://x/y.json", "    ", "\r\n"),
            "    const GIST_URL = 'https://x/y.json';\r\n"
        );
    }

    // =========================================================================
    // inject_str
    // =========================================================================

    #[test]
    fn replaces_image_region_and_keeps_markers() {
        let result = inject(SAMPLE_TEMPLATE, &["A.JPG", "b.png"], None);
        assert!(result.content.contains(
            "  // IMAGES_LIST_START\n  const images = [\n    'A.JPG',\n    'b.png'\n  ];\n  // IMAGES_LIST_END\n"
        ));
        assert!(!result.content.contains("old.png"));
    }

    #[test]
    fn empty_list_has_no_elements() {
        let result = inject(SAMPLE_TEMPLATE, &[], None);
        assert!(
            result
                .content
                .contains("// IMAGES_LIST_START\n  const images = [];\n  // IMAGES_LIST_END")
        );
    }

    #[test]
    fn feed_injected_when_url_present() {
        let url = "https://gist.githubusercontent.com/pappater/abc123/raw/art_prompts.json";
        let result = inject(SAMPLE_TEMPLATE, &["a.png"], Some(url));
        assert_eq!(result.feed, FeedOutcome::Injected);
        assert!(result.content.contains(&format!(
            "  // GIST_URL_START\n  const GIST_URL = '{url}';\n  // GIST_URL_END\n"
        )));
        assert!(!result.content.contains("const GIST_URL = '';"));
    }

    #[test]
    fn feed_region_untouched_without_url() {
        let result = inject(SAMPLE_TEMPLATE, &["a.png"], None);
        assert_eq!(result.feed, FeedOutcome::NoUrl);
        assert!(result.content.contains(
            "  // GIST_URL_START\n  const GIST_URL = '';\n  // GIST_URL_END\n"
        ));
    }

    #[test]
    fn outside_content_preserved() {
        let result = inject(SAMPLE_TEMPLATE, &["x.webp"], Some("https://f"));
        let (before, _) = SAMPLE_TEMPLATE.split_once("// IMAGES_LIST_START").unwrap();
        let (_, between) = SAMPLE_TEMPLATE.split_once("// IMAGES_LIST_END").unwrap();
        let (between, _) = between.split_once("// GIST_URL_START").unwrap();
        let (_, after) = SAMPLE_TEMPLATE.split_once("// GIST_URL_END").unwrap();

        assert!(result.content.starts_with(before));
        assert!(result.content.contains(between));
        assert!(result.content.ends_with(after));
    }

    #[test]
    fn second_run_is_identical() {
        let images = ["a.png", "b.svg"];
        let first = inject(SAMPLE_TEMPLATE, &images, Some("https://f"));
        let second = inject(&first.content, &images, Some("https://f"));
        assert_eq!(first.content, second.content);
    }

    #[test]
    fn crlf_line_endings_preserved() {
        let template = SAMPLE_TEMPLATE.replace('\n', "\r\n");
        let result = inject(&template, &["a.png"], Some("https://f"));
        assert!(!result.content.replace("\r\n", "").contains('\n'));
        assert!(result.content.contains("  const images = [\r\n    'a.png'\r\n  ];\r\n"));
    }

    #[test]
    fn file_without_trailing_newline() {
        let template = "// IMAGES_LIST_START\nold\n// IMAGES_LIST_END";
        let result = inject(template, &["a.png"], None);
        assert_eq!(
            result.content,
            "// IMAGES_LIST_START\nconst images = [\n  'a.png'\n];\n// IMAGES_LIST_END"
        );
        assert_eq!(result.feed, FeedOutcome::NoMarkers);
    }

    #[test]
    fn markers_match_as_substrings() {
        let template = "<script>/* x */ // IMAGES_LIST_START here\n\
                        stale\n\
                        ;// IMAGES_LIST_END\n</script>\n";
        let result = inject(template, &[], None);
        assert_eq!(
            result.content,
            "<script>/* x */ // IMAGES_LIST_START here\n\
             const images = [];\n\
             ;// IMAGES_LIST_END\n</script>\n"
        );
    }

    #[test]
    fn both_markers_on_one_line_is_error() {
        let err = inject_err("const images = []; // IMAGES_LIST_START // IMAGES_LIST_END\n");
        assert_eq!(
            err,
            TemplateError::SingleLineRegion {
                start: "// IMAGES_LIST_START".to_string(),
                end: "// IMAGES_LIST_END".to_string(),
                line: 1,
            }
        );
    }

    #[test]
    fn missing_feed_markers_skipped() {
        let template = "// IMAGES_LIST_START\n// IMAGES_LIST_END\n";
        let result = inject(template, &["a.png"], Some("https://f"));
        assert_eq!(result.feed, FeedOutcome::NoMarkers);
        assert!(!result.content.contains("GIST_URL"));
    }

    // =========================================================================
    // Malformed templates
    // =========================================================================

    #[test]
    fn missing_image_markers_is_error() {
        let err = inject_err("<html></html>\n");
        assert!(matches!(err, TemplateError::MissingMarkers { .. }));
    }

    #[test]
    fn missing_image_end_is_error() {
        let err = inject_err("a\n// IMAGES_LIST_START\nb\n");
        assert_eq!(
            err,
            TemplateError::UnclosedRegion {
                start: "// IMAGES_LIST_START".to_string(),
                end: "// IMAGES_LIST_END".to_string(),
                line: 2,
            }
        );
    }

    #[test]
    fn end_before_start_is_error() {
        let err = inject_err("// IMAGES_LIST_END\n// IMAGES_LIST_START\n");
        assert!(matches!(err, TemplateError::UnopenedRegion { line: 1, .. }));
    }

    #[test]
    fn duplicate_region_is_error() {
        let template = "// IMAGES_LIST_START\n// IMAGES_LIST_END\n\
                        // IMAGES_LIST_START\n// IMAGES_LIST_END\n";
        let err = inject_err(template);
        assert!(matches!(err, TemplateError::DuplicateMarker { line: 3, .. }));
    }

    #[test]
    fn nested_start_is_error() {
        let err = inject_err("// IMAGES_LIST_START\n// IMAGES_LIST_START\n// IMAGES_LIST_END\n");
        assert!(matches!(err, TemplateError::DuplicateMarker { line: 2, .. }));
    }

    #[test]
    fn malformed_feed_markers_is_error_even_without_url() {
        let config = Config::default();
        let template = "// IMAGES_LIST_START\n// IMAGES_LIST_END\n// GIST_URL_START\n";
        let err = inject_str(
            template,
            &[],
            None,
            &InjectOptions::from_config(&config),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::UnclosedRegion { .. }));
    }

    // =========================================================================
    // inject_file
    // =========================================================================

    #[test]
    fn inject_file_rewrites_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = write_template(tmp.path(), SAMPLE_TEMPLATE);
        let config = Config::default();

        let report = inject_file(
            &path,
            &names(&["a.png"]),
            None,
            &InjectOptions::from_config(&config),
        )
        .unwrap();

        assert!(report.changed);
        assert_eq!(report.image_count, 1);
        assert!(fs::read_to_string(&path).unwrap().contains("'a.png'"));
    }

    #[test]
    fn inject_file_unchanged_skips_write() {
        let tmp = TempDir::new().unwrap();
        let path = write_template(tmp.path(), SAMPLE_TEMPLATE);
        let config = Config::default();
        let options = InjectOptions::from_config(&config);

        inject_file(&path, &names(&["a.png"]), None, &options).unwrap();
        let first = fs::read(&path).unwrap();
        let report = inject_file(&path, &names(&["a.png"]), None, &options).unwrap();

        assert!(!report.changed);
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn malformed_file_left_untouched() {
        let tmp = TempDir::new().unwrap();
        let broken = "<script>\n// IMAGES_LIST_START\nconst images = ['x.png'];\n</script>\n";
        let path = write_template(tmp.path(), broken);
        let config = Config::default();

        let result = inject_file(
            &path,
            &names(&["a.png"]),
            None,
            &InjectOptions::from_config(&config),
        );

        assert!(matches!(
            result,
            Err(InjectError::MalformedTemplate {
                source: TemplateError::UnclosedRegion { .. },
                ..
            })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), broken);
        assert_eq!(dir_entry_count(tmp.path()), 1, "no scratch file left behind");
    }

    #[test]
    fn missing_template_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let config = Config::default();
        let result = inject_file(
            &tmp.path().join("index.html"),
            &[],
            None,
            &InjectOptions::from_config(&config),
        );
        assert!(matches!(result, Err(InjectError::NotFound(_))));
    }

    #[test]
    fn write_atomic_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = write_template(tmp.path(), "old contents that are longer\n");
        write_atomic(&path, "new\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert_eq!(dir_entry_count(tmp.path()), 1);
    }

    #[cfg(unix)]
    #[test]
    fn inject_file_through_symlink_updates_target() {
        let tmp = TempDir::new().unwrap();
        let deploy = tmp.path().join("deploy");
        fs::create_dir(&deploy).unwrap();
        let real = deploy.join("real.html");
        fs::write(&real, "// IMAGES_LIST_START\n// IMAGES_LIST_END\n").unwrap();
        let link = tmp.path().join("index.html");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let config = Config::default();

        let report = inject_file(
            &link,
            &names(&["a.png"]),
            None,
            &InjectOptions::from_config(&config),
        )
        .unwrap();

        assert!(report.changed);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(
            fs::read_to_string(&real).unwrap(),
            "// IMAGES_LIST_START\nconst images = [\n  'a.png'\n];\n// IMAGES_LIST_END\n"
        );
        assert_eq!(dir_entry_count(&deploy), 1, "no scratch file left behind");
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = write_template(tmp.path(), "x\n");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        write_atomic(&path, "y\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
