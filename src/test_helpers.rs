//! Shared test utilities for the artgal test suite.
//!
//! Provides a sample template, fixture setup for the `fixtures/site` gallery,
//! and small filesystem helpers used by the discover, inject and build tests.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Template with both marker pairs, stale content in each region and
/// two-space indentation on the marker lines.
pub const SAMPLE_TEMPLATE: &str = "<!DOCTYPE html>
<html>
<head>
  <title>Gallery</title>
</head>
<body>
<div id=\"gallery\"></div>
<script>
  // IMAGES_LIST_START
  const images = [
    'old.png'
  ];
  // IMAGES_LIST_END

  // GIST_URL_START
  const GIST_URL = '';
  // GIST_URL_END

  render(images, GIST_URL);
</script>
</body>
</html>
";

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Filesystem helpers
// =========================================================================

/// Write `content` as `index.html` in `dir` and return its path.
pub fn write_template(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("index.html");
    std::fs::write(&path, content).unwrap();
    path
}

/// Create empty placeholder files; extension is all discovery looks at.
pub fn touch_all(dir: &Path, names: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for name in names {
        std::fs::write(dir.join(name), "fake image").unwrap();
    }
}

/// Number of entries directly inside `dir`.
pub fn dir_entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
