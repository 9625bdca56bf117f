//! Image discovery.
//!
//! Lists the gallery images in a single directory. Only the top level is
//! scanned, only regular files count, and the extension check is
//! case-insensitive. The result is sorted by byte order of the filename so
//! repeated builds over the same directory produce the same list.
//!
//! ```text
//! images/
//! ├── A.JPG            ✓
//! ├── b.png            ✓
//! ├── b_metadata.json  ✗ (extension)
//! ├── notes.txt        ✗ (extension)
//! └── drafts/          ✗ (directory, not descended into)
//! ```

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions accepted as gallery images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "svg", "webp"];

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("images directory not found: {0}")]
    NotFound(PathBuf),
    #[error("images directory is not readable: {0}")]
    Access(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DiscoverError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => DiscoverError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => DiscoverError::Access(path.to_path_buf()),
            _ => DiscoverError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Whether a filename carries one of the [`IMAGE_EXTENSIONS`].
pub fn has_image_extension(name: &Path) -> bool {
    name.extension()
        .map(|e| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| e.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Return the sorted image filenames directly inside `dir`.
///
/// An empty result is not an error; callers decide how to report it.
pub fn discover(dir: &Path) -> Result<Vec<String>, DiscoverError> {
    let meta = std::fs::metadata(dir).map_err(|e| DiscoverError::from_io(dir, e))?;
    if !meta.is_dir() {
        return Err(DiscoverError::NotADirectory(dir.to_path_buf()));
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(io_err) => DiscoverError::from_io(&path, io_err),
                None => DiscoverError::Io {
                    path,
                    source: io::Error::other("filesystem loop"),
                },
            }
        })?;

        // Follows symlinks: a link to a file counts, a link to a directory doesn't.
        if !entry.path().is_file() || !has_image_extension(entry.path()) {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) => names.push(name.to_string()),
            None => log::warn!(
                "skipping image with non UTF-8 name: {}",
                entry.path().display()
            ),
        }
    }

    names.sort();
    Ok(names)
}
