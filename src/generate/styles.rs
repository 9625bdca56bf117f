//! Art style list loading and selection.
//!
//! The style list is a JSON file of the form `{"art_styles": ["Bauhaus", ...]}`.

use super::GenerateError;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct StylesFile {
    art_styles: Vec<String>,
}

/// Load the non-blank styles from `path`.
pub fn load_styles(path: &Path) -> Result<Vec<String>, GenerateError> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => GenerateError::StylesNotFound(path.to_path_buf()),
        _ => GenerateError::Io(e),
    })?;
    let file: StylesFile =
        serde_json::from_str(&content).map_err(|source| GenerateError::StylesParse {
            path: path.to_path_buf(),
            source,
        })?;

    let styles: Vec<String> = file
        .art_styles
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if styles.is_empty() {
        return Err(GenerateError::NoStyles(path.to_path_buf()));
    }
    Ok(styles)
}

/// Pick one style uniformly at random. `styles` must not be empty.
pub fn choose_style<'a, R: Rng + ?Sized>(styles: &'a [String], rng: &mut R) -> &'a str {
    styles.choose(rng).map(String::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn write_styles(content: &str) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("art_styles.json");
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn loads_styles() {
        let (_tmp, path) = write_styles(r#"{"art_styles": ["Bauhaus", " Ukiyo-e ", ""]}"#);
        assert_eq!(load_styles(&path).unwrap(), vec!["Bauhaus", "Ukiyo-e"]);
    }

    #[test]
    fn extra_keys_ignored() {
        let (_tmp, path) =
            write_styles(r#"{"version": 2, "art_styles": ["Fauvism"], "notes": "x"}"#);
        assert_eq!(load_styles(&path).unwrap(), vec!["Fauvism"]);
    }

    #[test]
    fn missing_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_styles(&tmp.path().join("art_styles.json"));
        assert!(matches!(result, Err(GenerateError::StylesNotFound(_))));
    }

    #[test]
    fn missing_key() {
        let (_tmp, path) = write_styles(r#"{"styles": ["Bauhaus"]}"#);
        assert!(matches!(
            load_styles(&path),
            Err(GenerateError::StylesParse { .. })
        ));
    }

    #[test]
    fn empty_list() {
        let (_tmp, path) = write_styles(r#"{"art_styles": []}"#);
        assert!(matches!(load_styles(&path), Err(GenerateError::NoStyles(_))));
    }

    #[test]
    fn choice_comes_from_list() {
        let styles: Vec<String> = ["Bauhaus", "Ukiyo-e", "Art Nouveau"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let pick = choose_style(&styles, &mut rng);
            assert!(styles.iter().any(|s| s == pick));
            seen.insert(pick.to_string());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn choice_is_seed_deterministic() {
        let styles: Vec<String> = (0..10).map(|i| format!("style-{i}")).collect();
        let a = choose_style(&styles, &mut StdRng::seed_from_u64(42)).to_string();
        let b = choose_style(&styles, &mut StdRng::seed_from_u64(42)).to_string();
        assert_eq!(a, b);
    }
}
