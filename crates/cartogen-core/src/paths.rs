//! Filename sanitation and path-sandbox safety.
//!
//! Region names and data column headers end up as output file names, and
//! boundary/data paths come from callers. Everything that reaches the
//! filesystem goes through these helpers first.

use std::path::{Component, Path, PathBuf};

use crate::error::{CartogenError, Result};

const INVALID_FILENAME_CHARS: &[char] =
    &['\\', '/', ':', '*', '?', '\'', '"', '<', '>', '|'];

/// Replace characters unsafe for filenames with underscores.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if INVALID_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Reject names containing characters unsafe for filenames.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.chars().any(|c| INVALID_FILENAME_CHARS.contains(&c)) {
        return Err(CartogenError::InvalidColumnName { name: filename.to_string() });
    }
    Ok(())
}

/// Normalize a path lexically, resolving `.` and `..` without touching the
/// filesystem. A `..` that would climb above the start of the path is kept
/// so sandbox checks still see the escape attempt.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if popped {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join `parts` onto `root` and verify the result stays inside one of the
/// allowed `roots`. Relative inputs are resolved against `root`.
///
/// The raw path never appears in the returned error; it is logged
/// operator-side only.
pub fn safe_join(roots: &[PathBuf], root: &Path, parts: &[&str]) -> Result<PathBuf> {
    let mut joined = PathBuf::from(root);
    for part in parts {
        joined.push(part);
    }
    resolve_safe(roots, &joined)
}

/// Verify an already-built path stays inside one of the allowed roots.
pub fn resolve_safe(roots: &[PathBuf], path: &Path) -> Result<PathBuf> {
    let full = normalize(path);
    let allowed = roots.iter().any(|r| full.starts_with(normalize(r)));
    if !allowed {
        tracing::error!(path = %full.display(), "path escapes the allowed data roots");
        return Err(CartogenError::UnsafePath);
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Vec<PathBuf> {
        vec![PathBuf::from("/data/tmp"), PathBuf::from("/data/userdata")]
    }

    #[test]
    fn test_sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize_filename(r#"Popu\lation:2020?"#), "Popu_lation_2020_");
        assert_eq!(sanitize_filename("Population (people)"), "Population (people)");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize_filename("a/b:c*d");
        assert_eq!(sanitize_filename(&once), once);
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("Population (people)").is_ok());
        assert!(validate_filename("bad/name").is_err());
        assert!(validate_filename("quote\"name").is_err());
    }

    #[test]
    fn test_safe_join_inside_root() {
        let path = safe_join(&roots(), Path::new("/data/tmp"), &["abc", "map.json"]).unwrap();
        assert_eq!(path, PathBuf::from("/data/tmp/abc/map.json"));
    }

    #[test]
    fn test_safe_join_rejects_escape() {
        let err = safe_join(&roots(), Path::new("/data/tmp"), &["..", "..", "etc", "passwd"])
            .unwrap_err();
        assert!(matches!(err, CartogenError::UnsafePath));
        // The raw path must not leak into the user-facing message
        assert!(!err.to_string().contains("passwd"));
    }

    #[test]
    fn test_safe_join_rejects_sibling_root() {
        assert!(resolve_safe(&roots(), Path::new("/data/other/map.json")).is_err());
    }

    #[test]
    fn test_normalize_resolves_dotdot_inside() {
        let path = resolve_safe(&roots(), Path::new("/data/tmp/a/../b.json")).unwrap();
        assert_eq!(path, PathBuf::from("/data/tmp/b.json"));
    }
}
