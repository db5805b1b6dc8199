//! Resolution of the OCR bearer credential.
//!
//! The credential can be supplied in two ways, checked in priority order:
//!
//! 1. **Direct value** - e.g. `OCR_API_KEY=sk-...` for local testing
//! 2. **File reference** - e.g. `OCR_API_KEY_FILE=/run/secrets/ocr_key` for
//!    Docker/Kubernetes secrets

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves an optional secret from a direct value or a file.
///
/// Empty strings count as "not provided". Returns `Ok(None)` when neither
/// source is set, since unauthenticated OCR endpoints are allowed.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
) -> Result<Option<SecretString>> {
    if let Some(value) = direct {
        let value = value.trim();
        if !value.is_empty() {
            return Ok(Some(SecretString::from(value.to_string())));
        }
    }

    if let Some(path) = file_path {
        if !path.is_empty() {
            let expanded = expand_home(path);
            let content =
                fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
                    path: expanded.clone(),
                    source: e,
                })?;
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Err(SecretError::EmptyFile { path: expanded });
            }
            return Ok(Some(SecretString::from(trimmed.to_string())));
        }
    }

    Ok(None)
}

/// Expands `~` to the user's home directory.
///
/// Only `~` and `~/path` are supported, not `~user/path`.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            if path == "~" {
                return home.to_string_lossy().into_owned();
            }
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_direct_value_takes_priority() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "file_value").unwrap();

        let result = resolve_secret_optional(
            Some("direct_value"),
            Some(temp_file.path().to_str().unwrap()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
    }

    #[test]
    fn test_file_content_trimmed() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "  token_with_whitespace  ").unwrap();

        let result = resolve_secret_optional(None, Some(temp_file.path().to_str().unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(result.expose_secret(), "token_with_whitespace");
    }

    #[test]
    fn test_empty_direct_value_falls_through_to_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "from_file").unwrap();

        let result = resolve_secret_optional(Some("  "), Some(temp_file.path().to_str().unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(result.expose_secret(), "from_file");
    }

    #[test]
    fn test_no_source_is_none() {
        assert!(resolve_secret_optional(None, None).unwrap().is_none());
        assert!(resolve_secret_optional(Some(""), Some("")).unwrap().is_none());
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret_optional(None, Some("/nonexistent/path/to/secret"));
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    fn test_empty_file_error() {
        let temp_file = NamedTempFile::new().unwrap();
        let result = resolve_secret_optional(None, Some(temp_file.path().to_str().unwrap()));
        assert!(matches!(result, Err(SecretError::EmptyFile { .. })));
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/run/secrets/key"), "/run/secrets/key");
    }
}
