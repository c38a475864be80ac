//! TOML configuration file reading.
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ConfigError;

/// Read and deserialize a TOML file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not valid for `T`.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, path)
}

/// Deserialize TOML text; `path` is only used for error reporting.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the content is not valid for `T`.
pub fn parse_config<T: DeserializeOwned>(content: &str, path: &Path) -> Result<T, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config::<Sample>(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = parse_config::<Sample>("value = \"x\"", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("x.toml"));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.toml");
        std::fs::write(&path, "value = 7\n").unwrap();
        let sample: Sample = load_config(&path).unwrap();
        assert_eq!(sample.value, 7);
    }
}
