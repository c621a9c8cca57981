use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug)]
pub struct BasaltConfig {
    #[serde(default = "defaults::queue_name")]
    pub queue_name: String,
    #[serde(default = "defaults::path")]
    pub path: String,
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,
    #[serde(default = "defaults::message_size")]
    pub message_size: usize,
    #[serde(default = "defaults::message_count")]
    pub message_count: u64,
}

/// Why a config file could not be turned into a [`BasaltConfig`].
///
/// Both variants carry the offending path so the binaries can report it
/// without threading extra context through.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot load config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} is not valid TOML: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

mod defaults {
    pub fn queue_name() -> String {
        "basalt".into()
    }

    pub fn path() -> String {
        "/tmp".into()
    }

    pub fn capacity() -> usize {
        1 << 16
    }

    pub fn message_size() -> usize {
        64
    }

    pub fn message_count() -> u64 {
        1_000_000
    }
}

impl Default for BasaltConfig {
    fn default() -> Self {
        Self {
            queue_name: defaults::queue_name(),
            path: defaults::path(),
            capacity: defaults::capacity(),
            message_size: defaults::message_size(),
            message_count: defaults::message_count(),
        }
    }
}

impl BasaltConfig {
    /// Reads and parses a TOML config file. Any field absent from the file
    /// falls back to its default.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Invalid {
            path: path.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: BasaltConfig = toml::from_str("queue_name = \"md\"").unwrap();
        assert_eq!(config.queue_name, "md");
        assert_eq!(config.path, "/tmp");
        assert_eq!(config.capacity, 1 << 16);
        assert_eq!(config.message_size, 64);
        assert_eq!(config.message_count, 1_000_000);
    }

    #[test]
    fn load_reports_the_offending_path() {
        let err = BasaltConfig::load("/nonexistent/basalt.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/basalt.toml"));
    }

    #[test]
    fn explicit_fields_win() {
        let config: BasaltConfig = toml::from_str(
            "queue_name = \"md\"\npath = \"/run/shm\"\ncapacity = 8192\nmessage_size = 32\nmessage_count = 10",
        )
        .unwrap();
        assert_eq!(config.path, "/run/shm");
        assert_eq!(config.capacity, 8192);
        assert_eq!(config.message_size, 32);
        assert_eq!(config.message_count, 10);
    }
}
