//! Error types surfaced to the top level.
//!
//! Only whole-operation preconditions end up here. Per-file and per-link
//! problems are recovered where they happen and show up in reports instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("directory `{0}` doesn't exist")]
    DirectoryNotFound(PathBuf),

    #[error("could not find {what} for `{searched_from}`")]
    ConfigurationMissing { what: String, searched_from: PathBuf },

    #[error("could not parse redirect manifest `{path}`")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not parse config file `{path}`")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not parse docset configuration `{path}`")]
    DocsetConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid glob pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("IO error when accessing `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not serialize output")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SweepError>;

impl SweepError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn missing(what: impl Into<String>, searched_from: impl Into<PathBuf>) -> Self {
        Self::ConfigurationMissing {
            what: what.into(),
            searched_from: searched_from.into(),
        }
    }
}
