//! Error types shared by the locale resolver, the resource loader and the
//! catalog store.

use std::io;
use std::path::{Path, PathBuf};

/// Result alias used throughout the crate.
pub type Result<T, E = MsgcatError> = std::result::Result<T, E>;

/// Errors from message catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum MsgcatError {
    /// A locale string could not be normalized.
    #[error("invalid locale {raw:?}: {reason}")]
    InvalidLocaleFormat {
        /// The input as given by the caller.
        raw: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A resource directory or file could not be read.
    #[error("failed to load resources from {}", path.display())]
    ResourceLoad {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A resource file is not decodable as a message file at all.
    #[error("failed to parse {}:{line}: {message}", path.display())]
    ResourceParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A single entry was rejected.
    #[error(transparent)]
    MalformedEntry(#[from] MalformedEntry),

    /// The number of substitution arguments does not match the template.
    #[error("message {key:?} expects {expected} argument(s), got {found}")]
    SubstitutionArity {
        key: String,
        expected: usize,
        found: usize,
    },
}

impl MsgcatError {
    pub(crate) fn invalid_locale(raw: &str, reason: &'static str) -> Self {
        Self::InvalidLocaleFormat {
            raw: raw.to_owned(),
            reason,
        }
    }

    /// Whether this error came from reading or parsing resource files.
    #[must_use]
    pub fn is_resource_error(&self) -> bool {
        matches!(self, Self::ResourceLoad { .. } | Self::ResourceParse { .. })
    }
}

/// One rejected statement or pair inside a message file.
///
/// Malformed entries never abort a load; they are collected in
/// [`LoadReport::issues`](crate::LoadReport::issues).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}:{line}: {reason}", location(.path.as_deref()))]
pub struct MalformedEntry {
    /// File the entry came from, if any.
    pub path: Option<PathBuf>,
    /// 1-based line where the offending statement starts.
    pub line: usize,
    /// Human-readable description.
    pub reason: String,
}

fn location(path: Option<&Path>) -> String {
    path.map_or_else(|| "<memory>".to_owned(), |p| p.display().to_string())
}
