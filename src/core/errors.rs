//! FFE-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FusionError>;

/// Top-level error type for the Financial Fusion Engine.
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("[FFE-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FFE-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FFE-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FFE-2001] invalid input in field `{field}`: {details}")]
    InvalidInput {
        field: &'static str,
        details: String,
    },

    #[error(
        "[FFE-2101] total evidence conflict (K = {conflict}) while combining `{source_label}`; \
all fusion mass annihilated"
    )]
    FusionConflict { conflict: f64, source_label: String },

    #[error("[FFE-2201] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[FFE-2301] narrative enrichment failed: {details}")]
    Enrichment { details: String },

    #[error("[FFE-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FFE-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl FusionError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FFE-1001",
            Self::MissingConfig { .. } => "FFE-1002",
            Self::ConfigParse { .. } => "FFE-1003",
            Self::InvalidInput { .. } => "FFE-2001",
            Self::FusionConflict { .. } => "FFE-2101",
            Self::Serialization { .. } => "FFE-2201",
            Self::Enrichment { .. } => "FFE-2301",
            Self::Io { .. } => "FFE-3002",
            Self::Runtime { .. } => "FFE-3900",
        }
    }

    /// Whether the caller can recover without changing its inputs.
    ///
    /// A `FusionConflict` is recoverable by re-running with the DST strategy
    /// weight zeroed; an `Enrichment` failure falls back to the template
    /// explanation; IO and runtime failures may succeed on retry.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FusionConflict { .. }
                | Self::Enrichment { .. }
                | Self::Io { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for input validation failures.
    #[must_use]
    pub fn invalid_input(field: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for FusionError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for FusionError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
