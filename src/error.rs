//! Error types for configuration, rendering, and conversion.
//!
//! Configuration errors propagate to the caller. Rendering and filesystem
//! errors never leave [`Converter::convert`](crate::converter::Converter::convert);
//! they are folded into a failed
//! [`ConversionResult`](crate::converter::ConversionResult).

use std::path::PathBuf;

/// Errors raised while building, mutating, or resolving a [`Config`](crate::config::Config).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field violates its invariant.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Name of the offending field (e.g. `font_size`).
        field: &'static str,
        /// What is wrong with the value.
        reason: String,
    },

    /// The configured stylesheet does not exist.
    #[error("stylesheet not found: {}", .0.display())]
    StylesheetNotFound(PathBuf),

    /// The stylesheet exists but could not be read.
    #[error("failed to read stylesheet {}: {source}", path.display())]
    StylesheetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output directory could not be created.
    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// The field name for validation errors, `None` otherwise.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Errors raised by a [`RenderEngine`](crate::engine::RenderEngine).
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Layout computation failed.
    #[error("layout failed: {0}")]
    Layout(String),

    /// PDF serialisation failed.
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    /// The rendered bytes could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine panicked.
    #[error("rendering engine panicked: {0}")]
    Panicked(String),
}

/// Everything that can make a single conversion fail.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Rendering(#[from] RenderError),

    /// Directory creation or file metadata failed.
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine reported success but left no file behind.
    #[error("PDF file was not created at {}", .0.display())]
    MissingOutput(PathBuf),
}
