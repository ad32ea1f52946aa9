//! Error kinds raised by the extraction engine.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// A candidate string does not match the permission-constant grammar.
    #[error("invalid permission identifier: {0}")]
    InvalidPermission(String),

    /// `@RequiresPermission` carried a key this tool does not understand.
    #[error("unsupported @RequiresPermission key `{key}` on {method}")]
    UnsupportedAnnotationKey { method: String, key: String },

    /// `@RequiresPermission` was written in a form this tool does not understand.
    #[error("unsupported @RequiresPermission shape on {method}: {shape}")]
    UnsupportedAnnotationShape { method: String, shape: String },

    #[error("failed to parse {}: {message}", path.display())]
    MalformedSource { path: PathBuf, message: String },

    #[error("ambiguous protection level `{level}` for {permission}")]
    AmbiguousProtectionLevel { permission: String, level: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Whether the error aborts the file because of an annotation this tool
    /// cannot interpret.
    pub fn is_unsupported_annotation(&self) -> bool {
        matches!(
            self,
            ExtractError::UnsupportedAnnotationKey { .. } | ExtractError::UnsupportedAnnotationShape { .. }
        )
    }
}
