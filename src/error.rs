//! Error types for reference resolution and document retrieval.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving `$ref` references.
///
/// Every variant except [`ResolveError::NotAReference`] is fatal to the
/// resolution pass that produced it.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The candidate node is not an object carrying `$ref`. Used to classify
    /// nodes during traversal; never surfaced from a top-level resolve.
    #[error("node is not a reference")]
    NotAReference,

    #[error("invalid JSON pointer \"{pointer}\": {message}")]
    InvalidPointer { pointer: String, message: String },

    #[error("cannot parse URI \"{uri}\": {message}")]
    UriParse { uri: String, message: String },

    #[error("circular reference detected while resolving \"{reference}\"")]
    CircularReference { reference: String },

    #[error(
        "cannot resolve \"{reference}\"{}: {message}",
        document_id.as_ref().map(|id| format!(" in document \"{id}\"")).unwrap_or_default()
    )]
    PointerResolution {
        reference: String,
        document_id: Option<String>,
        message: String,
    },

    // Retrieval errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to fetch {url}: HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("no retriever available for \"{uri}\"")]
    UnsupportedScheme { uri: String },

    #[error("no document registered for \"{uri}\"")]
    NotFound { uri: String },

    #[error("media type application/schema+json expected for {uri}, got \"{content_type}\"")]
    MediaType { uri: String, content_type: String },

    #[error("invalid JSON in {uri}: {source}")]
    DocumentDecoding {
        uri: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::FileNotFound { .. }
            | ResolveError::ReadError { .. }
            | ResolveError::HttpStatus { .. }
            | ResolveError::UnsupportedScheme { .. }
            | ResolveError::NotFound { .. } => 3,
            #[cfg(feature = "remote")]
            ResolveError::NetworkError { .. } => 3,
            _ => 2,
        }
    }

    /// True for failures of the document fetch collaborator: retrieval,
    /// an unexpected media type, or a document that is not valid JSON.
    pub fn is_fetch_error(&self) -> bool {
        self.exit_code() == 3
            || matches!(
                self,
                ResolveError::MediaType { .. } | ResolveError::DocumentDecoding { .. }
            )
    }

    pub(crate) fn invalid_pointer(pointer: &str, message: impl Into<String>) -> Self {
        ResolveError::InvalidPointer {
            pointer: pointer.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn uri_parse(uri: &str, message: impl Into<String>) -> Self {
        ResolveError::UriParse {
            uri: uri.to_string(),
            message: message.into(),
        }
    }
}
