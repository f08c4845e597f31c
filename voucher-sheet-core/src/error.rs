use thiserror::Error;

/// Failures that abort a whole sheet build. A missing visual is not one of them:
/// it only increments the skip count.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("batch contains no items")]
    EmptyBatch,
    #[error("invalid grid geometry: {0}")]
    InvalidGeometry(String),
    #[error("{skipped} items could not be rendered (limit {limit})")]
    TooManySkipped { skipped: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot render visual for key {key:?}: {reason}")]
    Failed { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("transfer failed with status {status}: {message}")]
    TransferFailed { status: u16, message: String },
    #[error("fallback filename must not be empty")]
    MissingFallback,
    #[error("credential cannot be sent as a header: {0}")]
    InvalidCredential(#[from] reqwest::header::InvalidHeaderValue),
    #[error("cannot resolve export path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write artifact to {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
