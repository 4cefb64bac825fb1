use thiserror::Error;

/// Failures raised by the key-value store and the repositories layered on it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file {path} is corrupt: {source}")]
    CorruptStore {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {key} could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {key} could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failures of the attach / detach / share flows. A dismissed picker is not an
/// error; it is reported as `AttachOutcome::Cancelled`.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("file picker failed: {0}")]
    Picker(String),

    #[error("file must be smaller than {limit_mb}MB")]
    FileTooLarge { size: u64, limit: u64, limit_mb: u64 },

    #[error("unsupported file type: {name}")]
    UnsupportedType {
        name: String,
        mime_type: Option<String>,
    },

    #[error("failed to save file: {0}")]
    Copy(#[source] std::io::Error),

    #[error("no attachment stored for {country_id}/{document_id}")]
    NotFound {
        country_id: String,
        document_id: String,
    },

    #[error("file not found: {0}")]
    FileMissing(String),

    #[error("file sharing is not available on this device")]
    ShareUnavailable,

    #[error("file system failure: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
