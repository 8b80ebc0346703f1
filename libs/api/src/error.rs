use serde::Serialize;

/// Category of a failure reported by the engine. Lets the caller decide
/// how to surface it (status code, retry button, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad paging/filter input. Permanent.
    InvalidArgument,
    /// Referenced index or record is absent.
    NotFound,
    /// Authorization denied or the oracle could not be reached.
    Unauthorized,
    /// External index errored or timed out. Transient.
    StoreUnavailable,
    /// The store refused a partial annotation update.
    AnnotationWriteFailed,
}

impl ErrorKind {
    /// Only transient store failures are safe to repeat as-is.
    pub fn is_retry_safe(self) -> bool {
        matches!(self, ErrorKind::StoreUnavailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::AnnotationWriteFailed => "annotation_write_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned across the engine's public boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("annotation write failed: {0}")]
    AnnotationWriteFailed(String),
}

impl TxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TxError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TxError::NotFound(_) => ErrorKind::NotFound,
            TxError::Unauthorized(_) => ErrorKind::Unauthorized,
            TxError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            TxError::AnnotationWriteFailed(_) => ErrorKind::AnnotationWriteFailed,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TxError::InvalidArgument(m)
            | TxError::NotFound(m)
            | TxError::Unauthorized(m)
            | TxError::StoreUnavailable(m)
            | TxError::AnnotationWriteFailed(m) => m,
        }
    }
}

/// Error reported by a `SearchIndex` or `AnnotationStore` backend.
///
/// The engine decides what each variant means for the caller depending on
/// the step that produced it (query vs. partial update).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Index or document does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Network/transport failure, timeout, 5xx.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The store understood the request and refused it.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// The authorization oracle could not give an answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authorization oracle unavailable: {0}")]
    Unavailable(String),
}
