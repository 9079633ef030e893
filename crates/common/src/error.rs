use thiserror::Error;

/// The error taxonomy of spec.md §7, independent of any particular wire
/// transport. The outward RPC/HTTP shell (out of scope here) maps
/// [`CoreError::wire_code`] onto its own status codes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed precondition: {reason}: {message}")]
    FailedPrecondition { reason: &'static str, message: String },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl CoreError {
    pub fn precondition(reason: &'static str, message: impl Into<String>) -> Self {
        Self::FailedPrecondition {
            reason,
            message: message.into(),
        }
    }

    /// The wire-level error code named in spec.md §6.
    pub fn wire_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::FailedPrecondition { .. } => "FAILED_PRECONDITION",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Machine-readable reason for `FAILED_PRECONDITION`, e.g. `AGREEMENT_INACTIVE`.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::FailedPrecondition { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "store operation failed");
        Self::Internal(e.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
