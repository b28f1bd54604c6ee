use crate::documents::StorageError;
use crate::store::RepositoryError;
use crate::workflows::element_sheet::ElementSheetError;

/// Failure raised by any workflow operation.
///
/// Each variant maps to one stable condition name via [`WorkflowError::kind`] so callers can
/// render consistent messages.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("invalid or expired OTP")]
    InvalidOrExpired,
    #[error("invalid vendor OTP")]
    InvalidOtp,
    #[error("cannot {operation} a {entity} that is {status}")]
    InvalidState {
        entity: &'static str,
        status: &'static str,
        operation: &'static str,
    },
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Import(#[from] ElementSheetError),
    #[error("incorrect email or password")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("credential processing failed: {0}")]
    Credentials(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WorkflowError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::InvalidOrExpired => "invalid_or_expired",
            WorkflowError::InvalidOtp => "invalid_otp",
            WorkflowError::InvalidState { .. } => "invalid_state",
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::Import(ElementSheetError::Io(_)) => "storage_error",
            WorkflowError::Import(_) => "validation_error",
            WorkflowError::Unauthorized => "unauthorized",
            WorkflowError::Forbidden(_) => "forbidden",
            WorkflowError::Credentials(_) => "internal_error",
            WorkflowError::Repository(_) => "unavailable",
            WorkflowError::Storage(StorageError::InvalidName) => "validation_error",
            WorkflowError::Storage(_) => "storage_error",
        }
    }
}
