use sea_orm::error::DbErr;
use serde::Serialize;

/// Errors surfaced by the ledger, purchase and transfer engines.
///
/// The variants are transport agnostic; callers map them to their own status
/// codes via [`ServiceError::error_code`].
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid status transition: {0}")]
    InvalidStatusTransition(String),

    #[error("Purchase locked: {0}")]
    PurchaseLocked(String),

    #[error("Transfer locked: {0}")]
    TransferLocked(String),

    #[error("Binding exceeds demand: {0}")]
    BindingExceedsDemand(String),

    #[error("Only pending purchases can be deleted: {0}")]
    OnlyPendingDeletable(String),

    #[error("Concurrent modification of inventory {0}")]
    ConcurrentModification(i64),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Stable machine-readable code for this error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::ValidationError(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::InvalidStatusTransition(_) => "invalid_status_transition",
            Self::PurchaseLocked(_) => "purchase_locked",
            Self::TransferLocked(_) => "transfer_locked",
            Self::BindingExceedsDemand(_) => "binding_exceeds_demand",
            Self::OnlyPendingDeletable(_) => "only_pending_deletable",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Internal failures are opaque to callers and never caused by the request itself.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_)
        )
    }
}
