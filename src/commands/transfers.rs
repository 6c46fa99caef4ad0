use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::entities::TransferStatus;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_distinct_stores"))]
pub struct CreateTransferCommand {
    #[validate(range(min = 1))]
    pub from_store_id: i64,
    #[validate(range(min = 1))]
    pub to_store_id: i64,
    #[validate(range(min = 1))]
    pub product_variant_id: i64,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    /// Defaults to pending; `in_transit` or `completed` move stock immediately.
    pub status: Option<TransferStatus>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub user_id: Option<i64>,
}

fn validate_distinct_stores(cmd: &CreateTransferCommand) -> Result<(), ValidationError> {
    if cmd.from_store_id == cmd.to_store_id {
        let mut err = ValidationError::new("same_store");
        err.message = Some("Source and destination stores must differ".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateTransferStatusCommand {
    pub status: TransferStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub user_id: Option<i64>,
}
