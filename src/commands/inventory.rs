use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entities::TransactionType;

/// How an adjustment's `quantity` is applied to the current stock.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdjustmentAction {
    Add,
    Reduce,
    Set,
}

impl AdjustmentAction {
    /// Signed delta taking `current` stock to the requested level.
    pub fn delta(self, current: i32, quantity: i32) -> i32 {
        match self {
            AdjustmentAction::Add => quantity,
            AdjustmentAction::Reduce => -quantity,
            AdjustmentAction::Set => quantity - current,
        }
    }

    pub fn transaction_type(self) -> TransactionType {
        match self {
            AdjustmentAction::Add => TransactionType::Addition,
            AdjustmentAction::Reduce => TransactionType::Reduction,
            AdjustmentAction::Set => TransactionType::Adjustment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustInventoryCommand {
    #[validate(range(min = 1))]
    pub store_id: i64,
    #[validate(range(min = 1))]
    pub product_variant_id: i64,
    pub action: AdjustmentAction,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub user_id: Option<i64>,
}

/// Narrows an inventory history listing. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct HistoryFilter {
    pub transaction_type: Option<TransactionType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkuLookupFilter {
    pub store_id: Option<i64>,
    pub low_stock_only: bool,
}
