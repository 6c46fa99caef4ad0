use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Kinds of ledger movements recorded in the audit log
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
    #[sea_orm(string_value = "addition")]
    Addition,
    #[sea_orm(string_value = "reduction")]
    Reduction,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    #[sea_orm(string_value = "transfer_in")]
    TransferIn,
    #[sea_orm(string_value = "transfer_out")]
    TransferOut,
    #[sea_orm(string_value = "transfer_cancel")]
    TransferCancel,
}

/// Append-only audit row. Invariant: `after_quantity = before_quantity + quantity`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub inventory_id: i64,
    pub r#type: TransactionType,
    pub quantity: i32,
    pub before_quantity: i32,
    pub after_quantity: i32,
    pub user_id: Option<i64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory::Entity",
        from = "Column::InventoryId",
        to = "super::inventory::Column::Id"
    )]
    Inventory,
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn transaction_type_names_match_storage() {
        assert_eq!(TransactionType::TransferCancel.to_string(), "transfer_cancel");
        assert_eq!(
            TransactionType::from_str("transfer_out").unwrap(),
            TransactionType::TransferOut
        );
        assert_eq!(
            TransactionType::Addition.to_value(),
            "addition".to_string()
        );
    }
}
