use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Purchase order lifecycle.
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
pub enum PurchaseStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PurchaseStatus {
    /// Every allowed `(from, to)` edge of the purchase state graph.
    pub const TRANSITIONS: &'static [(PurchaseStatus, PurchaseStatus)] = &[
        (PurchaseStatus::Pending, PurchaseStatus::Confirmed),
        (PurchaseStatus::Pending, PurchaseStatus::Cancelled),
        (PurchaseStatus::Confirmed, PurchaseStatus::Completed),
        (PurchaseStatus::Confirmed, PurchaseStatus::Cancelled),
    ];

    pub fn can_transition_to(self, to: PurchaseStatus) -> bool {
        Self::TRANSITIONS.contains(&(self, to))
    }

    /// Validates `self -> to` against the state graph.
    pub fn transition(self, to: PurchaseStatus) -> Result<PurchaseStatus, ServiceError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(ServiceError::InvalidStatusTransition(format!(
                "purchase status {} cannot change to {}",
                self, to
            )))
        }
    }

    /// Line items and header fields may change only while editable.
    pub fn is_editable(self) -> bool {
        matches!(self, PurchaseStatus::Pending | PurchaseStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PurchaseStatus::Completed | PurchaseStatus::Cancelled)
    }

    /// Stock is received into the store when a purchase enters this state.
    pub fn is_received(self) -> bool {
        self == PurchaseStatus::Completed
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub store_id: i64,
    #[sea_orm(unique)]
    pub order_number: String,
    pub status: PurchaseStatus,
    pub shipping_cost: i64,
    pub total_amount: i64,
    pub purchased_at: DateTime<Utc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_item::Entity")]
    PurchaseItem,
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
}

impl Related<super::purchase_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseItem.def()
    }
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
