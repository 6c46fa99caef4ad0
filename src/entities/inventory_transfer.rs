use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Store-to-store transfer lifecycle.
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
pub enum TransferStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl TransferStatus {
    /// Every allowed `(from, to)` edge of the transfer state graph.
    pub const TRANSITIONS: &'static [(TransferStatus, TransferStatus)] = &[
        (TransferStatus::Pending, TransferStatus::InTransit),
        (TransferStatus::Pending, TransferStatus::Completed),
        (TransferStatus::Pending, TransferStatus::Cancelled),
        (TransferStatus::InTransit, TransferStatus::Completed),
        (TransferStatus::InTransit, TransferStatus::Cancelled),
    ];

    pub fn can_transition_to(self, to: TransferStatus) -> bool {
        Self::TRANSITIONS.contains(&(self, to))
    }

    /// Validates `self -> to` against the state graph.
    pub fn transition(self, to: TransferStatus) -> Result<TransferStatus, ServiceError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(ServiceError::InvalidStatusTransition(format!(
                "transfer status {} cannot change to {}",
                self, to
            )))
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }

    /// Whether the source store has been debited once a transfer is in this state.
    pub fn has_left_source(self) -> bool {
        matches!(self, TransferStatus::InTransit | TransferStatus::Completed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_transfers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub from_store_id: i64,
    pub to_store_id: i64,
    pub product_variant_id: i64,
    pub quantity: i32,
    pub status: TransferStatus,
    pub user_id: Option<i64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

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
