use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Purchase order line. Lines for the same variant are never merged; a line
/// bound to a backordered sales line carries its `order_item_id`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub purchase_id: i64,
    pub product_variant_id: i64,
    pub quantity: i32,
    pub unit_price: i64,
    pub cost_price: i64,
    pub allocated_shipping_cost: i64,
    pub order_item_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// `quantity * cost_price`, excluding shipping. `None` on overflow.
    pub fn line_cost(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.cost_price)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase::Entity",
        from = "Column::PurchaseId",
        to = "super::purchase::Column::Id",
        on_delete = "Cascade"
    )]
    Purchase,
}

impl Related<super::purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchase.def()
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
