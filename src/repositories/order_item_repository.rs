use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, EntityTrait, QuerySelect, Set};
use tracing::debug;

use super::OrderItemRepository;
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::errors::ServiceError;

/// Order-line access backed by the `order_items` table.
#[derive(Debug, Default, Clone)]
pub struct SeaOrmOrderItemRepository;

impl SeaOrmOrderItemRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OrderItemRepository for SeaOrmOrderItemRepository {
    async fn get(
        &self,
        txn: &DatabaseTransaction,
        order_item_id: i64,
    ) -> Result<Option<order_item::Model>, ServiceError> {
        Ok(OrderItem::find_by_id(order_item_id)
            .lock_exclusive()
            .one(txn)
            .await?)
    }

    async fn mark_fulfilled(
        &self,
        txn: &DatabaseTransaction,
        order_item_id: i64,
        additional_quantity: i32,
    ) -> Result<order_item::Model, ServiceError> {
        let item = self.get(txn, order_item_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Order item {} not found", order_item_id))
        })?;

        let fulfilled = item.fulfilled_quantity.saturating_add(additional_quantity).min(item.quantity);
        let fully_fulfilled = fulfilled >= item.quantity;
        debug!(
            order_item_id,
            fulfilled, fully_fulfilled, "marking order item fulfilled"
        );

        let mut active: order_item::ActiveModel = item.into();
        active.fulfilled_quantity = Set(fulfilled);
        if fully_fulfilled {
            active.is_backorder = Set(false);
        }
        Ok(active.update(txn).await?)
    }
}
