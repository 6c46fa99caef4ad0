//! Collaborator interfaces the engines consume for data they do not own.
//!
//! Sales order lines and the variant catalogue belong to sibling systems.
//! The engines only read them, and write order-line fulfilment, through these
//! traits inside their own transaction.

use async_trait::async_trait;
use sea_orm::DatabaseTransaction;

use crate::entities::{order_item, product_variant};
use crate::errors::ServiceError;

pub mod order_item_repository;
pub mod product_variant_repository;

pub use order_item_repository::SeaOrmOrderItemRepository;
pub use product_variant_repository::SeaOrmProductVariantRepository;

#[async_trait]
pub trait OrderItemRepository: Send + Sync {
    /// Loads an order line, locking it for the rest of the transaction.
    async fn get(
        &self,
        txn: &DatabaseTransaction,
        order_item_id: i64,
    ) -> Result<Option<order_item::Model>, ServiceError>;

    /// Adds `additional_quantity` to the line's fulfilled quantity and clears
    /// its backorder flag once it is fully fulfilled.
    async fn mark_fulfilled(
        &self,
        txn: &DatabaseTransaction,
        order_item_id: i64,
        additional_quantity: i32,
    ) -> Result<order_item::Model, ServiceError>;
}

#[async_trait]
pub trait ProductVariantRepository: Send + Sync {
    async fn get(
        &self,
        txn: &DatabaseTransaction,
        variant_id: i64,
    ) -> Result<Option<product_variant::Model>, ServiceError>;
}
