use std::sync::Arc;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use super::ledger::{self, Ledger, StockMutation};
use crate::commands::{AdjustInventoryCommand, HistoryFilter, SkuLookupFilter};
use crate::db::DbPool;
use crate::entities::inventory::{self, Entity as Inventory};
use crate::entities::inventory_transaction::{self, Entity as InventoryTransaction};
use crate::entities::product_variant::{self, Entity as ProductVariant};
use crate::errors::ServiceError;
use crate::events::EventSender;

const DEFAULT_HISTORY_LIMIT: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustInventoryResult {
    pub inventory: inventory::Model,
    pub transaction: inventory_transaction::Model,
}

/// Stock of one SKU across stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuStock {
    pub variant: product_variant::Model,
    pub inventories: Vec<inventory::Model>,
    pub total_quantity: i64,
}

/// Manual stock adjustments and ledger read models.
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    ledger: Ledger,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
            ledger: Ledger::default(),
        }
    }

    pub fn with_ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Adds, removes or sets stock for a `(store, variant)` pair.
    #[instrument(skip(self, command), fields(
        store_id = command.store_id,
        product_variant_id = command.product_variant_id,
        action = %command.action
    ))]
    pub async fn adjust(
        &self,
        command: AdjustInventoryCommand,
    ) -> Result<AdjustInventoryResult, ServiceError> {
        command.validate()?;

        let txn = self.db_pool.begin().await?;
        if ledger::find_store(&txn, command.store_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Store {} not found",
                command.store_id
            )));
        }
        if ledger::find_variant(&txn, command.product_variant_id)
            .await?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!(
                "Product variant {} not found",
                command.product_variant_id
            )));
        }

        let mut record = self
            .ledger
            .get_or_create(&txn, command.store_id, command.product_variant_id)
            .await?;
        if let Some(threshold) = command.low_stock_threshold {
            record = self
                .ledger
                .set_low_stock_threshold(&txn, &record, threshold)
                .await?;
        }

        let delta = command.action.delta(record.quantity, command.quantity);
        let mut mutation =
            StockMutation::new(command.action.transaction_type(), delta).by(command.user_id);
        mutation.notes = command.notes.clone();
        let entry = self.ledger.apply(&txn, &record, mutation).await?;

        txn.commit().await?;

        info!(
            inventory_id = entry.record.id,
            before = entry.transaction.before_quantity,
            after = entry.transaction.after_quantity,
            "inventory adjusted"
        );
        self.event_sender.publish_all(entry.events()).await;

        Ok(AdjustInventoryResult {
            inventory: entry.record,
            transaction: entry.transaction,
        })
    }

    /// Audit rows of one ledger record, newest first.
    pub async fn history(
        &self,
        inventory_id: i64,
        filter: HistoryFilter,
    ) -> Result<Vec<inventory_transaction::Model>, ServiceError> {
        filter.validate()?;
        let db = self.db_pool.as_ref();

        if Inventory::find_by_id(inventory_id).one(db).await?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Inventory {} not found",
                inventory_id
            )));
        }

        let mut query = InventoryTransaction::find()
            .filter(inventory_transaction::Column::InventoryId.eq(inventory_id));
        if let Some(transaction_type) = filter.transaction_type {
            query = query.filter(inventory_transaction::Column::Type.eq(transaction_type));
        }
        if let Some(from) = filter.from {
            query = query.filter(inventory_transaction::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(inventory_transaction::Column::CreatedAt.lte(to));
        }

        Ok(query
            .order_by_desc(inventory_transaction::Column::CreatedAt)
            .order_by_desc(inventory_transaction::Column::Id)
            .limit(filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .all(db)
            .await?)
    }

    /// Stock of the variant with `sku`, per store.
    pub async fn get_by_sku(
        &self,
        sku: &str,
        filter: SkuLookupFilter,
    ) -> Result<SkuStock, ServiceError> {
        let db = self.db_pool.as_ref();
        let variant = ProductVariant::find()
            .filter(product_variant::Column::Sku.eq(sku))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("SKU {} not found", sku)))?;

        let mut query =
            Inventory::find().filter(inventory::Column::ProductVariantId.eq(variant.id));
        if let Some(store_id) = filter.store_id {
            query = query.filter(inventory::Column::StoreId.eq(store_id));
        }
        let inventories: Vec<inventory::Model> = query
            .order_by_asc(inventory::Column::StoreId)
            .all(db)
            .await?
            .into_iter()
            .filter(|record| !filter.low_stock_only || record.is_low_stock())
            .collect();
        let total_quantity = inventories.iter().map(|r| i64::from(r.quantity)).sum();

        Ok(SkuStock {
            variant,
            inventories,
            total_quantity,
        })
    }

    /// Records at or below their (non-zero) low-stock threshold.
    pub async fn list_low_stock(
        &self,
        store_id: Option<i64>,
    ) -> Result<Vec<inventory::Model>, ServiceError> {
        let mut query = Inventory::find()
            .filter(inventory::Column::LowStockThreshold.gt(0))
            .filter(
                Expr::col(inventory::Column::Quantity)
                    .lte(Expr::col(inventory::Column::LowStockThreshold)),
            );
        if let Some(store_id) = store_id {
            query = query.filter(inventory::Column::StoreId.eq(store_id));
        }
        Ok(query
            .order_by_asc(inventory::Column::StoreId)
            .order_by_asc(inventory::Column::ProductVariantId)
            .all(self.db_pool.as_ref())
            .await?)
    }
}
