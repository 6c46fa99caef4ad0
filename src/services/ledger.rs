//! Ledger store and stock mutator.
//!
//! [`Ledger::apply`] is the only code path that writes
//! `inventories.quantity`. It runs inside the caller's transaction, rejects
//! any delta that would take stock below zero and appends exactly one audit
//! row per call.

use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QuerySelect, Set,
};
use tracing::{debug, instrument, warn};

use crate::entities::inventory::{self, Entity as Inventory};
use crate::entities::inventory_transaction::{self, TransactionType};
use crate::entities::{product_variant, store, ProductVariant, Store};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::metrics;

/// One requested change to a ledger row.
#[derive(Debug, Clone)]
pub struct StockMutation {
    pub transaction_type: TransactionType,
    pub delta: i32,
    pub user_id: Option<i64>,
    pub notes: Option<String>,
}

impl StockMutation {
    pub fn new(transaction_type: TransactionType, delta: i32) -> Self {
        Self {
            transaction_type,
            delta,
            user_id: None,
            notes: None,
        }
    }

    pub fn by(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Result of a successful [`Ledger::apply`].
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub record: inventory::Model,
    pub transaction: inventory_transaction::Model,
}

impl LedgerEntry {
    /// Events to publish once the surrounding transaction has committed.
    pub fn events(&self) -> Vec<Event> {
        let mut events = vec![Event::StockChanged {
            inventory_id: self.record.id,
            store_id: self.record.store_id,
            product_variant_id: self.record.product_variant_id,
            transaction_type: self.transaction.r#type,
            delta: self.transaction.quantity,
            before_quantity: self.transaction.before_quantity,
            after_quantity: self.transaction.after_quantity,
        }];
        if self.transaction.quantity < 0 && self.record.is_low_stock() {
            events.push(Event::LowStock {
                inventory_id: self.record.id,
                store_id: self.record.store_id,
                product_variant_id: self.record.product_variant_id,
                quantity: self.record.quantity,
                threshold: self.record.low_stock_threshold,
            });
        }
        events
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    default_low_stock_threshold: i32,
}

impl Ledger {
    pub fn new(default_low_stock_threshold: i32) -> Self {
        Self {
            default_low_stock_threshold: default_low_stock_threshold.max(0),
        }
    }

    /// Returns the `(store, variant)` row, failing with `NotFound` if absent.
    pub async fn get<C: ConnectionTrait>(
        &self,
        db: &C,
        store_id: i64,
        product_variant_id: i64,
    ) -> Result<inventory::Model, ServiceError> {
        self.find(db, store_id, product_variant_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No inventory for variant {} at store {}",
                    product_variant_id, store_id
                ))
            })
    }

    pub async fn find<C: ConnectionTrait>(
        &self,
        db: &C,
        store_id: i64,
        product_variant_id: i64,
    ) -> Result<Option<inventory::Model>, ServiceError> {
        Ok(Inventory::find()
            .filter(inventory::Column::StoreId.eq(store_id))
            .filter(inventory::Column::ProductVariantId.eq(product_variant_id))
            .one(db)
            .await?)
    }

    /// Loads the row for update, or `None` when the pair has never been stocked.
    pub async fn find_for_update(
        &self,
        txn: &DatabaseTransaction,
        store_id: i64,
        product_variant_id: i64,
    ) -> Result<Option<inventory::Model>, ServiceError> {
        Ok(Inventory::find()
            .filter(inventory::Column::StoreId.eq(store_id))
            .filter(inventory::Column::ProductVariantId.eq(product_variant_id))
            .lock_exclusive()
            .one(txn)
            .await?)
    }

    /// Returns the row for update, inserting an empty one first if needed.
    #[instrument(skip(self, txn))]
    pub async fn get_or_create(
        &self,
        txn: &DatabaseTransaction,
        store_id: i64,
        product_variant_id: i64,
    ) -> Result<inventory::Model, ServiceError> {
        if let Some(record) = self
            .find_for_update(txn, store_id, product_variant_id)
            .await?
        {
            return Ok(record);
        }

        let now = Utc::now();
        let row = inventory::ActiveModel {
            store_id: Set(store_id),
            product_variant_id: Set(product_variant_id),
            quantity: Set(0),
            low_stock_threshold: Set(self.default_low_stock_threshold),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        // A concurrent creator may win the unique index; its row is then reused.
        Inventory::insert(row)
            .on_conflict(
                OnConflict::columns([
                    inventory::Column::StoreId,
                    inventory::Column::ProductVariantId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(txn)
            .await?;
        debug!(store_id, product_variant_id, "created inventory record");

        self.find_for_update(txn, store_id, product_variant_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Inventory for variant {} at store {} vanished after insert",
                    product_variant_id, store_id
                ))
            })
    }

    /// Applies `mutation` to `record`, which must have been read in `txn`.
    ///
    /// The write is a compare-and-swap on the quantity read by the caller;
    /// if another writer got there first the call fails with
    /// `ConcurrentModification` and nothing is written.
    #[instrument(skip(self, txn, record), fields(inventory_id = record.id))]
    pub async fn apply(
        &self,
        txn: &DatabaseTransaction,
        record: &inventory::Model,
        mutation: StockMutation,
    ) -> Result<LedgerEntry, ServiceError> {
        let before = record.quantity;
        let after = before.checked_add(mutation.delta).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Quantity change {} overflows inventory {}",
                mutation.delta, record.id
            ))
        })?;

        if after < 0 {
            metrics::INSUFFICIENT_STOCK.inc();
            warn!(
                store_id = record.store_id,
                product_variant_id = record.product_variant_id,
                available = before,
                requested = -mutation.delta,
                "insufficient stock"
            );
            return Err(ServiceError::InsufficientStock(format!(
                "variant {} at store {}: available {}, requested {}",
                record.product_variant_id, record.store_id, before, -mutation.delta
            )));
        }

        let now = Utc::now();
        let updated = Inventory::update_many()
            .col_expr(inventory::Column::Quantity, Expr::value(after))
            .col_expr(inventory::Column::UpdatedAt, Expr::value(now))
            .filter(inventory::Column::Id.eq(record.id))
            .filter(inventory::Column::Quantity.eq(before))
            .exec(txn)
            .await?;
        if updated.rows_affected != 1 {
            warn!(inventory_id = record.id, "inventory changed underneath mutation");
            return Err(ServiceError::ConcurrentModification(record.id));
        }

        let transaction = inventory_transaction::ActiveModel {
            inventory_id: Set(record.id),
            r#type: Set(mutation.transaction_type),
            quantity: Set(mutation.delta),
            before_quantity: Set(before),
            after_quantity: Set(after),
            user_id: Set(mutation.user_id),
            notes: Set(mutation.notes),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        metrics::STOCK_MUTATIONS
            .with_label_values(&[&mutation.transaction_type.to_string()])
            .inc();
        debug!(
            inventory_id = record.id,
            before,
            after,
            transaction_type = %mutation.transaction_type,
            "stock mutated"
        );

        Ok(LedgerEntry {
            record: inventory::Model {
                quantity: after,
                updated_at: now,
                ..record.clone()
            },
            transaction,
        })
    }

    /// Sets the informational low-stock threshold. Quantity is untouched.
    pub async fn set_low_stock_threshold(
        &self,
        txn: &DatabaseTransaction,
        record: &inventory::Model,
        threshold: i32,
    ) -> Result<inventory::Model, ServiceError> {
        if threshold < 0 {
            return Err(ServiceError::ValidationError(
                "Low stock threshold cannot be negative".to_string(),
            ));
        }
        Inventory::update_many()
            .col_expr(inventory::Column::LowStockThreshold, Expr::value(threshold))
            .filter(inventory::Column::Id.eq(record.id))
            .exec(txn)
            .await?;
        Ok(inventory::Model {
            low_stock_threshold: threshold,
            ..record.clone()
        })
    }
}

pub(crate) async fn find_store<C: ConnectionTrait>(
    db: &C,
    store_id: i64,
) -> Result<Option<store::Model>, ServiceError> {
    Ok(Store::find_by_id(store_id).one(db).await?)
}

pub(crate) async fn find_variant<C: ConnectionTrait>(
    db: &C,
    product_variant_id: i64,
) -> Result<Option<product_variant::Model>, ServiceError> {
    Ok(ProductVariant::find_by_id(product_variant_id).one(db).await?)
}
