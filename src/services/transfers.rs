use std::sync::Arc;

use sea_orm::{ActiveModelTrait, DatabaseTransaction, EntityTrait, QuerySelect, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use super::ledger::{self, Ledger, StockMutation};
use crate::commands::{CreateTransferCommand, UpdateTransferStatusCommand};
use crate::db::DbPool;
use crate::entities::inventory_transfer::{self, Entity as InventoryTransfer, TransferStatus};
use crate::entities::TransactionType;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;

/// Outcome of [`TransferService::update_status`]. Wording for the caller's
/// user is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferStatusUpdate {
    pub transfer: inventory_transfer::Model,
    pub previous_status: TransferStatus,
    /// `false` when the requested status was already current.
    pub changed: bool,
}

/// Store-to-store transfer engine.
///
/// The source is debited when a transfer leaves `pending` and the
/// destination credited on `completed`; cancelling an in-transit transfer
/// credits the source back.
pub struct TransferService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    ledger: Ledger,
}

impl TransferService {
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

    #[instrument(skip(self, command), fields(
        from_store_id = command.from_store_id,
        to_store_id = command.to_store_id,
        product_variant_id = command.product_variant_id
    ))]
    pub async fn create(
        &self,
        command: CreateTransferCommand,
    ) -> Result<inventory_transfer::Model, ServiceError> {
        command.validate()?;
        let status = command.status.unwrap_or(TransferStatus::Pending);
        if status == TransferStatus::Cancelled {
            return Err(ServiceError::ValidationError(
                "A transfer cannot be created as cancelled".to_string(),
            ));
        }

        let txn = self.db_pool.begin().await?;

        for store_id in [command.from_store_id, command.to_store_id] {
            if ledger::find_store(&txn, store_id).await?.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Store {} does not exist",
                    store_id
                )));
            }
        }
        if ledger::find_variant(&txn, command.product_variant_id)
            .await?
            .is_none()
        {
            return Err(ServiceError::ValidationError(format!(
                "Product variant {} does not exist",
                command.product_variant_id
            )));
        }

        let transfer = inventory_transfer::ActiveModel {
            from_store_id: Set(command.from_store_id),
            to_store_id: Set(command.to_store_id),
            product_variant_id: Set(command.product_variant_id),
            quantity: Set(command.quantity),
            status: Set(status),
            user_id: Set(command.user_id),
            notes: Set(command.notes.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut events = vec![Event::TransferCreated {
            transfer_id: transfer.id,
            status,
        }];
        if status.has_left_source() {
            events.extend(self.debit_source(&txn, &transfer, command.user_id).await?);
        }
        if status == TransferStatus::Completed {
            events.extend(
                self.credit_destination(&txn, &transfer, command.user_id)
                    .await?,
            );
        }

        txn.commit().await?;

        metrics::TRANSFERS
            .with_label_values(&[&status.to_string()])
            .inc();
        info!(transfer_id = transfer.id, status = %status, "transfer created");
        self.event_sender.publish_all(events).await;

        Ok(transfer)
    }

    /// Moves a transfer to `command.status`, moving stock as the new state requires.
    #[instrument(skip(self, command), fields(status = %command.status))]
    pub async fn update_status(
        &self,
        transfer_id: i64,
        command: UpdateTransferStatusCommand,
    ) -> Result<TransferStatusUpdate, ServiceError> {
        command.validate()?;

        let txn = self.db_pool.begin().await?;
        let transfer = lock_transfer(&txn, transfer_id).await?;

        if transfer.status == command.status {
            return Ok(TransferStatusUpdate {
                previous_status: transfer.status,
                transfer,
                changed: false,
            });
        }
        ensure_open(&transfer)?;

        let old_status = transfer.status;
        if command.status == TransferStatus::Cancelled {
            let (transfer, events) = self
                .cancel_in(&txn, transfer, command.notes, command.user_id)
                .await?;
            txn.commit().await?;
            self.finish(&transfer, events).await;
            return Ok(TransferStatusUpdate {
                transfer,
                previous_status: old_status,
                changed: true,
            });
        }

        let new_status = old_status.transition(command.status)?;

        let mut events = Vec::new();
        if new_status.has_left_source() && !old_status.has_left_source() {
            events.extend(self.debit_source(&txn, &transfer, command.user_id).await?);
        }
        if new_status == TransferStatus::Completed {
            events.extend(
                self.credit_destination(&txn, &transfer, command.user_id)
                    .await?,
            );
        }
        events.push(Event::TransferStatusChanged {
            transfer_id,
            old_status,
            new_status,
        });

        let transfer = set_status(&txn, transfer, new_status, command.notes.as_deref()).await?;
        txn.commit().await?;
        self.finish(&transfer, events).await;

        Ok(TransferStatusUpdate {
            transfer,
            previous_status: old_status,
            changed: true,
        })
    }

    /// Cancels an open transfer, returning in-transit stock to the source store.
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        transfer_id: i64,
        reason: Option<String>,
        user_id: Option<i64>,
    ) -> Result<inventory_transfer::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let transfer = lock_transfer(&txn, transfer_id).await?;
        ensure_open(&transfer)?;

        let (transfer, events) = self.cancel_in(&txn, transfer, reason, user_id).await?;
        txn.commit().await?;
        self.finish(&transfer, events).await;
        Ok(transfer)
    }

    pub async fn get(&self, transfer_id: i64) -> Result<inventory_transfer::Model, ServiceError> {
        InventoryTransfer::find_by_id(transfer_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| transfer_not_found(transfer_id))
    }

    async fn cancel_in(
        &self,
        txn: &DatabaseTransaction,
        transfer: inventory_transfer::Model,
        reason: Option<String>,
        user_id: Option<i64>,
    ) -> Result<(inventory_transfer::Model, Vec<Event>), ServiceError> {
        let old_status = transfer.status;
        old_status.transition(TransferStatus::Cancelled)?;

        let mut events = Vec::new();
        if old_status.has_left_source() {
            let record = self
                .ledger
                .get_or_create(txn, transfer.from_store_id, transfer.product_variant_id)
                .await?;
            let entry = self
                .ledger
                .apply(
                    txn,
                    &record,
                    StockMutation::new(TransactionType::TransferCancel, transfer.quantity)
                        .by(user_id)
                        .with_notes(format!("Transfer {} cancelled", transfer.id)),
                )
                .await?;
            events.extend(entry.events());
        }
        events.push(Event::TransferStatusChanged {
            transfer_id: transfer.id,
            old_status,
            new_status: TransferStatus::Cancelled,
        });

        let transfer = set_status(txn, transfer, TransferStatus::Cancelled, reason.as_deref()).await?;
        Ok((transfer, events))
    }

    async fn debit_source(
        &self,
        txn: &DatabaseTransaction,
        transfer: &inventory_transfer::Model,
        user_id: Option<i64>,
    ) -> Result<Vec<Event>, ServiceError> {
        let record = self
            .ledger
            .find_for_update(txn, transfer.from_store_id, transfer.product_variant_id)
            .await?
            .ok_or_else(|| {
                metrics::INSUFFICIENT_STOCK.inc();
                ServiceError::InsufficientStock(format!(
                    "variant {} at store {}: available 0, requested {}",
                    transfer.product_variant_id, transfer.from_store_id, transfer.quantity
                ))
            })?;
        let entry = self
            .ledger
            .apply(
                txn,
                &record,
                StockMutation::new(TransactionType::TransferOut, -transfer.quantity)
                    .by(user_id)
                    .with_notes(format!(
                        "Transfer {} to store {}",
                        transfer.id, transfer.to_store_id
                    )),
            )
            .await?;
        Ok(entry.events())
    }

    async fn credit_destination(
        &self,
        txn: &DatabaseTransaction,
        transfer: &inventory_transfer::Model,
        user_id: Option<i64>,
    ) -> Result<Vec<Event>, ServiceError> {
        let record = self
            .ledger
            .get_or_create(txn, transfer.to_store_id, transfer.product_variant_id)
            .await?;
        let entry = self
            .ledger
            .apply(
                txn,
                &record,
                StockMutation::new(TransactionType::TransferIn, transfer.quantity)
                    .by(user_id)
                    .with_notes(format!(
                        "Transfer {} from store {}",
                        transfer.id, transfer.from_store_id
                    )),
            )
            .await?;
        Ok(entry.events())
    }

    async fn finish(&self, transfer: &inventory_transfer::Model, events: Vec<Event>) {
        metrics::TRANSFERS
            .with_label_values(&[&transfer.status.to_string()])
            .inc();
        info!(transfer_id = transfer.id, status = %transfer.status, "transfer status changed");
        self.event_sender.publish_all(events).await;
    }
}

fn transfer_not_found(transfer_id: i64) -> ServiceError {
    ServiceError::NotFound(format!("Transfer {} not found", transfer_id))
}

fn ensure_open(transfer: &inventory_transfer::Model) -> Result<(), ServiceError> {
    if transfer.status.is_terminal() {
        Err(ServiceError::TransferLocked(format!(
            "Transfer {} has status {}, cannot modify",
            transfer.id, transfer.status
        )))
    } else {
        Ok(())
    }
}

async fn lock_transfer(
    txn: &DatabaseTransaction,
    transfer_id: i64,
) -> Result<inventory_transfer::Model, ServiceError> {
    InventoryTransfer::find_by_id(transfer_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| transfer_not_found(transfer_id))
}

async fn set_status(
    txn: &DatabaseTransaction,
    transfer: inventory_transfer::Model,
    status: TransferStatus,
    note: Option<&str>,
) -> Result<inventory_transfer::Model, ServiceError> {
    let notes = match (transfer.notes.as_deref(), note) {
        (Some(existing), Some(note)) if !existing.is_empty() => {
            Some(format!("{}\n{}", existing, note))
        }
        (_, Some(note)) => Some(note.to_string()),
        (existing, None) => existing.map(str::to_string),
    };
    let mut active: inventory_transfer::ActiveModel = transfer.into();
    active.status = Set(status);
    active.notes = Set(notes);
    Ok(active.update(txn).await?)
}
