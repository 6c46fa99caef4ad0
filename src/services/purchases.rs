use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use super::ledger::{self, Ledger, StockMutation};
use super::shipping::allocate_shipping;
use crate::commands::{
    CreatePurchaseCommand, ManualPurchaseItem, OrderItemBinding, UpdatePurchaseCommand,
};
use crate::db::DbPool;
use crate::entities::purchase::{self, Entity as Purchase, PurchaseStatus};
use crate::entities::purchase_item::{self, Entity as PurchaseItem};
use crate::entities::TransactionType;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::repositories::{
    OrderItemRepository, ProductVariantRepository, SeaOrmOrderItemRepository,
    SeaOrmProductVariantRepository,
};

const DEFAULT_NUMBER_PREFIX: &str = "PO";

/// A purchase together with its lines, ordered by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseDetail {
    pub purchase: purchase::Model,
    pub items: Vec<purchase_item::Model>,
}

/// A line ready to be written, before shipping allocation.
#[derive(Debug, Clone, PartialEq)]
struct PlannedLine {
    product_variant_id: i64,
    quantity: i32,
    unit_price: i64,
    cost_price: i64,
    order_item_id: Option<i64>,
}

impl PlannedLine {
    fn cost(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.cost_price)
    }
}

/// Purchase order engine: creation, line replacement, shipping
/// re-allocation, the status state machine, deletion and backorder binding.
///
/// Entering `completed` stocks every line into the purchase's store and
/// fulfils bound order items, all in the transaction that changes the status.
pub struct PurchaseService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    ledger: Ledger,
    order_items: Arc<dyn OrderItemRepository>,
    variants: Arc<dyn ProductVariantRepository>,
    number_prefix: String,
}

impl PurchaseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
            ledger: Ledger::default(),
            order_items: Arc::new(SeaOrmOrderItemRepository::new()),
            variants: Arc::new(SeaOrmProductVariantRepository::new()),
            number_prefix: DEFAULT_NUMBER_PREFIX.to_string(),
        }
    }

    pub fn with_ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_number_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.number_prefix = prefix.into();
        self
    }

    pub fn with_repositories(
        mut self,
        order_items: Arc<dyn OrderItemRepository>,
        variants: Arc<dyn ProductVariantRepository>,
    ) -> Self {
        self.order_items = order_items;
        self.variants = variants;
        self
    }

    /// Creates a purchase from manual lines and backorder bindings.
    #[instrument(skip(self, command), fields(store_id = command.store_id))]
    pub async fn create(
        &self,
        command: CreatePurchaseCommand,
    ) -> Result<PurchaseDetail, ServiceError> {
        command.validate()?;
        let status = command.status.unwrap_or(PurchaseStatus::Pending);
        if status == PurchaseStatus::Cancelled {
            return Err(ServiceError::ValidationError(
                "A purchase cannot be created as cancelled".to_string(),
            ));
        }

        let txn = self.db_pool.begin().await?;

        if ledger::find_store(&txn, command.store_id).await?.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Store {} does not exist",
                command.store_id
            )));
        }

        let order_number = match &command.order_number {
            Some(number) => {
                if order_number_taken(&txn, number).await? {
                    return Err(ServiceError::ValidationError(format!(
                        "Order number {} already exists",
                        number
                    )));
                }
                number.clone()
            }
            None => self.next_order_number(&txn, Utc::now()).await?,
        };

        let lines = self
            .plan_lines(
                &txn,
                command.store_id,
                None,
                &command.items,
                &command.order_items,
            )
            .await?;
        let total = total_amount(command.shipping_cost, lines.iter().map(PlannedLine::cost))?;

        let purchase = purchase::ActiveModel {
            store_id: Set(command.store_id),
            order_number: Set(order_number),
            status: Set(status),
            shipping_cost: Set(command.shipping_cost),
            total_amount: Set(total),
            purchased_at: Set(command.purchased_at.unwrap_or_else(Utc::now)),
            notes: Set(command.notes.clone()),
            user_id: Set(command.user_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let items = insert_lines(&txn, purchase.id, command.shipping_cost, &lines).await?;

        let mut events = vec![Event::PurchaseCreated {
            purchase_id: purchase.id,
            order_number: purchase.order_number.clone(),
            status,
        }];
        if status.is_received() {
            events.extend(
                self.receive(&txn, &purchase, &items, command.user_id)
                    .await?,
            );
        }

        txn.commit().await?;

        metrics::PURCHASES_CREATED.inc();
        if status.is_received() {
            metrics::PURCHASES_RECEIVED.inc();
        }
        info!(
            purchase_id = purchase.id,
            order_number = %purchase.order_number,
            status = %status,
            lines = items.len(),
            "purchase created"
        );
        self.event_sender.publish_all(events).await;

        Ok(PurchaseDetail { purchase, items })
    }

    /// Replaces all lines of an open purchase and re-allocates shipping.
    #[instrument(skip(self, command))]
    pub async fn update(
        &self,
        purchase_id: i64,
        command: UpdatePurchaseCommand,
    ) -> Result<PurchaseDetail, ServiceError> {
        command.validate_all()?;

        let txn = self.db_pool.begin().await?;
        let purchase = lock_purchase(&txn, purchase_id).await?;
        ensure_editable(&purchase)?;

        let existing = load_items(&txn, purchase.id).await?;
        let items = match command.items {
            Some(items) => items,
            None => existing
                .iter()
                .filter(|item| item.order_item_id.is_none())
                .map(|item| ManualPurchaseItem {
                    product_variant_id: item.product_variant_id,
                    quantity: item.quantity,
                    cost_price: item.cost_price,
                    unit_price: Some(item.unit_price),
                })
                .collect(),
        };
        let bindings = match command.order_items {
            Some(bindings) => bindings,
            None => existing
                .iter()
                .filter_map(|item| {
                    item.order_item_id.map(|order_item_id| OrderItemBinding {
                        order_item_id,
                        purchase_quantity: item.quantity,
                        cost_price: Some(item.cost_price),
                    })
                })
                .collect(),
        };
        if items.is_empty() && bindings.is_empty() {
            return Err(ServiceError::ValidationError(
                "A purchase needs at least one item or order item".to_string(),
            ));
        }

        let lines = self
            .plan_lines(
                &txn,
                purchase.store_id,
                Some(purchase.id),
                &items,
                &bindings,
            )
            .await?;
        let shipping_cost = command.shipping_cost.unwrap_or(purchase.shipping_cost);
        let total = total_amount(shipping_cost, lines.iter().map(PlannedLine::cost))?;

        PurchaseItem::delete_many()
            .filter(purchase_item::Column::PurchaseId.eq(purchase.id))
            .exec(&txn)
            .await?;
        let new_items = insert_lines(&txn, purchase.id, shipping_cost, &lines).await?;

        let mut active: purchase::ActiveModel = purchase.into();
        active.shipping_cost = Set(shipping_cost);
        active.total_amount = Set(total);
        if let Some(purchased_at) = command.purchased_at {
            active.purchased_at = Set(purchased_at);
        }
        if command.notes.is_some() {
            active.notes = Set(command.notes);
        }
        if command.user_id.is_some() {
            active.user_id = Set(command.user_id);
        }
        let purchase = active.update(&txn).await?;

        txn.commit().await?;

        info!(purchase_id, lines = new_items.len(), "purchase lines replaced");
        self.event_sender
            .publish_all(vec![Event::PurchaseUpdated(purchase_id)])
            .await;

        Ok(PurchaseDetail {
            purchase,
            items: new_items,
        })
    }

    /// Re-allocates a new shipping cost over the current lines. Allowed in any status.
    #[instrument(skip(self))]
    pub async fn update_shipping_cost(
        &self,
        purchase_id: i64,
        shipping_cost: i64,
    ) -> Result<PurchaseDetail, ServiceError> {
        if shipping_cost < 0 {
            return Err(ServiceError::ValidationError(
                "Shipping cost cannot be negative".to_string(),
            ));
        }

        let txn = self.db_pool.begin().await?;
        let purchase = lock_purchase(&txn, purchase_id).await?;
        let items = load_items(&txn, purchase.id).await?;
        let total = total_amount(shipping_cost, items.iter().map(purchase_item::Model::line_cost))?;

        let quantities: Vec<i32> = items.iter().map(|item| item.quantity).collect();
        let shares = allocate_shipping(shipping_cost, &quantities);
        let mut updated_items = Vec::with_capacity(items.len());
        for (item, share) in items.into_iter().zip(shares) {
            let mut active: purchase_item::ActiveModel = item.into();
            active.allocated_shipping_cost = Set(share);
            updated_items.push(active.update(&txn).await?);
        }

        let mut active: purchase::ActiveModel = purchase.into();
        active.shipping_cost = Set(shipping_cost);
        active.total_amount = Set(total);
        let purchase = active.update(&txn).await?;

        txn.commit().await?;

        info!(purchase_id, shipping_cost, "purchase shipping cost updated");
        self.event_sender
            .publish_all(vec![Event::PurchaseUpdated(purchase_id)])
            .await;

        Ok(PurchaseDetail {
            purchase,
            items: updated_items,
        })
    }

    /// Moves a purchase along its state graph, receiving stock on `completed`.
    #[instrument(skip(self))]
    pub async fn transition_status(
        &self,
        purchase_id: i64,
        status: PurchaseStatus,
        user_id: Option<i64>,
    ) -> Result<purchase::Model, ServiceError> {
        self.change_status(purchase_id, status, user_id, None).await
    }

    /// Cancels a pending or confirmed purchase, appending `reason` to its notes.
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        purchase_id: i64,
        reason: Option<String>,
        user_id: Option<i64>,
    ) -> Result<purchase::Model, ServiceError> {
        self.change_status(purchase_id, PurchaseStatus::Cancelled, user_id, reason)
            .await
    }

    async fn change_status(
        &self,
        purchase_id: i64,
        status: PurchaseStatus,
        user_id: Option<i64>,
        reason: Option<String>,
    ) -> Result<purchase::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let purchase = lock_purchase(&txn, purchase_id).await?;
        let old_status = purchase.status;

        if status == PurchaseStatus::Cancelled && old_status.is_terminal() {
            return Err(ServiceError::InvalidStatusTransition(format!(
                "Purchase {} has status {} and cannot be cancelled",
                purchase.order_number, old_status
            )));
        }
        let new_status = old_status.transition(status)?;

        let mut events = vec![Event::PurchaseStatusChanged {
            purchase_id,
            old_status,
            new_status,
        }];
        if new_status.is_received() {
            let items = load_items(&txn, purchase.id).await?;
            events.extend(self.receive(&txn, &purchase, &items, user_id).await?);
        }

        let notes = match reason {
            Some(reason) => Some(append_note(purchase.notes.as_deref(), &reason)),
            None => purchase.notes.clone(),
        };
        let mut active: purchase::ActiveModel = purchase.into();
        active.status = Set(new_status);
        active.notes = Set(notes);
        let purchase = active.update(&txn).await?;

        txn.commit().await?;

        if new_status.is_received() {
            metrics::PURCHASES_RECEIVED.inc();
        }
        info!(
            purchase_id,
            old_status = %old_status,
            new_status = %new_status,
            "purchase status changed"
        );
        self.event_sender.publish_all(events).await;

        Ok(purchase)
    }

    /// Deletes a pending purchase and its lines.
    #[instrument(skip(self))]
    pub async fn delete(&self, purchase_id: i64) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let purchase = lock_purchase(&txn, purchase_id).await?;
        if purchase.status != PurchaseStatus::Pending {
            return Err(ServiceError::OnlyPendingDeletable(format!(
                "Purchase {} has status {}",
                purchase.order_number, purchase.status
            )));
        }

        PurchaseItem::delete_many()
            .filter(purchase_item::Column::PurchaseId.eq(purchase.id))
            .exec(&txn)
            .await?;
        Purchase::delete_by_id(purchase.id).exec(&txn).await?;

        txn.commit().await?;

        info!(purchase_id, "purchase deleted");
        self.event_sender
            .publish_all(vec![Event::PurchaseDeleted(purchase_id)])
            .await;
        Ok(())
    }

    /// Appends backorder-bound lines to an open purchase.
    #[instrument(skip(self, bindings))]
    pub async fn bind_orders(
        &self,
        purchase_id: i64,
        bindings: Vec<OrderItemBinding>,
    ) -> Result<PurchaseDetail, ServiceError> {
        if bindings.is_empty() {
            return Err(ServiceError::ValidationError(
                "No order items to bind".to_string(),
            ));
        }
        for binding in &bindings {
            binding.validate()?;
        }

        let txn = self.db_pool.begin().await?;
        let purchase = lock_purchase(&txn, purchase_id).await?;
        ensure_editable(&purchase)?;

        let new_lines = self
            .plan_lines(&txn, purchase.store_id, None, &[], &bindings)
            .await?;
        let existing = load_items(&txn, purchase.id).await?;
        let total = total_amount(
            purchase.shipping_cost,
            existing
                .iter()
                .map(purchase_item::Model::line_cost)
                .chain(new_lines.iter().map(PlannedLine::cost)),
        )?;

        let quantities: Vec<i32> = existing
            .iter()
            .map(|item| item.quantity)
            .chain(new_lines.iter().map(|line| line.quantity))
            .collect();
        let shares = allocate_shipping(purchase.shipping_cost, &quantities);
        let (existing_shares, new_shares) = shares.split_at(existing.len());

        let mut items = Vec::with_capacity(quantities.len());
        for (item, share) in existing.into_iter().zip(existing_shares) {
            let mut active: purchase_item::ActiveModel = item.into();
            active.allocated_shipping_cost = Set(*share);
            items.push(active.update(&txn).await?);
        }
        for (line, share) in new_lines.iter().zip(new_shares) {
            items.push(insert_line(&txn, purchase.id, line, *share).await?);
        }

        let mut active: purchase::ActiveModel = purchase.into();
        active.total_amount = Set(total);
        let purchase = active.update(&txn).await?;

        txn.commit().await?;

        info!(purchase_id, bound = new_lines.len(), "order items bound to purchase");
        self.event_sender
            .publish_all(vec![Event::PurchaseUpdated(purchase_id)])
            .await;

        Ok(PurchaseDetail { purchase, items })
    }

    pub async fn get(&self, purchase_id: i64) -> Result<PurchaseDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let purchase = Purchase::find_by_id(purchase_id)
            .one(db)
            .await?
            .ok_or_else(|| purchase_not_found(purchase_id))?;
        let items = load_items(db, purchase.id).await?;
        Ok(PurchaseDetail { purchase, items })
    }

    /// `<prefix>-<YYYYMMDD>-<seq>`, `seq` counting from 1 within the day.
    async fn next_order_number(
        &self,
        txn: &DatabaseTransaction,
        at: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let day_prefix = format!("{}-{}-", self.number_prefix, at.format("%Y%m%d"));
        let numbered_today = Purchase::find()
            .filter(purchase::Column::OrderNumber.starts_with(&day_prefix))
            .count(txn)
            .await?;

        let mut seq = numbered_today + 1;
        loop {
            let candidate = format!("{}{:04}", day_prefix, seq);
            if !order_number_taken(txn, &candidate).await? {
                return Ok(candidate);
            }
            seq += 1;
        }
    }

    /// Resolves manual lines and bindings into lines to write, manual lines
    /// first, never merging same-variant rows.
    ///
    /// `replacing` names a purchase whose current lines are about to be
    /// replaced and so do not count against order-item demand.
    async fn plan_lines(
        &self,
        txn: &DatabaseTransaction,
        store_id: i64,
        replacing: Option<i64>,
        items: &[ManualPurchaseItem],
        bindings: &[OrderItemBinding],
    ) -> Result<Vec<PlannedLine>, ServiceError> {
        let mut lines = Vec::with_capacity(items.len() + bindings.len());

        for item in items {
            if self.variants.get(txn, item.product_variant_id).await?.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Product variant {} does not exist",
                    item.product_variant_id
                )));
            }
            lines.push(PlannedLine {
                product_variant_id: item.product_variant_id,
                quantity: item.quantity,
                unit_price: item.unit_price.unwrap_or(item.cost_price),
                cost_price: item.cost_price,
                order_item_id: None,
            });
        }

        let mut requested: HashMap<i64, i64> = HashMap::new();
        for binding in bindings {
            *requested.entry(binding.order_item_id).or_default() +=
                i64::from(binding.purchase_quantity);
        }

        let mut checked: HashSet<i64> = HashSet::new();
        for binding in bindings {
            let order_item = self
                .order_items
                .get(txn, binding.order_item_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Order item {} does not exist",
                        binding.order_item_id
                    ))
                })?;

            if checked.insert(order_item.id) {
                if order_item.store_id != store_id {
                    return Err(ServiceError::BindingExceedsDemand(format!(
                        "Order item {} belongs to store {}, not store {}",
                        order_item.id, order_item.store_id, store_id
                    )));
                }
                if !order_item.is_backorder {
                    return Err(ServiceError::ValidationError(format!(
                        "Order item {} is not backordered",
                        order_item.id
                    )));
                }
                let bound = bound_quantity(txn, order_item.id, replacing).await?;
                let demand = i64::from(order_item.outstanding_quantity()) - bound;
                let wanted = requested.get(&order_item.id).copied().unwrap_or_default();
                if wanted > demand {
                    return Err(ServiceError::BindingExceedsDemand(format!(
                        "Order item {} has {} unbound units outstanding, {} requested",
                        order_item.id,
                        demand.max(0),
                        wanted
                    )));
                }
            }

            let cost_price = match binding.cost_price {
                Some(cost_price) => cost_price,
                None => {
                    self.variants
                        .get(txn, order_item.product_variant_id)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::ValidationError(format!(
                                "Product variant {} does not exist",
                                order_item.product_variant_id
                            ))
                        })?
                        .cost_price
                }
            };
            lines.push(PlannedLine {
                product_variant_id: order_item.product_variant_id,
                quantity: binding.purchase_quantity,
                unit_price: cost_price,
                cost_price,
                order_item_id: Some(order_item.id),
            });
        }

        Ok(lines)
    }

    /// Stocks every line in and fulfils bound order items.
    async fn receive(
        &self,
        txn: &DatabaseTransaction,
        purchase: &purchase::Model,
        items: &[purchase_item::Model],
        user_id: Option<i64>,
    ) -> Result<Vec<Event>, ServiceError> {
        let mut events = Vec::new();
        for item in items {
            let record = self
                .ledger
                .get_or_create(txn, purchase.store_id, item.product_variant_id)
                .await?;
            let entry = self
                .ledger
                .apply(
                    txn,
                    &record,
                    StockMutation::new(TransactionType::Addition, item.quantity)
                        .by(user_id)
                        .with_notes(format!("Purchase {} received", purchase.order_number)),
                )
                .await?;
            events.extend(entry.events());

            if let Some(order_item_id) = item.order_item_id {
                let order_item = self
                    .order_items
                    .get(txn, order_item_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Order item {} not found", order_item_id))
                    })?;
                let fulfil = item.quantity.min(order_item.outstanding_quantity());
                if fulfil > 0 {
                    self.order_items
                        .mark_fulfilled(txn, order_item_id, fulfil)
                        .await?;
                }
            }
        }

        events.push(Event::PurchaseReceived {
            purchase_id: purchase.id,
            store_id: purchase.store_id,
            received_at: Utc::now(),
        });
        Ok(events)
    }
}

/// Shipping plus every line cost; a `None` cost marks an overflowed line.
fn total_amount<I>(shipping_cost: i64, line_costs: I) -> Result<i64, ServiceError>
where
    I: IntoIterator<Item = Option<i64>>,
{
    line_costs
        .into_iter()
        .try_fold(shipping_cost, |total, cost| total.checked_add(cost?))
        .ok_or_else(|| {
            ServiceError::ValidationError("Purchase total exceeds the amount range".to_string())
        })
}

fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
        _ => note.to_string(),
    }
}

fn purchase_not_found(purchase_id: i64) -> ServiceError {
    ServiceError::NotFound(format!("Purchase {} not found", purchase_id))
}

fn ensure_editable(purchase: &purchase::Model) -> Result<(), ServiceError> {
    if purchase.status.is_editable() {
        Ok(())
    } else {
        Err(ServiceError::PurchaseLocked(format!(
            "Purchase {} has status {}, cannot modify",
            purchase.order_number, purchase.status
        )))
    }
}

async fn lock_purchase(
    txn: &DatabaseTransaction,
    purchase_id: i64,
) -> Result<purchase::Model, ServiceError> {
    Purchase::find_by_id(purchase_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| purchase_not_found(purchase_id))
}

async fn load_items<C: ConnectionTrait>(
    db: &C,
    purchase_id: i64,
) -> Result<Vec<purchase_item::Model>, ServiceError> {
    Ok(PurchaseItem::find()
        .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
        .order_by_asc(purchase_item::Column::Id)
        .all(db)
        .await?)
}

async fn order_number_taken(
    txn: &DatabaseTransaction,
    order_number: &str,
) -> Result<bool, ServiceError> {
    Ok(Purchase::find()
        .filter(purchase::Column::OrderNumber.eq(order_number))
        .count(txn)
        .await?
        > 0)
}

/// Units of `order_item_id` already bound on open purchases.
async fn bound_quantity(
    txn: &DatabaseTransaction,
    order_item_id: i64,
    excluding_purchase: Option<i64>,
) -> Result<i64, ServiceError> {
    let mut query = PurchaseItem::find()
        .join(JoinType::InnerJoin, purchase_item::Relation::Purchase.def())
        .filter(purchase_item::Column::OrderItemId.eq(order_item_id))
        .filter(
            purchase::Column::Status.is_in([PurchaseStatus::Pending, PurchaseStatus::Confirmed]),
        );
    if let Some(purchase_id) = excluding_purchase {
        query = query.filter(purchase_item::Column::PurchaseId.ne(purchase_id));
    }
    let items = query.all(txn).await?;
    Ok(items.iter().map(|item| i64::from(item.quantity)).sum())
}

async fn insert_lines(
    txn: &DatabaseTransaction,
    purchase_id: i64,
    shipping_cost: i64,
    lines: &[PlannedLine],
) -> Result<Vec<purchase_item::Model>, ServiceError> {
    let quantities: Vec<i32> = lines.iter().map(|line| line.quantity).collect();
    let shares = allocate_shipping(shipping_cost, &quantities);
    let mut items = Vec::with_capacity(lines.len());
    for (line, share) in lines.iter().zip(shares) {
        items.push(insert_line(txn, purchase_id, line, share).await?);
    }
    Ok(items)
}

async fn insert_line(
    txn: &DatabaseTransaction,
    purchase_id: i64,
    line: &PlannedLine,
    allocated_shipping_cost: i64,
) -> Result<purchase_item::Model, ServiceError> {
    Ok(purchase_item::ActiveModel {
        purchase_id: Set(purchase_id),
        product_variant_id: Set(line.product_variant_id),
        quantity: Set(line.quantity),
        unit_price: Set(line.unit_price),
        cost_price: Set(line.cost_price),
        allocated_shipping_cost: Set(allocated_shipping_cost),
        order_item_id: Set(line.order_item_id),
        ..Default::default()
    }
    .insert(txn)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn total_is_line_cost_plus_shipping() {
        let lines = vec![
            PlannedLine {
                product_variant_id: 1,
                quantity: 10,
                unit_price: 8_000,
                cost_price: 8_000,
                order_item_id: None,
            },
            PlannedLine {
                product_variant_id: 2,
                quantity: 5,
                unit_price: 16_000,
                cost_price: 16_000,
                order_item_id: Some(4),
            },
        ];
        let total = total_amount(30_000, lines.iter().map(PlannedLine::cost)).unwrap();
        assert_eq!(total, 190_000);
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let line = PlannedLine {
            product_variant_id: 1,
            quantity: 10,
            unit_price: 1,
            cost_price: i64::MAX / 4,
            order_item_id: None,
        };
        assert_matches!(
            total_amount(0, [line.cost()]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            total_amount(i64::MAX, [Some(1)]),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(total_amount(i64::MAX, Vec::new()).unwrap(), i64::MAX);
    }

    #[test]
    fn notes_are_appended_on_new_lines() {
        assert_eq!(append_note(None, "supplier late"), "supplier late");
        assert_eq!(append_note(Some(""), "x"), "x");
        assert_eq!(append_note(Some("first"), "second"), "first\nsecond");
    }
}
