#![allow(dead_code)]

use std::sync::Arc;

use retail_ledger::{
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    entities::{inventory, order_item, product_variant, store, OrderItem},
    events::{Event, EventSender},
    services::Ledger,
    LedgerContext,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tokio::sync::mpsc;

/// A ledger backed by a fresh single-connection in-memory SQLite database,
/// seeded with two stores, two variants and a backordered order item.
pub struct TestLedger {
    pub ctx: LedgerContext,
    pub db: Arc<DbPool>,
    pub events: mpsc::Receiver<Event>,
    pub main_store: store::Model,
    pub branch_store: store::Model,
    pub widget: product_variant::Model,
    pub gadget: product_variant::Model,
}

impl TestLedger {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::new("sqlite::memory:".into(), "test".into())).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let pool = db::connect(&DbConfig {
            url: config.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("connect to sqlite");
        db::run_migrations(&pool).await.expect("run migrations");

        let db = Arc::new(pool);
        let (sender, events) = EventSender::channel(1024);
        let ctx = LedgerContext::new(db.clone(), Arc::new(sender), &config);

        let main_store = seed_store(&db, "MAIN", "Main Street").await;
        let branch_store = seed_store(&db, "BRANCH", "Harbour Branch").await;
        let widget = seed_variant(&db, "WID-001", "Widget", 8_000).await;
        let gadget = seed_variant(&db, "GAD-001", "Gadget", 16_000).await;

        Self {
            ctx,
            db,
            events,
            main_store,
            branch_store,
            widget,
            gadget,
        }
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::default()
    }

    /// Current stock, or 0 when the pair has never been stocked.
    pub async fn stock(&self, store_id: i64, variant_id: i64) -> i32 {
        self.record(store_id, variant_id)
            .await
            .map(|r| r.quantity)
            .unwrap_or(0)
    }

    pub async fn record(&self, store_id: i64, variant_id: i64) -> Option<inventory::Model> {
        self.ledger()
            .find(self.db.as_ref(), store_id, variant_id)
            .await
            .expect("query inventory")
    }

    pub async fn order_item(&self, id: i64) -> order_item::Model {
        OrderItem::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .expect("query order item")
            .expect("order item exists")
    }

    /// Everything published so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub async fn seed_store(db: &DbPool, code: &str, name: &str) -> store::Model {
    store::ActiveModel {
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed store")
}

pub async fn seed_variant(db: &DbPool, sku: &str, name: &str, cost_price: i64) -> product_variant::Model {
    product_variant::ActiveModel {
        sku: Set(sku.to_string()),
        name: Set(name.to_string()),
        cost_price: Set(cost_price),
        average_cost: Set(cost_price),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed variant")
}

pub async fn seed_order_item(
    db: &DbPool,
    store_id: i64,
    variant_id: i64,
    quantity: i32,
    fulfilled_quantity: i32,
    is_backorder: bool,
) -> order_item::Model {
    order_item::ActiveModel {
        store_id: Set(store_id),
        product_variant_id: Set(variant_id),
        quantity: Set(quantity),
        fulfilled_quantity: Set(fulfilled_quantity),
        is_backorder: Set(is_backorder),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed order item")
}
