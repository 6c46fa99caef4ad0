//! Retail Ledger
//!
//! Multi-store inventory ledger with purchase orders, shipping-cost
//! allocation, backorder binding and store-to-store transfers, on SeaORM.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod migrator;
pub mod repositories;
pub mod services;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{InventoryService, Ledger, PurchaseService, TransferService};

/// Wires the engines to one connection pool and event channel.
#[derive(Clone)]
pub struct LedgerContext {
    pub db: Arc<DbPool>,
    pub event_sender: Arc<EventSender>,
    ledger: Ledger,
    purchase_number_prefix: String,
}

impl LedgerContext {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self {
            db,
            event_sender,
            ledger: Ledger::new(config.default_low_stock_threshold),
            purchase_number_prefix: config.purchase_number_prefix.clone(),
        }
    }

    pub fn purchases(&self) -> PurchaseService {
        PurchaseService::new(self.db.clone(), self.event_sender.clone())
            .with_ledger(self.ledger.clone())
            .with_number_prefix(self.purchase_number_prefix.clone())
    }

    pub fn transfers(&self) -> TransferService {
        TransferService::new(self.db.clone(), self.event_sender.clone())
            .with_ledger(self.ledger.clone())
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(self.db.clone(), self.event_sender.clone())
            .with_ledger(self.ledger.clone())
    }
}
