//! Prometheus counters for ledger activity.
//!
//! All collectors live in one crate-level [`Registry`]; [`gather_text`]
//! renders it in the text exposition format.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new_custom(Some("retail_ledger".into()), None)
        .expect("registry can be created");
    pub static ref STOCK_MUTATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("stock_mutations_total", "Ledger writes by transaction type"),
        &["type"]
    )
    .expect("metric can be created");
    pub static ref INSUFFICIENT_STOCK: IntCounter = IntCounter::new(
        "insufficient_stock_total",
        "Debits rejected because they would drive stock negative"
    )
    .expect("metric can be created");
    pub static ref PURCHASES_CREATED: IntCounter =
        IntCounter::new("purchases_created_total", "Purchase orders created")
            .expect("metric can be created");
    pub static ref PURCHASES_RECEIVED: IntCounter = IntCounter::new(
        "purchases_received_total",
        "Purchase orders received into stock"
    )
    .expect("metric can be created");
    pub static ref TRANSFERS: IntCounterVec = IntCounterVec::new(
        Opts::new("transfers_total", "Transfer state changes by resulting status"),
        &["status"]
    )
    .expect("metric can be created");
}

fn register_all() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(STOCK_MUTATIONS.clone()),
        Box::new(INSUFFICIENT_STOCK.clone()),
        Box::new(PURCHASES_CREATED.clone()),
        Box::new(PURCHASES_RECEIVED.clone()),
        Box::new(TRANSFERS.clone()),
    ];
    for collector in collectors {
        // AlreadyReg is expected on every call after the first
        if let Err(e) = REGISTRY.register(collector) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                error!("Failed to register metric: {}", e);
            }
        }
    }
}

/// Renders every ledger metric in the Prometheus text format.
pub fn gather_text() -> String {
    register_all();
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        STOCK_MUTATIONS.with_label_values(&["addition"]).inc();
        PURCHASES_CREATED.inc();
        let text = gather_text();
        assert!(text.contains("retail_ledger_stock_mutations_total"));
        assert!(text.contains("retail_ledger_purchases_created_total"));
        // second gather must not fail on re-registration
        assert!(gather_text().contains("retail_ledger_insufficient_stock_total"));
    }
}
