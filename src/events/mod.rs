use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::{PurchaseStatus, TransactionType, TransferStatus};

/// Domain events published by the engines once their transaction has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    StockChanged {
        inventory_id: i64,
        store_id: i64,
        product_variant_id: i64,
        transaction_type: TransactionType,
        delta: i32,
        before_quantity: i32,
        after_quantity: i32,
    },
    LowStock {
        inventory_id: i64,
        store_id: i64,
        product_variant_id: i64,
        quantity: i32,
        threshold: i32,
    },
    PurchaseCreated {
        purchase_id: i64,
        order_number: String,
        status: PurchaseStatus,
    },
    PurchaseUpdated(i64),
    PurchaseStatusChanged {
        purchase_id: i64,
        old_status: PurchaseStatus,
        new_status: PurchaseStatus,
    },
    PurchaseReceived {
        purchase_id: i64,
        store_id: i64,
        received_at: DateTime<Utc>,
    },
    PurchaseDeleted(i64),
    TransferCreated {
        transfer_id: i64,
        status: TransferStatus,
    },
    TransferStatusChanged {
        transfer_id: i64,
        old_status: TransferStatus,
        new_status: TransferStatus,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiving half of a bounded channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes a batch of events, logging failures instead of returning them.
    ///
    /// Events describe work that is already committed, so a closed channel
    /// must not surface as a failure of that work.
    pub async fn publish_all(&self, events: Vec<Event>) {
        for event in events {
            if let Err(e) = self.send(event).await {
                warn!(error = %e, "dropping domain event");
            }
        }
    }
}

/// Drains the event channel, logging every event until all senders are gone.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::LowStock {
                store_id,
                product_variant_id,
                quantity,
                threshold,
                ..
            } => {
                warn!(
                    store_id,
                    product_variant_id, quantity, threshold, "stock at or below threshold"
                );
            }
            Event::PurchaseReceived {
                purchase_id,
                store_id,
                ..
            } => {
                info!(purchase_id, store_id, "purchase received into stock");
            }
            other => info!(event = ?other, "domain event"),
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_all_tolerates_closed_channel() {
        let (sender, rx) = EventSender::channel(4);
        drop(rx);
        sender
            .publish_all(vec![Event::PurchaseDeleted(1), Event::PurchaseUpdated(2)])
            .await;
        assert!(sender.send(Event::PurchaseDeleted(3)).await.is_err());
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let (sender, mut rx) = EventSender::channel(4);
        sender
            .publish_all(vec![Event::PurchaseUpdated(1), Event::PurchaseDeleted(1)])
            .await;
        assert_eq!(rx.recv().await, Some(Event::PurchaseUpdated(1)));
        assert_eq!(rx.recv().await, Some(Event::PurchaseDeleted(1)));
    }
}
