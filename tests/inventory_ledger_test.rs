mod common;

use assert_matches::assert_matches;
use common::TestLedger;
use retail_ledger::{
    commands::{AdjustInventoryCommand, AdjustmentAction, HistoryFilter, SkuLookupFilter},
    entities::TransactionType,
    errors::ServiceError,
    events::Event,
    services::{Ledger, StockMutation},
};
use sea_orm::TransactionTrait;

fn adjust(t: &TestLedger, action: AdjustmentAction, quantity: i32) -> AdjustInventoryCommand {
    AdjustInventoryCommand {
        store_id: t.main_store.id,
        product_variant_id: t.widget.id,
        action,
        quantity,
        low_stock_threshold: None,
        notes: None,
        user_id: Some(5),
    }
}

#[tokio::test]
async fn reduce_past_zero_is_rejected_without_a_write() {
    let t = TestLedger::new().await;
    let service = t.ctx.inventory();
    service
        .adjust(adjust(&t, AdjustmentAction::Add, 3))
        .await
        .expect("add");

    let err = service
        .adjust(adjust(&t, AdjustmentAction::Reduce, 4))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 3);

    let record = t.record(t.main_store.id, t.widget.id).await.unwrap();
    let history = service
        .history(record.id, HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn every_mutation_leaves_a_consistent_audit_row() {
    let t = TestLedger::new().await;
    let service = t.ctx.inventory();

    let added = service
        .adjust(adjust(&t, AdjustmentAction::Add, 10))
        .await
        .unwrap();
    assert_eq!(added.transaction.r#type, TransactionType::Addition);
    assert_eq!(added.inventory.quantity, 10);

    let reduced = service
        .adjust(adjust(&t, AdjustmentAction::Reduce, 4))
        .await
        .unwrap();
    assert_eq!(reduced.transaction.r#type, TransactionType::Reduction);
    assert_eq!(reduced.transaction.quantity, -4);

    let set = service
        .adjust(AdjustInventoryCommand {
            notes: Some("cycle count".into()),
            ..adjust(&t, AdjustmentAction::Set, 2)
        })
        .await
        .unwrap();
    assert_eq!(set.transaction.r#type, TransactionType::Adjustment);
    assert_eq!(set.transaction.quantity, -4);
    assert_eq!(set.transaction.notes.as_deref(), Some("cycle count"));

    let history = service
        .history(set.inventory.id, HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    for row in &history {
        assert_eq!(row.after_quantity, row.before_quantity + row.quantity);
        assert!(row.after_quantity >= 0);
        assert_eq!(row.user_id, Some(5));
    }
    assert_eq!(history[0].after_quantity, 2);
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 2);
}

#[tokio::test]
async fn history_filters_by_type_and_limit() {
    let t = TestLedger::new().await;
    let service = t.ctx.inventory();
    for _ in 0..3 {
        service
            .adjust(adjust(&t, AdjustmentAction::Add, 2))
            .await
            .unwrap();
    }
    let last = service
        .adjust(adjust(&t, AdjustmentAction::Reduce, 1))
        .await
        .unwrap();

    let additions = service
        .history(
            last.inventory.id,
            HistoryFilter {
                transaction_type: Some(TransactionType::Addition),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(additions.len(), 3);

    let newest = service
        .history(
            last.inventory.id,
            HistoryFilter {
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].id, last.transaction.id);

    assert_matches!(
        service.history(9_999, HistoryFilter::default()).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn adjust_requires_known_store_and_variant() {
    let t = TestLedger::new().await;
    let service = t.ctx.inventory();
    let err = service
        .adjust(AdjustInventoryCommand {
            store_id: 9_999,
            ..adjust(&t, AdjustmentAction::Add, 1)
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = service
        .adjust(AdjustInventoryCommand {
            product_variant_id: 9_999,
            ..adjust(&t, AdjustmentAction::Add, 1)
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn sku_lookup_spans_stores() {
    let t = TestLedger::new().await;
    let service = t.ctx.inventory();
    service
        .adjust(adjust(&t, AdjustmentAction::Add, 7))
        .await
        .unwrap();
    service
        .adjust(AdjustInventoryCommand {
            store_id: t.branch_store.id,
            low_stock_threshold: Some(5),
            ..adjust(&t, AdjustmentAction::Add, 2)
        })
        .await
        .unwrap();

    let all = service
        .get_by_sku("WID-001", SkuLookupFilter::default())
        .await
        .unwrap();
    assert_eq!(all.variant.id, t.widget.id);
    assert_eq!(all.inventories.len(), 2);
    assert_eq!(all.total_quantity, 9);

    let branch = service
        .get_by_sku(
            "WID-001",
            SkuLookupFilter {
                store_id: Some(t.branch_store.id),
                low_stock_only: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(branch.inventories.len(), 1);

    let low = service
        .get_by_sku(
            "WID-001",
            SkuLookupFilter {
                store_id: None,
                low_stock_only: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(low.inventories.len(), 1);
    assert_eq!(low.inventories[0].store_id, t.branch_store.id);

    assert_matches!(
        service
            .get_by_sku("NOPE", SkuLookupFilter::default())
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn low_stock_is_listed_and_signalled() {
    let mut t = TestLedger::new().await;
    let service = t.ctx.inventory();
    service
        .adjust(AdjustInventoryCommand {
            low_stock_threshold: Some(3),
            ..adjust(&t, AdjustmentAction::Add, 10)
        })
        .await
        .unwrap();
    assert!(service.list_low_stock(None).await.unwrap().is_empty());
    t.drain_events();

    service
        .adjust(adjust(&t, AdjustmentAction::Reduce, 7))
        .await
        .unwrap();
    let low = service.list_low_stock(Some(t.main_store.id)).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].quantity, 3);
    assert!(service
        .list_low_stock(Some(t.branch_store.id))
        .await
        .unwrap()
        .is_empty());

    let events = t.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::LowStock {
            quantity: 3,
            threshold: 3,
            ..
        }
    )));
}

#[tokio::test]
async fn racing_debits_never_oversell() {
    let t = TestLedger::new().await;
    t.ctx
        .inventory()
        .adjust(adjust(&t, AdjustmentAction::Add, 10))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let service = t.ctx.inventory();
        let command = adjust(&t, AdjustmentAction::Reduce, 1);
        tasks.push(tokio::spawn(async move { service.adjust(command).await }));
    }

    let mut succeeded = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => succeeded += 1,
            Err(err) => assert_matches!(
                err,
                ServiceError::InsufficientStock(_) | ServiceError::ConcurrentModification(_)
            ),
        }
    }
    assert_eq!(succeeded, 10);
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 0);
}

#[tokio::test]
async fn stale_record_is_a_concurrent_modification() {
    let t = TestLedger::new().await;
    let ledger = Ledger::default();

    let txn = t.db.begin().await.unwrap();
    let stale = ledger
        .get_or_create(&txn, t.main_store.id, t.widget.id)
        .await
        .unwrap();
    ledger
        .apply(&txn, &stale, StockMutation::new(TransactionType::Addition, 5))
        .await
        .unwrap();

    let err = ledger
        .apply(&txn, &stale, StockMutation::new(TransactionType::Addition, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ConcurrentModification(id) if id == stale.id);
    txn.commit().await.unwrap();

    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 5);
}

#[tokio::test]
async fn get_or_create_is_idempotent() {
    let t = TestLedger::new().await;
    let ledger = Ledger::new(4);

    let txn = t.db.begin().await.unwrap();
    let first = ledger
        .get_or_create(&txn, t.branch_store.id, t.gadget.id)
        .await
        .unwrap();
    let second = ledger
        .get_or_create(&txn, t.branch_store.id, t.gadget.id)
        .await
        .unwrap();
    txn.commit().await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.quantity, 0);
    assert_eq!(first.low_stock_threshold, 4);
    assert_matches!(
        ledger.get(t.db.as_ref(), t.main_store.id, t.gadget.id).await,
        Err(ServiceError::NotFound(_))
    );
}
