mod common;

use assert_matches::assert_matches;
use common::TestLedger;
use retail_ledger::{
    commands::{
        AdjustInventoryCommand, AdjustmentAction, CreateTransferCommand, HistoryFilter,
        UpdateTransferStatusCommand,
    },
    entities::{InventoryTransfer, TransactionType, TransferStatus},
    errors::ServiceError,
};
use sea_orm::EntityTrait;

async fn stock_up(t: &TestLedger, store_id: i64, variant_id: i64, quantity: i32) {
    t.ctx
        .inventory()
        .adjust(AdjustInventoryCommand {
            store_id,
            product_variant_id: variant_id,
            action: AdjustmentAction::Add,
            quantity,
            low_stock_threshold: None,
            notes: Some("opening stock".into()),
            user_id: None,
        })
        .await
        .expect("stock up");
}

fn transfer(t: &TestLedger, quantity: i32, status: Option<TransferStatus>) -> CreateTransferCommand {
    CreateTransferCommand {
        from_store_id: t.main_store.id,
        to_store_id: t.branch_store.id,
        product_variant_id: t.widget.id,
        quantity,
        status,
        notes: None,
        user_id: Some(11),
    }
}

fn to(status: TransferStatus) -> UpdateTransferStatusCommand {
    UpdateTransferStatusCommand {
        status,
        notes: None,
        user_id: Some(11),
    }
}

#[tokio::test]
async fn in_transit_create_then_cancel_restores_source() {
    let t = TestLedger::new().await;
    stock_up(&t, t.main_store.id, t.widget.id, 20).await;
    let service = t.ctx.transfers();

    let created = service
        .create(transfer(&t, 8, Some(TransferStatus::InTransit)))
        .await
        .expect("create transfer");
    assert_eq!(created.status, TransferStatus::InTransit);
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 12);
    assert_eq!(t.stock(t.branch_store.id, t.widget.id).await, 0);

    let cancelled = service
        .cancel(created.id, Some("truck broke down".into()), Some(11))
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, TransferStatus::Cancelled);
    assert_eq!(cancelled.notes.as_deref(), Some("truck broke down"));
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 20);

    let record = t.record(t.main_store.id, t.widget.id).await.unwrap();
    let history = t
        .ctx
        .inventory()
        .history(record.id, HistoryFilter::default())
        .await
        .expect("history");
    let latest = &history[0];
    assert_eq!(latest.r#type, TransactionType::TransferCancel);
    assert_eq!(latest.quantity, 8);
    assert_eq!(latest.before_quantity, 12);
    assert_eq!(latest.after_quantity, 20);
    assert_eq!(latest.user_id, Some(11));
}

#[tokio::test]
async fn pending_to_in_transit_to_completed() {
    let t = TestLedger::new().await;
    stock_up(&t, t.main_store.id, t.widget.id, 5).await;
    let service = t.ctx.transfers();

    let created = service
        .create(transfer(&t, 5, None))
        .await
        .expect("create transfer");
    assert_eq!(created.status, TransferStatus::Pending);
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 5);

    let update = service
        .update_status(created.id, to(TransferStatus::InTransit))
        .await
        .expect("ship");
    assert!(update.changed);
    assert_eq!(update.previous_status, TransferStatus::Pending);
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 0);
    assert_eq!(t.stock(t.branch_store.id, t.widget.id).await, 0);

    let update = service
        .update_status(created.id, to(TransferStatus::Completed))
        .await
        .expect("receive");
    assert_eq!(update.transfer.status, TransferStatus::Completed);
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 0);
    assert_eq!(t.stock(t.branch_store.id, t.widget.id).await, 5);
}

#[tokio::test]
async fn pending_completes_directly_with_both_legs() {
    let t = TestLedger::new().await;
    stock_up(&t, t.main_store.id, t.widget.id, 9).await;
    let service = t.ctx.transfers();

    let created = service
        .create(transfer(&t, 4, None))
        .await
        .expect("create transfer");
    service
        .update_status(created.id, to(TransferStatus::Completed))
        .await
        .expect("complete");
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 5);
    assert_eq!(t.stock(t.branch_store.id, t.widget.id).await, 4);

    let direct = service
        .create(transfer(&t, 5, Some(TransferStatus::Completed)))
        .await
        .expect("create completed");
    assert_eq!(direct.status, TransferStatus::Completed);
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 0);
    assert_eq!(t.stock(t.branch_store.id, t.widget.id).await, 9);
}

#[tokio::test]
async fn short_source_aborts_without_a_record() {
    let t = TestLedger::new().await;
    let service = t.ctx.transfers();

    // never stocked
    let err = service
        .create(transfer(&t, 1, Some(TransferStatus::InTransit)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    stock_up(&t, t.main_store.id, t.widget.id, 3).await;
    let err = service
        .create(transfer(&t, 4, Some(TransferStatus::Completed)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    assert!(InventoryTransfer::find()
        .all(t.db.as_ref())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 3);
    assert!(t.record(t.branch_store.id, t.widget.id).await.is_none());
}

#[tokio::test]
async fn short_source_leaves_pending_transfer_unchanged() {
    let t = TestLedger::new().await;
    stock_up(&t, t.main_store.id, t.widget.id, 2).await;
    let service = t.ctx.transfers();
    let created = service
        .create(transfer(&t, 2, None))
        .await
        .expect("create transfer");

    t.ctx
        .inventory()
        .adjust(AdjustInventoryCommand {
            store_id: t.main_store.id,
            product_variant_id: t.widget.id,
            action: AdjustmentAction::Reduce,
            quantity: 1,
            low_stock_threshold: None,
            notes: None,
            user_id: None,
        })
        .await
        .expect("sell one");

    let err = service
        .update_status(created.id, to(TransferStatus::InTransit))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(
        service.get(created.id).await.unwrap().status,
        TransferStatus::Pending
    );
}

#[tokio::test]
async fn same_status_is_a_no_op() {
    let t = TestLedger::new().await;
    stock_up(&t, t.main_store.id, t.widget.id, 5).await;
    let service = t.ctx.transfers();
    let created = service
        .create(transfer(&t, 2, Some(TransferStatus::InTransit)))
        .await
        .expect("create transfer");

    let update = service
        .update_status(created.id, to(TransferStatus::InTransit))
        .await
        .expect("no-op");
    assert!(!update.changed);
    assert_eq!(update.previous_status, TransferStatus::InTransit);
    assert_eq!(update.transfer.status, TransferStatus::InTransit);
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 3);
}

#[tokio::test]
async fn terminal_transfers_are_locked() {
    let t = TestLedger::new().await;
    stock_up(&t, t.main_store.id, t.widget.id, 5).await;
    let service = t.ctx.transfers();
    let done = service
        .create(transfer(&t, 2, Some(TransferStatus::Completed)))
        .await
        .expect("create transfer");

    let err = service
        .update_status(done.id, to(TransferStatus::Cancelled))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::TransferLocked(_));
    let err = service.cancel(done.id, None, None).await.unwrap_err();
    assert_matches!(err, ServiceError::TransferLocked(_));
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 3);
    assert_eq!(t.stock(t.branch_store.id, t.widget.id).await, 2);
}

#[tokio::test]
async fn in_transit_cannot_return_to_pending() {
    let t = TestLedger::new().await;
    stock_up(&t, t.main_store.id, t.widget.id, 5).await;
    let service = t.ctx.transfers();
    let created = service
        .create(transfer(&t, 2, Some(TransferStatus::InTransit)))
        .await
        .expect("create transfer");

    let err = service
        .update_status(created.id, to(TransferStatus::Pending))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatusTransition(_));
}

#[tokio::test]
async fn cancelling_pending_moves_no_stock() {
    let t = TestLedger::new().await;
    stock_up(&t, t.main_store.id, t.widget.id, 5).await;
    let service = t.ctx.transfers();
    let created = service
        .create(transfer(&t, 2, None))
        .await
        .expect("create transfer");

    let update = service
        .update_status(created.id, to(TransferStatus::Cancelled))
        .await
        .expect("cancel via status");
    assert_eq!(update.transfer.status, TransferStatus::Cancelled);
    assert_eq!(t.stock(t.main_store.id, t.widget.id).await, 5);

    let record = t.record(t.main_store.id, t.widget.id).await.unwrap();
    let history = t
        .ctx
        .inventory()
        .history(record.id, HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn create_validates_endpoints() {
    let t = TestLedger::new().await;
    let service = t.ctx.transfers();

    let mut same = transfer(&t, 1, None);
    same.to_store_id = same.from_store_id;
    assert_matches!(
        service.create(same).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        service.create(transfer(&t, 0, None)).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        service
            .create(transfer(&t, 1, Some(TransferStatus::Cancelled)))
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(service.get(404).await, Err(ServiceError::NotFound(_)));
}
