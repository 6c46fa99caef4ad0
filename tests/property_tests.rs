mod common;

use common::TestLedger;
use proptest::prelude::*;
use retail_ledger::{
    commands::{AdjustInventoryCommand, AdjustmentAction, HistoryFilter},
    errors::ServiceError,
};

fn action() -> impl Strategy<Value = AdjustmentAction> {
    prop_oneof![
        Just(AdjustmentAction::Add),
        Just(AdjustmentAction::Reduce),
        Just(AdjustmentAction::Set),
    ]
}

fn run(steps: Vec<(AdjustmentAction, i32)>) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    runtime.block_on(async move {
        let t = TestLedger::new().await;
        let service = t.ctx.inventory();
        let mut expected = 0i32;
        let mut applied = 0usize;

        for (action, quantity) in steps {
            let result = service
                .adjust(AdjustInventoryCommand {
                    store_id: t.main_store.id,
                    product_variant_id: t.widget.id,
                    action,
                    quantity,
                    low_stock_threshold: None,
                    notes: None,
                    user_id: None,
                })
                .await;

            let target = expected + action.delta(expected, quantity);
            match result {
                Ok(done) => {
                    prop_assert!(target >= 0);
                    prop_assert_eq!(done.inventory.quantity, target);
                    expected = target;
                    applied += 1;
                }
                Err(ServiceError::InsufficientStock(_)) => prop_assert!(target < 0),
                Err(other) => return Err(TestCaseError::fail(other.to_string())),
            }
            prop_assert_eq!(t.stock(t.main_store.id, t.widget.id).await, expected);
        }

        if let Some(record) = t.record(t.main_store.id, t.widget.id).await {
            let history = service
                .history(record.id, HistoryFilter::default())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(history.len(), applied);
            let net: i32 = history.iter().map(|row| row.quantity).sum();
            prop_assert_eq!(net, expected);
        }
        Ok(())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn stock_never_goes_negative(steps in prop::collection::vec((action(), 0i32..40), 1..25)) {
        run(steps)?;
    }
}
