//! Typed, validated inputs for every engine operation.
//!
//! Commands are plain data; the services in [`crate::services`] execute them.
//! Each carries the acting `user_id` so audit rows never depend on ambient state.

pub mod inventory;
pub mod purchases;
pub mod transfers;

pub use inventory::{AdjustInventoryCommand, AdjustmentAction, HistoryFilter, SkuLookupFilter};
pub use purchases::{
    CreatePurchaseCommand, ManualPurchaseItem, OrderItemBinding, UpdatePurchaseCommand,
};
pub use transfers::{CreateTransferCommand, UpdateTransferStatusCommand};
