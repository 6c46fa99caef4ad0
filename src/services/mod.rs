//! The ledger engines.
//!
//! Every operation that touches stock runs in a single database
//! transaction and publishes its events only after that transaction commits.

pub mod inventory;
pub mod ledger;
pub mod purchases;
pub mod shipping;
pub mod transfers;

pub use inventory::InventoryService;
pub use ledger::{Ledger, LedgerEntry, StockMutation};
pub use purchases::{PurchaseDetail, PurchaseService};
pub use shipping::allocate_shipping;
pub use transfers::{TransferService, TransferStatusUpdate};
