//! SeaORM entities for the ledger, purchasing and transfer tables.

pub mod inventory;
pub mod inventory_transaction;
pub mod inventory_transfer;
pub mod order_item;
pub mod product_variant;
pub mod purchase;
pub mod purchase_item;
pub mod store;

pub use inventory::Entity as Inventory;
pub use inventory_transaction::{Entity as InventoryTransaction, TransactionType};
pub use inventory_transfer::{Entity as InventoryTransfer, TransferStatus};
pub use order_item::Entity as OrderItem;
pub use product_variant::Entity as ProductVariant;
pub use purchase::{Entity as Purchase, PurchaseStatus};
pub use purchase_item::Entity as PurchaseItem;
pub use store::Entity as Store;
