use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_order_items_table::Migration),
            Box::new(m20240101_000003_create_inventory_tables::Migration),
            Box::new(m20240101_000004_create_purchase_tables::Migration),
            Box::new(m20240101_000005_create_inventory_transfers_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Stores::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Stores::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Stores::Name).string().not_null())
                        .col(ColumnDef::new(Stores::Code).string().not_null().unique_key())
                        .col(
                            ColumnDef::new(Stores::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductVariants::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ProductVariants::Name).string().not_null())
                        .col(
                            ColumnDef::new(ProductVariants::CostPrice)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::AverageCost)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Stores::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Stores {
        Table,
        Id,
        Name,
        Code,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum ProductVariants {
        Table,
        Id,
        Sku,
        Name,
        CostPrice,
        AverageCost,
        CreatedAt,
    }
}

mod m20240101_000002_create_order_items_table {
    use super::m20240101_000001_create_catalog_tables::{ProductVariants, Stores};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Sales order lines, owned by the order workflow; the ledger only
            // reads demand and writes fulfilment progress.
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::StoreId).big_integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::ProductVariantId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::FulfilledQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderItems::IsBackorder)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_store")
                                .from(OrderItems::Table, OrderItems::StoreId)
                                .to(Stores::Table, Stores::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_variant")
                                .from(OrderItems::Table, OrderItems::ProductVariantId)
                                .to(ProductVariants::Table, ProductVariants::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum OrderItems {
        Table,
        Id,
        StoreId,
        ProductVariantId,
        Quantity,
        FulfilledQuantity,
        IsBackorder,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_inventory_tables {
    use super::m20240101_000001_create_catalog_tables::{ProductVariants, Stores};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Inventories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Inventories::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Inventories::StoreId).big_integer().not_null())
                        .col(
                            ColumnDef::new(Inventories::ProductVariantId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Inventories::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventories::LowStockThreshold)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Inventories::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventories_store")
                                .from(Inventories::Table, Inventories::StoreId)
                                .to(Stores::Table, Stores::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventories_variant")
                                .from(Inventories::Table, Inventories::ProductVariantId)
                                .to(ProductVariants::Table, ProductVariants::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_inventories_store_variant")
                        .table(Inventories::Table)
                        .col(Inventories::StoreId)
                        .col(Inventories::ProductVariantId)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryTransactions::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::InventoryId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Type)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::BeforeQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::AfterQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::UserId)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(InventoryTransactions::Notes).text().null())
                        .col(
                            ColumnDef::new(InventoryTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transactions_inventory")
                                .from(
                                    InventoryTransactions::Table,
                                    InventoryTransactions::InventoryId,
                                )
                                .to(Inventories::Table, Inventories::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_inventory_transactions_inventory")
                        .table(InventoryTransactions::Table)
                        .col(InventoryTransactions::InventoryId)
                        .col(InventoryTransactions::CreatedAt)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryTransactions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Inventories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Inventories {
        Table,
        Id,
        StoreId,
        ProductVariantId,
        Quantity,
        LowStockThreshold,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum InventoryTransactions {
        Table,
        Id,
        InventoryId,
        Type,
        Quantity,
        BeforeQuantity,
        AfterQuantity,
        UserId,
        Notes,
        CreatedAt,
    }
}

mod m20240101_000004_create_purchase_tables {
    use super::m20240101_000001_create_catalog_tables::{ProductVariants, Stores};
    use super::m20240101_000002_create_order_items_table::OrderItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_purchase_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Purchases::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Purchases::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Purchases::StoreId).big_integer().not_null())
                        .col(
                            ColumnDef::new(Purchases::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Purchases::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Purchases::ShippingCost)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Purchases::TotalAmount)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Purchases::PurchasedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Purchases::Notes).text().null())
                        .col(ColumnDef::new(Purchases::UserId).big_integer().null())
                        .col(
                            ColumnDef::new(Purchases::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Purchases::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchases_store")
                                .from(Purchases::Table, Purchases::StoreId)
                                .to(Stores::Table, Stores::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseItems::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseItems::PurchaseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseItems::ProductVariantId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(PurchaseItems::UnitPrice)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseItems::CostPrice)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseItems::AllocatedShippingCost)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseItems::OrderItemId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_items_purchase")
                                .from(PurchaseItems::Table, PurchaseItems::PurchaseId)
                                .to(Purchases::Table, Purchases::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_items_variant")
                                .from(PurchaseItems::Table, PurchaseItems::ProductVariantId)
                                .to(ProductVariants::Table, ProductVariants::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_items_order_item")
                                .from(PurchaseItems::Table, PurchaseItems::OrderItemId)
                                .to(OrderItems::Table, OrderItems::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_purchase_items_order_item")
                        .table(PurchaseItems::Table)
                        .col(PurchaseItems::OrderItemId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Purchases::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Purchases {
        Table,
        Id,
        StoreId,
        OrderNumber,
        Status,
        ShippingCost,
        TotalAmount,
        PurchasedAt,
        Notes,
        UserId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseItems {
        Table,
        Id,
        PurchaseId,
        ProductVariantId,
        Quantity,
        UnitPrice,
        CostPrice,
        AllocatedShippingCost,
        OrderItemId,
        CreatedAt,
    }
}

mod m20240101_000005_create_inventory_transfers_table {
    use super::m20240101_000001_create_catalog_tables::{ProductVariants, Stores};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_inventory_transfers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryTransfers::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::FromStoreId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::ToStoreId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::ProductVariantId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::UserId)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(InventoryTransfers::Notes).text().null())
                        .col(
                            ColumnDef::new(InventoryTransfers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transfers_from_store")
                                .from(InventoryTransfers::Table, InventoryTransfers::FromStoreId)
                                .to(Stores::Table, Stores::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transfers_to_store")
                                .from(InventoryTransfers::Table, InventoryTransfers::ToStoreId)
                                .to(Stores::Table, Stores::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transfers_variant")
                                .from(
                                    InventoryTransfers::Table,
                                    InventoryTransfers::ProductVariantId,
                                )
                                .to(ProductVariants::Table, ProductVariants::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryTransfers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryTransfers {
        Table,
        Id,
        FromStoreId,
        ToStoreId,
        ProductVariantId,
        Quantity,
        Status,
        UserId,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}
