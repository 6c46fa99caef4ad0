use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use retail_ledger::{
    commands::{
        AdjustInventoryCommand, AdjustmentAction, CreateTransferCommand, HistoryFilter,
        SkuLookupFilter, UpdateTransferStatusCommand,
    },
    config::{self, AppConfig},
    db,
    entities::{inventory, PurchaseStatus, TransactionType, TransferStatus},
    events::{self, EventSender},
    LedgerContext,
};
use serde::Serialize;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize(matches!(cli.command, Commands::Migrate)).await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.ledger.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::Adjust(args) => handle_adjust(&context, args, cli.json).await?,
        Commands::History(args) => handle_history(&context, args, cli.json).await?,
        Commands::Sku(args) => handle_sku(&context, args, cli.json).await?,
        Commands::LowStock(args) => handle_low_stock(&context, args, cli.json).await?,
        Commands::Transfer(command) => handle_transfer(&context, command, cli.json).await?,
        Commands::Purchase(command) => handle_purchase(&context, command, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "ledger-cli", about = "Operate the retail stock ledger", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Add, reduce or set stock for a store and variant
    Adjust(AdjustArgs),
    /// Show the audit trail of an inventory record
    History(HistoryArgs),
    /// Show stock of a SKU across stores
    Sku(SkuArgs),
    /// List records at or below their low-stock threshold
    LowStock(LowStockArgs),
    #[command(subcommand)]
    Transfer(TransferCommands),
    #[command(subcommand)]
    Purchase(PurchaseCommands),
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Add,
    Reduce,
    Set,
}

impl From<ActionArg> for AdjustmentAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Add => AdjustmentAction::Add,
            ActionArg::Reduce => AdjustmentAction::Reduce,
            ActionArg::Set => AdjustmentAction::Set,
        }
    }
}

#[derive(Args)]
struct AdjustArgs {
    #[arg(long)]
    store: i64,
    #[arg(long)]
    variant: i64,
    #[arg(long, value_enum)]
    action: ActionArg,
    #[arg(long)]
    quantity: i32,
    #[arg(long, help = "Also set the low-stock threshold")]
    threshold: Option<i32>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long, help = "Acting user id recorded in the audit trail")]
    user: Option<i64>,
}

#[derive(Args)]
struct HistoryArgs {
    #[arg(long)]
    inventory: i64,
    #[arg(long = "type", value_parser = parse_enum::<TransactionType>)]
    transaction_type: Option<TransactionType>,
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args)]
struct SkuArgs {
    sku: String,
    #[arg(long)]
    store: Option<i64>,
    #[arg(long, action = ArgAction::SetTrue)]
    low_stock_only: bool,
}

#[derive(Args)]
struct LowStockArgs {
    #[arg(long)]
    store: Option<i64>,
}

#[derive(Subcommand)]
enum TransferCommands {
    Create(TransferCreateArgs),
    Status(TransferStatusArgs),
    Cancel(TransferCancelArgs),
}

#[derive(Args)]
struct TransferCreateArgs {
    #[arg(long)]
    from: i64,
    #[arg(long)]
    to: i64,
    #[arg(long)]
    variant: i64,
    #[arg(long)]
    quantity: i32,
    #[arg(long, value_parser = parse_enum::<TransferStatus>)]
    status: Option<TransferStatus>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    user: Option<i64>,
}

#[derive(Args)]
struct TransferStatusArgs {
    #[arg(long)]
    id: i64,
    #[arg(long, value_parser = parse_enum::<TransferStatus>)]
    status: TransferStatus,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    user: Option<i64>,
}

#[derive(Args)]
struct TransferCancelArgs {
    #[arg(long)]
    id: i64,
    #[arg(long)]
    reason: Option<String>,
    #[arg(long)]
    user: Option<i64>,
}

#[derive(Subcommand)]
enum PurchaseCommands {
    Show(PurchaseIdArgs),
    Status(PurchaseStatusArgs),
    Cancel(PurchaseCancelArgs),
    Shipping(PurchaseShippingArgs),
}

#[derive(Args)]
struct PurchaseIdArgs {
    #[arg(long)]
    id: i64,
}

#[derive(Args)]
struct PurchaseStatusArgs {
    #[arg(long)]
    id: i64,
    #[arg(long, value_parser = parse_enum::<PurchaseStatus>)]
    status: PurchaseStatus,
    #[arg(long)]
    user: Option<i64>,
}

#[derive(Args)]
struct PurchaseCancelArgs {
    #[arg(long)]
    id: i64,
    #[arg(long)]
    reason: Option<String>,
    #[arg(long)]
    user: Option<i64>,
}

#[derive(Args)]
struct PurchaseShippingArgs {
    #[arg(long)]
    id: i64,
    #[arg(long, help = "New shipping cost in minor currency units")]
    cost: i64,
}

fn parse_enum<T: FromStr>(value: &str) -> std::result::Result<T, String> {
    T::from_str(value).map_err(|_| format!("unknown value '{}'", value))
}

struct CliContext {
    ledger: LedgerContext,
}

impl CliContext {
    async fn initialize(migrating: bool) -> Result<Self> {
        let config: AppConfig =
            config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::connect_with(&config)
            .await
            .context("failed to connect to database")?;
        if config.auto_migrate && !migrating {
            db::run_migrations(&db_pool)
                .await
                .context("failed to run migrations")?;
        }

        let (event_sender, event_rx) = EventSender::channel(config.event_channel_capacity);
        tokio::spawn(events::process_events(event_rx));

        info!(environment = %config.environment, "ledger cli ready");
        Ok(Self {
            ledger: LedgerContext::new(Arc::new(db_pool), Arc::new(event_sender), &config),
        })
    }
}

async fn handle_adjust(context: &CliContext, args: AdjustArgs, json: bool) -> Result<()> {
    let result = context
        .ledger
        .inventory()
        .adjust(AdjustInventoryCommand {
            store_id: args.store,
            product_variant_id: args.variant,
            action: args.action.into(),
            quantity: args.quantity,
            low_stock_threshold: args.threshold,
            notes: args.notes,
            user_id: args.user,
        })
        .await
        .context("failed to adjust inventory")?;

    if json {
        print_json(&result)?;
    } else {
        println!(
            "Inventory {}: {} -> {} ({})",
            result.inventory.id,
            result.transaction.before_quantity,
            result.transaction.after_quantity,
            result.transaction.r#type
        );
    }
    Ok(())
}

async fn handle_history(context: &CliContext, args: HistoryArgs, json: bool) -> Result<()> {
    let rows = context
        .ledger
        .inventory()
        .history(
            args.inventory,
            HistoryFilter {
                transaction_type: args.transaction_type,
                limit: args.limit,
                ..Default::default()
            },
        )
        .await
        .context("failed to load inventory history")?;

    if json {
        print_json(&rows)?;
    } else {
        for row in rows {
            println!(
                "- {} {:<15} {:>+6}  {} -> {}  {}",
                row.created_at.format("%Y-%m-%d %H:%M:%S"),
                row.r#type.to_string(),
                row.quantity,
                row.before_quantity,
                row.after_quantity,
                row.notes.unwrap_or_default()
            );
        }
    }
    Ok(())
}

async fn handle_sku(context: &CliContext, args: SkuArgs, json: bool) -> Result<()> {
    let stock = context
        .ledger
        .inventory()
        .get_by_sku(
            &args.sku,
            SkuLookupFilter {
                store_id: args.store,
                low_stock_only: args.low_stock_only,
            },
        )
        .await
        .context("failed to look up SKU")?;

    if json {
        print_json(&stock)?;
    } else {
        println!(
            "{} ({}) total {}",
            stock.variant.sku, stock.variant.name, stock.total_quantity
        );
        stock.inventories.iter().for_each(render_inventory);
    }
    Ok(())
}

async fn handle_low_stock(context: &CliContext, args: LowStockArgs, json: bool) -> Result<()> {
    let rows = context
        .ledger
        .inventory()
        .list_low_stock(args.store)
        .await
        .context("failed to list low stock")?;

    if json {
        print_json(&rows)?;
    } else if rows.is_empty() {
        println!("No records at or below threshold");
    } else {
        rows.iter().for_each(render_inventory);
    }
    Ok(())
}

async fn handle_transfer(context: &CliContext, command: TransferCommands, json: bool) -> Result<()> {
    let service = context.ledger.transfers();
    let transfer = match command {
        TransferCommands::Create(args) => service
            .create(CreateTransferCommand {
                from_store_id: args.from,
                to_store_id: args.to,
                product_variant_id: args.variant,
                quantity: args.quantity,
                status: args.status,
                notes: args.notes,
                user_id: args.user,
            })
            .await
            .context("failed to create transfer")?,
        TransferCommands::Status(args) => {
            let update = service
                .update_status(
                    args.id,
                    UpdateTransferStatusCommand {
                        status: args.status,
                        notes: args.notes,
                        user_id: args.user,
                    },
                )
                .await
                .context("failed to update transfer status")?;
            if !json {
                if update.changed {
                    println!(
                        "Transfer {}: {} -> {}",
                        update.transfer.id, update.previous_status, update.transfer.status
                    );
                } else {
                    println!("Transfer {} already {}", update.transfer.id, update.transfer.status);
                }
            }
            update.transfer
        }
        TransferCommands::Cancel(args) => service
            .cancel(args.id, args.reason, args.user)
            .await
            .context("failed to cancel transfer")?,
    };

    if json {
        print_json(&transfer)?;
    } else {
        println!(
            "Transfer {} • store {} -> {} • variant {} x{} • {}",
            transfer.id,
            transfer.from_store_id,
            transfer.to_store_id,
            transfer.product_variant_id,
            transfer.quantity,
            transfer.status
        );
    }
    Ok(())
}

async fn handle_purchase(context: &CliContext, command: PurchaseCommands, json: bool) -> Result<()> {
    let service = context.ledger.purchases();
    let detail = match command {
        PurchaseCommands::Show(args) => service
            .get(args.id)
            .await
            .context("failed to load purchase")?,
        PurchaseCommands::Status(args) => {
            service
                .transition_status(args.id, args.status, args.user)
                .await
                .context("failed to change purchase status")?;
            service.get(args.id).await?
        }
        PurchaseCommands::Cancel(args) => {
            service
                .cancel(args.id, args.reason, args.user)
                .await
                .context("failed to cancel purchase")?;
            service.get(args.id).await?
        }
        PurchaseCommands::Shipping(args) => service
            .update_shipping_cost(args.id, args.cost)
            .await
            .context("failed to update shipping cost")?,
    };

    if json {
        print_json(&detail)?;
    } else {
        let purchase = &detail.purchase;
        println!(
            "Purchase {} ({}) • store {} • {} • shipping {} • total {}",
            purchase.order_number,
            purchase.id,
            purchase.store_id,
            purchase.status,
            purchase.shipping_cost,
            purchase.total_amount
        );
        for item in &detail.items {
            println!(
                "  - variant {} x{} @ {} • shipping {}{}",
                item.product_variant_id,
                item.quantity,
                item.cost_price,
                item.allocated_shipping_cost,
                item.order_item_id
                    .map(|id| format!(" • order item {}", id))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn render_inventory(record: &inventory::Model) {
    println!(
        "- store {} • variant {} • qty {} • threshold {}{}",
        record.store_id,
        record.product_variant_id,
        record.quantity,
        record.low_stock_threshold,
        if record.is_low_stock() { " • LOW" } else { "" }
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
