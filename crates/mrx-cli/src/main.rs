use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mrx")]
#[command(about = "Merx inventory engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> deployment -> local overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Warehouse stock operations
    Stock {
        #[command(subcommand)]
        cmd: StockCmd,
    },

    /// Expiry reaper utilities
    Reaper {
        #[command(subcommand)]
        cmd: ReaperCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations. Guardrail: refuses while open reservations exist unless --yes is provided.
    Migrate {
        /// Acknowledge you are migrating a store that may have live checkout traffic.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum StockCmd {
    /// Warehouse intake: on-hand += qty
    Import {
        #[arg(long)]
        variant: String,
        #[arg(long)]
        qty: i64,
        #[arg(long, default_value = "warehouse import")]
        reason: String,
    },

    /// Warehouse outflow: on-hand -= qty
    Export {
        #[arg(long)]
        variant: String,
        #[arg(long)]
        qty: i64,
        #[arg(long, default_value = "warehouse export")]
        reason: String,
    },

    /// Administrative correction to an absolute count
    Correct {
        #[arg(long)]
        variant: String,
        #[arg(long)]
        count: i64,
        #[arg(long, default_value = "manual correction")]
        reason: String,
    },

    /// Availability (on-hand minus active claims) for one variant
    Available {
        #[arg(long)]
        variant: String,
    },

    /// Availability for every variant of a product
    AvailableBatch {
        #[arg(long)]
        product: String,
    },
}

#[derive(Subcommand)]
enum ReaperCmd {
    /// Run one sweep cycle and print the report
    SweepOnce,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => match cmd {
            DbCmd::Status => commands::db::status().await,
            DbCmd::Migrate { yes } => commands::db::migrate(yes).await,
        },

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = mrx_config::load_layered(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }

        Commands::Stock { cmd } => match cmd {
            StockCmd::Import {
                variant,
                qty,
                reason,
            } => commands::stock::import(&variant, qty, &reason).await,
            StockCmd::Export {
                variant,
                qty,
                reason,
            } => commands::stock::export(&variant, qty, &reason).await,
            StockCmd::Correct {
                variant,
                count,
                reason,
            } => commands::stock::correct(&variant, count, &reason).await,
            StockCmd::Available { variant } => commands::stock::available(&variant).await,
            StockCmd::AvailableBatch { product } => {
                commands::stock::available_batch(&product).await
            }
        },

        Commands::Reaper { cmd } => match cmd {
            ReaperCmd::SweepOnce => commands::sweep::sweep_once().await,
        },
    }
}
