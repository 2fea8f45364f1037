//! Poly-Insider — collect and reconcile Polymarket trader data
//!
//! Usage:
//!   poly-insider collect 0xADDRESS --markets     — one trader
//!   poly-insider batch --addresses 0xA,0xB       — several traders
//!   poly-insider inspect 0xADDRESS               — diagnostics counts

use clap::{Parser, Subcommand};
use collector::{AddressLocks, Config, PolymarketGateway, TraderCollector};
use persistence::Database;
use tracing::info;

#[derive(Parser)]
#[command(name = "poly-insider")]
#[command(about = "Polymarket trader data collection and reconciliation", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// SQLite database path
    #[arg(long, global = true, default_value = "data/poly_insider.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect one trader by address
    Collect {
        /// Trader wallet address
        address: String,
        /// Also resolve and store referenced markets
        #[arg(long)]
        markets: bool,
    },
    /// Collect several traders sequentially
    Batch {
        /// Addresses to collect (comma-separated)
        #[arg(long, value_delimiter = ',')]
        addresses: Vec<String>,
        /// Also resolve and store referenced markets
        #[arg(long)]
        markets: bool,
    },
    /// Show diagnostic counts for a trader
    Inspect {
        /// Trader wallet address
        address: String,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,collector=debug,persistence=debug")
    } else {
        EnvFilter::new("info,collector=info,persistence=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let db = Database::new(&cli.db).await?;
    let gateway = PolymarketGateway::new(&config)?;
    let locks = AddressLocks::new();
    let collector = TraderCollector::new(&gateway, &db, &locks, &config);

    match cli.command {
        Commands::Collect { address, markets } => {
            let summary = collector.collect(&address, markets).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Batch { addresses, markets } => {
            if addresses.is_empty() {
                anyhow::bail!("no addresses given (use --addresses 0xA,0xB)");
            }
            let collected = collector.collect_batch(&addresses, markets).await;
            info!(collected, total = addresses.len(), "Batch done");
        }
        Commands::Inspect { address } => {
            let diagnostics = collector.diagnostics(&address).await?;
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        }
    }

    Ok(())
}
