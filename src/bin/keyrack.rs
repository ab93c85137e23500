//! Keyrack Server Binary
//!
//! Command-line interface for the key slot allocator:
//! - Serve the HTTP API with background inventory sync
//! - Run a one-shot sync and print the rack
//! - Show the effective configuration
//!
//! # Examples
//!
//! ```bash
//! # Start server
//! keyrack --config keyrack.toml serve --port 5050
//!
//! # Pull the inventory once and print the rack
//! KEYRACK_SOURCE__BASE_URL=https://dms.example/v2 keyrack sync
//! ```

use clap::{Args, Parser, Subcommand};
use keyrack::server::start_server;
use keyrack::service::RackOverview;
use keyrack::source::HttpVehicleSource;
use keyrack::{KeyService, Settings, SyncService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keyrack - vehicle key slot allocation
#[derive(Parser, Debug)]
#[command(name = "keyrack")]
#[command(version = keyrack::VERSION)]
#[command(about = "Keyrack - vehicle key slot allocation", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, short, global = true, env = "KEYRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "KEYRACK_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Sync the inventory once and print the rack
    Sync,

    /// Print the effective configuration
    Config,

    /// Show version
    Version,
}

/// Server arguments; override the configuration file
#[derive(Args, Debug)]
struct ServeArgs {
    /// HTTP bind address
    #[arg(short, long, env = "KEYRACK_BIND")]
    bind: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "KEYRACK_PORT")]
    port: Option<u16>,

    /// Do not run the background sync
    #[arg(long)]
    no_sync: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => serve_command(settings, args).await,
        Commands::Sync => sync_command(settings).await,
        Commands::Config => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
        Commands::Version => {
            println!("keyrack {}", keyrack::VERSION);
            Ok(())
        }
    }
}

fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "keyrack.log");

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(!cli.no_color)
                .pretty(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

/// Sync service for the configured source, if any
fn build_sync(settings: &Settings, keys: &Arc<KeyService>) -> anyhow::Result<Option<Arc<SyncService>>> {
    if settings.source.base_url.is_none() {
        return Ok(None);
    }
    let source = HttpVehicleSource::new(&settings.source)?;
    Ok(Some(Arc::new(SyncService::new(keys.clone(), Arc::new(source)))))
}

async fn serve_command(mut settings: Settings, args: ServeArgs) -> anyhow::Result<()> {
    info!(version = %keyrack::VERSION, "Keyrack starting");

    if let Some(bind) = args.bind {
        settings.server.http_addr = bind;
    }
    if let Some(port) = args.port {
        settings.server.http_port = port;
    }

    let keys = Arc::new(KeyService::new(settings.slots.build_allocator()));
    info!(
        total_slots = settings.slots.total_slots,
        tiered = settings.slots.tiered,
        "Key rack initialized"
    );

    let sync = build_sync(&settings, &keys)?;
    match &sync {
        Some(sync) if settings.sync.enabled && !args.no_sync => {
            sync.spawn_auto_sync(settings.sync.interval());
        }
        Some(_) => info!("Background sync disabled"),
        None => warn!("No vehicle source configured; sync unavailable"),
    }

    start_server(settings.server, keys, sync).await
}

async fn sync_command(settings: Settings) -> anyhow::Result<()> {
    let keys = Arc::new(KeyService::new(settings.slots.build_allocator()));
    let Some(sync) = build_sync(&settings, &keys)? else {
        anyhow::bail!("source.base_url is not set");
    };

    let report = sync.sync_once().await?;
    println!(
        "Synced {} vehicles: {} added, {} sold, {} skipped",
        report.total, report.added, report.sold_detected, report.skipped
    );
    for failure in report.results.iter().filter(|r| !r.success) {
        println!(
            "  {} ({}): {}",
            failure.license_plate,
            failure.vehicle_id,
            failure.error.as_deref().unwrap_or("failed")
        );
    }

    print_overview(&keys.overview());
    Ok(())
}

fn print_overview(overview: &RackOverview) {
    for band in &overview.bands {
        println!();
        println!("{}", band.label);
        for a in &band.assignments {
            println!(
                "  [{:>3}] {:<12} {:>10.2}  {} {} {}",
                a.slot_index,
                a.license_plate,
                a.purchase_price,
                a.metadata_str("brand"),
                a.metadata_str("model"),
                a.metadata_str("color"),
            );
        }
    }

    if !overview.pending.is_empty() {
        println!();
        println!("awaiting handover");
        for r in &overview.pending {
            println!(
                "  [{:>3}] {:<12} from slot {}",
                r.pool_label, r.license_plate, r.original_slot_index
            );
        }
    }

    let stats = &overview.stats;
    println!();
    println!(
        "{} of {} slots occupied, {} pending handover, {} pool slots free",
        stats.occupied_slots, stats.total_slots, stats.pending_handovers, stats.free_pool_slots
    );
}
