use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use qw_core::config::{
    DEFAULT_FEED_URL, DEFAULT_TABLE_NAME, FeedConfig, PollConfig, RetryConfig, StoreConfig,
    TableName,
};
use qw_core::{Poller, QuakewatchError};
use qw_db::SqliteEventStore;
use qw_feed::UsgsFeedClient;

const DEFAULT_DB_PATH: &str = ".quakewatch/events.db";

#[derive(Parser)]
#[command(name = "qw", version, about = "Seismic feed ingestion poller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the feed indefinitely
    Run {
        #[clap(flatten)]
        inner: IngestArgs,
    },
    /// Execute exactly one fetch+persist cycle and exit
    Once {
        #[clap(flatten)]
        inner: IngestArgs,
    },
}

#[derive(Args)]
struct IngestArgs {
    /// Feed endpoint URL (falls back to QUAKEWATCH_FEED_URL)
    #[arg(long)]
    feed_url: Option<String>,

    /// Drop events below this magnitude at the feed
    #[arg(long)]
    min_magnitude: Option<f64>,

    /// Window width in seconds, subtracted from now on every fetch
    #[arg(long, default_value_t = 300)]
    lookback_secs: u64,

    /// Seconds between poll cycles
    #[arg(long, default_value_t = 60)]
    interval_secs: u64,

    /// SQLite database path (falls back to QUAKEWATCH_DB_PATH)
    #[arg(long)]
    db_path: Option<String>,

    /// Destination table name
    #[arg(long, default_value = DEFAULT_TABLE_NAME)]
    table: String,

    /// Startup connectivity attempts before giving up
    #[arg(long, default_value_t = 10)]
    retry_attempts: u32,

    /// Seconds between startup connectivity attempts
    #[arg(long, default_value_t = 5)]
    retry_delay_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { inner } => run(inner).await,
        Command::Once { inner } => once(inner).await,
    }
}

async fn run(args: IngestArgs) -> ExitCode {
    let poller = match build_poller(&args).await {
        Ok(poller) => poller,
        Err(err) => {
            error!(error = %err, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let ct = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ct.cancel();
    });

    poller.run(shutdown).await;
    ExitCode::SUCCESS
}

async fn once(args: IngestArgs) -> ExitCode {
    let poller = match build_poller(&args).await {
        Ok(poller) => poller,
        Err(err) => {
            error!(error = %err, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    match poller.cycle().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "cycle failed");
            ExitCode::FAILURE
        }
    }
}

async fn build_poller(
    args: &IngestArgs,
) -> Result<Poller<UsgsFeedClient, SqliteEventStore>, QuakewatchError> {
    let table = TableName::new(&args.table)?;
    let poll = PollConfig::new(
        Duration::from_secs(args.interval_secs),
        Duration::from_secs(args.lookback_secs),
    )?;
    let feed_url = args
        .feed_url
        .clone()
        .or_else(|| std::env::var("QUAKEWATCH_FEED_URL").ok())
        .unwrap_or_else(|| DEFAULT_FEED_URL.to_string());
    let db_path = args
        .db_path
        .clone()
        .or_else(|| std::env::var("QUAKEWATCH_DB_PATH").ok())
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    if let Some(parent) = Path::new(&db_path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let store_config = StoreConfig { db_path, table };
    let retry = RetryConfig {
        max_attempts: args.retry_attempts,
        delay: Duration::from_secs(args.retry_delay_secs),
    };

    info!(
        db_path = %store_config.db_path,
        table = %store_config.table,
        "connecting to destination store"
    );
    let conn = qw_db::schema::wait_until_reachable(&store_config.db_path, &retry).await?;
    let store = SqliteEventStore::new(conn, store_config.table);
    store.ensure_schema()?;

    info!(feed_url = %feed_url, "poller ready");
    let client = UsgsFeedClient::new(FeedConfig {
        endpoint: feed_url,
        min_magnitude: args.min_magnitude,
    })?;
    Ok(Poller::new(client, store, poll))
}
