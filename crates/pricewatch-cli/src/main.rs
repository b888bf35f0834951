use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pricewatch_client::{HttpPageHost, ReqwestDelivery, ReqwestTargetSource};
use pricewatch_core::config::{CrawlConfigPatch, IntervalPatch, RetryPatch};
use pricewatch_core::events::{TracingEventSink, TracingNotifier};
use pricewatch_core::{
    Checkpoint, CheckpointStore, CrawlConfig, CrawlEvent, CrawlerDeps, EngineOptions, PageHost,
    ResultSet, Settings, UiCommand, launch,
};
use pricewatch_store::{FileCheckpointStore, StateDir, StoreConfig};

#[derive(Parser)]
#[command(name = "pricewatch", version, about = "Paced marketplace price crawler")]
struct Cli {
    /// Settings file (endpoints, default crawl tuning)
    #[arg(
        long,
        global = true,
        env = "PRICEWATCH_SETTINGS",
        default_value = "config/settings.json"
    )]
    settings: PathBuf,

    /// Directory holding the checkpoint and schedule files
    #[arg(
        long,
        global = true,
        env = "PRICEWATCH_STATE_DIR",
        default_value = pricewatch_store::config::DEFAULT_STATE_DIR
    )]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawler, reading commands from stdin and writing events to stdout
    Run {
        /// Render pages in headless Chromium instead of plain HTTP
        #[arg(long, default_value_t = false)]
        browser: bool,

        /// With --browser, show the browser window
        #[arg(long, default_value_t = false, requires = "browser")]
        headful: bool,

        /// Start crawling immediately instead of waiting for `start`
        #[arg(long, default_value_t = false)]
        autostart: bool,
    },

    /// Fetch a fresh task list from the collect endpoint and reset progress
    FetchTargets,

    /// Show the persisted crawl progress
    Status,

    /// Print the persisted result list
    Results {
        /// Output CSV instead of JSON
        #[arg(long, default_value_t = false)]
        csv: bool,
    },

    /// Show or change the crawl tuning
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective crawl config
    Show,
    /// Update the stored crawl config; omitted values are kept
    Set(ConfigSetArgs),
}

#[derive(Args)]
struct ConfigSetArgs {
    /// Items per delivery batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// Minimum pause between items, in milliseconds
    #[arg(long)]
    interval_min: Option<u64>,
    /// Maximum pause between items, in milliseconds
    #[arg(long)]
    interval_max: Option<u64>,
    /// Attempts per failing item
    #[arg(long)]
    retry_max: Option<u32>,
    /// Pause before a retry, in milliseconds
    #[arg(long)]
    retry_interval: Option<u64>,
}

impl From<ConfigSetArgs> for CrawlConfigPatch {
    fn from(args: ConfigSetArgs) -> Self {
        Self {
            batch_size: args.batch_size,
            interval: Some(IntervalPatch {
                min: args.interval_min,
                max: args.interval_max,
            }),
            retry: Some(RetryPatch {
                max: args.retry_max,
                interval: args.retry_interval,
            }),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pricewatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.settings)
        .with_context(|| format!("Failed to load settings from {}", cli.settings.display()))?;
    let state = StateDir::open(&StoreConfig::new(cli.state_dir.clone()))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Run {
            browser,
            headful,
            autostart,
        } => {
            if browser {
                run_with_browser(&settings, &state, !headful, autostart).await?;
            } else {
                let host = HttpPageHost::with_timeout(settings.extract_timeout())
                    .map_err(|e| anyhow::anyhow!(e))?;
                cmd_run(host, &settings, &state, autostart).await?;
            }
        }
        Commands::FetchTargets => cmd_fetch_targets(&settings, &state).await?,
        Commands::Status => cmd_status(&state).await?,
        Commands::Results { csv } => cmd_results(&state, csv).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&settings, &state).await?,
            ConfigAction::Set(args) => cmd_config_set(&settings, &state, args.into()).await?,
        },
    }

    Ok(())
}

#[cfg(feature = "browser")]
async fn run_with_browser(
    settings: &Settings,
    state: &StateDir,
    headless: bool,
    autostart: bool,
) -> Result<()> {
    let host = pricewatch_client::BrowserPageHost::launch(headless)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    cmd_run(host, settings, state, autostart).await
}

#[cfg(not(feature = "browser"))]
async fn run_with_browser(
    _settings: &Settings,
    _state: &StateDir,
    _headless: bool,
    _autostart: bool,
) -> Result<()> {
    anyhow::bail!("This binary was built without the `browser` feature")
}

async fn checkpoint_store(state: &StateDir) -> Result<FileCheckpointStore> {
    state
        .checkpoint_store()
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

fn effective_config(settings: &Settings, snapshot: &Checkpoint) -> CrawlConfig {
    snapshot
        .config
        .filter(|c| c.validate().is_ok())
        .unwrap_or(settings.crawling)
}

async fn cmd_run<H>(host: H, settings: &Settings, state: &StateDir, autostart: bool) -> Result<()>
where
    H: PageHost + 'static,
{
    let (events_tx, mut events_rx) = broadcast::channel::<CrawlEvent>(256);
    let deps = CrawlerDeps {
        host,
        store: checkpoint_store(state).await?,
        schedule_store: state.schedule_store().await.map_err(|e| anyhow::anyhow!(e))?,
        delivery: ReqwestDelivery::new(&settings.api.delivery_url)
            .map_err(|e| anyhow::anyhow!(e))?,
        targets: ReqwestTargetSource::new(settings.api.collect_url())
            .map_err(|e| anyhow::anyhow!(e))?,
        events: Arc::new((events_tx, TracingEventSink)),
        notifier: Arc::new(TracingNotifier),
    };

    let cancel = CancellationToken::new();
    let crawler = launch(
        deps,
        settings.crawling,
        EngineOptions::from(settings),
        cancel.clone(),
    )
    .await
    .map_err(|e| anyhow::anyhow!(e))?;
    let controller = crawler.controller.clone();
    tracing::info!(session = %crawler.session, "Ready; commands: start, stop, retry-stop, skip, refresh, status, quit");

    if autostart {
        controller
            .command(UiCommand::CrawlStart)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            event = events_rx.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event output fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if !handle_line(&controller, line.trim()).await? {
                        break;
                    }
                }
                None => stdin_open = false,
            },
        }
    }

    cancel.cancel();
    crawler.join().await;
    Ok(())
}

/// Returns `false` when the operator asked to quit.
async fn handle_line<T, S>(
    controller: &pricewatch_core::Controller<T, S>,
    line: &str,
) -> Result<bool>
where
    T: pricewatch_core::TargetSource,
    S: CheckpointStore,
{
    let outcome = match line {
        "" => return Ok(true),
        "quit" | "exit" => return Ok(false),
        "skip" => controller.skip().await,
        "status" => match controller.current_status().await {
            Ok(status) => {
                println!("{}", serde_json::to_string(&status.engine)?);
                Ok(())
            }
            Err(e) => Err(e),
        },
        "refresh" => match controller.fetch_target_list().await {
            Ok(refreshed) => {
                tracing::info!(count = refreshed.task_list.len(), "Target list replaced");
                Ok(())
            }
            Err(e) => Err(e),
        },
        other => match other.parse::<UiCommand>() {
            Ok(command) => controller.command(command).await,
            Err(msg) => {
                tracing::warn!("{msg}");
                Ok(())
            }
        },
    };
    if let Err(e) = outcome {
        tracing::error!(error = %e, command = line, "Command failed");
    }
    Ok(true)
}

async fn cmd_fetch_targets(settings: &Settings, state: &StateDir) -> Result<()> {
    let targets = ReqwestTargetSource::new(settings.api.collect_url())
        .map_err(|e| anyhow::anyhow!(e))?;
    let tasks = pricewatch_core::TargetSource::fetch_targets(&targets)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let store = checkpoint_store(state).await?;
    store
        .save(
            Checkpoint::new()
                .with_task_list(tasks.clone())
                .with_current_index(0)
                .with_result_list(ResultSet::new())
                .with_retry_count(0)
                .with_refetched_at(pricewatch_core::models::now_ms()),
        )
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("Fetched {} targets from {}", tasks.len(), settings.api.collect_url());
    Ok(())
}

async fn cmd_status(state: &StateDir) -> Result<()> {
    let snapshot = checkpoint_store(state)
        .await?
        .load()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let total = snapshot.task_list.as_ref().map_or(0, Vec::len);
    let results = snapshot.result_list.unwrap_or_default();

    if total == 0 {
        println!("No task list. Run `pricewatch fetch-targets` first.");
        return Ok(());
    }

    println!(
        "Progress: {}/{} ({} results, {} delivered)",
        snapshot.current_index.unwrap_or(0),
        total,
        results.len(),
        results.sent_count()
    );
    println!(
        "Running: {}  Retry count: {}",
        snapshot.is_running.unwrap_or(false),
        snapshot.retry_count.unwrap_or(0)
    );
    if let Some(at) = snapshot.refetched_at.and_then(chrono::DateTime::from_timestamp_millis) {
        println!("Task list fetched: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(session) = snapshot.session_id {
        println!("Last session: {session}");
    }
    Ok(())
}

async fn cmd_results(state: &StateDir, as_csv: bool) -> Result<()> {
    let snapshot = checkpoint_store(state)
        .await?
        .load()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let results = snapshot.result_list.unwrap_or_default();

    if !as_csv {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record([
        "sku_id",
        "status",
        "product_name",
        "original_price",
        "sales_price",
        "final_price",
        "error",
    ])?;
    for result in results.iter() {
        let price = result.price.unwrap_or_default();
        writer.write_record([
            result.sku_id.as_str(),
            result.status.as_str(),
            result.product_name.as_str(),
            &price.original.to_string(),
            &price.sales.to_string(),
            &price.final_price.to_string(),
            result.error.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

async fn cmd_config_show(settings: &Settings, state: &StateDir) -> Result<()> {
    let snapshot = checkpoint_store(state)
        .await?
        .load()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let config = effective_config(settings, &snapshot);
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn cmd_config_set(settings: &Settings, state: &StateDir, patch: CrawlConfigPatch) -> Result<()> {
    let store = checkpoint_store(state).await?;
    let snapshot = store.load().await.map_err(|e| anyhow::anyhow!(e))?;
    let updated = effective_config(settings, &snapshot)
        .apply(&patch)
        .map_err(|e| anyhow::anyhow!(e))?;
    store
        .save(Checkpoint::new().with_config(updated))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(path = %state.path().display(), "Crawl config saved");
    println!("{}", serde_json::to_string_pretty(&updated)?);
    Ok(())
}
