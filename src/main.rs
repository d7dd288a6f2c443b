use anyhow::Context as _;
use clap::{Parser, Subcommand};
use shop_backend::config::{Config, DatabaseConfig};
use shop_backend::observability::{self, metrics};
use shop_backend::seed::seed_demo_data;
use shop_backend::server::{build_app, start_server};
use shop_backend::storage::{InMemoryStorage, Storage};
use shop_backend::tasks::{Job, JobExecutor, JobRunner, QueueSettings, Scheduler, TaskQueue};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "shop_backend")]
#[command(about = "E-commerce backend: GraphQL catalog and orders with background notifications")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = shop_backend::config::DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server, the task worker and the scheduler
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
        /// Load demo data before serving
        #[arg(long)]
        seed: bool,
    },
    /// Send yesterday's order statistics now
    DailyStats,
    /// Write the products report now
    ProductsReport,
    /// Insert demo data into the configured storage
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = observability::init_logging("logs");

    let cli = Cli::parse();
    let mut config = Config::load_from(&cli.config).context("failed to load configuration")?;

    if let Some(addr) = config.server.metrics_addr.as_deref() {
        metrics::init(addr)?;
    }

    let storage = open_storage(&config.database).await?;

    match cli.command {
        Commands::Serve { port, seed } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if seed {
                seed_demo_data(storage.as_ref()).await?;
            }
            serve(config, storage).await?;
        }
        Commands::DailyStats => run_once(&config, storage, Job::DailyStatistics).await?,
        Commands::ProductsReport => run_once(&config, storage, Job::ProductsReport).await?,
        Commands::Seed => {
            let summary = seed_demo_data(storage.as_ref()).await?;
            println!(
                "Seeded {} categories, {} tags, {} products, {} users, {} stores",
                summary.categories, summary.tags, summary.products, summary.users, summary.stores
            );
        }
    }

    Ok(())
}

async fn open_storage(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn Storage>> {
    if config.url.trim().is_empty() {
        info!("Using in-memory storage");
        return Ok(Arc::new(InMemoryStorage::new()));
    }

    #[cfg(feature = "db")]
    {
        let manager = shop_backend::db::DatabaseManager::new(config).await?;
        manager.run_migrations().await?;
        Ok(Arc::new(shop_backend::storage::DatabaseStorage::new(manager).await?))
    }

    #[cfg(not(feature = "db"))]
    {
        tracing::warn!("DATABASE_URL is set but this build lacks the `db` feature; using in-memory storage");
        Ok(Arc::new(InMemoryStorage::new()))
    }
}

async fn serve(config: Config, storage: Arc<dyn Storage>) -> anyhow::Result<()> {
    let runner = JobRunner::from_config(&config, storage.clone())?;
    let (queue, worker) = TaskQueue::start(
        Arc::new(runner),
        storage.clone(),
        QueueSettings::from(&config.tasks),
    );
    let schedules = Scheduler::from_config(&config.schedule, queue.clone())?.spawn();

    let (_, router) = build_app(storage, queue, config.tasks.order_notification_delay());
    let result = start_server(router, config.server.port, shutdown_signal()).await;

    info!("Shutting down background tasks");
    for handle in schedules {
        handle.abort();
    }
    worker.shutdown().await;

    result
}

async fn run_once(config: &Config, storage: Arc<dyn Storage>, job: Job) -> anyhow::Result<()> {
    let runner = JobRunner::from_config(config, storage)?;
    match runner.execute(&job).await {
        Ok(summary) => {
            println!("{}: {}", job.name(), summary);
            Ok(())
        }
        Err(e) => {
            error!(task = job.name(), "Task failed: {}", e);
            Err(e.into())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
