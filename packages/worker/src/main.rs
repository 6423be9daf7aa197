mod batch;
mod config;
mod context;
mod database;
mod embed;
mod entity;
mod error;
mod handlers;
mod pca;
mod poller;
mod repo;

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail, ensure};
use clap::{Parser, Subcommand};
use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use common::storage::s3::S3BlobStore;
use sea_orm::DatabaseConnection;
use tokio::sync::watch;
use tracing::{error, info};

use crate::batch::BatchRequest;
use crate::config::{StorageConfig, WorkerAppConfig};
use crate::context::AppContext;
use crate::embed::HttpEmbedder;
use crate::pca::PcaBasisService;

#[derive(Parser)]
#[command(name = "worker")]
#[command(about = "Photo embedding worker: embeds queued photos and maintains PCA projections")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the queue for embedding jobs until interrupted
    Poll,
    /// Process a batch-invocation file and print the failed record ids
    Batch {
        /// Path to a JSON file with {"records": [{"id": ..., "body": ...}]}
        #[arg(long)]
        file: PathBuf,
    },
    /// Process one job payload from a file, without touching the queue
    Once {
        /// Path to a JSON job payload
        #[arg(long)]
        job: PathBuf,
    },
    /// Recompute the projection basis for one contest
    Pca {
        #[arg(long)]
        contest_id: i64,
        /// Defaults to the configured embedder model version
        #[arg(long)]
        model_version: Option<String>,
        /// Defaults to pca.dim from config
        #[arg(long)]
        dim: Option<usize>,
        /// Defaults to pca.min_ready from config
        #[arg(long)]
        min_ready: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    let config = WorkerAppConfig::load().context("Failed to load config")?;

    let db = database::init_db(&config.db.url())
        .await
        .context("Failed to initialize database")?;
    info!("Database ready");

    match cli.command.unwrap_or(Commands::Poll) {
        Commands::Poll => run_poll(config, db).await,
        Commands::Batch { file } => run_batch_file(config, db, &file).await,
        Commands::Once { job } => run_single_job(config, db, &job).await,
        Commands::Pca {
            contest_id,
            model_version,
            dim,
            min_ready,
        } => {
            let model_version =
                model_version.unwrap_or_else(|| config.embedder.model_version.clone());
            let report = PcaBasisService::new(db)
                .run_once(
                    contest_id,
                    &model_version,
                    dim.unwrap_or(config.pca.dim),
                    min_ready.unwrap_or(config.pca.min_ready),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn run_poll(config: WorkerAppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let ctx = build_context(&config, db)?;
    let source = mq::RedisStreamSource::connect(
        &config.mq.url,
        &config.mq.stream,
        &config.mq.group,
        &config.mq.consumer,
    )
    .await
    .context("Failed to connect to the queue")?;
    info!(url = %config.mq.url, "Queue connected");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Without a signal handler the loop cannot stop cleanly; keep the
            // sender alive so it does not stop at all.
            error!(error = %e, "Cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    poller::run_poll_loop(&ctx, &source, &config.mq, shutdown_rx).await;
    info!("Poller stopped");
    Ok(())
}

async fn run_batch_file(
    config: WorkerAppConfig,
    db: DatabaseConnection,
    file: &Path,
) -> anyhow::Result<()> {
    let ctx = build_context(&config, db)?;
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read batch file {}", file.display()))?;
    let request: BatchRequest = serde_json::from_str(&raw).context("Invalid batch request")?;

    let result = batch::run_batch(&ctx, &request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_single_job(
    config: WorkerAppConfig,
    db: DatabaseConnection,
    job: &Path,
) -> anyhow::Result<()> {
    let ctx = build_context(&config, db)?;
    let raw = std::fs::read_to_string(job)
        .with_context(|| format!("Failed to read job file {}", job.display()))?;

    let outcome = handlers::embedding::process_body(&ctx, &raw).await?;
    println!("{outcome:?}");
    Ok(())
}

fn build_context(config: &WorkerAppConfig, db: DatabaseConnection) -> anyhow::Result<AppContext> {
    let store = build_store(&config.storage)?;
    let embedder = Arc::new(HttpEmbedder::new(
        config.embedder.endpoint.clone(),
        config.embedder.dim,
    ));
    Ok(AppContext {
        db,
        store,
        embedder,
    })
}

fn build_store(storage: &StorageConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    match storage.provider.as_str() {
        "local" => {
            let store = FilesystemBlobStore::new(storage.root_dir.clone())
                .with_context(|| format!("Failed to open local store at {}", storage.root_dir))?;
            Ok(Arc::new(store))
        }
        "s3" => {
            ensure!(
                !storage.bucket.is_empty(),
                "storage.bucket is required for the s3 provider"
            );
            let store =
                S3BlobStore::new(&storage.bucket, &storage.region, storage.endpoint.as_deref())
                    .context("Failed to configure S3 store")?;
            Ok(Arc::new(store))
        }
        other => bail!("Unknown storage provider: {other}"),
    }
}
