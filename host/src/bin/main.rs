use std::fs::create_dir_all;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use imagegen_blobstore::{BlobStore, LocalBlobStore, RemoteBlobStore};
use imagegen_broker::Broker;
use imagegen_host::auth::SharedSecretVerifier;
use imagegen_host::state::AppState;
use imagegen_host::Cli;
use imagegen_ledger::Ledger;
use imagegen_modelclient::{HttpModelClient, HttpModelClientConfig, MockModelClient, ModelClient};
use imagegen_orchestrator::{GenerationOrchestrator, GenerationStore, OperationCatalog, UploadStore};
use imagegen_pushhub::PushHub;
use imagegen_tempstore::TempFileStore;
use imagegen_worker::{spawn_generation_worker, GenerationWorker};
use tracing::{debug, info};
use tracing_appender::{non_blocking::WorkerGuard, rolling::Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .init();

    let mut cli = Cli::parse();
    cli.merge_from_file()?;

    let _guard = subscribe_log(&cli.log_path, &cli.log_level);
    debug!("Start config:\n{:#?}", cli);

    let ledger = Ledger::connect(&cli.database_url).await?;

    let pool = sqlx::PgPool::connect(&cli.database_url).await?;
    let operations = OperationCatalog::new(pool.clone());
    let orchestrator_generations = GenerationStore::new(pool.clone());
    let orchestrator_uploads = UploadStore::new(pool.clone());
    let worker_generations = GenerationStore::new(pool.clone());
    let worker_uploads = UploadStore::new(pool);

    let blobstore: Arc<dyn BlobStore> = if cli.has_remote_blobstore() {
        info!("using RemoteBlobStore");
        Arc::new(RemoteBlobStore::new(
            cli.r2_endpoint.clone().expect("checked by has_remote_blobstore"),
            cli.r2_bucket.clone().expect("checked by has_remote_blobstore"),
            cli.r2_access_key_id.clone().expect("checked by has_remote_blobstore"),
            cli.r2_secret_access_key.clone().unwrap_or_default(),
            cli.r2_public_base_url.clone().unwrap_or_default(),
        ))
    } else {
        info!("using LocalBlobStore at {:?}", cli.blob_root);
        Arc::new(LocalBlobStore::new(cli.blob_root.clone(), "/blobs"))
    };

    let tempstore = Arc::new(TempFileStore::new(cli.scratch_root.clone()));

    let broker = Broker::new();
    let _broker_tasks = broker.spawn_background_tasks();

    let orchestrator = Arc::new(GenerationOrchestrator::new(
        ledger.clone(),
        blobstore.clone(),
        tempstore.clone(),
        broker.clone(),
        operations,
        orchestrator_generations,
        orchestrator_uploads,
    ));
    orchestrator.init_schema().await.context("initializing orchestrator schema")?;

    let modelclient: Arc<dyn ModelClient> = match &cli.model_endpoint {
        Some(endpoint) => {
            info!("using HttpModelClient at {endpoint}");
            Arc::new(HttpModelClient::new(HttpModelClientConfig {
                base_url: endpoint.parse().context("parsing MODEL_ENDPOINT")?,
                api_key: cli.model_api_key.clone().unwrap_or_default(),
                ..HttpModelClientConfig::default()
            })?)
        }
        None => {
            info!("no MODEL_ENDPOINT set, using MockModelClient");
            Arc::new(MockModelClient::always_succeeds())
        }
    };

    let pushhub = PushHub::new();

    let worker = GenerationWorker::new(
        worker_generations,
        worker_uploads,
        blobstore,
        tempstore.clone(),
        modelclient,
        ledger.clone(),
        pushhub.clone(),
    );
    let _worker_task = spawn_generation_worker(&broker, worker, cli.worker_concurrency);

    let sweep_interval = cli
        .temp_file_cleanup_cron
        .as_deref()
        .and_then(parse_cron_minutes)
        .unwrap_or(imagegen_scheduler::DEFAULT_SWEEP_INTERVAL);
    let _sweeper_task = imagegen_scheduler::spawn_sweeper(tempstore.clone(), sweep_interval);

    let verifier = Arc::new(SharedSecretVerifier::new(cli.token_secret_key.clone()));

    let state = AppState {
        orchestrator,
        ledger,
        broker,
        pushhub,
        tempstore,
        verifier: verifier.clone(),
        socket_authenticator: verifier,
        max_upload_bytes: imagegen_host::multipart::MAX_IMAGE_BYTES,
        scratch_root: cli.scratch_root.clone(),
    };

    imagegen_host::server::serve(&cli.address, state).await?;
    Ok(())
}

/// `TEMP_FILE_CLEANUP_CRON` is read as `*/N * * * *` and turned into an
/// N-minute fixed interval (see `imagegen-scheduler`'s grounding note);
/// any other cron shape falls back to the default interval.
fn parse_cron_minutes(cron: &str) -> Option<std::time::Duration> {
    let step = cron.split_whitespace().next()?.strip_prefix("*/")?;
    let minutes: u64 = step.parse().ok()?;
    Some(std::time::Duration::from_secs(minutes * 60))
}

pub fn subscribe_log(log_path: &Option<PathBuf>, log_level: &str) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_filter(env_filter);

    let Some(dir) = log_path else {
        tracing_subscriber::registry().with(stdout_layer).init();
        return None;
    };

    if let Err(e) = create_dir_all(dir) {
        eprintln!("failed to create log dir: {e}");
        tracing_subscriber::registry().with(stdout_layer).init();
        return None;
    }

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix("imagegen-host")
        .filename_suffix("log")
        .build(dir)
        .unwrap_or_else(|e| panic!("failed to build rolling file appender: {e}"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Some(guard)
}
