#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use divergence::{
    CounterStore, DiskAssetStore, FfmpegEncoder, FlickerGenerator, JobScheduler,
    JsonCounterStore, MemoryCounterStore, RequestRouter, TubeRenderer, TubeScene, TubeTheme,
};
use server::config::{CliArgs, ServerConfig};
use server::service::handler::{AppState, HealthReporter, routes};
use server::telemetry::{TelemetryProviders, init_telemetry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let theme = match &config.tube_theme {
        Some(path) => TubeTheme::load(path)?,
        None => TubeTheme::default(),
    };

    let encoder = FfmpegEncoder::new(&config.ffmpeg_bin, config.format)
        .with_export_width(config.export_width);
    if !encoder.is_available() {
        tracing::warn!(
            program = %config.ffmpeg_bin.display(),
            "Encoder not found; every render will fail until it is installed"
        );
    }

    // Fails fast when the tube materials cannot be drawn.
    let renderer = TubeRenderer::new(theme.clone(), config.digits, encoder)?;

    let store = Arc::new(DiskAssetStore::new(
        &config.output_dir,
        &config.cache_dir,
        config.format,
    )?);
    let generator = FlickerGenerator::new(config.digits, config.chances)?;
    let scheduler = JobScheduler::start(renderer, Arc::clone(&store), generator, config.job);

    let counter: Arc<dyn CounterStore> = match &config.counter_store {
        Some(path) => Arc::new(JsonCounterStore::open(path)?),
        None => Arc::new(MemoryCounterStore::new()),
    };

    let health = HealthReporter::new();
    let state = AppState {
        router: RequestRouter::new(
            store,
            Arc::clone(scheduler.queues()),
            config.lookahead,
            config.digits,
        ),
        counter,
        scene: Arc::new(TubeScene::new(theme)),
        counter_digits: config.counter_digits,
        health: health.clone(),
    };

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config.server_addr, &config);
    health.set_serving();

    axum::serve(listener, routes(state))
        .with_graceful_shutdown(shutdown_signal(scheduler, health, providers, config))
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting odometer on {} with full config: {:#?}", addr, config);
    } else {
        tracing::info!(
            "Starting odometer on {} with {} tubes, lookahead {} and {} output",
            addr,
            config.digits,
            config.lookahead,
            config.format
        );
    }
}

async fn shutdown_signal(
    scheduler: JobScheduler,
    health: HealthReporter,
    providers: TelemetryProviders,
    config: ServerConfig,
) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    health.set_not_serving();

    // 2. Stop the render worker; new requests now get 503
    if let Err(e) = scheduler.shutdown(config.shutdown_timeout).await {
        tracing::error!("Error during worker shutdown: {:?}", e);
    }

    providers.shutdown();
}
