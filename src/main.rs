//! semfold service entry point
//!
//! Wires the engine together: configuration, logging, store, watcher,
//! recluster scheduler, HTTP server and the initial scan.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use semfold::core::config::AppConfig;
use semfold::core::types::EventBus;
use semfold::db::{create_database_pool, DatabaseConfig};
use semfold::embed::{EmbeddingService, NamingService};
use semfold::pipeline::Pipeline;
use semfold::scheduler::{ReclusterScheduler, SchedulerConfig};
use semfold::store::MetadataStore;
use semfold::sync::OsSynchronizer;
use semfold::watcher::{AggregatorConfig, ChangeAggregator, FileWatcher, MoveSuppressionGuard};
use semfold::{logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = parse_config_arg();
    let config = AppConfig::load_from(config_path.as_deref()).context("loading configuration")?;

    let _log_guard = logging::init(config.log_directory.as_deref()).context("initializing logging")?;
    tracing::info!("semfold starting, root folder {:?}", config.root_folder);

    tokio::fs::create_dir_all(&config.root_folder)
        .await
        .context("creating root folder")?;

    // Durable store
    let pool = create_database_pool(&DatabaseConfig::with_path(config.database_path()))
        .await
        .context("opening database")?;
    let store = MetadataStore::open(pool).await.context("preparing schema")?;

    // Engine components
    let guard = Arc::new(MoveSuppressionGuard::new(config.engine.guard_ttl()));
    let synchronizer = OsSynchronizer::new(
        config.root_folder.clone(),
        Arc::clone(&guard),
        config.engine.settle(),
    );
    let scheduler = ReclusterScheduler::new(SchedulerConfig {
        debounce: config.engine.recluster_debounce(),
        cooldown: config.engine.cooldown(),
    });
    let embedder = Arc::new(EmbeddingService::from_config(&config.providers));
    let namer = Arc::new(NamingService::from_config(&config.providers));
    let events = EventBus::default();

    let pipeline = Arc::new(Pipeline::new(
        config.clone(),
        store,
        embedder,
        namer,
        synchronizer,
        Arc::clone(&scheduler),
        events,
    ));

    // Recluster run loop: the single place a full pass executes
    {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(Arc::clone(&scheduler).run(move || {
            let pipeline = Arc::clone(&pipeline);
            async move {
                if let Err(e) = pipeline.run_recluster().await {
                    tracing::error!("Recluster pass failed: {}", e);
                }
            }
        }));
    }

    // Watcher -> aggregator -> pipeline
    let (aggregator, mut batches) = ChangeAggregator::spawn(
        AggregatorConfig {
            debounce: config.engine.change_debounce(),
            ..Default::default()
        },
        Arc::clone(&guard),
    );
    let _watcher =
        FileWatcher::start(&config.root_folder, aggregator).context("starting file watcher")?;

    {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            while let Some(batch) = batches.recv().await {
                pipeline.handle_batch(batch).await;
            }
        });
    }

    // Initial scan in the background
    {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            if let Err(e) = pipeline.full_scan().await {
                tracing::error!("Initial scan failed: {}", e);
            }
        });
    }

    tracing::info!(
        attach_threshold = config.engine.attach_threshold,
        method_switch = config.engine.agglomerative_max_items,
        "Engine configured"
    );

    server::serve(pipeline, &config.server.host, config.server.port)
        .await
        .context("running API server")?;

    Ok(())
}

fn parse_config_arg() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
