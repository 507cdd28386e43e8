use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use farm_sync::config::FarmConfig;
use farm_sync::farm::dispatcher::TaskDispatcher;
use farm_sync::farm::emitter::TaskEmitter;
use farm_sync::farm::gate::{CreationGate, TaskSwitches};
use farm_sync::farm::handlers::{
    handle_emit_task, handle_enqueue_task, handle_execute_task, handle_process_log,
    handle_session_stats, handle_task_types,
};
use farm_sync::farm::log::{MemoryTaskLog, TaskLog};
use farm_sync::farm::processor::TaskProcessor;
use farm_sync::farm::protocol::*;
use farm_sync::farm::registry::TaskRegistry;
use farm_sync::farm::types::NodeId;
use farm_sync::node::caches::LocalCaches;
use farm_sync::node::context::NodeContext;
use farm_sync::sessions::cache::SessionCache;
use farm_sync::worker::hub::WorkerHub;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help") {
        eprintln!(
            "Usage: {} [--config <file.json>] [--bind <addr:port>] [--file-root <dir>] \
             [--shared-root <dir>]... [--max-binary-size <bytes>] [--tick-ms <ms>] \
             [--poll-ms <ms>] [--flush-ms <ms>] [--grace-ms <ms>] [--allow-anonymous] \
             [--disable-tasks] [--log-level <level>]",
            args[0]
        );
        std::process::exit(1);
    }

    let config = FarmConfig::from_args(&args)?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    let node_id = NodeId::new();
    tracing::info!("Starting web farm node {:?} on {}", node_id, config.bind_addr);

    // 1. Task types:
    let registry = TaskRegistry::new();
    farm_sync::tasks::register_all(&registry)?;

    // 2. Node-local state:
    let hub = WorkerHub::new(config.worker_tick());
    let sessions = SessionCache::start(&hub);
    let caches = Arc::new(LocalCaches::new());
    let context = NodeContext::new(
        node_id.clone(),
        caches,
        sessions.clone(),
        config.file_root.clone(),
    );

    // 3. Task pipeline:
    let switches = TaskSwitches::new(
        config.allow_tasks,
        config.allow_anonymous_tasks,
        config.shutdown_grace(),
    );
    let gate = CreationGate::new(
        registry.clone(),
        switches.clone(),
        config.max_binary_size,
        config.shared_storage_roots.clone(),
    );
    let log: Arc<dyn TaskLog> = Arc::new(MemoryTaskLog::new());
    let dispatcher = TaskDispatcher::new(registry.clone(), context);
    let emitter = TaskEmitter::new(node_id.clone(), registry.clone(), gate, log.clone());
    let processor = TaskProcessor::new(
        node_id,
        log,
        dispatcher.clone(),
        config.poll_batch_size,
        config.poll_interval(),
    );

    processor.purge_memory_tasks(&registry).await?;
    let processor_handle = processor.clone().start();
    let flusher_handle = emitter.clone().start(config.flush_interval());

    // 4. Stats reporter:
    let stats_processor = processor.clone();
    let stats_sessions = sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));

        loop {
            interval.tick().await;
            let stats = stats_processor.stats();
            tracing::info!(
                "Node stats: applied={} dropped={} failed={} skipped={} cursor={}",
                stats.applied.load(Ordering::Relaxed),
                stats.dropped.load(Ordering::Relaxed),
                stats.failed.load(Ordering::Relaxed),
                stats.skipped.load(Ordering::Relaxed),
                stats_processor.cursor()
            );
            for site in stats_sessions.site_names() {
                tracing::info!(
                    "  - site '{}': sessions={} authenticated={} hidden={}",
                    site,
                    stats_sessions.get_sessions_count(&site),
                    stats_sessions.get_authenticated_users_count(&site),
                    stats_sessions.get_hidden_users_count(&site)
                );
            }
        }
    });

    // 5. HTTP Router:
    let app = Router::new()
        .route(ENDPOINT_EMIT_TASK, post(handle_emit_task))
        .route(ENDPOINT_ENQUEUE_TASK, post(handle_enqueue_task))
        .route(ENDPOINT_EXECUTE_TASK, post(handle_execute_task))
        .route(ENDPOINT_TASK_TYPES, get(handle_task_types))
        .route(ENDPOINT_PROCESS_LOG, post(handle_process_log))
        .route(ENDPOINT_SESSION_STATS, get(handle_session_stats))
        .layer(Extension(emitter.clone()))
        .layer(Extension(dispatcher))
        .layer(Extension(registry))
        .layer(Extension(processor))
        .layer(Extension(sessions));

    // 6. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let shutdown_switches = switches.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            shutdown_switches.begin_shutdown();
        })
        .await?;

    // 7. Settle node-local state:
    tokio::time::sleep(config.shutdown_grace()).await;
    flusher_handle.abort();
    match emitter.flush().await {
        Ok(written) => tracing::info!("Flushed {} pending tasks before exit", written),
        Err(e) => tracing::error!("Failed to flush pending tasks: {}", e),
    }
    processor_handle.abort();
    hub.shutdown().await;
    tracing::info!("Node stopped");

    Ok(())
}
