use std::sync::Arc;

use clap::Parser;
use inventory_authz::{Authorizer, AuthorizerReplicator, ReferenceAuthorizer};
use inventory_core::schema::SchemaService;
use inventory_server::broadcast::ReplicationBroadcast;
use inventory_server::cli::{Cli, Command};
use inventory_server::config::{AppConfig, LogFormat};
use inventory_server::consumer::ReplicationConsumer;
use inventory_server::error::ConsumerError;
use inventory_server::metrics::Metrics;
use inventory_server::outbox::OutboxEventSource;
use inventory_server::service::RelationReplicationService;
use inventory_storage::InMemoryStore;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Some(Command::CheckConfig) => run_check_config(&config),
        Some(Command::Serve) | None => run_serve(config).await,
    }
}

fn run_check_config(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Configuration is valid");
    println!("  Lock ID:    {}", config.lock_id());
    println!(
        "  Read after write: {}",
        config.consistency.read_after_write_enabled
    );
    Ok(())
}

/// Runs the replicator against an in-process store and the Reference
/// Authorizer. There is no ingress in this binary, so the outbox stays empty
/// and the broadcast has no waiters; it is a smoke harness for config, lock
/// acquisition and shutdown wiring.
async fn run_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        lock_id = %config.lock_id(),
        broadcast_enabled = config.replication.broadcast_enabled,
        "starting inventory replicator"
    );

    let store = InMemoryStore::new();
    let authorizer = ReferenceAuthorizer::new();
    authorizer.health().await?;
    let metrics = Arc::new(Metrics::new());

    let source = OutboxEventSource::new(
        store.clone(),
        authorizer.clone(),
        config.lock_id(),
        config.poll_interval(),
    );
    let service = RelationReplicationService::new(
        AuthorizerReplicator::new(authorizer),
        SchemaService::default(),
    );
    let mut consumer = ReplicationConsumer::new(store, service, source, Arc::clone(&metrics))
        .with_max_tx_retries(config.consumer.max_tx_retries);
    if config.replication.broadcast_enabled {
        consumer = consumer.with_broadcast(ReplicationBroadcast::new(
            config.consumer.channel_capacity,
        ));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(shutdown_signal(shutdown_tx));

    match consumer.run(shutdown_rx).await {
        Ok(()) | Err(ConsumerError::Cancelled) => {
            tracing::info!("replicator shut down gracefully");
        }
        Err(e) => {
            tracing::error!(error = %e, "replicator stopped");
            print!("{}", metrics.render_prometheus());
            return Err(e.into());
        }
    }

    print!("{}", metrics.render_prometheus());
    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => { tracing::info!("received SIGINT"); }
                _ = sigterm.recv() => { tracing::info!("received SIGTERM"); }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler, using SIGINT only");
            let _ = ctrl_c.await;
            tracing::info!("received SIGINT");
        }
    }

    let _ = shutdown_tx.send(true);
}
