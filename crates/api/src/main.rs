//! API server entry point.

use api::config::{Config, LogFormat};
use event_store::{EventBus, InMemoryEventBus, InMemoryEventStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .init();
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Create the bus, event store and application state
    let bus = InMemoryEventBus::with_capacity(config.bus_capacity);
    let event_store = InMemoryEventStore::with_bus(bus.clone());
    let (state, processor) = api::create_default_state(event_store, &config);

    // 4. Subscribe first, then catch up, so nothing committed in between is lost
    let subscription = bus.subscribe();
    processor.run_catch_up().await.expect("catch-up failed");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let live = tokio::spawn({
        let processor = processor.clone();
        async move {
            if let Err(error) = processor.run(subscription, shutdown_rx).await {
                // Only unknown or corrupt events end the live loop.
                tracing::error!(%error, "projection processor stopped");
            }
        }
    });

    // 5. Build the application
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, app = %config.app_name, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Stop the projection processor
    let _ = shutdown_tx.send(true);
    if let Err(error) = live.await {
        tracing::error!(%error, "projection processor task panicked");
    }

    tracing::info!("server shut down gracefully");
}
