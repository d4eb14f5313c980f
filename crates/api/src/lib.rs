//! HTTP API server with observability for the account event-sourcing system.
//!
//! Provides REST endpoints for account commands and read-model queries,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use confirmation::ConfirmationProcessManager;
use domain::{AccountService, Argon2PasswordHasher, PasswordHasher};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{AccountsView, Projection, ProjectionProcessor};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::accounts::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/accounts",
            post(routes::accounts::create::<S>).get(routes::accounts::list::<S>),
        )
        .route("/accounts/count", get(routes::accounts::count::<S>))
        .route(
            "/accounts/{id}",
            get(routes::accounts::get::<S>)
                .put(routes::accounts::update::<S>)
                .delete(routes::accounts::delete::<S>),
        )
        .route("/accounts/{id}/enable", post(routes::accounts::enable::<S>))
        .route("/accounts/{id}/disable", post(routes::accounts::disable::<S>))
        .route("/accounts/{id}/login", post(routes::accounts::login::<S>))
        .route("/accounts/{id}/events", get(routes::accounts::events::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: the account service, the accounts read
/// model and a processor driving it together with the confirmation manager.
pub fn create_state<S: EventStore + Clone + 'static>(
    event_store: S,
    hasher: Arc<dyn PasswordHasher>,
    store_timeout: Option<Duration>,
) -> (Arc<AppState<S>>, Arc<ProjectionProcessor<S>>) {
    let mut account_service = AccountService::new(event_store.clone(), hasher);
    if let Some(timeout) = store_timeout {
        account_service = account_service.with_timeout(timeout);
    }
    let account_service = Arc::new(account_service);

    let accounts = AccountsView::new();
    let confirmations = ConfirmationProcessManager::new(account_service.clone());

    let mut processor = ProjectionProcessor::new(event_store);
    processor.register(Box::new(accounts.clone()) as Box<dyn Projection>);
    processor.register(Box::new(confirmations) as Box<dyn Projection>);
    let processor = Arc::new(processor);

    let state = Arc::new(AppState {
        account_service,
        accounts,
        projection_processor: processor.clone(),
    });

    (state, processor)
}

/// Creates the application state with the default Argon2id hasher and the
/// configured store timeout.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: &Config,
) -> (Arc<AppState<S>>, Arc<ProjectionProcessor<S>>) {
    create_state(
        event_store,
        Arc::new(Argon2PasswordHasher::new()),
        Some(config.store_timeout),
    )
}
