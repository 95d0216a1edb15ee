//! HTTP front door for order fulfillment.
//!
//! Starts and queries orders, relays customer decisions and carrier
//! updates, lists shipments and runs standalone charges. Requests and
//! processes are traced with `tracing`; counters and histograms are
//! exported for Prometheus at `/metrics`.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{OrderStatusView, ProjectionProcessor, ShipmentListView};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflows::{Engine, Services};

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore + Clone + 'static> {
    pub engine: Engine<S>,
    pub orders: OrderStatusView<S>,
    pub shipments: Arc<ShipmentListView>,
    pub projection_processor: ProjectionProcessor<S>,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    /// Creates the engine and read models over `event_store`.
    pub fn new(event_store: S, services: Services) -> Self {
        let engine = Engine::new(event_store.clone(), services);

        let shipments = Arc::new(ShipmentListView::new());
        let mut projection_processor = ProjectionProcessor::new(event_store);
        projection_processor.register(shipments.clone());

        Self {
            orders: OrderStatusView::new(engine.clone()),
            engine,
            shipments,
            projection_processor,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/action", post(routes::orders::action::<S>))
        .route("/shipments", get(routes::shipments::list::<S>))
        .route("/shipments/{id}", get(routes::shipments::get::<S>))
        .route("/shipments/{id}/status", post(routes::shipments::update_status::<S>))
        .route("/charge", post(routes::charge::charge::<S>))
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
