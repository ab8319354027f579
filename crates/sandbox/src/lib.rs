//! Local stand-in for the cart collaborator.
//!
//! Serves the collaborator's REST contract under `/api` from an
//! `InMemoryCartBackend`, with structured logging (tracing) and Prometheus
//! metrics. Point the engine's `CART_API_BASE_URL` at it for local runs.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use pricing::{PricingConfig, PricingError};
use remote::{CartBackend, InMemoryCartBackend};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<B: CartBackend + 'static>(
    state: Arc<AppState<B>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        .route("/carrito/usuario/{user_id}", get(routes::cart::get::<B>))
        .route("/carrito/agregar", post(routes::cart::add::<B>))
        .route(
            "/carrito/actualizar-cantidad",
            put(routes::cart::update_quantity::<B>),
        )
        .route("/carrito/eliminar/{item_id}", delete(routes::cart::remove::<B>))
        .route("/carrito/limpiar/{user_id}", delete(routes::cart::clear::<B>))
        .route("/carrito/procesar-pedido", post(routes::cart::submit::<B>))
        .route("/cupones/validos", get(routes::coupons::valid::<B>))
        .route("/cupones/aplicar", post(routes::coupons::apply::<B>))
        .route("/pedidos/usuario/{user_id}", get(routes::orders::history::<B>))
        .route("/pedidos/{order_id}", get(routes::orders::detail::<B>))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api", api)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates state backed by a fresh in-memory collaborator.
///
/// # Errors
///
/// Returns error if the demo coupons fail validation.
pub fn create_default_state(
    pricing: PricingConfig,
    seed: bool,
) -> Result<Arc<AppState<InMemoryCartBackend>>, PricingError> {
    let backend = InMemoryCartBackend::with_pricing(pricing);
    if seed {
        seed::demo_catalog(&backend)?;
    }
    Ok(Arc::new(AppState { backend }))
}
