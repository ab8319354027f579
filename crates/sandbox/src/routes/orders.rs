//! Order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{OrderId, UserId};
use remote::{CartBackend, OrderConfirmation, OrderSummary};

use super::AppState;
use crate::error::ApiError;

/// GET /pedidos/usuario/{userId}, newest first.
#[tracing::instrument(skip(state))]
pub async fn history<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    Ok(Json(state.backend.order_history(user_id).await?))
}

/// GET /pedidos/{id}
#[tracing::instrument(skip(state))]
pub async fn detail<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderConfirmation>, ApiError> {
    Ok(Json(state.backend.order_detail(order_id).await?))
}
