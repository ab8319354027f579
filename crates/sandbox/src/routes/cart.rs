//! Cart endpoints, including order submission.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CartItemId, UserId};
use pricing::Money;
use remote::wire::{AddItemRequest, CartItemDto, UpdateQuantityRequest};
use remote::{CartBackend, OrderConfirmation, OrderItem, OrderRequest};
use serde::Serialize;

use super::AppState;
use crate::error::ApiError;

/// Acknowledgement for cart writes: `{ success, mensaje }`.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(rename = "mensaje")]
    pub message: String,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// Body returned after a successful order submission.
#[derive(Debug, Serialize)]
pub struct SubmitOrderResponse {
    pub success: bool,
    #[serde(flatten)]
    pub confirmation: OrderConfirmation,
    #[serde(rename = "cantidadItems")]
    pub item_count: usize,
    pub subtotal: Money,
    #[serde(rename = "mensaje")]
    pub message: String,
}

/// GET /carrito/usuario/{userId}
#[tracing::instrument(skip(state))]
pub async fn get<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<CartItemDto>>, ApiError> {
    let items = state.backend.fetch_cart(user_id).await?;
    Ok(Json(items.iter().map(CartItemDto::from).collect()))
}

/// POST /carrito/agregar
#[tracing::instrument(skip(state))]
pub async fn add<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    state
        .backend
        .add_item(req.user_id, req.product_id, req.quantity)
        .await?;
    Ok(ActionResponse::ok("Product added to cart"))
}

/// PUT /carrito/actualizar-cantidad
#[tracing::instrument(skip(state))]
pub async fn update_quantity<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    state
        .backend
        .update_quantity(req.item_id, req.quantity)
        .await?;
    Ok(ActionResponse::ok("Quantity updated"))
}

/// DELETE /carrito/eliminar/{itemId}
#[tracing::instrument(skip(state))]
pub async fn remove<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.backend.remove_item(item_id).await?;
    Ok(ActionResponse::ok("Product removed from cart"))
}

/// DELETE /carrito/limpiar/{userId}
#[tracing::instrument(skip(state))]
pub async fn clear<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.backend.clear_cart(user_id).await?;
    Ok(ActionResponse::ok("Cart cleared"))
}

/// POST /carrito/procesar-pedido
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn submit<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<SubmitOrderResponse>, ApiError> {
    let confirmation = match state.backend.submit_order(&req).await {
        Ok(confirmation) => confirmation,
        Err(e) => {
            metrics::counter!("sandbox_orders_rejected_total").increment(1);
            return Err(e.into());
        }
    };
    metrics::counter!("sandbox_orders_submitted_total").increment(1);

    let subtotal = confirmation.items.iter().map(OrderItem::line_total).sum();
    let order_id = confirmation.order.id;
    tracing::info!(%order_id, total = %confirmation.order.total, "order placed");

    Ok(Json(SubmitOrderResponse {
        success: true,
        item_count: confirmation.items.len(),
        confirmation,
        subtotal,
        message: format!("Order {order_id} placed"),
    }))
}
