//! Coupon endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use remote::wire::{ApplyCouponRequest, ApplyCouponResponse, CouponDto};
use remote::{CartBackend, RemoteError};

use super::AppState;
use crate::error::ApiError;

/// GET /cupones/validos
#[tracing::instrument(skip(state))]
pub async fn valid<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<Vec<CouponDto>>, ApiError> {
    let coupons = state.backend.valid_coupons().await?;
    Ok(Json(coupons.iter().map(CouponDto::from).collect()))
}

/// POST /cupones/aplicar
///
/// A refused coupon answers 400 with `{ success: false, error }` in the
/// same body shape as an accepted one.
#[tracing::instrument(skip(state))]
pub async fn apply<B: CartBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Json(req): Json<ApplyCouponRequest>,
) -> Result<(StatusCode, Json<ApplyCouponResponse>), ApiError> {
    match state.backend.apply_coupon(&req.code, req.subtotal).await {
        Ok(application) => {
            let discount = application.coupon.discount_for(req.subtotal);
            Ok((
                StatusCode::OK,
                Json(ApplyCouponResponse {
                    success: true,
                    coupon: Some(CouponDto::from(&application.coupon)),
                    message: application.message,
                    error: None,
                    discount: Some(discount),
                    final_amount: Some((req.subtotal - discount).non_negative()),
                }),
            ))
        }
        Err(RemoteError::Rejected(reason)) => {
            metrics::counter!("sandbox_coupon_rejections_total").increment(1);
            Ok((
                StatusCode::BAD_REQUEST,
                Json(ApplyCouponResponse {
                    error: Some(reason),
                    ..ApplyCouponResponse::default()
                }),
            ))
        }
        Err(e) => Err(e.into()),
    }
}
