//! `CartBackend` over the collaborator's REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{CartItemId, OrderId, ProductId, UserId};
use pricing::{CartItem, Coupon, Money};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{RemoteError, Result};
use crate::store::{CartBackend, CouponApplication, OrderConfirmation, OrderRequest, OrderSummary};
use crate::wire::{
    AddItemRequest, ApplyCouponRequest, ApplyCouponResponse, CartItemDto, CouponDto, ErrorBody,
    UpdateQuantityRequest,
};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the cart collaborator.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpCartBackend {
    inner: Arc<HttpCartBackendInner>,
}

#[derive(Debug)]
struct HttpCartBackendInner {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCartBackend {
    /// Creates a client for `base_url` (e.g. `http://localhost:8080/api`).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            inner: Arc::new(HttpCartBackendInner { client, base_url }),
        })
    }

    /// The base URL requests are made against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.inner.client.get(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.inner.client.post(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    async fn put_empty<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        let response = self.inner.client.put(self.url(path)).json(body).send().await?;
        Self::expect_success(response).await
    }

    async fn post_empty<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        let response = self.inner.client.post(self.url(path)).json(body).send().await?;
        Self::expect_success(response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self.inner.client.delete(self.url(path)).send().await?;
        Self::expect_success(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn expect_success(response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(response).await)
        }
    }

    async fn parse_error(response: reqwest::Response) -> RemoteError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        classify(status, &body)
    }
}

/// Classifies a non-2xx response.
///
/// Only a 4xx carrying a reason is a business rejection. A 5xx is a bare
/// status even when its body names an error.
fn classify(status: u16, body: &str) -> RemoteError {
    let reason = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.reason().map(str::to_string));

    match reason {
        Some(reason) if (400..500).contains(&status) => RemoteError::Rejected(reason),
        _ if status == 404 => RemoteError::NotFound,
        _ => RemoteError::Status { status },
    }
}

#[async_trait]
impl CartBackend for HttpCartBackend {
    #[tracing::instrument(skip(self))]
    async fn fetch_cart(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let items: Vec<CartItemDto> = self.get(&format!("/carrito/usuario/{user_id}")).await?;
        items.into_iter().map(CartItem::try_from).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()> {
        let body = AddItemRequest {
            user_id,
            product_id,
            quantity,
        };
        self.post_empty("/carrito/agregar", &body).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()> {
        let body = UpdateQuantityRequest { item_id, quantity };
        self.put_empty("/carrito/actualizar-cantidad", &body).await
    }

    #[tracing::instrument(skip(self))]
    async fn remove_item(&self, item_id: CartItemId) -> Result<()> {
        self.delete(&format!("/carrito/eliminar/{item_id}")).await
    }

    #[tracing::instrument(skip(self))]
    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        self.delete(&format!("/carrito/limpiar/{user_id}")).await
    }

    #[tracing::instrument(skip(self))]
    async fn valid_coupons(&self) -> Result<Vec<Coupon>> {
        let coupons: Vec<CouponDto> = self.get("/cupones/validos").await?;
        coupons.into_iter().map(Coupon::try_from).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn apply_coupon(&self, code: &str, subtotal: Money) -> Result<CouponApplication> {
        let body = ApplyCouponRequest {
            code: code.to_string(),
            subtotal,
        };
        let response = self
            .inner
            .client
            .post(self.url("/cupones/aplicar"))
            .json(&body)
            .send()
            .await?;

        // The verdict lives in the body; rejections may arrive with 200 or 400.
        let status = response.status().as_u16();
        let text = response.text().await?;
        if status >= 500 {
            return Err(classify(status, &text));
        }
        let parsed = match serde_json::from_str::<ApplyCouponResponse>(&text) {
            Ok(parsed) => parsed,
            Err(_) if status >= 400 => return Err(RemoteError::Status { status }),
            Err(e) => return Err(e.into()),
        };

        match parsed {
            ApplyCouponResponse {
                success: true,
                coupon: Some(coupon),
                message,
                ..
            } => Ok(CouponApplication {
                coupon: Coupon::try_from(coupon)?,
                message,
            }),
            ApplyCouponResponse {
                error: Some(reason),
                ..
            } => Err(RemoteError::Rejected(reason)),
            ApplyCouponResponse {
                message: Some(reason),
                success: false,
                ..
            } => Err(RemoteError::Rejected(reason)),
            _ if status >= 400 => Err(RemoteError::Status { status }),
            _ => Err(RemoteError::Malformed(
                "coupon response carried neither a coupon nor a reason".to_string(),
            )),
        }
    }

    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderConfirmation> {
        self.post("/carrito/procesar-pedido", request).await
    }

    #[tracing::instrument(skip(self))]
    async fn order_history(&self, user_id: UserId) -> Result<Vec<OrderSummary>> {
        self.get(&format!("/pedidos/usuario/{user_id}")).await
    }

    #[tracing::instrument(skip(self))]
    async fn order_detail(&self, order_id: OrderId) -> Result<OrderConfirmation> {
        self.get(&format!("/pedidos/{order_id}")).await
    }
}
