//! The collaborator operations the engine depends on.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::{CartItemId, CouponId, OrderId, ProductId, UserId};
use pricing::{CartItem, Coupon, Money};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::wire::ProductDto;

/// A coupon accepted by the collaborator together with its confirmation text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponApplication {
    pub coupon: Coupon,
    pub message: Option<String>,
}

/// Order submission payload: `{ usuarioId, direccionEntrega, cuponId? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(rename = "usuarioId")]
    pub user_id: UserId,

    #[serde(rename = "direccionEntrega")]
    pub shipping_address: String,

    #[serde(rename = "cuponId")]
    pub coupon_id: Option<CouponId>,
}

/// Lifecycle status of an order, as recorded by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "PENDIENTE")]
    Pending,

    #[serde(rename = "CONFIRMADO")]
    Confirmed,

    #[serde(rename = "ENVIADO")]
    Shipped,

    #[serde(rename = "ENTREGADO")]
    Delivered,

    #[serde(rename = "CANCELADO")]
    Cancelled,
}

impl OrderStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An order summary owned by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,

    #[serde(rename = "fechapedido")]
    pub placed_at: NaiveDateTime,

    pub total: Money,

    #[serde(rename = "estado")]
    pub status: OrderStatus,

    #[serde(rename = "direccionentrega")]
    pub shipping_address: String,
}

/// A line of a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,

    #[serde(rename = "producto")]
    pub product: ProductDto,

    #[serde(rename = "cantidad")]
    pub quantity: u32,

    #[serde(rename = "preciounitario")]
    pub unit_price: Money,
}

impl OrderItem {
    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Confirmed order plus its lines: `{ pedido, items }`.
///
/// Returned after a successful submission and by the order detail lookup.
/// The engine only renders it; nothing is kept locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    #[serde(rename = "pedido")]
    pub order: Order,

    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// One entry of a user's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,

    #[serde(rename = "cantidadItems", default)]
    pub item_count: usize,

    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Operations offered by the remote cart collaborator.
///
/// Every cart mutation is a plain write; callers refetch the cart afterwards
/// rather than assuming what the collaborator did.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// `GET /carrito/usuario/{userId}`
    async fn fetch_cart(&self, user_id: UserId) -> Result<Vec<CartItem>>;

    /// `POST /carrito/agregar`
    async fn add_item(&self, user_id: UserId, product_id: ProductId, quantity: u32)
    -> Result<()>;

    /// `PUT /carrito/actualizar-cantidad`
    async fn update_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()>;

    /// `DELETE /carrito/eliminar/{itemId}`
    async fn remove_item(&self, item_id: CartItemId) -> Result<()>;

    /// `DELETE /carrito/limpiar/{userId}`
    async fn clear_cart(&self, user_id: UserId) -> Result<()>;

    /// `GET /cupones/validos`
    async fn valid_coupons(&self) -> Result<Vec<Coupon>>;

    /// `POST /cupones/aplicar`
    ///
    /// The subtotal is passed along for server-side eligibility checks such
    /// as minimum-purchase coupons.
    async fn apply_coupon(&self, code: &str, subtotal: Money) -> Result<CouponApplication>;

    /// `POST /carrito/procesar-pedido`
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderConfirmation>;

    /// `GET /pedidos/usuario/{userId}`
    async fn order_history(&self, user_id: UserId) -> Result<Vec<OrderSummary>>;

    /// `GET /pedidos/{orderId}`
    async fn order_detail(&self, order_id: OrderId) -> Result<OrderConfirmation>;
}
