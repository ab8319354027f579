//! In-process collaborator used by tests and the sandbox server.
//!
//! Enforces the collaborator's business rules (stock, coupon eligibility,
//! order creation) and records how often each operation was called so tests
//! can assert that no network call was issued.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use common::{CartItemId, CouponId, OrderId, ProductId, UserId};
use pricing::{CartItem, Coupon, Money, PricingConfig, ProductRef, Totals};

use crate::error::{RemoteError, Result};
use crate::store::{
    CartBackend, CouponApplication, Order, OrderConfirmation, OrderItem, OrderRequest,
    OrderStatus, OrderSummary,
};
use crate::wire::ProductDto;

/// Collaborator operations, for call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchCart,
    AddItem,
    UpdateQuantity,
    RemoveItem,
    ClearCart,
    ValidCoupons,
    ApplyCoupon,
    SubmitOrder,
    OrderHistory,
    OrderDetail,
}

/// A coupon plus the eligibility rules the collaborator checks on apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRule {
    pub coupon: Coupon,
    pub active: bool,
    pub starts_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
    pub max_uses: Option<u32>,
    pub uses: u32,
    pub minimum_purchase: Option<Money>,
}

impl CouponRule {
    /// An active coupon with no date window, usage cap or minimum.
    pub fn new(coupon: Coupon) -> Self {
        Self {
            coupon,
            active: true,
            starts_at: None,
            expires_at: None,
            max_uses: None,
            uses: 0,
            minimum_purchase: None,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn valid_between(mut self, starts_at: NaiveDateTime, expires_at: NaiveDateTime) -> Self {
        self.starts_at = Some(starts_at);
        self.expires_at = Some(expires_at);
        self
    }

    pub fn max_uses(mut self, max_uses: u32) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    pub fn used(mut self, uses: u32) -> Self {
        self.uses = uses;
        self
    }

    pub fn minimum_purchase(mut self, minimum: Money) -> Self {
        self.minimum_purchase = Some(minimum);
        self
    }

    /// Checks the time window, status and usage cap.
    pub fn check_valid(&self, now: NaiveDateTime) -> std::result::Result<(), String> {
        if !self.active {
            return Err("Coupon is inactive".to_string());
        }
        if self.starts_at.is_some_and(|start| now < start) {
            return Err("Coupon is not yet valid".to_string());
        }
        if self.expires_at.is_some_and(|end| now >= end) {
            return Err("Coupon has expired".to_string());
        }
        if self.max_uses.is_some_and(|max| self.uses >= max) {
            return Err("Coupon has reached its usage limit".to_string());
        }
        Ok(())
    }

    /// Checks validity plus the minimum purchase against `subtotal`.
    pub fn check_applicable(
        &self,
        now: NaiveDateTime,
        subtotal: Money,
    ) -> std::result::Result<(), String> {
        self.check_valid(now)?;
        match self.minimum_purchase {
            Some(minimum) if subtotal < minimum => {
                Err(format!("Minimum purchase of {minimum} not met"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
struct Product {
    name: String,
    price: Money,
    stock: u32,
}

#[derive(Debug, Clone)]
struct StoredItem {
    id: CartItemId,
    user_id: UserId,
    product_id: ProductId,
    unit_price: Money,
    quantity: u32,
}

#[derive(Debug, Clone)]
struct StoredOrder {
    user_id: UserId,
    confirmation: OrderConfirmation,
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    products: HashMap<ProductId, Product>,
    items: Vec<StoredItem>,
    coupons: Vec<CouponRule>,
    orders: Vec<StoredOrder>,
    next_item_id: i64,
    next_order_id: i64,
    next_order_item_id: i64,
    pricing: PricingConfig,
    calls: HashMap<Operation, usize>,
    offline: bool,
    reject_orders: Option<String>,
    latency: Duration,
}

impl InMemoryCartState {
    fn product(&self, id: ProductId) -> Result<&Product> {
        self.products
            .get(&id)
            .ok_or_else(|| RemoteError::Rejected(format!("Product {id} not found")))
    }

    fn user_items(&self, user_id: UserId) -> impl Iterator<Item = &StoredItem> {
        self.items.iter().filter(move |i| i.user_id == user_id)
    }

    fn to_cart_item(&self, stored: &StoredItem) -> Result<CartItem> {
        let name = self
            .products
            .get(&stored.product_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        CartItem::new(
            stored.id,
            ProductRef::new(stored.product_id, name),
            stored.unit_price,
            stored.quantity,
        )
        .map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    fn coupon_rule(&self, code: &str) -> Option<&CouponRule> {
        let code = code.trim().to_uppercase();
        self.coupons.iter().find(|r| r.coupon.code() == code)
    }
}

/// In-memory cart collaborator.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartBackend {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartBackend {
    /// Creates an empty backend with the default shipping rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend that prices orders with `pricing`.
    pub fn with_pricing(pricing: PricingConfig) -> Self {
        let backend = Self::default();
        backend.write().pricing = pricing;
        backend
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryCartState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryCartState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds (or replaces) a catalog product.
    pub fn add_product(&self, id: ProductId, name: impl Into<String>, price: Money, stock: u32) {
        self.write().products.insert(
            id,
            Product {
                name: name.into(),
                price,
                stock,
            },
        );
    }

    /// Registers a coupon with its eligibility rules.
    pub fn add_coupon(&self, rule: CouponRule) {
        let mut state = self.write();
        state.coupons.retain(|r| r.coupon.id() != rule.coupon.id());
        state.coupons.push(rule);
    }

    /// Makes every operation fail with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.write().offline = offline;
    }

    /// Makes order submission fail with a business rejection.
    pub fn set_reject_orders(&self, reason: Option<String>) {
        self.write().reject_orders = reason;
    }

    /// Delays every operation by `latency` before it touches state.
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = latency;
    }

    /// Remaining stock of a product.
    pub fn stock_of(&self, id: ProductId) -> Option<u32> {
        self.read().products.get(&id).map(|p| p.stock)
    }

    /// Times a coupon has been consumed by an order.
    pub fn coupon_uses(&self, id: CouponId) -> Option<u32> {
        self.read()
            .coupons
            .iter()
            .find(|r| r.coupon.id() == id)
            .map(|r| r.uses)
    }

    /// Number of lines in a user's remote cart.
    pub fn cart_len(&self, user_id: UserId) -> usize {
        self.read().user_items(user_id).count()
    }

    /// Number of calls made to one operation.
    pub fn call_count(&self, operation: Operation) -> usize {
        self.read().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Number of calls made to any operation.
    pub fn total_calls(&self) -> usize {
        self.read().calls.values().sum()
    }

    async fn begin(&self, operation: Operation) -> Result<()> {
        let latency = {
            let mut state = self.write();
            *state.calls.entry(operation).or_default() += 1;
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.read().offline {
            return Err(RemoteError::Unavailable("collaborator offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CartBackend for InMemoryCartBackend {
    async fn fetch_cart(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        self.begin(Operation::FetchCart).await?;
        let state = self.read();
        let mut items = state
            .user_items(user_id)
            .map(|stored| state.to_cart_item(stored))
            .collect::<Result<Vec<_>>>()?;
        items.sort_by_key(|item| std::cmp::Reverse(item.id()));
        Ok(items)
    }

    async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()> {
        self.begin(Operation::AddItem).await?;
        if quantity == 0 {
            return Err(RemoteError::Rejected(
                "Quantity must be greater than 0".to_string(),
            ));
        }

        let mut state = self.write();
        let product = state.product(product_id)?.clone();
        if product.stock < quantity {
            return Err(RemoteError::Rejected(format!(
                "Insufficient stock. Available: {}",
                product.stock
            )));
        }

        if let Some(existing) = state
            .items
            .iter_mut()
            .find(|i| i.user_id == user_id && i.product_id == product_id)
        {
            let merged = existing.quantity + quantity;
            if product.stock < merged {
                return Err(RemoteError::Rejected(format!(
                    "You already have {} unit(s) in the cart. Available stock: {}",
                    existing.quantity, product.stock
                )));
            }
            existing.quantity = merged;
            return Ok(());
        }

        state.next_item_id += 1;
        let id = CartItemId::new(state.next_item_id);
        state.items.push(StoredItem {
            id,
            user_id,
            product_id,
            unit_price: product.price,
            quantity,
        });
        Ok(())
    }

    async fn update_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()> {
        self.begin(Operation::UpdateQuantity).await?;
        if quantity == 0 {
            return Err(RemoteError::Rejected(
                "Quantity must be greater than 0".to_string(),
            ));
        }

        let mut state = self.write();
        let product_id = state
            .items
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| i.product_id)
            .ok_or_else(|| RemoteError::Rejected("Cart item not found".to_string()))?;
        let stock = state.product(product_id)?.stock;
        if stock < quantity {
            return Err(RemoteError::Rejected(format!(
                "Insufficient stock. Available: {stock}"
            )));
        }
        if let Some(item) = state.items.iter_mut().find(|i| i.id == item_id) {
            item.quantity = quantity;
        }
        Ok(())
    }

    async fn remove_item(&self, item_id: CartItemId) -> Result<()> {
        self.begin(Operation::RemoveItem).await?;
        self.write().items.retain(|i| i.id != item_id);
        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        self.begin(Operation::ClearCart).await?;
        self.write().items.retain(|i| i.user_id != user_id);
        Ok(())
    }

    async fn valid_coupons(&self) -> Result<Vec<Coupon>> {
        self.begin(Operation::ValidCoupons).await?;
        let now = Utc::now().naive_utc();
        Ok(self
            .read()
            .coupons
            .iter()
            .filter(|r| r.check_valid(now).is_ok())
            .map(|r| r.coupon.clone())
            .collect())
    }

    async fn apply_coupon(&self, code: &str, subtotal: Money) -> Result<CouponApplication> {
        self.begin(Operation::ApplyCoupon).await?;
        let now = Utc::now().naive_utc();
        let state = self.read();
        let rule = state
            .coupon_rule(code)
            .ok_or_else(|| RemoteError::Rejected("Coupon not found".to_string()))?;
        rule.check_applicable(now, subtotal)
            .map_err(RemoteError::Rejected)?;

        let discount = rule.coupon.discount_for(subtotal);
        Ok(CouponApplication {
            coupon: rule.coupon.clone(),
            message: Some(format!(
                "Coupon {} applied: {discount} off",
                rule.coupon.code()
            )),
        })
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderConfirmation> {
        self.begin(Operation::SubmitOrder).await?;
        let now = Utc::now().naive_utc();
        let mut state = self.write();

        if let Some(reason) = state.reject_orders.clone() {
            return Err(RemoteError::Rejected(reason));
        }

        let stored: Vec<StoredItem> = state.user_items(request.user_id).cloned().collect();
        if stored.is_empty() {
            return Err(RemoteError::Rejected("Cart is empty".to_string()));
        }
        for item in &stored {
            let product = state.product(item.product_id)?;
            if product.stock < item.quantity {
                return Err(RemoteError::Rejected(format!(
                    "Insufficient stock for product: {}",
                    product.name
                )));
            }
        }

        let cart_items = stored
            .iter()
            .map(|s| state.to_cart_item(s))
            .collect::<Result<Vec<_>>>()?;
        let subtotal = pricing::compute_subtotal(&cart_items);

        let coupon = match request.coupon_id {
            Some(coupon_id) => {
                let rule = state
                    .coupons
                    .iter()
                    .find(|r| r.coupon.id() == coupon_id)
                    .ok_or_else(|| RemoteError::Rejected("Coupon not found".to_string()))?;
                rule.check_applicable(now, subtotal)
                    .map_err(RemoteError::Rejected)?;
                Some(rule.coupon.clone())
            }
            None => None,
        };
        let totals = Totals::compute(&cart_items, coupon.as_ref(), &state.pricing);

        if let Some(coupon_id) = request.coupon_id {
            if let Some(rule) = state.coupons.iter_mut().find(|r| r.coupon.id() == coupon_id) {
                rule.uses += 1;
            }
        }

        state.next_order_id += 1;
        let order = Order {
            id: OrderId::new(state.next_order_id),
            placed_at: now,
            total: totals.total,
            status: OrderStatus::Pending,
            shipping_address: request.shipping_address.clone(),
        };

        let mut items = Vec::with_capacity(cart_items.len());
        for item in &cart_items {
            if let Some(product) = state.products.get_mut(&item.product().id) {
                product.stock -= item.quantity();
            }
            state.next_order_item_id += 1;
            items.push(OrderItem {
                id: state.next_order_item_id,
                product: ProductDto::from(item.product()),
                quantity: item.quantity(),
                unit_price: item.unit_price(),
            });
        }

        state.items.retain(|i| i.user_id != request.user_id);

        let confirmation = OrderConfirmation { order, items };
        state.orders.push(StoredOrder {
            user_id: request.user_id,
            confirmation: confirmation.clone(),
        });
        Ok(confirmation)
    }

    async fn order_history(&self, user_id: UserId) -> Result<Vec<OrderSummary>> {
        self.begin(Operation::OrderHistory).await?;
        Ok(self
            .read()
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .map(|o| OrderSummary {
                order: o.confirmation.order.clone(),
                item_count: o.confirmation.items.len(),
                items: o.confirmation.items.clone(),
            })
            .collect())
    }

    async fn order_detail(&self, order_id: OrderId) -> Result<OrderConfirmation> {
        self.begin(Operation::OrderDetail).await?;
        self.read()
            .orders
            .iter()
            .find(|o| o.confirmation.order.id == order_id)
            .map(|o| o.confirmation.clone())
            .ok_or(RemoteError::NotFound)
    }
}
