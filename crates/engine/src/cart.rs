//! The local view of one user's cart.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use common::{CartItemId, ProductId, UserId};
use pricing::{CartItem, Coupon, PricingConfig, Totals};
use remote::{CartBackend, RemoteError};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::cancel::CancellationToken;
use crate::error::{EngineError, Result, ValidationError};

/// An immutable copy of the cart at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub coupon: Option<Coupon>,
    pub totals: Totals,
    pub version: u64,
}

impl CartSnapshot {
    /// Returns true if the cart has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities across all lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity())).sum()
    }

    /// Returns the line for `item_id`, if present.
    pub fn item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id() == item_id)
    }
}

/// Exclusive hold on a cart's operation queue, taken for a checkout attempt.
pub struct CheckoutLock<'a> {
    _serial: MutexGuard<'a, ()>,
}

#[derive(Debug, Default)]
struct CartState {
    items: Vec<CartItem>,
    coupon: Option<Coupon>,
    version: u64,
}

/// Mirrors the remote cart and mediates every mutation through it.
///
/// Mutations are write-then-refetch: the write goes to the collaborator and
/// the local items are replaced by a fresh fetch. Loads and mutations are
/// serialized, so responses are applied in the order operations started.
/// A failed operation leaves the last applied snapshot untouched.
pub struct CartStore<B: CartBackend> {
    backend: Arc<B>,
    user_id: UserId,
    pricing: PricingConfig,
    ops: Mutex<()>,
    state: RwLock<CartState>,
    cancel: CancellationToken,
}

impl<B: CartBackend> CartStore<B> {
    /// Creates an empty store for `user_id`.
    pub fn new(
        backend: Arc<B>,
        user_id: UserId,
        pricing: PricingConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            user_id,
            pricing,
            ops: Mutex::new(()),
            state: RwLock::new(CartState::default()),
            cancel,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    fn read(&self) -> RwLockReadGuard<'_, CartState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CartState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current snapshot with freshly computed totals.
    pub fn snapshot(&self) -> CartSnapshot {
        let state = self.read();
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &CartState) -> CartSnapshot {
        CartSnapshot {
            user_id: self.user_id,
            items: state.items.clone(),
            coupon: state.coupon.clone(),
            totals: Totals::compute(&state.items, state.coupon.as_ref(), &self.pricing),
            version: state.version,
        }
    }

    /// Totals of the current snapshot.
    pub fn totals(&self) -> Totals {
        let state = self.read();
        Totals::compute(&state.items, state.coupon.as_ref(), &self.pricing)
    }

    /// The applied coupon, if any.
    pub fn coupon(&self) -> Option<Coupon> {
        self.read().coupon.clone()
    }

    /// Monotonic version of the applied snapshot.
    pub fn version(&self) -> u64 {
        self.read().version
    }

    /// Runs a collaborator call unless the session is cancelled first.
    async fn remote<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = remote::Result<T>>,
    {
        match self.cancel.run_until_cancelled(call).await {
            Some(result) => result.map_err(EngineError::from),
            None => Err(EngineError::Cancelled),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(EngineError::TornDown)
        } else {
            Ok(())
        }
    }

    fn apply_items(&self, items: Vec<CartItem>) -> Result<CartSnapshot> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let mut state = self.write();
        state.items = items;
        state.version += 1;
        Ok(self.snapshot_of(&state))
    }

    /// Fetches the current cart from the collaborator.
    ///
    /// Any non-OK response from the collaborator is an empty cart. A
    /// transport failure or an unreadable payload is returned and the last
    /// snapshot is kept.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn load(&self) -> Result<CartSnapshot> {
        let _serial = self.ops.lock().await;
        self.ensure_live()?;

        let items = match self
            .cancel
            .run_until_cancelled(self.backend.fetch_cart(self.user_id))
            .await
        {
            None => return Err(EngineError::Cancelled),
            Some(Ok(items)) => items,
            Some(Err(e @ (RemoteError::Rejected(_) | RemoteError::Status { .. } | RemoteError::NotFound))) => {
                tracing::debug!(error = %e, "cart fetch returned non-OK, treating as empty");
                Vec::new()
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "cart load failed");
                return Err(e.into());
            }
        };

        let snapshot = self.apply_items(items)?;
        tracing::debug!(version = snapshot.version, lines = snapshot.items.len(), "cart loaded");
        Ok(snapshot)
    }

    async fn mutate<W>(&self, operation: &'static str, write: W) -> Result<CartSnapshot>
    where
        W: Future<Output = remote::Result<()>>,
    {
        let _serial = self.ops.lock().await;
        self.ensure_live()?;
        metrics::counter!("cart_mutations_total", "operation" => operation).increment(1);

        let result = async {
            self.remote(write).await?;
            let items = self.remote(self.backend.fetch_cart(self.user_id)).await?;
            self.apply_items(items)
        }
        .await;

        match &result {
            Ok(snapshot) => {
                tracing::info!(operation, version = snapshot.version, "cart mutated");
            }
            Err(e) => {
                metrics::counter!(
                    "cart_mutation_failures_total",
                    "operation" => operation,
                    "kind" => e.kind()
                )
                .increment(1);
                tracing::warn!(operation, error = %e, "cart mutation failed");
            }
        }
        result
    }

    /// Adds `quantity` units of a product, then reloads.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn add_item(&self, product_id: ProductId, quantity: u32) -> Result<CartSnapshot> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity { quantity: 0 }.into());
        }
        self.mutate(
            "add_item",
            self.backend.add_item(self.user_id, product_id, quantity),
        )
        .await
    }

    /// Sets a line's quantity, then reloads. Zero or less removes the line.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn set_quantity(&self, item_id: CartItemId, quantity: i64) -> Result<CartSnapshot> {
        if quantity <= 0 {
            return self.remove_item(item_id).await;
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| ValidationError::InvalidQuantity { quantity })?;
        self.mutate(
            "set_quantity",
            self.backend.update_quantity(item_id, quantity),
        )
        .await
    }

    /// Removes a line, then reloads.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn remove_item(&self, item_id: CartItemId) -> Result<CartSnapshot> {
        self.mutate("remove_item", self.backend.remove_item(item_id))
            .await
    }

    /// Empties the remote cart, then resets local state and detaches the
    /// coupon without refetching.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn clear(&self) -> Result<CartSnapshot> {
        let _serial = self.ops.lock().await;
        self.ensure_live()?;
        metrics::counter!("cart_mutations_total", "operation" => "clear").increment(1);

        if let Err(e) = self.remote(self.backend.clear_cart(self.user_id)).await {
            metrics::counter!(
                "cart_mutation_failures_total",
                "operation" => "clear",
                "kind" => e.kind()
            )
            .increment(1);
            tracing::warn!(error = %e, "cart clear failed");
            return Err(e);
        }
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(self.reset_state())
    }

    /// Waits for in-flight operations, then holds off every later load and
    /// mutation until the returned lock is dropped.
    ///
    /// Checkout holds it from pricing through order submission, so the order
    /// the collaborator creates is the cart that was paid for.
    pub async fn lock_for_checkout(&self) -> CheckoutLock<'_> {
        CheckoutLock {
            _serial: self.ops.lock().await,
        }
    }

    /// Empties the local cart and detaches the coupon, without a network call.
    ///
    /// Used after a confirmed order, when the collaborator has already
    /// emptied its side.
    pub fn reset_local(&self, _lock: &CheckoutLock<'_>) -> CartSnapshot {
        self.reset_state()
    }

    fn reset_state(&self) -> CartSnapshot {
        let mut state = self.write();
        state.items.clear();
        state.coupon = None;
        state.version += 1;
        self.snapshot_of(&state)
    }

    /// Makes `coupon` the applied coupon, replacing any previous one.
    pub fn attach_coupon(&self, coupon: Coupon) -> CartSnapshot {
        let mut state = self.write();
        state.coupon = Some(coupon);
        state.version += 1;
        self.snapshot_of(&state)
    }

    /// Detaches the applied coupon. A no-op when none is applied.
    pub fn detach_coupon(&self) -> CartSnapshot {
        let mut state = self.write();
        if state.coupon.take().is_some() {
            state.version += 1;
        }
        self.snapshot_of(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CouponId;
    use pricing::{CouponKind, Decimal, Money};
    use remote::{InMemoryCartBackend, Operation};
    use std::time::Duration;

    const USER: UserId = UserId::new(1);
    const LAMP: ProductId = ProductId::new(10);
    const MUG: ProductId = ProductId::new(11);

    fn setup() -> (Arc<InMemoryCartBackend>, CartStore<InMemoryCartBackend>, CancellationToken) {
        let backend = Arc::new(InMemoryCartBackend::new());
        backend.add_product(LAMP, "Desk Lamp", Money::from_units(20_000), 10);
        backend.add_product(MUG, "Mug", Money::from_units(3_000), 10);
        let token = CancellationToken::new();
        let store = CartStore::new(
            Arc::clone(&backend),
            USER,
            PricingConfig::default(),
            token.clone(),
        );
        (backend, store, token)
    }

    fn coupon() -> Coupon {
        Coupon::new(
            CouponId::new(1),
            "TEN",
            CouponKind::Percentage,
            Decimal::from(10),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_then_refetch() {
        let (backend, store, _) = setup();
        let snapshot = store.add_item(LAMP, 2).await.unwrap();

        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.item_count(), 2);
        assert_eq!(snapshot.totals.subtotal, Money::from_units(40_000));
        assert_eq!(snapshot.totals.total, Money::from_units(45_000));
        assert_eq!(backend.call_count(Operation::FetchCart), 1);
    }

    #[tokio::test]
    async fn test_zero_quantity_add_is_local_validation() {
        let (backend, store, _) = setup();
        let err = store.add_item(LAMP, 0).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation(ValidationError::InvalidQuantity { quantity: 0 })
        );
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_set_quantity_non_positive_removes() {
        let (backend, store, _) = setup();
        let id = store.add_item(MUG, 1).await.unwrap().items[0].id();

        let snapshot = store.set_quantity(id, 4).await.unwrap();
        assert_eq!(snapshot.item(id).map(CartItem::quantity), Some(4));

        let snapshot = store.set_quantity(id, -1).await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(backend.call_count(Operation::RemoveItem), 1);
        assert_eq!(backend.call_count(Operation::UpdateQuantity), 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_last_snapshot() {
        let (backend, store, _) = setup();
        store.add_item(LAMP, 1).await.unwrap();
        let before = store.snapshot();

        backend.set_offline(true);
        let err = store.add_item(MUG, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
        assert_eq!(store.snapshot(), before);

        backend.set_offline(false);
        let err = store.add_item(MUG, 50).await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_snapshot_and_version() {
        let (backend, store, _) = setup();
        store.add_item(LAMP, 1).await.unwrap();
        let version = store.version();

        backend.set_offline(true);
        assert!(store.load().await.is_err());
        assert_eq!(store.version(), version);
        assert_eq!(store.snapshot().items.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_detaches_coupon() {
        let (backend, store, _) = setup();
        store.add_item(LAMP, 3).await.unwrap();
        store.attach_coupon(coupon());

        let snapshot = store.clear().await.unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.coupon.is_none());
        assert_eq!(backend.cart_len(USER), 0);
    }

    #[tokio::test]
    async fn test_coupon_attach_and_idempotent_detach() {
        let (_, store, _) = setup();
        store.add_item(LAMP, 3).await.unwrap();

        let with = store.attach_coupon(coupon());
        assert_eq!(with.totals.discount, Money::from_units(6_000));

        let once = store.detach_coupon();
        let twice = store.detach_coupon();
        assert_eq!(once.totals, twice.totals);
        assert_eq!(once.version, twice.version);
    }

    #[tokio::test]
    async fn test_versions_are_monotonic() {
        let (_, store, _) = setup();
        let v1 = store.add_item(LAMP, 1).await.unwrap().version;
        let v2 = store.add_item(MUG, 1).await.unwrap().version;
        let v3 = store.load().await.unwrap().version;
        assert!(v1 < v2 && v2 < v3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_mutations_apply_in_order() {
        let (backend, store, _) = setup();
        let store = Arc::new(store);
        let id = store.add_item(MUG, 1).await.unwrap().items[0].id();
        backend.set_latency(Duration::from_millis(50));

        let first = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.set_quantity(id, 2).await })
        };
        tokio::task::yield_now().await;
        let second = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.set_quantity(id, 5).await })
        };

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert!(a.version < b.version);
        assert_eq!(store.snapshot().item(id).map(CartItem::quantity), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_flight_applies_nothing() {
        let (backend, store, token) = setup();
        store.add_item(LAMP, 1).await.unwrap();
        let before = store.snapshot();
        backend.set_latency(Duration::from_secs(1));

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let err = store.add_item(MUG, 1).await.unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.load().await.unwrap_err(), EngineError::TornDown);
    }
}
