//! The engine facade handed to the presentation layer.

use std::sync::{Arc, Weak};

use common::{CartItemId, OrderId, ProductId, UserId};
use pricing::{Coupon, Totals};
use remote::{CartBackend, HttpCartBackend, OrderConfirmation, OrderSummary};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::cancel::CancellationToken;
use crate::cart::{CartSnapshot, CartStore};
use crate::checkout::{
    CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest, CheckoutState, CheckoutTransition,
};
use crate::config::EngineConfig;
use crate::coupon::{AppliedCoupon, CouponValidator};
use crate::error::{EngineError, Result};
use crate::payment::{PaymentGateway, SimulatedPaymentGateway};
use crate::session::SessionGuard;

/// One user's cart engine.
///
/// Create it through a `SessionGuard` so the process holds a single live
/// instance; the guard's shutdown token cancels everything in flight.
pub struct CartEngine<B: CartBackend, P: PaymentGateway = SimulatedPaymentGateway> {
    config: EngineConfig,
    backend: Arc<B>,
    payment: Arc<P>,
    cart: Arc<CartStore<B>>,
    coupons: CouponValidator<B>,
    checkout: CheckoutOrchestrator<B, P>,
    shutdown: CancellationToken,
}

impl<B: CartBackend> CartEngine<B, SimulatedPaymentGateway> {
    /// Builds an engine whose payment step is simulated with
    /// `config.payment_delay`.
    pub fn with_simulated_payment(
        backend: B,
        user_id: UserId,
        config: EngineConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let payment = SimulatedPaymentGateway::new(config.payment_delay);
        Self::new(backend, payment, user_id, config, shutdown)
    }
}

impl CartEngine<HttpCartBackend, SimulatedPaymentGateway> {
    /// Builds an engine talking to the collaborator at `config.api_base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the HTTP client fails to build.
    pub fn connect(
        user_id: UserId,
        config: EngineConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let backend = HttpCartBackend::with_timeout(&config.api_base_url, config.request_timeout)?;
        Ok(Self::with_simulated_payment(
            backend, user_id, config, shutdown,
        ))
    }
}

impl<B: CartBackend, P: PaymentGateway> CartEngine<B, P> {
    pub fn new(
        backend: B,
        payment: P,
        user_id: UserId,
        config: EngineConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let backend = Arc::new(backend);
        let payment = Arc::new(payment);
        let cart = Arc::new(CartStore::new(
            Arc::clone(&backend),
            user_id,
            config.pricing,
            shutdown.clone(),
        ));
        let coupons =
            CouponValidator::new(Arc::clone(&backend), Arc::clone(&cart), shutdown.clone());
        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&backend),
            Arc::clone(&cart),
            Arc::clone(&payment),
            config.default_shipping_address.clone(),
            shutdown.clone(),
        );

        Self {
            config,
            backend,
            payment,
            cart,
            coupons,
            checkout,
            shutdown,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn user_id(&self) -> UserId {
        self.cart.user_id()
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn payment(&self) -> &Arc<P> {
        &self.payment
    }

    pub fn cart(&self) -> &Arc<CartStore<B>> {
        &self.cart
    }

    /// Returns true once the owning session has been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // Cart

    pub async fn load(&self) -> Result<CartSnapshot> {
        self.cart.load().await
    }

    pub async fn add_item(&self, product_id: ProductId, quantity: u32) -> Result<CartSnapshot> {
        self.cart.add_item(product_id, quantity).await
    }

    pub async fn set_quantity(&self, item_id: CartItemId, quantity: i64) -> Result<CartSnapshot> {
        self.cart.set_quantity(item_id, quantity).await
    }

    pub async fn remove_item(&self, item_id: CartItemId) -> Result<CartSnapshot> {
        self.cart.remove_item(item_id).await
    }

    pub async fn clear(&self) -> Result<CartSnapshot> {
        self.cart.clear().await
    }

    pub fn snapshot(&self) -> CartSnapshot {
        self.cart.snapshot()
    }

    pub fn totals(&self) -> Totals {
        self.cart.totals()
    }

    // Coupons

    /// Applies a coupon code. Refused while a checkout is in flight, since
    /// the attempt has already priced the cart.
    pub async fn apply_coupon(&self, code: &str) -> Result<AppliedCoupon> {
        self.ensure_no_checkout()?;
        self.coupons.apply(code).await
    }

    /// Detaches the applied coupon. Refused while a checkout is in flight.
    pub fn remove_coupon(&self) -> Result<CartSnapshot> {
        self.ensure_no_checkout()?;
        Ok(self.coupons.remove())
    }

    pub async fn available_coupons(&self, limit: usize) -> Result<Vec<Coupon>> {
        self.coupons.available(limit).await
    }

    // Checkout

    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        self.checkout.checkout(request).await
    }

    pub fn cancel_checkout(&self) -> bool {
        self.checkout.cancel_checkout()
    }

    pub fn checkout_state(&self) -> CheckoutState {
        self.checkout.state()
    }

    pub fn subscribe_checkout(&self) -> watch::Receiver<CheckoutState> {
        self.checkout.subscribe()
    }

    pub fn checkout_transitions(&self) -> Vec<CheckoutTransition> {
        self.checkout.transitions()
    }

    fn ensure_no_checkout(&self) -> Result<()> {
        if self.checkout.state().is_in_flight() {
            return Err(EngineError::CheckoutInProgress);
        }
        Ok(())
    }

    // Orders

    #[tracing::instrument(skip(self), fields(user_id = %self.user_id()))]
    pub async fn order_history(&self) -> Result<Vec<OrderSummary>> {
        self.guarded(self.backend.order_history(self.user_id()))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn order_detail(&self, order_id: OrderId) -> Result<OrderConfirmation> {
        self.guarded(self.backend.order_detail(order_id)).await
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T>
    where
        F: std::future::Future<Output = remote::Result<T>>,
    {
        if self.shutdown.is_cancelled() {
            return Err(EngineError::TornDown);
        }
        match self.shutdown.run_until_cancelled(call).await {
            Some(result) => result.map_err(EngineError::from),
            None => Err(EngineError::Cancelled),
        }
    }
}

impl<B, P> CartEngine<B, P>
where
    B: CartBackend + 'static,
    P: PaymentGateway + 'static,
{
    /// Starts the periodic cart reload if `refresh_interval` is configured.
    ///
    /// The task is registered with `guard` and stops on teardown. It holds
    /// only a weak reference, so dropping the engine also ends it. Returns
    /// false when refresh is disabled.
    pub fn spawn_refresh(self: &Arc<Self>, guard: &SessionGuard<Self>) -> bool {
        let Some(interval) = self.config.refresh_interval else {
            return false;
        };
        let engine: Weak<Self> = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();

        guard.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(engine) = engine.upgrade() else { break };
                        match engine.load().await {
                            Ok(snapshot) => {
                                tracing::debug!(version = snapshot.version, "cart refreshed");
                            }
                            Err(EngineError::Cancelled | EngineError::TornDown) => break,
                            Err(e) => tracing::warn!(error = %e, "cart refresh failed"),
                        }
                    }
                }
            }
        });
        tracing::info!(interval_secs = interval.as_secs(), "cart refresh started");
        true
    }
}
