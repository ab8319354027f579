//! Drives a checkout attempt from cart to confirmed order.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::AttemptId;
use pricing::Coupon;
use remote::{CartBackend, OrderConfirmation, OrderRequest};
use tokio::sync::watch;

use crate::cancel::CancellationToken;
use crate::cart::{CartSnapshot, CartStore, CheckoutLock};
use crate::error::{EngineError, Result, ValidationError};
use crate::payment::{PaymentGateway, PaymentReceipt, PaymentRequest};

use super::state::CheckoutState;

/// Entries kept in the transition log.
const TRANSITION_LOG_CAPACITY: usize = 256;

/// Checkout intent from the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Delivery address; blank or absent falls back to the configured default.
    pub shipping_address: Option<String>,
}

impl CheckoutRequest {
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            shipping_address: Some(address.into()),
        }
    }
}

/// Result of a successful checkout, for rendering a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub attempt: AttemptId,
    pub confirmation: OrderConfirmation,
    pub payment: PaymentReceipt,
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutTransition {
    pub attempt: AttemptId,
    pub from: CheckoutState,
    pub to: CheckoutState,
    pub at: DateTime<Utc>,
}

/// Runs the checkout state machine for one cart.
///
/// At most one attempt runs at a time; a second `checkout` while one is in
/// flight is rejected with `CheckoutInProgress`. The attempt holds the cart's
/// operation queue, so cart loads and mutations wait for it to settle and the
/// submitted order is the cart that was paid for. The cart is emptied only
/// after the collaborator confirms the order. Every failure path leaves the
/// cart exactly as it was and returns to `Idle`.
pub struct CheckoutOrchestrator<B: CartBackend, P: PaymentGateway> {
    backend: Arc<B>,
    cart: Arc<CartStore<B>>,
    payment: Arc<P>,
    default_address: String,
    state: watch::Sender<CheckoutState>,
    transitions: Mutex<VecDeque<CheckoutTransition>>,
    current: Mutex<Option<(AttemptId, CancellationToken)>>,
    session: CancellationToken,
}

impl<B: CartBackend, P: PaymentGateway> CheckoutOrchestrator<B, P> {
    pub fn new(
        backend: Arc<B>,
        cart: Arc<CartStore<B>>,
        payment: Arc<P>,
        default_address: impl Into<String>,
        session: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(CheckoutState::Idle);
        Self {
            backend,
            cart,
            payment,
            default_address: default_address.into(),
            state,
            transitions: Mutex::new(VecDeque::new()),
            current: Mutex::new(None),
            session,
        }
    }

    /// The current state.
    pub fn state(&self) -> CheckoutState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.state.subscribe()
    }

    /// Recorded transitions, oldest first.
    pub fn transitions(&self) -> Vec<CheckoutTransition> {
        lock(&self.transitions).iter().cloned().collect()
    }

    /// The attempt currently in flight, if any.
    pub fn current_attempt(&self) -> Option<AttemptId> {
        lock(&self.current).as_ref().map(|(attempt, _)| *attempt)
    }

    /// Cancels the in-flight attempt. Returns false when none is running.
    pub fn cancel_checkout(&self) -> bool {
        match lock(&self.current).as_ref() {
            Some((attempt, token)) => {
                tracing::info!(%attempt, "checkout cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Runs one checkout attempt.
    ///
    /// An empty cart is rejected without a network call and the state stays
    /// `Idle`.
    #[tracing::instrument(skip(self, request), fields(user_id = %self.cart.user_id()))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        if self.session.is_cancelled() {
            return Err(EngineError::TornDown);
        }

        if !self.state().can_start() {
            tracing::info!("checkout not started, another attempt is in flight");
            return Err(EngineError::CheckoutInProgress);
        }

        // Loads and mutations queue behind the attempt until it settles.
        let Some(cart_lock) = self
            .session
            .run_until_cancelled(self.cart.lock_for_checkout())
            .await
        else {
            return Err(EngineError::Cancelled);
        };
        let snapshot = self.cart.snapshot();
        let attempt = AttemptId::new();
        self.begin(attempt, &snapshot)?;

        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();
        let token = CancellationToken::new();
        *lock(&self.current) = Some((attempt, token.clone()));

        let outcome = self.run(attempt, &token, &cart_lock, snapshot, request).await;
        *lock(&self.current) = None;
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(receipt) => {
                self.transition(attempt, CheckoutState::Succeeded);
                self.transition(attempt, CheckoutState::Idle);
                metrics::counter!("checkout_succeeded_total").increment(1);
                tracing::info!(
                    %attempt,
                    order_id = %receipt.confirmation.order.id,
                    total = %receipt.confirmation.order.total,
                    "checkout succeeded"
                );
                Ok(receipt)
            }
            Err(e) => {
                self.transition(attempt, CheckoutState::Failed);
                self.transition(attempt, CheckoutState::Idle);
                metrics::counter!("checkout_failed_total", "kind" => e.kind()).increment(1);
                tracing::warn!(%attempt, error = %e, "checkout failed");
                Err(e)
            }
        }
    }

    /// Atomically moves `Idle → Validating` if the guard passes.
    fn begin(&self, attempt: AttemptId, snapshot: &CartSnapshot) -> Result<()> {
        let mut rejection = None;
        self.state.send_if_modified(|state| {
            if !state.can_start() {
                rejection = Some(EngineError::CheckoutInProgress);
                return false;
            }
            if snapshot.is_empty() {
                rejection = Some(ValidationError::EmptyCart.into());
                return false;
            }
            *state = CheckoutState::Validating;
            true
        });

        if let Some(e) = rejection {
            tracing::info!(error = %e, "checkout not started");
            return Err(e);
        }
        self.record(attempt, CheckoutState::Idle, CheckoutState::Validating);
        tracing::info!(%attempt, from = "IDLE", to = "VALIDATING", "checkout transition");
        Ok(())
    }

    async fn run(
        &self,
        attempt: AttemptId,
        token: &CancellationToken,
        cart_lock: &CheckoutLock<'_>,
        snapshot: CartSnapshot,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt> {
        let shipping_address = request
            .shipping_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| self.default_address.clone());

        self.transition(attempt, CheckoutState::ProcessingPayment);
        let payment_request = PaymentRequest {
            attempt,
            user_id: snapshot.user_id,
            amount: snapshot.totals.total,
        };
        let payment = self
            .guarded(token, self.payment.authorize(&payment_request))
            .await?;

        self.transition(attempt, CheckoutState::SubmittingOrder);
        let order_request = OrderRequest {
            user_id: snapshot.user_id,
            shipping_address,
            coupon_id: snapshot.coupon.as_ref().map(Coupon::id),
        };
        let confirmation = self
            .guarded(token, async {
                self.backend
                    .submit_order(&order_request)
                    .await
                    .map_err(EngineError::from)
            })
            .await?;

        self.cart.reset_local(cart_lock);
        Ok(CheckoutReceipt {
            attempt,
            confirmation,
            payment,
        })
    }

    /// Runs `fut` unless the attempt or the session is cancelled first.
    async fn guarded<T, F>(&self, token: &CancellationToken, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.session.cancelled() => Err(EngineError::Cancelled),
            _ = token.cancelled() => Err(EngineError::Cancelled),
            result = fut => result,
        }
    }

    fn transition(&self, attempt: AttemptId, to: CheckoutState) {
        let from = self.state.send_replace(to);
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
        self.record(attempt, from, to);
        tracing::info!(%attempt, %from, %to, "checkout transition");
    }

    fn record(&self, attempt: AttemptId, from: CheckoutState, to: CheckoutState) {
        let mut log = lock(&self.transitions);
        if log.len() == TRANSITION_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(CheckoutTransition {
            attempt,
            from,
            to,
            at: Utc::now(),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ProductId, UserId};
    use pricing::{Money, PricingConfig};
    use remote::{InMemoryCartBackend, Operation};
    use std::time::Duration;

    use crate::payment::SimulatedPaymentGateway;

    type Orchestrator = CheckoutOrchestrator<InMemoryCartBackend, SimulatedPaymentGateway>;

    struct Fixture {
        backend: Arc<InMemoryCartBackend>,
        cart: Arc<CartStore<InMemoryCartBackend>>,
        payment: Arc<SimulatedPaymentGateway>,
        orchestrator: Arc<Orchestrator>,
    }

    async fn fixture(with_items: bool) -> Fixture {
        let backend = Arc::new(InMemoryCartBackend::new());
        backend.add_product(ProductId::new(1), "Lamp", Money::from_units(20_000), 10);
        let session = CancellationToken::new();
        let cart = Arc::new(CartStore::new(
            Arc::clone(&backend),
            UserId::new(1),
            PricingConfig::default(),
            session.clone(),
        ));
        if with_items {
            cart.add_item(ProductId::new(1), 2).await.unwrap();
        }
        let payment = Arc::new(SimulatedPaymentGateway::new(Duration::from_millis(3000)));
        let orchestrator = Arc::new(CheckoutOrchestrator::new(
            Arc::clone(&backend),
            Arc::clone(&cart),
            Arc::clone(&payment),
            "Default address",
            session,
        ));
        Fixture {
            backend,
            cart,
            payment,
            orchestrator,
        }
    }

    fn path(orchestrator: &Orchestrator) -> Vec<CheckoutState> {
        let log = orchestrator.transitions();
        let mut states: Vec<_> = log.iter().take(1).map(|t| t.from).collect();
        states.extend(log.iter().map(|t| t.to));
        states
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_path() {
        let f = fixture(true).await;
        let receipt = f
            .orchestrator
            .checkout(CheckoutRequest::default())
            .await
            .unwrap();

        assert_eq!(receipt.confirmation.order.shipping_address, "Default address");
        assert_eq!(receipt.payment.amount, Money::from_units(45_000));
        assert!(f.cart.snapshot().is_empty());
        assert_eq!(f.orchestrator.state(), CheckoutState::Idle);
        assert_eq!(
            path(&f.orchestrator),
            vec![
                CheckoutState::Idle,
                CheckoutState::Validating,
                CheckoutState::ProcessingPayment,
                CheckoutState::SubmittingOrder,
                CheckoutState::Succeeded,
                CheckoutState::Idle,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_cart_stays_idle() {
        let f = fixture(false).await;
        let err = f
            .orchestrator
            .checkout(CheckoutRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Validation(ValidationError::EmptyCart));
        assert_eq!(f.orchestrator.state(), CheckoutState::Idle);
        assert!(f.orchestrator.transitions().is_empty());
        assert_eq!(f.backend.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decline_fails_without_submission() {
        let f = fixture(true).await;
        let before = f.cart.snapshot();
        f.payment.set_decline(Some("Insufficient funds".to_string()));

        let err = f
            .orchestrator
            .checkout(CheckoutRequest::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::PaymentDeclined("Insufficient funds".to_string())
        );
        assert_eq!(f.backend.call_count(Operation::SubmitOrder), 0);
        assert_eq!(f.cart.snapshot(), before);
        assert_eq!(
            path(&f.orchestrator),
            vec![
                CheckoutState::Idle,
                CheckoutState::Validating,
                CheckoutState::ProcessingPayment,
                CheckoutState::Failed,
                CheckoutState::Idle,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_checkout_is_rejected_while_in_flight() {
        let f = fixture(true).await;
        let first = {
            let orchestrator = Arc::clone(&f.orchestrator);
            tokio::spawn(async move { orchestrator.checkout(CheckoutRequest::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.orchestrator.state(), CheckoutState::ProcessingPayment);

        let err = f
            .orchestrator
            .checkout(CheckoutRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::CheckoutInProgress);

        first.await.unwrap().unwrap();
        assert_eq!(f.backend.call_count(Operation::SubmitOrder), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cart_mutation_waits_for_checkout_to_settle() {
        let f = fixture(true).await;
        let attempt = {
            let orchestrator = Arc::clone(&f.orchestrator);
            tokio::spawn(async move { orchestrator.checkout(CheckoutRequest::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(f.orchestrator.state(), CheckoutState::ProcessingPayment);

        let add = {
            let cart = Arc::clone(&f.cart);
            tokio::spawn(async move { cart.add_item(ProductId::new(1), 1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!add.is_finished());

        let receipt = attempt.await.unwrap().unwrap();
        assert_eq!(receipt.payment.amount, Money::from_units(45_000));
        assert_eq!(receipt.confirmation.order.total, receipt.payment.amount);
        assert_eq!(receipt.confirmation.items.len(), 1);
        assert_eq!(receipt.confirmation.items[0].quantity, 2);

        let after = add.await.unwrap().unwrap();
        assert_eq!(after.item_count(), 1);
        assert_eq!(f.backend.cart_len(UserId::new(1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_checkout_during_payment() {
        let f = fixture(true).await;
        let before = f.cart.snapshot();
        let attempt = {
            let orchestrator = Arc::clone(&f.orchestrator);
            tokio::spawn(async move { orchestrator.checkout(CheckoutRequest::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(f.orchestrator.current_attempt().is_some());
        assert!(f.orchestrator.cancel_checkout());

        let err = attempt.await.unwrap().unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
        assert_eq!(f.cart.snapshot(), before);
        assert_eq!(f.orchestrator.state(), CheckoutState::Idle);
        assert_eq!(f.backend.call_count(Operation::SubmitOrder), 0);
        assert!(!f.orchestrator.cancel_checkout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchers_observe_transitions() {
        let f = fixture(true).await;
        f.backend.set_latency(Duration::from_millis(100));
        let mut rx = f.orchestrator.subscribe();
        let watcher = tokio::spawn(async move {
            rx.wait_for(|s| *s == CheckoutState::SubmittingOrder)
                .await
                .map(|s| *s)
        });
        f.orchestrator
            .checkout(CheckoutRequest::with_address("Calle 9"))
            .await
            .unwrap();
        assert_eq!(watcher.await.unwrap().unwrap(), CheckoutState::SubmittingOrder);
    }
}
