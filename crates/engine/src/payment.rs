//! Payment gateway seam and the simulated implementation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::{AttemptId, UserId};
use pricing::Money;

use crate::config::DEFAULT_PAYMENT_DELAY;
use crate::error::{EngineError, Result};

/// What the orchestrator asks the gateway to authorize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub attempt: AttemptId,
    pub user_id: UserId,
    pub amount: Money,
}

/// Proof of an authorized payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub reference: String,
    pub amount: Money,
}

/// Authorizes payment for a checkout attempt.
///
/// A decline is `EngineError::PaymentDeclined`. Implementations need not
/// handle cancellation; the orchestrator drops the future when the attempt
/// is cancelled.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(&self, request: &PaymentRequest) -> Result<PaymentReceipt>;
}

/// Stand-in gateway: waits a fixed delay, then approves.
#[derive(Debug)]
pub struct SimulatedPaymentGateway {
    delay: Duration,
    decline: Mutex<Option<String>>,
    authorized: AtomicU32,
}

impl SimulatedPaymentGateway {
    /// Creates a gateway that approves after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            decline: Mutex::new(None),
            authorized: AtomicU32::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Makes subsequent authorizations decline with `reason`.
    pub fn set_decline(&self, reason: Option<String>) {
        *self.decline.lock().unwrap_or_else(PoisonError::into_inner) = reason;
    }

    /// Number of approved authorizations.
    pub fn authorized_count(&self) -> u32 {
        self.authorized.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedPaymentGateway {
    fn default() -> Self {
        Self::new(DEFAULT_PAYMENT_DELAY)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(attempt = %request.attempt, amount = %request.amount))]
    async fn authorize(&self, request: &PaymentRequest) -> Result<PaymentReceipt> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let decline = self
            .decline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(reason) = decline {
            return Err(EngineError::PaymentDeclined(reason));
        }

        let n = self.authorized.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentReceipt {
            reference: format!("SIM-{n:06}"),
            amount: request.amount,
        })
    }
}
