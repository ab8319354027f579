//! Checkout lifecycle states.

use serde::Serialize;

/// The state of the checkout state machine.
///
/// State transitions:
/// ```text
/// Idle ──► Validating ──► ProcessingPayment ──► SubmittingOrder ──┬──► Succeeded ──► Idle
///                                │                                └──► Failed ────► Idle
///                                └──────────────────────────────────► Failed ────► Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutState {
    /// Ready for a checkout intent.
    #[default]
    Idle,

    /// Checking the cart before any charge.
    Validating,

    /// Waiting on the payment gateway.
    ProcessingPayment,

    /// Waiting on order submission to the collaborator.
    SubmittingOrder,

    /// Order confirmed (terminal for the attempt).
    Succeeded,

    /// Attempt failed (terminal for the attempt).
    Failed,
}

impl CheckoutState {
    /// Returns true if a new attempt may start.
    pub fn can_start(&self) -> bool {
        matches!(self, CheckoutState::Idle)
    }

    /// Returns true while an attempt is running.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            CheckoutState::Validating
                | CheckoutState::ProcessingPayment
                | CheckoutState::SubmittingOrder
        )
    }

    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, ProcessingPayment)
                | (Validating, Failed)
                | (ProcessingPayment, SubmittingOrder)
                | (ProcessingPayment, Failed)
                | (SubmittingOrder, Succeeded)
                | (SubmittingOrder, Failed)
                | (Succeeded, Idle)
                | (Failed, Idle)
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Idle => "IDLE",
            CheckoutState::Validating => "VALIDATING",
            CheckoutState::ProcessingPayment => "PROCESSING_PAYMENT",
            CheckoutState::SubmittingOrder => "SUBMITTING_ORDER",
            CheckoutState::Succeeded => "SUCCEEDED",
            CheckoutState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
