//! Engine error types.

use pricing::PricingError;
use remote::RemoteError;
use thiserror::Error;

/// Local validation failures. Reported before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Coupon code is blank after trimming.
    #[error("Coupon code must not be empty")]
    EmptyCouponCode,

    /// Coupon code exceeds the store's limit.
    #[error("Coupon code has {len} characters, maximum is {max}")]
    CouponCodeTooLong { len: usize, max: usize },

    /// Checkout requested on an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Quantity cannot be sent to the collaborator.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },
}

/// Errors surfaced by engine operations.
///
/// Every operation converts failures into one of these at its boundary;
/// none of them leave the cart in a partially updated state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Local validation failed; nothing was sent.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The collaborator refused the request with a reason.
    #[error("{0}")]
    RemoteRejection(String),

    /// The requested record does not exist at the collaborator.
    #[error("Not found")]
    NotFound,

    /// Network failure, or a non-2xx response without a parseable reason.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The payment gateway declined the charge.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// Another checkout attempt is in flight for this cart.
    #[error("A checkout is already in progress")]
    CheckoutInProgress,

    /// The operation was cancelled before its result was applied.
    #[error("Operation cancelled")]
    Cancelled,

    /// The engine's session has been torn down.
    #[error("Engine has been torn down")]
    TornDown,
}

impl EngineError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::RemoteRejection(_) => "rejected",
            EngineError::NotFound => "not_found",
            EngineError::Transport(_) => "transport",
            EngineError::PaymentDeclined(_) => "payment_declined",
            EngineError::CheckoutInProgress => "in_progress",
            EngineError::Cancelled => "cancelled",
            EngineError::TornDown => "torn_down",
        }
    }

    /// Returns true for a well-formed refusal the user should see verbatim.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::RemoteRejection(_) | EngineError::PaymentDeclined(_)
        )
    }
}

impl From<RemoteError> for EngineError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected(reason) => EngineError::RemoteRejection(reason),
            RemoteError::NotFound => EngineError::NotFound,
            other => EngineError::Transport(other.to_string()),
        }
    }
}

impl From<PricingError> for EngineError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::EmptyCouponCode => ValidationError::EmptyCouponCode.into(),
            PricingError::CouponCodeTooLong { len, max } => {
                ValidationError::CouponCodeTooLong { len, max }.into()
            }
            PricingError::InvalidQuantity { quantity } => ValidationError::InvalidQuantity {
                quantity: i64::from(quantity),
            }
            .into(),
            other => EngineError::Transport(other.to_string()),
        }
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
