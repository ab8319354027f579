//! Cart pricing and checkout orchestration.
//!
//! The engine owns one user's cart view and drives checkout against a remote
//! collaborator (`remote::CartBackend`):
//!
//! - `CartStore` mirrors the remote cart; every mutation is write-then-refetch,
//!   serialized per cart and stamped with a monotonic version
//! - `CouponValidator` applies and detaches the single active coupon
//! - `CheckoutOrchestrator` runs the checkout state machine
//!   (Idle → Validating → ProcessingPayment → SubmittingOrder → Succeeded/Failed)
//! - `SessionGuard` keeps one live engine per process and owns its shutdown
//! - `CartEngine` ties them together behind one handle

pub mod cancel;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod coupon;
pub mod engine;
pub mod error;
pub mod payment;
pub mod session;

pub use cancel::CancellationToken;
pub use cart::{CartSnapshot, CartStore, CheckoutLock};
pub use checkout::{
    CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest, CheckoutState, CheckoutTransition,
};
pub use config::EngineConfig;
pub use coupon::{AppliedCoupon, CouponValidator};
pub use engine::CartEngine;
pub use error::{EngineError, Result, ValidationError};
pub use payment::{PaymentGateway, PaymentReceipt, PaymentRequest, SimulatedPaymentGateway};
pub use session::SessionGuard;
