//! Checkout state machine.

mod orchestrator;
mod state;

pub use orchestrator::{CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest, CheckoutTransition};
pub use state::CheckoutState;
