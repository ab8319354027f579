//! The remote collaborator the cart engine depends on.
//!
//! The collaborator stores cart items, coupons and orders. This crate
//! defines the operations the engine needs from it (`CartBackend`), the JSON
//! contract spoken over HTTP (`wire`), and two implementations:
//! - `InMemoryCartBackend`, which enforces the collaborator's business rules
//!   in process and is used by tests and the sandbox server
//! - `HttpCartBackend`, which talks to a live collaborator with `reqwest`

pub mod error;
pub mod http;
pub mod memory;
pub mod store;
pub mod wire;

pub use error::{RemoteError, Result};
pub use http::HttpCartBackend;
pub use memory::{CouponRule, InMemoryCartBackend, Operation};
pub use store::{
    CartBackend, CouponApplication, Order, OrderConfirmation, OrderItem, OrderRequest,
    OrderStatus, OrderSummary,
};
