//! Identifier types shared by every crate in the workspace.

mod types;

pub use types::{AttemptId, CartItemId, CouponId, OrderId, ProductId, UserId};
