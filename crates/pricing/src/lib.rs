//! Pricing layer for the cart engine.
//!
//! This crate provides the value types the rest of the workspace prices with:
//! - `Money` backed by a decimal, so percentage discounts stay exact
//! - `CartItem` and `Coupon` with their construction invariants
//! - the pure pricing primitives (subtotal, shipping, discount, total)
//!
//! Nothing here performs I/O.

pub mod coupon;
pub mod error;
pub mod item;
pub mod money;
pub mod totals;

pub use coupon::{Coupon, CouponKind, MAX_COUPON_CODE_LEN, normalize_code};
pub use error::PricingError;
pub use item::{CartItem, ProductRef};
pub use money::Money;
pub use rust_decimal::Decimal;
pub use totals::{
    DEFAULT_FLAT_SHIPPING_COST, DEFAULT_FREE_SHIPPING_THRESHOLD, PricingConfig, Totals,
    compute_discount, compute_shipping, compute_subtotal, compute_total,
};
