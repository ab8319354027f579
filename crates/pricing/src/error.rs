//! Pricing error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::money::Money;

/// Errors raised when a value violates a pricing invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// A cart item must hold at least one unit.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// Unit prices are never negative.
    #[error("Invalid unit price: {price} (must not be negative)")]
    InvalidPrice { price: Money },

    /// `unit_price * quantity` does not fit in a money amount.
    #[error("Line total overflows: {price} x {quantity}")]
    AmountOverflow { price: Money, quantity: u32 },

    /// Coupon code is blank after trimming.
    #[error("Coupon code must not be empty")]
    EmptyCouponCode,

    /// Coupon code exceeds the maximum length.
    #[error("Coupon code is {len} characters long (maximum {max})")]
    CouponCodeTooLong { len: usize, max: usize },

    /// Coupon value must be strictly positive.
    #[error("Invalid coupon value: {value} (must be greater than 0)")]
    InvalidCouponValue { value: Decimal },

    /// Percentage coupons cannot discount more than the whole subtotal.
    #[error("Invalid percentage: {value} (must not exceed 100)")]
    PercentageOutOfRange { value: Decimal },
}
