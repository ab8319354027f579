//! Coupon definitions and their discount rule.

use common::CouponId;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::PricingError;
use crate::money::Money;

/// Longest coupon code the store accepts.
pub const MAX_COUPON_CODE_LEN: usize = 50;

/// How a coupon's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponKind {
    /// `value` percent of the subtotal.
    Percentage,

    /// A fixed amount, capped at the subtotal.
    Fixed,
}

impl CouponKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponKind::Percentage => "PERCENTAGE",
            CouponKind::Fixed => "FIXED",
        }
    }
}

impl std::fmt::Display for CouponKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named discount rule.
///
/// Immutable once materialized. The cart references at most one applied
/// coupon at a time; coupons never stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coupon {
    id: CouponId,
    code: String,
    kind: CouponKind,
    value: Decimal,
    description: Option<String>,
}

impl Coupon {
    /// Creates a coupon, normalizing the code to upper case.
    ///
    /// Rejects blank or over-long codes, non-positive values and percentages
    /// above 100.
    pub fn new(
        id: CouponId,
        code: &str,
        kind: CouponKind,
        value: Decimal,
        description: Option<String>,
    ) -> Result<Self, PricingError> {
        let code = normalize_code(code)?;

        if value <= Decimal::ZERO {
            return Err(PricingError::InvalidCouponValue { value });
        }
        if kind == CouponKind::Percentage && value > Decimal::ONE_HUNDRED {
            return Err(PricingError::PercentageOutOfRange { value });
        }

        Ok(Self {
            id,
            code,
            kind,
            value,
            description,
        })
    }

    pub fn id(&self) -> CouponId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> CouponKind {
        self.kind
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the discount this coupon grants on `subtotal`.
    ///
    /// Percentage: `subtotal * value / 100`. Fixed: `min(value, subtotal)`.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        match self.kind {
            CouponKind::Percentage => subtotal.percent(self.value),
            CouponKind::Fixed => Money::new(self.value).min(subtotal),
        }
    }
}

/// Trims and upper-cases a coupon code, rejecting blank or over-long input.
pub fn normalize_code(code: &str) -> Result<String, PricingError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(PricingError::EmptyCouponCode);
    }
    let len = trimmed.chars().count();
    if len > MAX_COUPON_CODE_LEN {
        return Err(PricingError::CouponCodeTooLong {
            len,
            max: MAX_COUPON_CODE_LEN,
        });
    }
    Ok(trimmed.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(kind: CouponKind, value: i64) -> Coupon {
        Coupon::new(CouponId::new(1), "save", kind, Decimal::from(value), None).unwrap()
    }

    #[test]
    fn test_code_is_normalized() {
        let c = Coupon::new(
            CouponId::new(3),
            "  welcome10 ",
            CouponKind::Percentage,
            Decimal::from(10),
            Some("Welcome discount".to_string()),
        )
        .unwrap();
        assert_eq!(c.code(), "WELCOME10");
        assert_eq!(c.description(), Some("Welcome discount"));
    }

    #[test]
    fn test_percentage_discount() {
        let c = coupon(CouponKind::Percentage, 10);
        assert_eq!(
            c.discount_for(Money::from_units(60_000)),
            Money::from_units(6_000)
        );
    }

    #[test]
    fn test_fixed_discount_is_capped_at_subtotal() {
        let c = coupon(CouponKind::Fixed, 5_000);
        assert_eq!(
            c.discount_for(Money::from_units(3_000)),
            Money::from_units(3_000)
        );
        assert_eq!(
            c.discount_for(Money::from_units(9_000)),
            Money::from_units(5_000)
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero = Coupon::new(
            CouponId::new(1),
            "X",
            CouponKind::Fixed,
            Decimal::ZERO,
            None,
        );
        assert!(matches!(zero, Err(PricingError::InvalidCouponValue { .. })));

        let too_much = Coupon::new(
            CouponId::new(1),
            "X",
            CouponKind::Percentage,
            Decimal::from(101),
            None,
        );
        assert!(matches!(
            too_much,
            Err(PricingError::PercentageOutOfRange { .. })
        ));
    }

    #[test]
    fn test_fixed_value_above_100_is_fine() {
        assert!(
            Coupon::new(
                CouponId::new(1),
                "BIG",
                CouponKind::Fixed,
                Decimal::from(250),
                None
            )
            .is_ok()
        );
    }

    #[test]
    fn test_code_rules() {
        assert_eq!(normalize_code("   "), Err(PricingError::EmptyCouponCode));
        let long = "A".repeat(MAX_COUPON_CODE_LEN + 1);
        assert!(matches!(
            normalize_code(&long),
            Err(PricingError::CouponCodeTooLong { len: 51, max: 50 })
        ));
        assert_eq!(normalize_code("abc").unwrap(), "ABC");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CouponKind::Percentage.to_string(), "PERCENTAGE");
        assert_eq!(CouponKind::Fixed.to_string(), "FIXED");
    }
}
