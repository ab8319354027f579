//! Pricing primitives and derived cart totals.
//!
//! Pure, synchronous functions. Inputs are expected to be pre-validated by
//! the types in this crate, so none of them can fail.

use serde::Serialize;

use crate::coupon::Coupon;
use crate::item::CartItem;
use crate::money::Money;

/// Subtotal at or above which shipping is free.
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: i64 = 50_000;

/// Shipping charged below the free-shipping threshold.
pub const DEFAULT_FLAT_SHIPPING_COST: i64 = 5_000;

/// Shipping parameters fed into the pricing primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    pub free_shipping_threshold: Money,
    pub flat_shipping_cost: Money,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::from_units(DEFAULT_FREE_SHIPPING_THRESHOLD),
            flat_shipping_cost: Money::from_units(DEFAULT_FLAT_SHIPPING_COST),
        }
    }
}

/// Sum of `unit_price * quantity` over all items. Empty cart is zero.
pub fn compute_subtotal(items: &[CartItem]) -> Money {
    items.iter().map(CartItem::line_total).sum()
}

/// Zero when `subtotal >= free_threshold`, otherwise `flat_cost`.
pub fn compute_shipping(subtotal: Money, free_threshold: Money, flat_cost: Money) -> Money {
    if subtotal >= free_threshold {
        Money::zero()
    } else {
        flat_cost
    }
}

/// Discount granted by the applied coupon, if any.
pub fn compute_discount(coupon: Option<&Coupon>, subtotal: Money) -> Money {
    coupon
        .map(|c| c.discount_for(subtotal))
        .unwrap_or_else(Money::zero)
}

/// `subtotal + shipping - discount`, never below zero.
pub fn compute_total(subtotal: Money, shipping: Money, discount: Money) -> Money {
    (subtotal + shipping - discount).non_negative()
}

/// Totals derived from the cart items and the applied coupon.
///
/// Never persisted; recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

impl Totals {
    /// Computes totals for the given items and coupon.
    pub fn compute(items: &[CartItem], coupon: Option<&Coupon>, config: &PricingConfig) -> Self {
        let subtotal = compute_subtotal(items);
        let shipping = compute_shipping(
            subtotal,
            config.free_shipping_threshold,
            config.flat_shipping_cost,
        );
        let discount = compute_discount(coupon, subtotal);
        let total = compute_total(subtotal, shipping, discount);

        Self {
            subtotal,
            shipping,
            discount,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupon::CouponKind;
    use crate::item::ProductRef;
    use common::{CartItemId, CouponId, ProductId};
    use rust_decimal::Decimal;

    fn item(id: i64, price: i64, quantity: u32) -> CartItem {
        CartItem::new(
            CartItemId::new(id),
            ProductRef::new(ProductId::new(id), format!("Product {id}")),
            Money::from_units(price),
            quantity,
        )
        .unwrap()
    }

    fn coupon(kind: CouponKind, value: i64) -> Coupon {
        Coupon::new(CouponId::new(1), "TEST", kind, Decimal::from(value), None).unwrap()
    }

    fn units(n: i64) -> Money {
        Money::from_units(n)
    }

    #[test]
    fn test_subtotal() {
        assert_eq!(compute_subtotal(&[]), Money::zero());
        let items = [item(1, 10_000, 2), item(2, 5_000, 3)];
        assert_eq!(compute_subtotal(&items), units(35_000));
    }

    #[test]
    fn test_shipping_threshold() {
        let config = PricingConfig::default();
        for subtotal in [0, 1, 40_000, 49_999] {
            assert_eq!(
                compute_shipping(
                    units(subtotal),
                    config.free_shipping_threshold,
                    config.flat_shipping_cost
                ),
                units(5_000),
                "subtotal {subtotal}"
            );
        }
        for subtotal in [50_000, 50_001, 60_000, 1_000_000] {
            assert_eq!(
                compute_shipping(
                    units(subtotal),
                    config.free_shipping_threshold,
                    config.flat_shipping_cost
                ),
                Money::zero(),
                "subtotal {subtotal}"
            );
        }
    }

    #[test]
    fn test_discount_rules() {
        assert_eq!(compute_discount(None, units(60_000)), Money::zero());

        let pct = coupon(CouponKind::Percentage, 15);
        for subtotal in [0, 100, 3_333, 60_000] {
            assert_eq!(
                compute_discount(Some(&pct), units(subtotal)),
                Money::new(Decimal::from(subtotal) * Decimal::from(15) / Decimal::from(100))
            );
        }

        let fixed = coupon(CouponKind::Fixed, 5_000);
        for subtotal in [0, 3_000, 5_000, 80_000] {
            let discount = compute_discount(Some(&fixed), units(subtotal));
            assert_eq!(discount, units(subtotal.min(5_000)));
            assert!(compute_total(units(subtotal), Money::zero(), discount) >= Money::zero());
        }
    }

    #[test]
    fn test_total_is_clamped() {
        assert_eq!(
            compute_total(units(100), Money::zero(), units(500)),
            Money::zero()
        );
        assert_eq!(compute_total(units(100), units(50), units(30)), units(120));
    }

    #[test]
    fn test_scenario_below_threshold_without_coupon() {
        let totals = Totals::compute(&[item(1, 20_000, 2)], None, &PricingConfig::default());
        assert_eq!(totals.subtotal, units(40_000));
        assert_eq!(totals.shipping, units(5_000));
        assert_eq!(totals.discount, Money::zero());
        assert_eq!(totals.total, units(45_000));
    }

    #[test]
    fn test_scenario_free_shipping() {
        let totals = Totals::compute(&[item(1, 60_000, 1)], None, &PricingConfig::default());
        assert_eq!(totals.shipping, Money::zero());
        assert_eq!(totals.total, units(60_000));
    }

    #[test]
    fn test_scenario_percentage_coupon() {
        let c = coupon(CouponKind::Percentage, 10);
        let totals = Totals::compute(&[item(1, 30_000, 2)], Some(&c), &PricingConfig::default());
        assert_eq!(totals.discount, units(6_000));
        assert_eq!(totals.total, units(54_000));
    }

    #[test]
    fn test_scenario_fixed_coupon_capped() {
        let c = coupon(CouponKind::Fixed, 5_000);
        let totals = Totals::compute(&[item(1, 3_000, 1)], Some(&c), &PricingConfig::default());
        assert_eq!(totals.discount, units(3_000));
        // Shipping still applies below the threshold; only the discount is capped.
        assert_eq!(totals.total, units(5_000));

        let no_shipping = PricingConfig {
            free_shipping_threshold: Money::zero(),
            flat_shipping_cost: units(5_000),
        };
        let totals = Totals::compute(&[item(1, 3_000, 1)], Some(&c), &no_shipping);
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_totals_identity_holds() {
        let config = PricingConfig::default();
        let c = coupon(CouponKind::Percentage, 25);
        for (price, qty) in [(100, 1), (12_500, 4), (49_999, 1), (70_000, 3)] {
            let totals = Totals::compute(&[item(1, price, qty)], Some(&c), &config);
            assert_eq!(
                totals.total,
                totals.subtotal + totals.shipping - totals.discount
            );
            assert!(totals.discount <= totals.subtotal);
        }
    }

    #[test]
    fn test_custom_config() {
        let config = PricingConfig {
            free_shipping_threshold: units(100),
            flat_shipping_cost: units(7),
        };
        let totals = Totals::compute(&[item(1, 99, 1)], None, &config);
        assert_eq!(totals.shipping, units(7));
        let totals = Totals::compute(&[item(1, 100, 1)], None, &config);
        assert_eq!(totals.shipping, Money::zero());
    }

    #[test]
    fn test_huge_lines_saturate() {
        let huge = CartItem::new(
            CartItemId::new(1),
            ProductRef::new(ProductId::new(1), "Vault"),
            Money::new(Decimal::MAX),
            1,
        )
        .unwrap();
        let c = coupon(CouponKind::Percentage, 10);
        let totals = Totals::compute(&[huge.clone(), huge], Some(&c), &PricingConfig::default());
        assert_eq!(totals.subtotal, Money::new(Decimal::MAX));
        assert_eq!(totals.shipping, Money::zero());
        assert!(totals.discount.is_positive());
        assert!(totals.total < totals.subtotal);
    }
}
