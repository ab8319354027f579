//! Cart line items.

use common::{CartItemId, ProductId};
use serde::Serialize;

use crate::error::PricingError;
use crate::money::Money;

/// Reference to the catalog product behind a line item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProductRef {
    /// The product identifier.
    pub id: ProductId,

    /// Human-readable product name.
    pub name: String,
}

impl ProductRef {
    /// Creates a new product reference.
    pub fn new(id: ProductId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A line item in a cart.
///
/// Invariants: `quantity >= 1`, `unit_price >= 0` and a representable line
/// total for as long as the item exists. An item whose quantity would drop to zero is removed instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    id: CartItemId,
    product: ProductRef,
    unit_price: Money,
    quantity: u32,
}

impl CartItem {
    /// Creates a line item, enforcing the quantity and price invariants.
    pub fn new(
        id: CartItemId,
        product: ProductRef,
        unit_price: Money,
        quantity: u32,
    ) -> Result<Self, PricingError> {
        if quantity == 0 {
            return Err(PricingError::InvalidQuantity { quantity });
        }
        if unit_price.is_negative() {
            return Err(PricingError::InvalidPrice { price: unit_price });
        }
        if unit_price.checked_multiply(quantity).is_none() {
            return Err(PricingError::AmountOverflow {
                price: unit_price,
                quantity,
            });
        }
        Ok(Self {
            id,
            product,
            unit_price,
            quantity,
        })
    }

    pub fn id(&self) -> CartItemId {
        self.id
    }

    pub fn product(&self) -> &ProductRef {
        &self.product
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> ProductRef {
        ProductRef::new(ProductId::new(1), "Ceramic Mug")
    }

    #[test]
    fn test_line_total() {
        let item = CartItem::new(CartItemId::new(1), product(), Money::from_units(12_000), 3)
            .unwrap();
        assert_eq!(item.line_total(), Money::from_units(36_000));
        assert_eq!(item.product().name, "Ceramic Mug");
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = CartItem::new(CartItemId::new(1), product(), Money::from_units(10), 0);
        assert_eq!(result, Err(PricingError::InvalidQuantity { quantity: 0 }));
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = CartItem::new(CartItemId::new(1), product(), Money::from_units(-1), 1);
        assert!(matches!(result, Err(PricingError::InvalidPrice { .. })));
    }

    #[test]
    fn test_overflowing_line_total_rejected() {
        let price = Money::new(rust_decimal::Decimal::MAX);
        let result = CartItem::new(CartItemId::new(1), product(), price, 2);
        assert_eq!(
            result,
            Err(PricingError::AmountOverflow { price, quantity: 2 })
        );
        assert!(CartItem::new(CartItemId::new(1), product(), price, 1).is_ok());
    }

    #[test]
    fn test_free_item_allowed() {
        let item = CartItem::new(CartItemId::new(9), product(), Money::zero(), 2).unwrap();
        assert!(item.line_total().is_zero());
    }
}
