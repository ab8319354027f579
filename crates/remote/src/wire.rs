//! JSON shapes exchanged with the collaborator.
//!
//! Field names follow the collaborator's contract. Conversions into pricing
//! types re-check every invariant, so a bad payload surfaces as
//! `RemoteError::Malformed` instead of reaching the cart.

use common::{CartItemId, CouponId, ProductId, UserId};
use pricing::{CartItem, Coupon, CouponKind, Decimal, Money, ProductRef};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Product reference embedded in cart and order lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDto {
    pub id: ProductId,

    #[serde(rename = "nombre", default)]
    pub name: String,
}

impl From<&ProductRef> for ProductDto {
    fn from(product: &ProductRef) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
        }
    }
}

impl From<ProductDto> for ProductRef {
    fn from(dto: ProductDto) -> Self {
        ProductRef::new(dto.id, dto.name)
    }
}

/// A cart line as returned by `GET /carrito/usuario/{userId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemDto {
    pub id: CartItemId,

    #[serde(rename = "producto")]
    pub product: ProductDto,

    #[serde(rename = "preciounitario")]
    pub unit_price: Money,

    #[serde(rename = "cantidad")]
    pub quantity: i64,
}

impl TryFrom<CartItemDto> for CartItem {
    type Error = RemoteError;

    fn try_from(dto: CartItemDto) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(dto.quantity).map_err(|_| {
            RemoteError::Malformed(format!(
                "item {} has quantity {}",
                dto.id, dto.quantity
            ))
        })?;
        CartItem::new(dto.id, dto.product.into(), dto.unit_price, quantity)
            .map_err(|e| RemoteError::Malformed(format!("item {}: {e}", dto.id)))
    }
}

impl From<&CartItem> for CartItemDto {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id(),
            product: item.product().into(),
            unit_price: item.unit_price(),
            quantity: i64::from(item.quantity()),
        }
    }
}

/// Coupon kind as named by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponKindDto {
    #[serde(rename = "PORCENTAJE")]
    Percentage,

    #[serde(rename = "MONTO_FIJO")]
    Fixed,
}

impl From<CouponKindDto> for CouponKind {
    fn from(kind: CouponKindDto) -> Self {
        match kind {
            CouponKindDto::Percentage => CouponKind::Percentage,
            CouponKindDto::Fixed => CouponKind::Fixed,
        }
    }
}

impl From<CouponKind> for CouponKindDto {
    fn from(kind: CouponKind) -> Self {
        match kind {
            CouponKind::Percentage => CouponKindDto::Percentage,
            CouponKind::Fixed => CouponKindDto::Fixed,
        }
    }
}

/// A coupon as returned by `/cupones/validos` and `/cupones/aplicar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponDto {
    pub id: CouponId,

    #[serde(rename = "codigo")]
    pub code: String,

    #[serde(rename = "tipo")]
    pub kind: CouponKindDto,

    #[serde(rename = "valor")]
    pub value: Decimal,

    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
}

impl TryFrom<CouponDto> for Coupon {
    type Error = RemoteError;

    fn try_from(dto: CouponDto) -> Result<Self, Self::Error> {
        Coupon::new(
            dto.id,
            &dto.code,
            dto.kind.into(),
            dto.value,
            dto.description,
        )
        .map_err(|e| RemoteError::Malformed(format!("coupon {}: {e}", dto.id)))
    }
}

impl From<&Coupon> for CouponDto {
    fn from(coupon: &Coupon) -> Self {
        Self {
            id: coupon.id(),
            code: coupon.code().to_string(),
            kind: coupon.kind().into(),
            value: coupon.value(),
            description: coupon.description().map(str::to_string),
        }
    }
}

/// Body of `POST /carrito/agregar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemRequest {
    #[serde(rename = "usuarioId")]
    pub user_id: UserId,

    #[serde(rename = "productoId")]
    pub product_id: ProductId,

    #[serde(rename = "cantidad")]
    pub quantity: u32,
}

/// Body of `PUT /carrito/actualizar-cantidad`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateQuantityRequest {
    #[serde(rename = "itemId")]
    pub item_id: CartItemId,

    #[serde(rename = "cantidad")]
    pub quantity: u32,
}

/// Body of `POST /cupones/aplicar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCouponRequest {
    #[serde(rename = "codigo")]
    pub code: String,

    #[serde(rename = "montoOriginal")]
    pub subtotal: Money,
}

/// Response of `POST /cupones/aplicar`: `{ success, cupon?, mensaje?, error? }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplyCouponResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(rename = "cupon", default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponDto>,

    #[serde(rename = "mensaje", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(rename = "descuento", default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Money>,

    #[serde(rename = "montoFinal", default, skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<Money>,
}

/// Failure body the collaborator returns with a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(rename = "mensaje", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Builds a failure body carrying `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
            message: None,
        }
    }

    /// The human-readable reason, preferring `error` over `mensaje`.
    pub fn reason(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|r| !r.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_item_from_collaborator_json() {
        let json = serde_json::json!({
            "id": 5,
            "producto": { "id": 9, "nombre": "Desk Lamp", "precio": 20000 },
            "preciounitario": 20000.00,
            "cantidad": 2
        });
        let dto: CartItemDto = serde_json::from_value(json).unwrap();
        let item = CartItem::try_from(dto).unwrap();
        assert_eq!(item.id(), CartItemId::new(5));
        assert_eq!(item.product().name, "Desk Lamp");
        assert_eq!(item.line_total(), Money::from_units(40_000));
    }

    #[test]
    fn test_zero_or_negative_quantity_is_malformed() {
        for quantity in [0, -3] {
            let dto = CartItemDto {
                id: CartItemId::new(1),
                product: ProductDto {
                    id: ProductId::new(1),
                    name: "X".to_string(),
                },
                unit_price: Money::from_units(10),
                quantity,
            };
            assert!(matches!(
                CartItem::try_from(dto),
                Err(RemoteError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_overflowing_line_total_is_malformed() {
        let dto = CartItemDto {
            id: CartItemId::new(3),
            product: ProductDto {
                id: ProductId::new(1),
                name: "Vault".to_string(),
            },
            unit_price: Money::new(Decimal::MAX),
            quantity: 2,
        };
        let err = CartItem::try_from(dto).unwrap_err();
        assert!(matches!(err, RemoteError::Malformed(ref reason) if reason.starts_with("item 3")));
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_coupon_kinds_parse() {
        let json = serde_json::json!({
            "id": 2,
            "codigo": "fijo5000",
            "tipo": "MONTO_FIJO",
            "valor": 5000,
            "descripcion": "Flat discount",
            "usosmaximo": 10
        });
        let coupon = Coupon::try_from(serde_json::from_value::<CouponDto>(json).unwrap()).unwrap();
        assert_eq!(coupon.kind(), CouponKind::Fixed);
        assert_eq!(coupon.code(), "FIJO5000");
    }

    #[test]
    fn test_coupon_over_100_percent_is_malformed() {
        let dto = CouponDto {
            id: CouponId::new(1),
            code: "HUGE".to_string(),
            kind: CouponKindDto::Percentage,
            value: Decimal::from(150),
            description: None,
        };
        assert!(matches!(
            Coupon::try_from(dto),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn test_apply_response_with_error_only() {
        let json = serde_json::json!({ "success": false, "error": "Coupon has expired" });
        let response: ApplyCouponResponse = serde_json::from_value(json).unwrap();
        assert!(!response.success);
        assert!(response.coupon.is_none());
        assert_eq!(response.error.as_deref(), Some("Coupon has expired"));
    }

    #[test]
    fn test_error_body_reason() {
        assert_eq!(ErrorBody::new("Cart is empty").reason(), Some("Cart is empty"));

        let body = ErrorBody {
            success: false,
            error: None,
            message: Some("Out of stock".to_string()),
        };
        assert_eq!(body.reason(), Some("Out of stock"));
        assert_eq!(ErrorBody::default().reason(), None);
    }
}
