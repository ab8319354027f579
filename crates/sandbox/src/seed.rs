//! Demo catalog for local runs.

use common::{CouponId, ProductId};
use pricing::{Coupon, CouponKind, Decimal, Money, PricingError};
use remote::{CouponRule, InMemoryCartBackend};

/// Seeds a small furniture catalog and a spread of coupons.
///
/// `BIENVENIDO10` and `ENVIO5000` always apply, `MEGA20` needs a 100000
/// subtotal, `AGOTADO` is used up and `PAUSADO` is inactive.
pub fn demo_catalog(backend: &InMemoryCartBackend) -> Result<(), PricingError> {
    let products = [
        (1, "Sofa cama", 250_000, 4),
        (2, "Silla de comedor", 20_000, 24),
        (3, "Mesa de centro", 85_000, 6),
        (4, "Lampara de pie", 40_000, 10),
        (5, "Cojin decorativo", 3_000, 50),
    ];
    for (id, name, price, stock) in products {
        backend.add_product(ProductId::new(id), name, Money::from_units(price), stock);
    }

    let coupon = |id: i64, code: &str, kind: CouponKind, value: i64, description: &str| {
        Coupon::new(
            CouponId::new(id),
            code,
            kind,
            Decimal::from(value),
            Some(description.to_string()),
        )
    };

    backend.add_coupon(CouponRule::new(coupon(
        1,
        "BIENVENIDO10",
        CouponKind::Percentage,
        10,
        "10% off your first order",
    )?));
    backend.add_coupon(CouponRule::new(coupon(
        2,
        "ENVIO5000",
        CouponKind::Fixed,
        5_000,
        "5000 off any order",
    )?));
    backend.add_coupon(
        CouponRule::new(coupon(
            3,
            "MEGA20",
            CouponKind::Percentage,
            20,
            "20% off orders over 100000",
        )?)
        .minimum_purchase(Money::from_units(100_000)),
    );
    backend.add_coupon(
        CouponRule::new(coupon(4, "AGOTADO", CouponKind::Fixed, 10_000, "Sold out")?)
            .max_uses(1)
            .used(1),
    );
    backend.add_coupon(
        CouponRule::new(coupon(5, "PAUSADO", CouponKind::Percentage, 15, "Paused")?).inactive(),
    );

    tracing::info!(products = products.len(), coupons = 5, "demo catalog seeded");
    Ok(())
}
