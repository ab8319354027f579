use common::{CartItemId, CouponId, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use pricing::{CartItem, Coupon, CouponKind, Decimal, Money, PricingConfig, ProductRef, Totals};

fn make_items(count: i64) -> Vec<CartItem> {
    (1..=count)
        .map(|i| {
            CartItem::new(
                CartItemId::new(i),
                ProductRef::new(ProductId::new(i), format!("Bench Product {i}")),
                Money::new(Decimal::new(1_999 + i, 2)),
                (i % 5 + 1) as u32,
            )
            .unwrap()
        })
        .collect()
}

fn bench_totals_without_coupon(c: &mut Criterion) {
    let items = make_items(50);
    let config = PricingConfig::default();

    c.bench_function("pricing/totals_50_items", |b| {
        b.iter(|| Totals::compute(std::hint::black_box(&items), None, &config));
    });
}

fn bench_totals_with_percentage_coupon(c: &mut Criterion) {
    let items = make_items(50);
    let config = PricingConfig::default();
    let coupon = Coupon::new(
        CouponId::new(1),
        "BENCH10",
        CouponKind::Percentage,
        Decimal::new(125, 1),
        None,
    )
    .unwrap();

    c.bench_function("pricing/totals_50_items_percentage", |b| {
        b.iter(|| Totals::compute(std::hint::black_box(&items), Some(&coupon), &config));
    });
}

criterion_group!(
    benches,
    bench_totals_without_coupon,
    bench_totals_with_percentage_coupon
);
criterion_main!(benches);
