pub mod cart;
pub mod coupons;
pub mod health;
pub mod metrics;
pub mod orders;

use remote::CartBackend;

/// Shared application state accessible from all handlers.
pub struct AppState<B: CartBackend> {
    pub backend: B,
}
