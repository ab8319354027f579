//! Coupon application against the collaborator.

use std::sync::Arc;

use pricing::{Coupon, Money, normalize_code};
use remote::CartBackend;

use crate::cancel::CancellationToken;
use crate::cart::{CartSnapshot, CartStore};
use crate::error::{EngineError, Result};

/// Number of suggestions shown by the presentation layer.
pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;

/// A coupon accepted by the collaborator and attached to the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCoupon {
    pub coupon: Coupon,
    pub message: Option<String>,
    pub snapshot: CartSnapshot,
}

/// Decides whether a coupon code may be applied.
///
/// Exactly one coupon is active per cart: a successful apply replaces the
/// previous coupon. Codes are checked locally before any network call.
pub struct CouponValidator<B: CartBackend> {
    backend: Arc<B>,
    cart: Arc<CartStore<B>>,
    cancel: CancellationToken,
}

impl<B: CartBackend> CouponValidator<B> {
    pub fn new(backend: Arc<B>, cart: Arc<CartStore<B>>, cancel: CancellationToken) -> Self {
        Self {
            backend,
            cart,
            cancel,
        }
    }

    /// Asks the collaborator whether `code` applies to `subtotal`.
    ///
    /// Does not touch the cart.
    #[tracing::instrument(skip(self))]
    pub async fn validate(&self, code: &str, subtotal: Money) -> Result<remote::CouponApplication> {
        let code = normalize_code(code)?;
        if self.cancel.is_cancelled() {
            return Err(EngineError::TornDown);
        }

        metrics::counter!("coupon_applications_total").increment(1);
        let result = match self
            .cancel
            .run_until_cancelled(self.backend.apply_coupon(&code, subtotal))
            .await
        {
            Some(result) => result.map_err(EngineError::from),
            None => Err(EngineError::Cancelled),
        };

        if let Err(e) = &result {
            metrics::counter!("coupon_rejections_total", "kind" => e.kind()).increment(1);
            tracing::warn!(code = %code, error = %e, "coupon not applied");
        }
        result
    }

    /// Applies `code` to the current cart subtotal and attaches the coupon.
    ///
    /// On any failure the previously applied coupon stays in place.
    #[tracing::instrument(skip(self))]
    pub async fn apply(&self, code: &str) -> Result<AppliedCoupon> {
        let subtotal = self.cart.totals().subtotal;
        let application = self.validate(code, subtotal).await?;
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let snapshot = self.cart.attach_coupon(application.coupon.clone());
        tracing::info!(
            code = application.coupon.code(),
            discount = %snapshot.totals.discount,
            "coupon applied"
        );
        Ok(AppliedCoupon {
            coupon: application.coupon,
            message: application.message,
            snapshot,
        })
    }

    /// Detaches the applied coupon. Local only; repeated calls are no-ops.
    pub fn remove(&self) -> CartSnapshot {
        self.cart.detach_coupon()
    }

    /// Currently valid coupons, at most `limit` of them.
    #[tracing::instrument(skip(self))]
    pub async fn available(&self, limit: usize) -> Result<Vec<Coupon>> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::TornDown);
        }
        let mut coupons = match self
            .cancel
            .run_until_cancelled(self.backend.valid_coupons())
            .await
        {
            Some(result) => result?,
            None => return Err(EngineError::Cancelled),
        };
        coupons.truncate(limit);
        Ok(coupons)
    }
}
