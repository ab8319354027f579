use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a numeric identifier issued by the remote collaborator.
///
/// The collaborator keys every record with a signed 64-bit integer; wrapping
/// each one keeps a cart item ID from being passed where a user ID belongs.
macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw value.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw value sent over the wire.
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

remote_id!(
    /// The authenticated user who owns a cart.
    UserId
);
remote_id!(
    /// A line item in a user's cart.
    CartItemId
);
remote_id!(
    /// A catalog product.
    ProductId
);
remote_id!(
    /// A coupon definition.
    CouponId
);
remote_id!(
    /// An order recorded by the collaborator after checkout.
    OrderId
);

/// Unique identifier for a single checkout attempt.
///
/// Generated locally; never sent to the collaborator. Used to correlate
/// state transitions, log lines and payment receipts of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Creates a new random attempt ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AttemptId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_id_new_creates_unique_ids() {
        let id1 = AttemptId::new();
        let id2 = AttemptId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn remote_id_serializes_as_bare_number() {
        let id = CartItemId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let parsed: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, UserId::new(7));
    }

    #[test]
    fn remote_id_display_and_conversion() {
        let id = OrderId::from(1001);
        assert_eq!(id.to_string(), "1001");
        assert_eq!(i64::from(id), 1001);
        assert_eq!(id.get(), 1001);
    }
}
