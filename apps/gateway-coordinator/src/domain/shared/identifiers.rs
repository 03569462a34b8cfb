//! Strongly-typed numeric identifiers for persisted entities.
//!
//! These prevent mixing up row ids from different tables.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw row id.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Get the raw row id.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(ProfileId, "Identifier of a connection profile row.");
define_id!(ExecutionId, "Identifier of a persisted order execution row.");
define_id!(SetupId, "Identifier of a trading setup.");
define_id!(SignalId, "Identifier of a strategy signal.");
define_id!(ContractId, "Identifier of a stored instrument contract.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_raw_value() {
        assert_eq!(ProfileId::new(42).to_string(), "42");
        assert_eq!(ExecutionId::from(7).value(), 7);
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&SetupId::new(3)).unwrap();
        assert_eq!(json, "3");

        let parsed: ContractId = serde_json::from_str("11").unwrap();
        assert_eq!(parsed, ContractId::new(11));
    }

    #[test]
    fn ids_order_numerically() {
        assert!(ProfileId::new(2) < ProfileId::new(10));
    }
}
