//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype with the usual conversions.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random ", stringify!($name), ".")]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Creates a ", stringify!($name), " from an existing UUID.")]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a billing account (one per paying identity).
    AccountId
);

uuid_id!(
    /// Unique identifier for a shared workspace.
    WorkspaceId
);

uuid_id!(
    /// Unique identifier for a workspace membership record.
    MembershipId
);

uuid_id!(
    /// Unique identifier for a ledger charge attempt.
    ///
    /// Doubles as the idempotency key handed to the payment processor.
    AttemptId
);

impl AttemptId {
    /// Returns the idempotency key used for processor calls on this attempt.
    pub fn idempotency_key(&self) -> String {
        format!("charge-attempt-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_generates_unique_values() {
        let id1 = AccountId::new();
        let id2 = AccountId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn workspace_id_parses_from_valid_string() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: WorkspaceId = uuid_str.parse().unwrap();
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn membership_id_rejects_invalid_string() {
        let result: Result<MembershipId, _> = "not-a-uuid".parse();
        assert!(result.is_err());
    }

    #[test]
    fn attempt_id_idempotency_key_is_stable() {
        let id = AttemptId::from_uuid(Uuid::nil());
        assert_eq!(
            id.idempotency_key(),
            "charge-attempt-00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(id.idempotency_key(), id.idempotency_key());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = AccountId::from_uuid(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }
}
