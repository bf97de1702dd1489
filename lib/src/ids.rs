//! Opaque 128-bit identifiers.
//!
//! All identifiers in the system are UUID-shaped (§3 of the spec). We wrap
//! each one in a distinct newtype so that, say, a `GenerationId` can never be
//! passed where an `UploadId` is expected, while still being `Copy` and
//! `Serialize`/`Deserialize` exactly like the raw `Uuid`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

opaque_id!(UserId);
opaque_id!(GenerationId);
opaque_id!(UploadId);
opaque_id!(TempFileId);
opaque_id!(JobId);
opaque_id!(OperationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_ids_are_not_equal() {
        assert_ne!(GenerationId::new(), GenerationId::new());
    }

    #[test]
    fn roundtrips_through_uuid() {
        let raw = Uuid::new_v4();
        let id = UploadId::from(raw);
        assert_eq!(Uuid::from(id), raw);
    }
}
