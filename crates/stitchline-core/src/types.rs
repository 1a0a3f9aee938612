//! Strong identifier types for Stitchline.
//!
//! All identifiers are newtypes over the server-assigned string ids so an
//! event id can never be passed where a user id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;

/// Name of the remote collection holding one document per event.
pub const EVENTS_COLLECTION: &str = "Events";

/// Name of the remote collection holding one relation record per user.
pub const USER_EVENTS_COLLECTION: &str = "UserEvents";

/// Name of the remote collection holding one profile per user, keyed by
/// user id.
pub const USERS_COLLECTION: &str = "Users";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw id.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw id.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the raw id.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Server-assigned identifier of an event document.
    EventId
);

string_id!(
    /// Identifier of an authenticated user.
    UserId
);

string_id!(
    /// Server-assigned identifier of a relation record document.
    RelationId
);

impl EventId {
    /// Reference path stored in relation records, e.g. `Events/abc123`.
    pub fn to_ref_path(&self) -> String {
        format!("{}/{}", EVENTS_COLLECTION, self.0)
    }

    /// Parse a reference path produced by [`EventId::to_ref_path`].
    pub fn from_ref_path(path: &str) -> Result<Self, DecodeError> {
        match path.split_once('/') {
            Some((collection, id)) if collection == EVENTS_COLLECTION && !id.is_empty() => {
                if id.contains('/') {
                    return Err(DecodeError::InvalidReference(path.to_string()));
                }
                Ok(Self(id.to_string()))
            }
            _ => Err(DecodeError::InvalidReference(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_path_roundtrip() {
        let id = EventId::new("evt-42");
        let path = id.to_ref_path();
        assert_eq!(path, "Events/evt-42");
        assert_eq!(EventId::from_ref_path(&path).unwrap(), id);
    }

    #[test]
    fn test_ref_path_rejects_other_collections() {
        assert!(EventId::from_ref_path("UserEvents/evt-42").is_err());
        assert!(EventId::from_ref_path("Events/").is_err());
        assert!(EventId::from_ref_path("Events/a/b").is_err());
        assert!(EventId::from_ref_path("evt-42").is_err());
    }

    #[test]
    fn test_id_debug_and_display() {
        let id = UserId::new("u1");
        assert_eq!(format!("{}", id), "u1");
        assert_eq!(format!("{:?}", id), "UserId(u1)");
    }
}
