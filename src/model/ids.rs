//! Identifier newtypes
//!
//! User and book identifiers come from outside (session source, catalog) and are
//! kept as opaque strings. Request and notification identifiers are minted here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
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
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identity of a reader or librarian, as supplied by the session source
    UserId
);

string_id!(
    /// Catalog identifier of a book
    BookId
);

uuid_id!(
    /// Identifier of an access request
    RequestId
);

uuid_id!(
    /// Identifier of a notification
    NotificationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_ids_display_and_serialize() {
        let user = UserId::new("u1");
        assert_eq!(user.to_string(), "u1");
        assert_eq!(serde_json::to_string(&user).unwrap(), r#""u1""#);

        let book: BookId = serde_json::from_str(r#""b1""#).unwrap();
        assert_eq!(book.as_str(), "b1");
    }

    #[test]
    fn test_uuid_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
        assert_ne!(NotificationId::new(), NotificationId::new());
    }

    #[test]
    fn test_uuid_id_parse() {
        let id = RequestId::new();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        assert!("not-a-uuid".parse::<NotificationId>().is_err());
    }
}
