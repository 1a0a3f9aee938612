//! User profiles from the remote `Users` collection, keyed by user id.

use serde_json::Value;

use crate::document::{Document, Fields, FromDocument, IntoFields};
use crate::error::{DecodeError, EncodeError};
use crate::types::UserId;

/// Name details recorded for a user at sign-up.
///
/// Decoding is lenient: a missing or non-string field reads as empty, so
/// any profile document yields a display name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserProfile {
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// First and last name joined by a space.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl FromDocument for UserProfile {
    fn from_document(doc: &Document) -> Result<Self, DecodeError> {
        let text = |field: &str| {
            doc.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok(Self {
            id: UserId::new(doc.id.clone()),
            email: text("email"),
            first_name: text("firstName"),
            last_name: text("lastName"),
        })
    }
}

impl IntoFields for UserProfile {
    fn into_fields(&self) -> Result<Fields, EncodeError> {
        let mut fields = Fields::new();
        fields.insert("email".into(), Value::String(self.email.clone()));
        fields.insert("firstName".into(), Value::String(self.first_name.clone()));
        fields.insert("lastName".into(), Value::String(self.last_name.clone()));
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        match value {
            Value::Object(fields) => Document::new(id, fields),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_display_name_joins_first_and_last() {
        let profile = UserProfile::from_document(&doc(
            "u1",
            json!({"email": "ada@example.com", "firstName": "Ada", "lastName": "Byron"}),
        ))
        .unwrap();
        assert_eq!(profile.id, UserId::new("u1"));
        assert_eq!(profile.display_name(), "Ada Byron");
    }

    #[test]
    fn test_missing_or_mistyped_names_read_as_empty() {
        let profile =
            UserProfile::from_document(&doc("u2", json!({"firstName": "Ada", "lastName": 3})))
                .unwrap();
        assert_eq!(profile.email, "");
        assert_eq!(profile.display_name(), "Ada ");
    }

    #[test]
    fn test_fields_use_remote_names() {
        let profile = UserProfile::new(UserId::new("u1"), "ada@example.com", "Ada", "Byron");
        let fields = profile.into_fields().unwrap();
        assert_eq!(fields.get("firstName"), Some(&json!("Ada")));
        assert_eq!(fields.get("lastName"), Some(&json!("Byron")));
        assert!(fields.get("id").is_none());
        assert_eq!(
            UserProfile::from_document(&Document::new("u1", fields)).unwrap(),
            profile
        );
    }
}
