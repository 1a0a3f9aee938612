//! User profiles on the remote.

use std::sync::Arc;

use stitchline_core::{FromDocument, IntoFields, UserId, UserProfile, USERS_COLLECTION};
use stitchline_store::RemoteStore;

use crate::error::Result;

/// Reads and writes user profiles, one document per user id.
#[derive(Clone)]
pub struct ProfileStore {
    remote: Arc<dyn RemoteStore>,
    collection: String,
}

impl ProfileStore {
    /// A store over the default `Users` collection.
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self::with_collection(remote, USERS_COLLECTION)
    }

    pub fn with_collection(remote: Arc<dyn RemoteStore>, collection: impl Into<String>) -> Self {
        Self {
            remote,
            collection: collection.into(),
        }
    }

    /// Write `profile` under its user id, replacing any earlier one.
    pub async fn save(&self, profile: &UserProfile) -> Result<()> {
        self.remote
            .set_document(&self.collection, profile.id.as_str(), profile.into_fields()?)
            .await?;
        tracing::debug!(user = %profile.id, "saved user profile");
        Ok(())
    }

    pub async fn fetch(&self, user: &UserId) -> Result<Option<UserProfile>> {
        let doc = self.remote.get_document(&self.collection, user.as_str()).await?;
        Ok(doc
            .map(|doc| UserProfile::from_document(&doc))
            .transpose()?)
    }

    /// The user's display name, or `None` when they have no profile.
    pub async fn fetch_user_name(&self, user: &UserId) -> Result<Option<String>> {
        Ok(self.fetch(user).await?.map(|p| p.display_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stitchline_store::MemoryRemote;

    #[tokio::test]
    async fn test_saved_profile_has_display_name() {
        let remote = Arc::new(MemoryRemote::new());
        let profiles = ProfileStore::new(remote.clone());
        let user = UserId::new("u1");

        profiles
            .save(&UserProfile::new(user.clone(), "ada@example.com", "Ada", "Byron"))
            .await
            .unwrap();

        assert_eq!(
            profiles.fetch_user_name(&user).await.unwrap().as_deref(),
            Some("Ada Byron")
        );
        assert_eq!(remote.document_count(USERS_COLLECTION), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_name() {
        let profiles = ProfileStore::new(Arc::new(MemoryRemote::new()));
        assert_eq!(
            profiles.fetch_user_name(&UserId::new("nobody")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_partial_profile_still_has_a_name() {
        let remote = Arc::new(MemoryRemote::new());
        let fields = match json!({"firstName": "Ada"}) {
            serde_json::Value::Object(f) => f,
            _ => unreachable!(),
        };
        remote
            .set_document(USERS_COLLECTION, "u1", fields)
            .await
            .unwrap();

        let profiles = ProfileStore::new(remote);
        assert_eq!(
            profiles.fetch_user_name(&UserId::new("u1")).await.unwrap().as_deref(),
            Some("Ada ")
        );
    }

    #[tokio::test]
    async fn test_offline_remote_is_an_error() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_offline(true);
        let profiles = ProfileStore::new(remote);
        assert!(profiles.fetch_user_name(&UserId::new("u1")).await.is_err());
    }
}
