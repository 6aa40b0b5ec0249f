//! Registration draft storage.
//!
//! The draft is a single JSON blob under a fixed key. [`DraftStore`] hides
//! where it lives: the session in production, memory in tests.

use std::future::Future;
use std::sync::Arc;

use morada_core::{DRAFT_KEY, RegistrationDraft};
use thiserror::Error;
use tokio::sync::Mutex;
use tower_sessions::Session;

/// Errors reading or writing a draft.
#[derive(Debug, Error)]
pub enum DraftStoreError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("draft serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Get/set/clear of the one registration draft.
pub trait DraftStore: Send + Sync {
    /// The stored draft, if any. An unreadable draft counts as none.
    fn load(&self) -> impl Future<Output = Result<Option<RegistrationDraft>, DraftStoreError>> + Send;

    /// Replace the stored draft. Latest write wins.
    fn save(&self, draft: &RegistrationDraft)
    -> impl Future<Output = Result<(), DraftStoreError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), DraftStoreError>> + Send;
}

/// Draft kept in the visitor's server-side session.
#[derive(Clone)]
pub struct SessionDraftStore {
    session: Session,
}

impl SessionDraftStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl DraftStore for SessionDraftStore {
    async fn load(&self) -> Result<Option<RegistrationDraft>, DraftStoreError> {
        let Some(raw) = self.session.get::<serde_json::Value>(DRAFT_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_value(raw) {
            Ok(draft) => Ok(Some(draft)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable registration draft");
                self.session.remove_value(DRAFT_KEY).await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, draft: &RegistrationDraft) -> Result<(), DraftStoreError> {
        self.session.insert(DRAFT_KEY, draft).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), DraftStoreError> {
        self.session.remove_value(DRAFT_KEY).await?;
        Ok(())
    }
}

/// Draft kept in memory as serialized JSON.
#[derive(Clone, Default)]
pub struct MemoryDraftStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryDraftStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored blob.
    pub async fn raw(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }

    /// Overwrite the raw blob.
    pub async fn put_raw(&self, raw: impl Into<String>) {
        *self.slot.lock().await = Some(raw.into());
    }
}

impl DraftStore for MemoryDraftStore {
    async fn load(&self) -> Result<Option<RegistrationDraft>, DraftStoreError> {
        let mut slot = self.slot.lock().await;
        let Some(raw) = slot.as_deref() else {
            return Ok(None);
        };
        if let Ok(draft) = serde_json::from_str(raw) {
            Ok(Some(draft))
        } else {
            *slot = None;
            Ok(None)
        }
    }

    async fn save(&self, draft: &RegistrationDraft) -> Result<(), DraftStoreError> {
        let raw = serde_json::to_string(draft)?;
        *self.slot.lock().await = Some(raw);
        Ok(())
    }

    async fn clear(&self) -> Result<(), DraftStoreError> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use morada_core::{AuthData, UserType};
    use tower_sessions::MemoryStore;

    use super::*;

    fn draft() -> RegistrationDraft {
        let auth_data = AuthData {
            name: "Ana".into(),
            email: "ana@exemplo.com".into(),
            ..AuthData::default()
        };
        RegistrationDraft::new(UserType::Broker, auth_data, Utc::now())
    }

    #[tokio::test]
    async fn test_memory_store_round_trip_and_clear() {
        let store = MemoryDraftStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save(&draft()).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().auth_data.name, "Ana");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_drops_corrupt_blob() {
        let store = MemoryDraftStore::new();
        store.put_raw("{not json").await;
        assert!(store.load().await.unwrap().is_none());
        assert!(store.raw().await.is_none());
    }

    #[tokio::test]
    async fn test_session_store_round_trip() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let store = SessionDraftStore::new(session.clone());

        store.save(&draft()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.user_type, UserType::Broker);

        // Any other reader of the same session sees the same blob.
        let raw: serde_json::Value = session.get(DRAFT_KEY).await.unwrap().unwrap();
        assert_eq!(raw["authData"]["email"], "ana@exemplo.com");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_store_discards_unreadable_draft() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session
            .insert(DRAFT_KEY, serde_json::json!({ "step": "nowhere" }))
            .await
            .unwrap();

        let store = SessionDraftStore::new(session.clone());
        assert!(store.load().await.unwrap().is_none());
        assert!(session.get::<serde_json::Value>(DRAFT_KEY).await.unwrap().is_none());
    }
}
