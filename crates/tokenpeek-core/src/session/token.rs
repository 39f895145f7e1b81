use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::storage::{MemoryStorage, SessionStorage, StorageError};

/// Session storage key holding the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Normalized result of a successful sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Provider OAuth access token, or the ID token when the provider gave none
    pub access_token: String,
    pub id_token: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl SessionToken {
    /// True when `access_token` is the ID-token fallback
    pub fn used_fallback(&self) -> bool {
        !self.id_token.is_empty() && self.access_token == self.id_token
    }

    /// Best label for the signed-in user
    pub fn who(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Google user")
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("access_token", &mask_token(&self.access_token))
            .field("id_token", &mask_token(&self.id_token))
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Returns a masked version of a token for logs (first 8 chars + ...).
pub fn mask_token(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((idx, _)) if token.len() > 16 => format!("{}...", &token[..idx]),
        _ => "***".to_string(),
    }
}

/// Access-token store over a session storage handle.
///
/// Components get a `TokenStore` injected instead of reaching for global
/// storage, so the token screen and the sign-in flow can be tested alone.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn SessionStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Store backed by a fresh process-scoped `MemoryStorage`
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn get(&self) -> Result<Option<String>, StorageError> {
        self.storage.get_item(ACCESS_TOKEN_KEY)
    }

    pub fn set(&self, token: &str) -> Result<(), StorageError> {
        debug!(token = %mask_token(token), "Storing access token");
        self.storage.set_item(ACCESS_TOKEN_KEY, token)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(ACCESS_TOKEN_KEY)
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("key", &ACCESS_TOKEN_KEY)
            .finish_non_exhaustive()
    }
}

/// What the token screen found in storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredToken {
    /// A non-empty token string
    Present(String),
    Missing,
}

impl StoredToken {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            StoredToken::Present(token) => Some(token.as_str()),
            StoredToken::Missing => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, StoredToken::Present(_))
    }
}

/// Read the stored token for display. Never fails: a storage error and an
/// empty string both read as `Missing`.
pub fn read_stored_token(store: &TokenStore) -> StoredToken {
    match store.get() {
        Ok(Some(token)) if !token.is_empty() => StoredToken::Present(token),
        Ok(_) => StoredToken::Missing,
        Err(e) => {
            warn!(error = %e, "Failed to read session storage, treating token as absent");
            StoredToken::Missing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Storage whose every call fails, like a browser with storage disabled
    struct BrokenStorage;

    impl SessionStorage for BrokenStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable)
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }

        fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }
    }

    fn sample_token() -> SessionToken {
        SessionToken {
            access_token: "ya29.a0AfH6SMBx-long-access-token".to_string(),
            id_token: "eyJhbGciOiJSUzI1NiJ9.payload.signature".to_string(),
            email: Some("ada@example.com".to_string()),
            display_name: None,
        }
    }

    #[test]
    fn test_token_store_set_get_clear() {
        let store = TokenStore::in_memory();
        assert_eq!(store.get(), Ok(None));

        store.set("abc123").unwrap();
        assert_eq!(store.get(), Ok(Some("abc123".to_string())));

        store.clear().unwrap();
        assert_eq!(store.get(), Ok(None));
    }

    #[test]
    fn test_token_store_uses_fixed_key() {
        let storage = MemoryStorage::new();
        let store = TokenStore::new(Arc::new(storage.clone()));
        store.set("abc123").unwrap();
        assert_eq!(
            storage.get_item("accessToken"),
            Ok(Some("abc123".to_string()))
        );
    }

    #[test]
    fn test_read_stored_token_present() {
        let store = TokenStore::in_memory();
        store.set("abc123").unwrap();
        assert_eq!(
            read_stored_token(&store),
            StoredToken::Present("abc123".to_string())
        );
    }

    #[test]
    fn test_read_stored_token_missing_and_empty() {
        let store = TokenStore::in_memory();
        assert_eq!(read_stored_token(&store), StoredToken::Missing);

        store.set("").unwrap();
        assert_eq!(read_stored_token(&store), StoredToken::Missing);
    }

    #[test]
    fn test_read_stored_token_storage_failure_reads_as_missing() {
        let store = TokenStore::new(Arc::new(BrokenStorage));
        assert_eq!(read_stored_token(&store), StoredToken::Missing);
        assert_eq!(store.set("abc"), Err(StorageError::Unavailable));
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("ya29.a0AfH6SMBx-long-access-token"), "ya29.a0A...");
        assert_eq!(mask_token("short"), "***");
        assert_eq!(mask_token(""), "***");
    }

    #[test]
    fn test_session_token_debug_masks_tokens() {
        let debug = format!("{:?}", sample_token());
        assert!(!debug.contains("long-access-token"));
        assert!(!debug.contains("signature"));
        assert!(debug.contains("ada@example.com"));
    }

    #[test]
    fn test_session_token_who_and_fallback() {
        let mut token = sample_token();
        assert_eq!(token.who(), "ada@example.com");
        assert!(!token.used_fallback());

        token.display_name = Some("Ada Lovelace".to_string());
        assert_eq!(token.who(), "Ada Lovelace");

        token.access_token = token.id_token.clone();
        assert!(token.used_fallback());
    }
}
