use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{AuthError, IdentityProvider};
use crate::route::{Route, Router};
use crate::session::{mask_token, SessionToken, TokenStore};

/// Run the provider ceremony and normalize the result.
///
/// The access token is the provider's OAuth access token when it returns one,
/// otherwise the provider's ID token. A success never carries an empty token.
pub async fn sign_in(provider: &dyn IdentityProvider) -> Result<SessionToken, AuthError> {
    debug!(provider = provider.name(), "Starting provider sign-in");
    let result = provider.sign_in_with_popup().await?;

    let id_token = result.user.id_token().to_string();
    let access_token = match result.credential_access_token() {
        Some(token) => token.to_string(),
        None => {
            debug!(provider = provider.name(), "No OAuth access token, falling back to ID token");
            id_token.clone()
        }
    };

    if access_token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(SessionToken {
        access_token,
        id_token,
        email: result.user.email,
        display_name: result.user.display_name,
    })
}

/// Caller-facing sign-in controller with a single in-flight attempt.
///
/// Clone is cheap and clones share the pending flag, so the UI can poll
/// `is_pending` while a spawned task runs the attempt.
#[derive(Debug, Clone, Default)]
pub struct SignInFlow {
    pending: Arc<AtomicBool>,
}

impl SignInFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while an attempt is in flight. The triggering control is disabled.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Claim the pending flag. Fails if another attempt is in flight.
    ///
    /// The flag is released when the returned attempt is dropped, whether it
    /// ran to completion, failed, or was never run.
    pub fn begin(&self) -> Result<SignInAttempt, AuthError> {
        self.pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AuthError::AlreadyInProgress)?;
        Ok(SignInAttempt {
            guard: PendingGuard {
                pending: Arc::clone(&self.pending),
            },
        })
    }

    /// `begin` followed by `SignInAttempt::run`.
    pub async fn run(
        &self,
        provider: &dyn IdentityProvider,
        store: &TokenStore,
        router: &Router,
    ) -> Result<SessionToken, AuthError> {
        self.begin()?.run(provider, store, router).await
    }
}

/// One claimed sign-in attempt. Holding it keeps the flow pending.
#[must_use = "dropping the attempt releases the pending flag without signing in"]
#[derive(Debug)]
pub struct SignInAttempt {
    guard: PendingGuard,
}

impl SignInAttempt {
    /// Sign in, store the access token, and redirect to the token screen.
    ///
    /// On failure nothing is written to the store and the route is untouched.
    pub async fn run(
        self,
        provider: &dyn IdentityProvider,
        store: &TokenStore,
        router: &Router,
    ) -> Result<SessionToken, AuthError> {
        let _guard = self.guard;

        let token = match sign_in(provider).await {
            Ok(token) => token,
            Err(e) if e.is_user_cancelled() => {
                info!(provider = provider.name(), "Sign-in cancelled by user");
                return Err(e);
            }
            Err(e) => {
                error!(provider = provider.name(), error = %e, "Sign-in failed");
                return Err(e);
            }
        };

        if let Err(e) = store.set(&token.access_token) {
            warn!(error = %e, "Failed to store access token");
            return Err(e.into());
        }

        info!(
            provider = provider.name(),
            token = %mask_token(&token.access_token),
            fallback = token.used_fallback(),
            "Sign-in successful"
        );
        router.navigate(Route::Token);
        Ok(token)
    }
}

/// Clears the pending flag on drop, on every exit path.
#[derive(Debug)]
struct PendingGuard {
    pending: Arc<AtomicBool>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::identity::{OAuthCredential, ProviderSignIn, ProviderUser};
    use crate::session::{SessionStorage, StorageError};

    enum Outcome {
        Tokens {
            access_token: Option<&'static str>,
            id_token: &'static str,
        },
        Cancel,
        Reject,
    }

    struct FakeProvider {
        outcome: Outcome,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn sign_in_with_popup(&self) -> Result<ProviderSignIn, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Tokens {
                    access_token,
                    id_token,
                } => Ok(ProviderSignIn {
                    credential: Some(OAuthCredential {
                        access_token: access_token.map(str::to_string),
                    }),
                    user: ProviderUser::new(id_token)
                        .with_email("ada@example.com")
                        .with_display_name("Ada Lovelace"),
                }),
                Outcome::Cancel => Err(AuthError::Cancelled),
                Outcome::Reject => Err(AuthError::Rejected("access_denied".to_string())),
            }
        }
    }

    /// Provider that parks until released, to observe the pending flag
    struct GatedProvider {
        gate: Notify,
    }

    #[async_trait]
    impl IdentityProvider for GatedProvider {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn sign_in_with_popup(&self) -> Result<ProviderSignIn, AuthError> {
            self.gate.notified().await;
            Ok(ProviderSignIn {
                credential: None,
                user: ProviderUser::new("gated-id-token"),
            })
        }
    }

    /// Storage that accepts reads but fails writes
    #[derive(Default)]
    struct ReadOnlyStorage {
        value: Mutex<Option<String>>,
    }

    impl SessionStorage for ReadOnlyStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(self.value.lock().unwrap().clone())
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }

        fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }
    }

    #[tokio::test]
    async fn test_sign_in_prefers_access_token() {
        let provider = FakeProvider::new(Outcome::Tokens {
            access_token: Some("abc123"),
            id_token: "id-456",
        });
        let token = sign_in(&provider).await.unwrap();
        assert_eq!(token.access_token, "abc123");
        assert_eq!(token.id_token, "id-456");
        assert_eq!(token.email.as_deref(), Some("ada@example.com"));
        assert_eq!(token.display_name.as_deref(), Some("Ada Lovelace"));
        assert!(!token.used_fallback());
    }

    #[tokio::test]
    async fn test_sign_in_falls_back_to_id_token() {
        for access_token in [None, Some("")] {
            let provider = FakeProvider::new(Outcome::Tokens {
                access_token,
                id_token: "fallback789",
            });
            let token = sign_in(&provider).await.unwrap();
            assert_eq!(token.access_token, "fallback789");
            assert!(token.used_fallback());
        }
    }

    #[tokio::test]
    async fn test_sign_in_without_any_token_fails() {
        let provider = FakeProvider::new(Outcome::Tokens {
            access_token: None,
            id_token: "",
        });
        assert!(matches!(sign_in(&provider).await, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn test_flow_success_stores_token_and_navigates() {
        let provider = FakeProvider::new(Outcome::Tokens {
            access_token: Some("abc123"),
            id_token: "id-456",
        });
        let store = TokenStore::in_memory();
        let router = Router::default();
        let flow = SignInFlow::new();

        let token = flow.run(&provider, &store, &router).await.unwrap();

        assert_eq!(token.access_token, "abc123");
        assert_eq!(store.get(), Ok(Some("abc123".to_string())));
        assert_eq!(router.current(), Route::Token);
        assert!(!flow.is_pending());
    }

    #[tokio::test]
    async fn test_flow_fallback_token_is_stored() {
        let provider = FakeProvider::new(Outcome::Tokens {
            access_token: None,
            id_token: "fallback789",
        });
        let store = TokenStore::in_memory();
        let router = Router::default();

        SignInFlow::new().run(&provider, &store, &router).await.unwrap();

        assert_eq!(store.get(), Ok(Some("fallback789".to_string())));
    }

    #[tokio::test]
    async fn test_flow_cancel_leaves_store_and_route_alone() {
        let provider = FakeProvider::new(Outcome::Cancel);
        let store = TokenStore::in_memory();
        let router = Router::default();
        let flow = SignInFlow::new();

        let result = flow.run(&provider, &store, &router).await;

        assert!(matches!(result, Err(AuthError::Cancelled)));
        assert_eq!(store.get(), Ok(None));
        assert_eq!(router.current(), Route::Login);
        assert!(!flow.is_pending());
    }

    #[tokio::test]
    async fn test_flow_reject_keeps_prior_token() {
        let provider = FakeProvider::new(Outcome::Reject);
        let store = TokenStore::in_memory();
        store.set("previous").unwrap();
        let router = Router::default();
        let flow = SignInFlow::new();

        let result = flow.run(&provider, &store, &router).await;

        assert!(matches!(result, Err(AuthError::Rejected(_))));
        assert_eq!(store.get(), Ok(Some("previous".to_string())));
        assert_eq!(router.current(), Route::Login);
        assert!(!flow.is_pending());
    }

    #[tokio::test]
    async fn test_flow_storage_failure_does_not_navigate() {
        let provider = FakeProvider::new(Outcome::Tokens {
            access_token: Some("abc123"),
            id_token: "id",
        });
        let store = TokenStore::new(Arc::new(ReadOnlyStorage::default()));
        let router = Router::default();
        let flow = SignInFlow::new();

        let result = flow.run(&provider, &store, &router).await;

        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert_eq!(router.current(), Route::Login);
        assert!(!flow.is_pending());
    }

    #[test]
    fn test_begin_rejects_second_attempt() {
        let flow = SignInFlow::new();
        let attempt = flow.begin().unwrap();
        assert!(flow.is_pending());
        assert!(matches!(flow.begin(), Err(AuthError::AlreadyInProgress)));

        drop(attempt);
        assert!(!flow.is_pending());
        assert!(flow.begin().is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_run_does_not_call_provider_twice() {
        let provider = FakeProvider::new(Outcome::Cancel);
        let store = TokenStore::in_memory();
        let router = Router::default();
        let flow = SignInFlow::new();

        let _held = flow.begin().unwrap();
        let result = flow.run(&provider, &store, &router).await;

        assert!(matches!(result, Err(AuthError::AlreadyInProgress)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_pending_while_ceremony_in_flight() {
        let provider = Arc::new(GatedProvider { gate: Notify::new() });
        let store = TokenStore::in_memory();
        let router = Router::default();
        let flow = SignInFlow::new();

        let attempt = flow.begin().unwrap();
        let task = {
            let provider = Arc::clone(&provider);
            let store = store.clone();
            let router = router.clone();
            tokio::spawn(async move { attempt.run(provider.as_ref(), &store, &router).await })
        };

        tokio::task::yield_now().await;
        assert!(flow.is_pending());

        provider.gate.notify_one();
        let token = task.await.unwrap().unwrap();

        assert_eq!(token.access_token, "gated-id-token");
        assert!(!flow.is_pending());
        assert_eq!(router.current(), Route::Token);
    }

    #[tokio::test]
    async fn test_aborted_attempt_clears_pending() {
        let provider = Arc::new(GatedProvider { gate: Notify::new() });
        let flow = SignInFlow::new();

        let attempt = flow.begin().unwrap();
        let task = {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move {
                attempt
                    .run(provider.as_ref(), &TokenStore::in_memory(), &Router::default())
                    .await
            })
        };
        tokio::task::yield_now().await;

        task.abort();
        let _ = task.await;
        assert!(!flow.is_pending());
    }
}
