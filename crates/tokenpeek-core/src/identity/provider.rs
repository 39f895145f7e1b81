use std::fmt;

use async_trait::async_trait;

use super::AuthError;
use crate::session::mask_token;

/// OAuth credential attached to a provider sign-in result
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OAuthCredential {
    pub access_token: Option<String>,
}

impl fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("access_token", &self.access_token.as_deref().map(mask_token))
            .finish()
    }
}

/// The signed-in user as the provider reports it
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderUser {
    id_token: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl ProviderUser {
    pub fn new(id_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// The provider's own identity token for this user
    pub fn id_token(&self) -> &str {
        &self.id_token
    }
}

impl fmt::Debug for ProviderUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderUser")
            .field("id_token", &mask_token(&self.id_token))
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Raw outcome of a completed provider ceremony
#[derive(Debug, Clone)]
pub struct ProviderSignIn {
    pub credential: Option<OAuthCredential>,
    pub user: ProviderUser,
}

impl ProviderSignIn {
    /// The OAuth access token carried by the credential, if it is non-empty
    pub fn credential_access_token(&self) -> Option<&str> {
        self.credential
            .as_ref()
            .and_then(|c| c.access_token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// An external identity provider with an interactive sign-in ceremony.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name for logs and labels
    fn name(&self) -> &'static str;

    /// Run the interactive consent ceremony.
    ///
    /// Resolves once the user finishes or abandons the ceremony. Closing or
    /// denying it surfaces as `AuthError::Cancelled`.
    async fn sign_in_with_popup(&self) -> Result<ProviderSignIn, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(access_token: Option<&str>) -> ProviderSignIn {
        ProviderSignIn {
            credential: Some(OAuthCredential {
                access_token: access_token.map(str::to_string),
            }),
            user: ProviderUser::new("id-token"),
        }
    }

    #[test]
    fn test_credential_access_token() {
        assert_eq!(result_with(Some("abc")).credential_access_token(), Some("abc"));
        assert_eq!(result_with(Some("")).credential_access_token(), None);
        assert_eq!(result_with(None).credential_access_token(), None);

        let no_credential = ProviderSignIn {
            credential: None,
            user: ProviderUser::new("id-token"),
        };
        assert_eq!(no_credential.credential_access_token(), None);
    }

    #[test]
    fn test_provider_user_builder() {
        let user = ProviderUser::new("id")
            .with_email("ada@example.com")
            .with_display_name("Ada");
        assert_eq!(user.id_token(), "id");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.display_name.as_deref(), Some("Ada"));
    }
}
