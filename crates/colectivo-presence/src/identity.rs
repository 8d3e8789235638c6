use serde::{Deserialize, Serialize};

use crate::protocol::Role;

/// Who the local actor is for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            role,
        }
    }
}

/// An opaque bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("environment variable {0} is not set")]
    Missing(String),

    #[error("credential is empty")]
    Empty,
}

/// Source of the bearer token used to open a session.
///
/// Token issuance lives elsewhere; the presence layer only reads it.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self) -> Result<Credential, CredentialError>;
}

/// A token known up front (e.g. passed on the command line).
#[derive(Debug, Clone)]
pub struct StaticCredential(Credential);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Credential::new(token))
    }
}

impl CredentialProvider for StaticCredential {
    fn credential(&self) -> Result<Credential, CredentialError> {
        if self.0.token().trim().is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable each time it is asked.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredential {
    fn credential(&self) -> Result<Credential, CredentialError> {
        let token =
            std::env::var(&self.var).map_err(|_| CredentialError::Missing(self.var.clone()))?;
        StaticCredential::new(token).credential()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_is_redacted() {
        let cred = Credential::new("eyJhbGciOi.secret");
        let debug = format!("{cred:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn bearer_header_value() {
        assert_eq!(Credential::new("abc").bearer(), "Bearer abc");
    }

    #[test]
    fn static_credential_rejects_blank_token() {
        assert!(matches!(
            StaticCredential::new("  ").credential(),
            Err(CredentialError::Empty)
        ));
        assert_eq!(StaticCredential::new("tok").credential().unwrap().token(), "tok");
    }

    #[test]
    fn env_credential_reports_missing_variable() {
        let provider = EnvCredential::new("COLECTIVO_TEST_TOKEN_THAT_IS_NEVER_SET");
        let err = provider.credential().unwrap_err();
        assert!(err.to_string().contains("COLECTIVO_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }
}
