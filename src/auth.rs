//! Token and Scope Authorization
//!
//! Every inbound operation resolves its bearer token to a set of scopes before
//! it reaches a subsystem. Tokens are opaque strings owned by configuration;
//! a token holding the wildcard scope (`*`) is granted every scope.
//!
//! Two failure kinds are kept apart:
//! - **Unauthenticated**: no token, or a token the table does not know
//! - **Forbidden**: a known token that lacks the required scope

use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Scope names understood by the REST and MCP surfaces.
pub mod scopes {
    /// Grants every scope, including ones not listed here.
    pub const WILDCARD: &str = "*";
    pub const LOGS_READ: &str = "logs:read";
    pub const STATS_READ: &str = "stats:read";
    pub const HEALTH_READ: &str = "health:read";
    pub const QUEUE_READ: &str = "queue:read";
    pub const QUEUE_RETRY: &str = "queue:retry";
    pub const ARTISAN_LIST: &str = "artisan:list";
    pub const ARTISAN_EXECUTE: &str = "artisan:execute";

    /// Every named scope (the wildcard excluded)
    pub const ALL: [&str; 7] = [
        LOGS_READ,
        STATS_READ,
        HEALTH_READ,
        QUEUE_READ,
        QUEUE_RETRY,
        ARTISAN_LIST,
        ARTISAN_EXECUTE,
    ];
}

/// Authorization failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication token required.")]
    MissingToken,

    #[error("Invalid authentication token.")]
    InvalidToken,

    #[error("Token does not have required scope: {0}")]
    InsufficientScope(String),
}

impl AuthError {
    /// Whether the caller must resupply credentials (as opposed to lacking a scope)
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AuthError::MissingToken | AuthError::InvalidToken)
    }
}

/// Read-only token table answering capability queries
#[derive(Debug, Clone, Default)]
pub struct ScopeAuthority {
    tokens: HashMap<String, HashSet<String>>,
}

impl ScopeAuthority {
    /// Build the authority from the configured token table.
    ///
    /// Blank tokens are dropped even when present in configuration, so an unset
    /// environment variable can never become a valid credential.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (String, S)>,
        S: IntoIterator<Item = String>,
    {
        let tokens = tokens
            .into_iter()
            .filter(|(token, _)| !token.trim().is_empty())
            .map(|(token, scopes)| (token, scopes.into_iter().collect()))
            .collect();

        Self { tokens }
    }

    /// Scopes granted to `token`, or `None` if the token is unknown
    pub fn scopes_for_token(&self, token: &str) -> Option<&HashSet<String>> {
        if token.trim().is_empty() {
            return None;
        }
        self.tokens.get(token)
    }

    /// Whether `token` is known and holds `scope` (directly or via `*`)
    pub fn token_has_scope(&self, token: &str, scope: &str) -> bool {
        match self.scopes_for_token(token) {
            Some(scopes) => scopes.contains(scopes::WILDCARD) || scopes.contains(scope),
            None => false,
        }
    }

    /// Number of usable tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no usable token is configured
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Resolve an `Authorization` header value and check it grants `scope`.
    ///
    /// # Returns
    ///
    /// The token's scope set on success.
    pub fn authorize(
        &self,
        authorization: Option<&str>,
        scope: &str,
    ) -> Result<&HashSet<String>, AuthError> {
        let token = authorization
            .and_then(extract_bearer)
            .ok_or(AuthError::MissingToken)?;

        let granted = self.scopes_for_token(token).ok_or_else(|| {
            warn!("Rejected request with unknown token");
            AuthError::InvalidToken
        })?;

        if !self.token_has_scope(token, scope) {
            warn!(scope = %scope, "Rejected request lacking scope");
            return Err(AuthError::InsufficientScope(scope.to_string()));
        }

        Ok(granted)
    }
}

/// Pull the credential out of an `Authorization: Bearer <token>` value
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn authority() -> ScopeAuthority {
        ScopeAuthority::new(vec![
            ("admin-token".to_string(), vec!["*".to_string()]),
            (
                "reader-token".to_string(),
                vec![scopes::LOGS_READ.to_string(), scopes::HEALTH_READ.to_string()],
            ),
            ("".to_string(), vec!["*".to_string()]),
            ("   ".to_string(), vec!["*".to_string()]),
        ])
    }

    /// Captures formatted tracing output
    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rejections_log_without_token_values() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let auth = authority();
            let _ = auth.authorize(Some("Bearer guessed-secret-value"), scopes::LOGS_READ);
            let _ = auth.authorize(Some("Bearer reader-token"), scopes::ARTISAN_EXECUTE);
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("unknown token"));
        assert!(output.contains("artisan:execute"));
        assert!(!output.contains("guessed-secret-value"));
        assert!(!output.contains("reader-token"));
    }

    #[test]
    fn test_blank_tokens_are_excluded() {
        let auth = authority();
        assert_eq!(auth.len(), 2);
        assert!(auth.scopes_for_token("").is_none());
        assert!(auth.scopes_for_token("   ").is_none());
        assert!(!auth.token_has_scope("", scopes::LOGS_READ));
    }

    #[test]
    fn test_scopes_for_known_token() {
        let auth = authority();
        let scopes = auth.scopes_for_token("reader-token").unwrap();
        assert!(scopes.contains(scopes::LOGS_READ));
        assert!(scopes.contains(scopes::HEALTH_READ));
        assert_eq!(scopes.len(), 2);
    }

    #[test]
    fn test_exact_scope_match() {
        let auth = authority();
        assert!(auth.token_has_scope("reader-token", scopes::LOGS_READ));
        assert!(!auth.token_has_scope("reader-token", scopes::QUEUE_RETRY));
        assert!(!auth.token_has_scope("reader-token", "logs"));
        assert!(!auth.token_has_scope("reader-token", "*"));
    }

    #[test]
    fn test_wildcard_grants_everything() {
        let auth = authority();
        for scope in scopes::ALL {
            assert!(auth.token_has_scope("admin-token", scope));
        }
        assert!(auth.token_has_scope("admin-token", "made-up:scope"));
    }

    #[test]
    fn test_authorize_missing_header() {
        let auth = authority();
        assert_eq!(
            auth.authorize(None, scopes::LOGS_READ),
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            auth.authorize(Some("Basic dXNlcjpwYXNz"), scopes::LOGS_READ),
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            auth.authorize(Some("Bearer "), scopes::LOGS_READ),
            Err(AuthError::MissingToken)
        );
    }

    #[test]
    fn test_authorize_unknown_token_is_unauthenticated() {
        let auth = authority();
        let err = auth
            .authorize(Some("Bearer nope"), scopes::LOGS_READ)
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
        assert!(err.is_unauthenticated());
    }

    #[test]
    fn test_authorize_missing_scope_is_forbidden() {
        let auth = authority();
        let err = auth
            .authorize(Some("Bearer reader-token"), scopes::ARTISAN_EXECUTE)
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::InsufficientScope(scopes::ARTISAN_EXECUTE.to_string())
        );
        assert!(!err.is_unauthenticated());
        assert!(err.to_string().contains("artisan:execute"));
    }

    #[test]
    fn test_authorize_success_returns_scopes() {
        let auth = authority();
        let scopes = auth
            .authorize(Some("Bearer reader-token"), scopes::HEALTH_READ)
            .unwrap();
        assert!(scopes.contains(scopes::LOGS_READ));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("bearer abc"), None);
        assert_eq!(extract_bearer("Bearer"), None);
        assert_eq!(extract_bearer("Token abc"), None);
    }

    proptest! {
        #[test]
        fn prop_unknown_tokens_have_no_scopes(token in "[a-zA-Z0-9_-]{1,40}", scope in "[a-z:*]{1,20}") {
            prop_assume!(token != "admin-token" && token != "reader-token");
            let auth = authority();
            prop_assert!(auth.scopes_for_token(&token).is_none());
            prop_assert!(!auth.token_has_scope(&token, &scope));
        }

        #[test]
        fn prop_wildcard_token_has_any_scope(scope in ".{0,30}") {
            let auth = authority();
            prop_assert!(auth.token_has_scope("admin-token", &scope));
        }
    }
}
