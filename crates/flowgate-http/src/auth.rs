//! Principal resolution, the identity seam in front of every endpoint.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable identifier; session ownership is keyed on this.
    pub id: String,
    /// Display name for logs.
    pub name: String,
}

impl Principal {
    /// Create a principal with the same id and display name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
        }
    }
}

/// Why resolution failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credentials were presented.
    #[error("missing credentials")]
    Missing,
    /// Credentials were presented but did not match.
    #[error("invalid credentials")]
    Invalid,
}

/// Resolves the Authorization header to a principal.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Resolve a bearer token (already stripped of the `Bearer ` prefix) to
    /// a principal.
    async fn resolve(&self, bearer: Option<&str>) -> Result<Principal, AuthError>;
}

/// Accepts every request as one fixed local principal. The development
/// default when no tokens are configured.
pub struct OpenResolver {
    principal: Principal,
}

impl OpenResolver {
    /// Resolver mapping every caller to the given principal.
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    /// Resolver for a single local operator.
    pub fn local() -> Self {
        Self::new(Principal::named("local"))
    }
}

#[async_trait]
impl PrincipalResolver for OpenResolver {
    async fn resolve(&self, _bearer: Option<&str>) -> Result<Principal, AuthError> {
        Ok(self.principal.clone())
    }
}

/// Fixed token-to-principal map, loaded from configuration.
pub struct StaticTokenResolver {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenResolver {
    /// Build a resolver from (token, principal name) pairs.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let tokens = entries
            .into_iter()
            .map(|(token, name)| (token, Principal::named(name)))
            .collect();
        Self { tokens }
    }
}

#[async_trait]
impl PrincipalResolver for StaticTokenResolver {
    async fn resolve(&self, bearer: Option<&str>) -> Result<Principal, AuthError> {
        let token = bearer.ok_or(AuthError::Missing)?;
        self.tokens.get(token).cloned().ok_or(AuthError::Invalid)
    }
}
