use async_trait::async_trait;
use tagtrack_models::settings::Auth;

/// Resolved caller identity attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub subject: String,
}

/// Authentication collaborator seam.
///
/// The core never issues or validates tokens itself; it hands the opaque
/// bearer token to whatever sits behind this trait.
#[async_trait]
pub trait IdentityResolver: Send + Sync + 'static {
    /// Resolve an opaque bearer token to a caller identity, or None if
    /// the token is unknown.
    async fn resolve(&self, token: &str) -> Option<CallerIdentity>;
}

/// Static token list from configuration.
///
/// Suitable for machine-to-machine deployments; anything richer (OIDC,
/// sessions) plugs in behind the same trait.
pub struct StaticTokenResolver {
    tokens: Vec<(String, String)>,
}

impl StaticTokenResolver {
    pub fn new(auth: &Auth) -> Self {
        Self {
            tokens: auth
                .tokens
                .iter()
                .map(|t| (t.token.clone(), t.subject.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityResolver for StaticTokenResolver {
    async fn resolve(&self, token: &str) -> Option<CallerIdentity> {
        self.tokens
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, subject)| CallerIdentity {
                subject: subject.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagtrack_models::settings::StaticToken;

    #[tokio::test]
    async fn static_resolver_matches_configured_tokens() {
        let auth = Auth {
            enabled: true,
            tokens: vec![StaticToken {
                token: "s3cret".into(),
                subject: "warehouse-dashboard".into(),
            }],
        };
        let resolver = StaticTokenResolver::new(&auth);
        let id = resolver.resolve("s3cret").await.unwrap();
        assert_eq!(id.subject, "warehouse-dashboard");
        assert!(resolver.resolve("nope").await.is_none());
    }
}
