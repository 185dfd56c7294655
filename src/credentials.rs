use std::{fmt, sync::Arc};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use tracing::debug;

use crate::{
    crds::CredentialRef,
    error::{Error, Result},
};

pub const TOKEN_KEY: &str = "GITHUB_TOKEN";

/// Bearer token for the directory service. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fails with a not-found error when the secret does not exist.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;
}

pub struct CredentialResolver {
    secrets: Arc<dyn SecretStore>,
    fallback: Option<Credential>,
}

impl CredentialResolver {
    pub fn new(secrets: Arc<dyn SecretStore>, fallback: Option<Credential>) -> Self {
        Self { secrets, fallback }
    }

    /// Reads the token from `reference` if given, otherwise or when that
    /// secret carries no token uses the process wide fallback.
    pub async fn resolve(&self, reference: Option<&CredentialRef>) -> Result<Credential> {
        if let Some(reference) = reference {
            let secret = self
                .secrets
                .get_secret(&reference.namespace, &reference.name)
                .await?;

            if let Some(credential) = token_from_secret(&secret) {
                return Ok(credential);
            }
            debug!(
                secret = %reference.name,
                namespace = %reference.namespace,
                "secret has no {TOKEN_KEY}, using fallback token"
            );
        }

        self.fallback.clone().ok_or(Error::MissingCredential)
    }
}

fn token_from_secret(secret: &Secret) -> Option<Credential> {
    let data = secret.data.as_ref()?.get(TOKEN_KEY)?;
    Credential::new(String::from_utf8_lossy(&data.0))
}
