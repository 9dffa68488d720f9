//! Bearer credentials for the backend, held in an explicit context object
//! that every client shares by cloning.

use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    tokens: Arc<RwLock<Option<Tokens>>>,
}

impl Session {
    /// A session with no credentials; requests go out unauthenticated.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session already holding an access token.
    pub fn with_token(access_token: impl Into<String>) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(Some(Tokens {
                access_token: access_token.into(),
                refresh_token: None,
            }))),
        }
    }

    pub async fn store(&self, tokens: Tokens) {
        *self.tokens.write().await = Some(tokens);
    }

    pub async fn clear(&self) {
        *self.tokens.write().await = None;
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }
}
