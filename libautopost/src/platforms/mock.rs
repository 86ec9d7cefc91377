//! Mock client implementation for testing
//!
//! This module provides a configurable mock client that can simulate token
//! exchanges, page listings, posts and failures without any network access.
//! It is used by the service tests to verify orchestration logic.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::ClientError;
use crate::platforms::{CallbackParams, ClientResult, ProviderPage, SocialNetworkClient};
use crate::types::SocialNetworkName;

/// Configuration for mock client behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Provider the mock stands in for
    pub network: SocialNetworkName,

    /// Token returned by a successful exchange
    pub token: String,

    /// Pages returned by `account_pages`
    pub pages: Vec<ProviderPage>,

    /// Post id returned by `create_post`
    pub post_id: String,

    /// Error returned by `access_token` instead of the token
    pub token_error: Option<ClientError>,

    /// Error returned by `create_post` instead of the post id
    pub post_error: Option<ClientError>,

    /// Delay before completing remote operations (simulates network latency)
    pub delay: Duration,

    /// Number of times a remote operation has been called
    pub call_count: Arc<Mutex<usize>>,

    /// `(credentials, target, body)` of every post that was made
    pub posted: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            network: SocialNetworkName::Vk,
            token: "mock-token".to_string(),
            pages: Vec::new(),
            post_id: "mock-post".to_string(),
            token_error: None,
            post_error: None,
            delay: Duration::from_millis(0),
            call_count: Arc::new(Mutex::new(0)),
            posted: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock provider client for testing
#[derive(Debug, Clone)]
pub struct MockClient {
    config: MockConfig,
}

impl MockClient {
    /// Create a new mock client with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock client that always succeeds
    pub fn success(network: SocialNetworkName) -> Self {
        Self::new(MockConfig {
            network,
            ..Default::default()
        })
    }

    /// Create a mock client whose token exchange returns `token`
    pub fn with_token(network: SocialNetworkName, token: &str) -> Self {
        Self::new(MockConfig {
            network,
            token: token.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock client that lists `pages`
    pub fn with_pages(network: SocialNetworkName, pages: Vec<ProviderPage>) -> Self {
        Self::new(MockConfig {
            network,
            pages,
            ..Default::default()
        })
    }

    /// Create a mock client whose token exchange fails
    pub fn token_failure(network: SocialNetworkName, error: ClientError) -> Self {
        Self::new(MockConfig {
            network,
            token_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock client whose posts fail
    pub fn post_failure(network: SocialNetworkName, error: ClientError) -> Self {
        Self::new(MockConfig {
            network,
            post_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock client with a delay on every remote operation
    pub fn with_delay(network: SocialNetworkName, delay: Duration) -> Self {
        Self::new(MockConfig {
            network,
            delay,
            ..Default::default()
        })
    }

    /// Number of remote operations performed so far
    pub fn call_count(&self) -> usize {
        *self
            .config
            .call_count
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every post made so far
    pub fn posted(&self) -> Vec<(String, String, String)> {
        self.config
            .posted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn remote_call(&self) {
        *self
            .config
            .call_count
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }
}

#[async_trait]
impl SocialNetworkClient for MockClient {
    fn network(&self) -> SocialNetworkName {
        self.config.network
    }

    fn auth_url(&self, credentials: &str) -> ClientResult<String> {
        serde_json::from_str::<serde_json::Value>(credentials).map_err(|e| {
            ClientError::Credentials {
                network: self.config.network,
                message: e.to_string(),
            }
        })?;

        Ok(format!(
            "https://mock.example/authorize?network={}",
            self.config.network
        ))
    }

    async fn access_token(
        &self,
        _credentials: &str,
        params: &CallbackParams,
    ) -> ClientResult<String> {
        params.require("code")?;
        self.remote_call().await;

        match &self.config.token_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.config.token.clone()),
        }
    }

    async fn account_pages(
        &self,
        _credentials: &str,
        _access_token: &str,
    ) -> ClientResult<Vec<ProviderPage>> {
        self.remote_call().await;
        Ok(self.config.pages.clone())
    }

    async fn create_post(
        &self,
        credentials: &str,
        target_id: &str,
        body: &str,
    ) -> ClientResult<String> {
        self.remote_call().await;

        if let Some(error) = &self.config.post_error {
            return Err(error.clone());
        }

        self.config
            .posted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((
                credentials.to_string(),
                target_id.to_string(),
                body.to_string(),
            ));

        Ok(self.config.post_id.clone())
    }
}
