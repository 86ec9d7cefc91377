//! Immutable map from provider name to client

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::platforms::facebook::FacebookClient;
use crate::platforms::ok::OkClient;
use crate::platforms::vk::VkClient;
use crate::platforms::{redirect_uri, SocialNetworkClient};
use crate::types::SocialNetworkName;

/// Clients keyed by provider, built once at startup
///
/// `TWI` is a valid network name with no client, so lookups return an
/// `Option` and callers decide how to report the gap.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<SocialNetworkName, Arc<dyn SocialNetworkClient>>,
}

impl ClientRegistry {
    /// Register the VK, OK and Facebook clients over a shared transport
    pub fn new(transport: Arc<dyn HttpTransport>, redirect_base: &str) -> Result<Self> {
        let redirect = |network| {
            redirect_uri(redirect_base, network).map_err(|e| ConfigError::InvalidValue {
                field: "oauth.redirect_base".to_string(),
                message: e.to_string(),
            })
        };

        Ok(Self::builder()
            .register(Arc::new(VkClient::new(
                transport.clone(),
                redirect(SocialNetworkName::Vk)?,
            )))
            .register(Arc::new(OkClient::new(
                transport.clone(),
                redirect(SocialNetworkName::Odnoklassniki)?,
            )))
            .register(Arc::new(FacebookClient::new(
                transport,
                redirect(SocialNetworkName::Facebook)?,
            )))
            .build())
    }

    /// Build the production registry with a reqwest transport
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(config.http.timeout()?)?;
        Self::new(Arc::new(transport), &config.oauth.redirect_base)
    }

    pub fn builder() -> ClientRegistryBuilder {
        ClientRegistryBuilder::default()
    }

    pub fn get(&self, network: SocialNetworkName) -> Option<Arc<dyn SocialNetworkClient>> {
        self.clients.get(&network).cloned()
    }

    /// Networks with a registered client
    pub fn networks(&self) -> Vec<SocialNetworkName> {
        SocialNetworkName::ALL
            .into_iter()
            .filter(|network| self.clients.contains_key(network))
            .collect()
    }
}

#[derive(Default)]
pub struct ClientRegistryBuilder {
    clients: HashMap<SocialNetworkName, Arc<dyn SocialNetworkClient>>,
}

impl ClientRegistryBuilder {
    /// Register `client` under its own network, replacing any earlier one
    pub fn register(mut self, client: Arc<dyn SocialNetworkClient>) -> Self {
        self.clients.insert(client.network(), client);
        self
    }

    pub fn build(self) -> ClientRegistry {
        ClientRegistry {
            clients: self.clients,
        }
    }
}
