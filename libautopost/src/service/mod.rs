//! Service layer for Autopost
//!
//! `AutopostService` wires storage, configuration and provider clients
//! together for the CLI. All operations live on [`SocialNetworkService`]:
//!
//! - accounts: create, look up and list linked accounts
//! - authorization: build OAuth URLs and complete redirects
//! - pages: list provider pages and store publishing targets
//! - posting: accept and publish posts
//!
//! # Example
//!
//! ```no_run
//! use libautopost::service::AutopostService;
//!
//! # async fn example() -> libautopost::Result<()> {
//! let service = AutopostService::new().await?;
//!
//! let url = service.social_networks().account_auth_url("VK").await?;
//! println!("Authorize at {}", url);
//! # Ok(())
//! # }
//! ```

pub mod posting;
pub mod social_network;

pub use posting::PublishedPost;
pub use social_network::{CreatePageInput, ImportedPage, SocialNetworkService};

use std::sync::Arc;

use crate::error::ConfigError;
use crate::platforms::ClientRegistry;
use crate::{Config, Database, Result};

/// Main service facade
///
/// Owns the shared `Arc<Database>` used as both account and page storage.
pub struct AutopostService {
    db: Arc<Database>,
    social_networks: SocialNetworkService,
}

impl AutopostService {
    /// Create a service from the configuration at the default location
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration cannot be loaded
    /// - Database cannot be initialized or migrated
    /// - The HTTP client cannot be built
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(&config).await
    }

    /// Create a service with production clients for `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let registry = ClientRegistry::from_config(config)?;
        Self::with_registry(config, registry).await
    }

    /// Create a service with a caller-supplied client registry
    pub async fn with_registry(config: &Config, registry: ClientRegistry) -> Result<Self> {
        let db_path = config.database_path();
        let db_path_str = db_path.to_str().ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "database.path".to_string(),
                message: "path is not valid UTF-8".to_string(),
            }
        })?;
        let db = Arc::new(Database::new(db_path_str).await?);

        let social_networks =
            SocialNetworkService::new(db.clone(), db.clone(), Arc::new(registry));

        Ok(Self {
            db,
            social_networks,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn social_networks(&self) -> &SocialNetworkService {
        &self.social_networks
    }
}
