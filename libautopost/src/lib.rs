//! Autopost - publish to VK, OK and Facebook through one interface
//!
//! This library links social network accounts, runs their OAuth flows,
//! lists and stores the pages an account administers, and publishes posts
//! through per-provider clients behind a single trait.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod logging;
pub mod platforms;
pub mod repository;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{AutopostError, ErrorKind, Result};
pub use platforms::{CallbackParams, ClientRegistry, ProviderPage, SocialNetworkClient};
pub use service::{AutopostService, SocialNetworkService};
pub use types::{
    AccessToken, PostData, SocialNetworkAccount, SocialNetworkName, SocialNetworkPage,
    SocialNetworkPageInfo, SocialNetworkPost,
};
