//! Storage contract consumed by the service layer
//!
//! [`crate::db::Database`] implements both traits on SQLite. Uniqueness of
//! accounts per network and of pages per `(account_id, page_id)` is enforced
//! here rather than by the service, so concurrent creators cannot race past
//! a check.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{SocialNetworkAccount, SocialNetworkName, SocialNetworkPage};

/// Account selection; an empty network list matches every account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFilter {
    pub social_network_any_of: Vec<SocialNetworkName>,
}

impl AccountFilter {
    pub fn network(network: SocialNetworkName) -> Self {
        Self {
            social_network_any_of: vec![network],
        }
    }
}

/// Page selection; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFilter {
    pub account_id: Option<i64>,
    pub project: Option<String>,
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account and return its id
    ///
    /// # Errors
    ///
    /// `AutopostError::AccountAlreadyExists` if the network already has an
    /// account; the stored row is left unchanged.
    async fn create_account(&self, account: &SocialNetworkAccount) -> Result<i64>;

    async fn find_accounts(&self, filter: &AccountFilter) -> Result<Vec<SocialNetworkAccount>>;

    /// Overwrite credentials and token of the account with `account.id`
    ///
    /// # Errors
    ///
    /// `AutopostError::NotFound` if no such account is stored.
    async fn update_account(&self, account: &SocialNetworkAccount) -> Result<()>;

    async fn find_by_social_network(
        &self,
        network: SocialNetworkName,
    ) -> Result<Option<SocialNetworkAccount>>;
}

#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Insert or update the page keyed by `(account_id, page_id)`
    ///
    /// Returns the new row id. When the page already existed the row is
    /// updated in place and `AutopostError::PageAlreadyExists` carries the
    /// existing id.
    async fn create_page(&self, page: &SocialNetworkPage) -> Result<i64>;

    async fn find_pages(&self, filter: &PageFilter) -> Result<Vec<SocialNetworkPage>>;
}
