//! Account, authorization and page operations
//!
//! The service validates raw input, resolves the provider client from the
//! registry and composes repository and client calls. Provider failures are
//! wrapped as [`AutopostError::Provider`], which classifies as internal.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{AutopostError, Result};
use crate::platforms::{CallbackParams, ClientRegistry, ProviderPage, SocialNetworkClient};
use crate::repository::{AccountFilter, AccountRepository, PageFilter, PageRepository};
use crate::types::{
    AccessToken, SocialNetworkAccount, SocialNetworkName, SocialNetworkPage,
    SocialNetworkPageInfo,
};

/// Input for [`SocialNetworkService::create_page`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatePageInput {
    pub account_id: i64,
    pub project: String,
    /// Provider-side page id
    pub page_id: String,
    pub name: String,
    pub description: Option<String>,
    pub preview_image: Option<String>,
    pub access_token: Option<AccessToken>,
}

/// Outcome of storing one provider page during an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedPage {
    pub id: i64,
    pub page_id: String,
    pub name: String,
    /// False when an existing row was updated
    pub created: bool,
}

#[derive(Clone)]
pub struct SocialNetworkService {
    pub(crate) accounts: Arc<dyn AccountRepository>,
    pub(crate) pages: Arc<dyn PageRepository>,
    pub(crate) clients: Arc<ClientRegistry>,
}

impl SocialNetworkService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        pages: Arc<dyn PageRepository>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            accounts,
            pages,
            clients,
        }
    }

    pub(crate) fn client(&self, network: SocialNetworkName) -> Result<Arc<dyn SocialNetworkClient>> {
        self.clients.get(network).ok_or_else(|| {
            AutopostError::Internal(format!("social network {} is not supported yet", network))
        })
    }

    /// Store a new account for `network`
    ///
    /// # Errors
    ///
    /// - `Validation` if `network` is not a known name
    /// - `AccountAlreadyExists` if the network already has an account
    pub async fn create_account(
        &self,
        network: &str,
        credentials: &str,
    ) -> Result<SocialNetworkAccount> {
        let network = SocialNetworkName::parse(network).inspect_err(|e| {
            tracing::warn!("{}", e);
        })?;

        let mut account = SocialNetworkAccount::new(network, credentials.to_string());
        account.id = self.accounts.create_account(&account).await?;

        Ok(account)
    }

    pub async fn get_account(&self, network: &str) -> Result<SocialNetworkAccount> {
        let network = SocialNetworkName::parse(network)?;

        self.accounts
            .find_by_social_network(network)
            .await?
            .ok_or_else(|| {
                AutopostError::NotFound(format!("social network {} accounts not found", network))
            })
    }

    /// Stored accounts, restricted to `networks` when it is non-empty
    pub async fn find_accounts(&self, networks: &[&str]) -> Result<Vec<SocialNetworkAccount>> {
        let filter = AccountFilter {
            social_network_any_of: networks
                .iter()
                .map(|network| SocialNetworkName::parse(network))
                .collect::<Result<_>>()?,
        };

        self.accounts.find_accounts(&filter).await
    }

    pub fn auth_url(&self, network: &str, credentials: &str) -> Result<String> {
        let network = SocialNetworkName::parse(network)?;

        self.client(network)?
            .auth_url(credentials)
            .map_err(AutopostError::provider(network, "get auth url"))
    }

    /// Authorization URL built from the stored credentials of `network`
    pub async fn account_auth_url(&self, network: &str) -> Result<String> {
        let account = self.get_account(network).await?;
        self.auth_url(account.social_network.as_str(), &account.credentials)
    }

    pub async fn access_token(
        &self,
        account: &SocialNetworkAccount,
        params: &CallbackParams,
    ) -> Result<String> {
        self.client(account.social_network)?
            .access_token(&account.credentials, params)
            .await
            .map_err(AutopostError::provider(account.social_network, "get access token"))
    }

    /// Attach `token` to `account` and persist it
    ///
    /// The expiry follows the provider policy at the time of saving. When the
    /// update fails `account` keeps its previous token.
    pub async fn save_access_token(
        &self,
        token: String,
        account: &mut SocialNetworkAccount,
    ) -> Result<()> {
        let mut updated = account.clone();
        updated.access_token = Some(AccessToken::issued(
            account.social_network,
            token,
            Utc::now(),
        ));

        self.accounts.update_account(&updated).await?;
        *account = updated;

        tracing::info!("Saved access token for {} account", account.social_network);
        Ok(())
    }

    /// Complete an OAuth redirect: exchange the callback for a token and store it
    ///
    /// The network is read from the `socialNetwork` parameter. For Facebook a
    /// `project` parameter selects the stored page whose id is passed on as
    /// `groupID` when the callback does not carry one.
    pub async fn handle_auth_callback(
        &self,
        params: &CallbackParams,
    ) -> Result<SocialNetworkAccount> {
        let network = params.first("socialNetwork").ok_or_else(|| {
            AutopostError::validation(
                "url param socialNetwork not found",
                "socialNetwork",
                "required",
            )
        })?;

        let mut account = self.get_account(network).await?;

        let mut params = params.clone();
        if account.social_network == SocialNetworkName::Facebook && params.first("groupID").is_none()
        {
            if let Some(project) = params.first("project").map(str::to_string) {
                let page = self
                    .find_pages(Some(account.id), Some(&project))
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        AutopostError::NotFound(format!(
                            "no FB page stored for project {}",
                            project
                        ))
                    })?;
                params.insert("groupID", page.page_id);
            }
        }

        let token = self.access_token(&account, &params).await?;
        self.save_access_token(token, &mut account).await?;

        Ok(account)
    }

    /// Store a page, returning its row id
    ///
    /// A page that already exists for the account is updated and reported as
    /// `PageAlreadyExists`.
    pub async fn create_page(&self, input: CreatePageInput) -> Result<i64> {
        if input.page_id.is_empty() {
            return Err(AutopostError::validation(
                "page id must not be empty",
                "pageId",
                "required",
            ));
        }

        let page = SocialNetworkPage {
            id: 0,
            account_id: input.account_id,
            project: input.project,
            page_id: input.page_id,
            page_info: SocialNetworkPageInfo {
                name: input.name,
                description: input.description.unwrap_or_default(),
                preview_image: input.preview_image.unwrap_or_default(),
            },
            access_token: input.access_token,
        };

        self.pages.create_page(&page).await
    }

    pub async fn find_pages(
        &self,
        account_id: Option<i64>,
        project: Option<&str>,
    ) -> Result<Vec<SocialNetworkPage>> {
        self.pages
            .find_pages(&PageFilter {
                account_id,
                project: project.map(str::to_string),
            })
            .await
    }

    /// Pages the account administers, as listed by the provider right now
    pub async fn pages_from_social_network(
        &self,
        account: &SocialNetworkAccount,
    ) -> Result<Vec<ProviderPage>> {
        let token = account
            .access_token
            .as_ref()
            .filter(|token| !token.token.is_empty())
            .ok_or_else(|| {
                AutopostError::validation(
                    format!(
                        "social network {} account has no access token",
                        account.social_network
                    ),
                    "accessToken",
                    "required",
                )
            })?;

        self.client(account.social_network)?
            .account_pages(&account.credentials, &token.token)
            .await
            .map_err(AutopostError::provider(account.social_network, "get account pages"))
    }

    /// List the provider pages of `account` and store each under `project`
    pub async fn import_pages(
        &self,
        account: &SocialNetworkAccount,
        project: &str,
    ) -> Result<Vec<ImportedPage>> {
        let now = Utc::now();
        let mut imported = Vec::new();

        for page in self.pages_from_social_network(account).await? {
            let input = CreatePageInput {
                account_id: account.id,
                project: project.to_string(),
                page_id: page.id.clone(),
                name: page.name.clone(),
                description: Some(page.description),
                preview_image: Some(page.image),
                access_token: page
                    .access_token
                    .map(|token| AccessToken::issued(account.social_network, token, now)),
            };

            let (id, created) = match self.create_page(input).await {
                Ok(id) => (id, true),
                Err(AutopostError::PageAlreadyExists { page_id, .. }) => (page_id, false),
                Err(e) => return Err(e),
            };

            imported.push(ImportedPage {
                id,
                page_id: page.id,
                name: page.name,
                created,
            });
        }

        tracing::info!(
            "Imported {} {} pages into project {}",
            imported.len(),
            account.social_network,
            project
        );
        Ok(imported)
    }
}
