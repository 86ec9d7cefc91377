//! Facebook platform implementation
//!
//! Supports the authorization-code flow and the implicit-grant variant where
//! the redirect carries a `groupID` query parameter plus a user token in the
//! URL fragment; the latter is exchanged for that page's own token.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ClientError;
use crate::http::{HttpRequest, HttpTransport};
use crate::platforms::{
    build_url, expose, fetch, parse_credentials, CallbackParams, ClientResult, ProviderPage,
    SocialNetworkClient,
};
use crate::types::SocialNetworkName;

const GRAPH_VERSION: &str = "v16.0";
const SCOPE: &str = "pages_show_list,pages_read_engagement,pages_manage_posts";

/// Upper bound on `me/accounts` requests while following cursors
pub const MAX_PAGE_REQUESTS: usize = 20;

#[derive(Debug, Deserialize)]
struct FacebookCredentials {
    #[serde(default)]
    app_id: String,
    #[serde(default, deserialize_with = "crate::platforms::secret")]
    access_token: Option<SecretString>,
    #[serde(default, deserialize_with = "crate::platforms::secret")]
    client_secret: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    data: Vec<Account>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Account {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    cursors: Option<Cursors>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Cursors {
    #[serde(default)]
    after: Option<String>,
}

impl AccountsResponse {
    /// Cursor of the next result page, if the listing continues
    fn next_cursor(&self) -> Option<String> {
        let paging = self.paging.as_ref()?;
        paging.next.as_ref()?;
        paging
            .cursors
            .as_ref()
            .and_then(|cursors| cursors.after.clone())
            .filter(|after| !after.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    id: String,
}

/// Check that `id` is a bare Graph node id such as `42` or `42_1001`
///
/// Ids are placed in the URL path, so anything that could change the path,
/// query or fragment is rejected before a request is built.
fn graph_node(id: &str) -> ClientResult<&str> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(id)
    } else {
        Err(ClientError::InvalidUrl(format!(
            "'{}' is not a Graph object id",
            id
        )))
    }
}

/// Facebook Graph API client
pub struct FacebookClient {
    transport: Arc<dyn HttpTransport>,
    auth_api_url: String,
    work_api_url: String,
    redirect_uri: String,
}

impl FacebookClient {
    pub const AUTH_API_URL: &'static str = "https://www.facebook.com";
    pub const WORK_API_URL: &'static str = "https://graph.facebook.com";

    pub fn new(transport: Arc<dyn HttpTransport>, redirect_uri: String) -> Self {
        Self {
            transport,
            auth_api_url: Self::AUTH_API_URL.to_string(),
            work_api_url: Self::WORK_API_URL.to_string(),
            redirect_uri,
        }
    }

    fn credentials(&self, raw: &str) -> ClientResult<FacebookCredentials> {
        parse_credentials(SocialNetworkName::Facebook, raw)
    }

    async fn exchange_code(
        &self,
        credentials: &FacebookCredentials,
        code: &str,
    ) -> ClientResult<String> {
        let url = build_url(
            &self.work_api_url,
            "/oauth/access_token",
            &[
                ("client_id", credentials.app_id.as_str()),
                ("client_secret", expose(&credentials.client_secret)),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ],
        )?;

        let response = fetch(self.transport.as_ref(), HttpRequest::get(url)).await?;
        let token: TokenResponse = response.json()?;
        Ok(token.access_token)
    }

    async fn page_token(&self, group_id: &str, user_token: &str) -> ClientResult<String> {
        let url = build_url(
            &self.work_api_url,
            &format!("/{}", graph_node(group_id)?),
            &[("fields", "access_token"), ("access_token", user_token)],
        )?;

        let response = fetch(self.transport.as_ref(), HttpRequest::get(url)).await?;
        let token: TokenResponse = response.json()?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl SocialNetworkClient for FacebookClient {
    fn network(&self) -> SocialNetworkName {
        SocialNetworkName::Facebook
    }

    fn auth_url(&self, credentials: &str) -> ClientResult<String> {
        let credentials = self.credentials(credentials)?;

        let url = build_url(
            &self.auth_api_url,
            &format!("/{}/dialog/oauth", GRAPH_VERSION),
            &[
                ("client_id", credentials.app_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
                ("display", "popup"),
            ],
        )?;

        Ok(url.to_string())
    }

    async fn access_token(
        &self,
        credentials: &str,
        params: &CallbackParams,
    ) -> ClientResult<String> {
        let credentials = self.credentials(credentials)?;

        if let Some(code) = params.first("code").filter(|code| !code.is_empty()) {
            return self.exchange_code(&credentials, code).await;
        }

        match params.first("groupID").filter(|id| !id.is_empty()) {
            Some(group_id) => {
                let user_token = params.require("access_token")?;
                tracing::debug!("Exchanging implicit-grant token for page {}", group_id);
                self.page_token(group_id, user_token).await
            }
            None => Err(ClientError::MissingParam("code".to_string())),
        }
    }

    async fn account_pages(
        &self,
        _credentials: &str,
        access_token: &str,
    ) -> ClientResult<Vec<ProviderPage>> {
        let path = format!("/{}/me/accounts", GRAPH_VERSION);
        let mut pages = Vec::new();
        let mut after: Option<String> = None;

        for _ in 0..MAX_PAGE_REQUESTS {
            let mut params = vec![("admin_only", "true"), ("access_token", access_token)];
            if let Some(cursor) = after.as_deref() {
                params.push(("after", cursor));
            }

            let url = build_url(&self.work_api_url, &path, &params)?;
            let response = fetch(self.transport.as_ref(), HttpRequest::get(url)).await?;
            let data: AccountsResponse = response.json()?;

            let next = data.next_cursor();
            pages.extend(data.data.into_iter().map(|account| ProviderPage {
                id: account.id,
                name: account.name,
                access_token: account.access_token,
                ..Default::default()
            }));

            match next {
                Some(cursor) => after = Some(cursor),
                None => return Ok(pages),
            }
        }

        tracing::warn!(
            "Stopped following Facebook page cursors after {} requests",
            MAX_PAGE_REQUESTS
        );
        Ok(pages)
    }

    async fn create_post(
        &self,
        credentials: &str,
        target_id: &str,
        body: &str,
    ) -> ClientResult<String> {
        let credentials = self.credentials(credentials)?;

        let url = build_url(
            &self.work_api_url,
            &format!("/{}/feed", graph_node(target_id)?),
            &[
                ("access_token", expose(&credentials.access_token)),
                ("message", body),
            ],
        )?;

        let response = fetch(self.transport.as_ref(), HttpRequest::post(url)).await?;
        let post: PostResponse = response.json()?;

        tracing::debug!("Posted to Facebook page {}: {}", target_id, post.id);
        Ok(post.id)
    }
}
