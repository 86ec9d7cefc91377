//! Provider client abstraction and implementations
//!
//! Every social network is reached through one [`SocialNetworkClient`]
//! implementation. Clients own the provider quirks: how the authorization URL
//! is assembled, how callback parameters are exchanged for a token, how admin
//! pages are listed and enriched, and how a post is submitted. The service
//! layer only ever sees the normalized results and [`ClientError`]s.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use libautopost::http::ReqwestTransport;
//! use libautopost::platforms::{vk::VkClient, CallbackParams, SocialNetworkClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(ReqwestTransport::new(std::time::Duration::from_secs(30))?);
//! let client = VkClient::new(
//!     transport,
//!     "http://localhost:8080/auth/get_token?socialNetwork=VK".to_string(),
//! );
//!
//! let credentials = r#"{"app_id":"51234","secure_key":"s3cr3t","user_id":"1"}"#;
//! println!("Open {}", client.auth_url(credentials)?);
//!
//! let params = CallbackParams::new().with("code", "abc");
//! let token = client.access_token(credentials, &params).await?;
//! for page in client.account_pages(credentials, &token).await? {
//!     println!("{} {}", page.id, page.name);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use url::Url;

use crate::error::ClientError;
use crate::http::{HttpRequest, HttpTransport};
use crate::types::SocialNetworkName;

pub mod facebook;
pub mod ok;
pub mod registry;
pub mod vk;

// Mock client is available for all builds so integration tests can use it
pub mod mock;

pub use registry::ClientRegistry;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Uniform contract implemented once per provider
///
/// `credentials` is always the raw JSON stored on the account; each client
/// parses it into its own credential shape.
#[async_trait]
pub trait SocialNetworkClient: Send + Sync {
    /// Provider this client talks to
    fn network(&self) -> SocialNetworkName;

    /// Build the OAuth authorization URL the operator opens in a browser
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Credentials` if the credentials JSON cannot be
    /// parsed.
    fn auth_url(&self, credentials: &str) -> ClientResult<String>;

    /// Exchange OAuth callback parameters for an access token
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the credentials cannot be parsed (`ClientError::Credentials`)
    /// - a required callback parameter is absent (`ClientError::MissingParam`)
    /// - the HTTP call fails or answers with a non-200 status
    /// - the body is not the expected token envelope (`ClientError::Decode`)
    async fn access_token(&self, credentials: &str, params: &CallbackParams)
        -> ClientResult<String>;

    /// List the pages the token holder administers
    ///
    /// Enrichment failures (for example a missing preview image) are logged and
    /// leave the affected field empty instead of failing the listing.
    async fn account_pages(
        &self,
        credentials: &str,
        access_token: &str,
    ) -> ClientResult<Vec<ProviderPage>>;

    /// Publish `body` to `target_id` using the `access_token` in `credentials`
    ///
    /// Returns the provider-assigned post id.
    async fn create_post(&self, credentials: &str, target_id: &str, body: &str)
        -> ClientResult<String>;

    async fn delete_post(&self) -> ClientResult<()> {
        Err(ClientError::NotImplemented(format!(
            "{} delete post",
            self.network()
        )))
    }

    async fn upload_image(&self) -> ClientResult<()> {
        Err(ClientError::NotImplemented(format!(
            "{} upload image",
            self.network()
        )))
    }
}

/// A page as listed by a provider, before it is stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderPage {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image: String,
    /// Page-scoped token, only returned by providers that issue one
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

/// Parameters received on the OAuth redirect
///
/// A multi-map like a parsed query string. Implicit-grant flows deliver the
/// token in the URL fragment, so [`CallbackParams::from_callback_url`] merges
/// fragment parameters in after the query ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    values: HashMap<String, Vec<String>>,
}

impl CallbackParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`CallbackParams::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// First value recorded for `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First non-empty value for `key`, or `ClientError::MissingParam`
    pub fn require(&self, key: &str) -> ClientResult<&str> {
        self.first(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ClientError::MissingParam(key.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a raw query string such as `code=abc&socialNetwork=VK`
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Parse the full redirect URL, including fragment parameters
    pub fn from_callback_url(raw: &str) -> ClientResult<Self> {
        let url = Url::parse(raw).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let mut params: CallbackParams = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if let Some(fragment) = url.fragment() {
            for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
                params.insert(key.into_owned(), value.into_owned());
            }
        }

        Ok(params)
    }
}

impl FromIterator<(String, String)> for CallbackParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut params = CallbackParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Redirect URI registered with a provider: `{base}?socialNetwork={NAME}`
pub fn redirect_uri(base: &str, network: SocialNetworkName) -> ClientResult<String> {
    let mut url = Url::parse(base).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("socialNetwork", network.as_str());
    Ok(url.to_string())
}

/// Parse the stored credential JSON of `network`
///
/// The raw credentials never appear in the error; they carry secrets.
pub(crate) fn parse_credentials<T: DeserializeOwned>(
    network: SocialNetworkName,
    raw: &str,
) -> ClientResult<T> {
    serde_json::from_str(raw).map_err(|e| ClientError::Credentials {
        network,
        message: e.to_string(),
    })
}

/// Deserialize an optional credential secret
pub(crate) fn secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(SecretString::from))
}

/// Secret value, or empty when the credential does not carry it
pub(crate) fn expose(secret: &Option<SecretString>) -> &str {
    secret.as_ref().map(|s| s.expose_secret()).unwrap_or("")
}

/// Join `base` and `path` and append `params` to the query string
pub(crate) fn build_url(base: &str, path: &str, params: &[(&str, &str)]) -> ClientResult<Url> {
    let mut url = Url::parse(&format!("{}{}", base, path))
        .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter().copied());
    }

    Ok(url)
}

/// Successful (status 200) provider response
#[derive(Debug, Clone)]
pub(crate) struct ProviderResponse {
    pub endpoint: String,
    pub body: String,
}

impl ProviderResponse {
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_str(&self.body).map_err(|e| ClientError::Decode {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
            body: self.body.clone(),
        })
    }
}

/// Send `request` and normalize every non-200 outcome into a `ClientError`
pub(crate) async fn fetch(
    transport: &dyn HttpTransport,
    request: HttpRequest,
) -> ClientResult<ProviderResponse> {
    let endpoint = request.endpoint();
    tracing::debug!("{} {}", request.method, endpoint);

    let response = transport.send(request).await.map_err(|e| {
        if e.timed_out {
            ClientError::Cancelled {
                endpoint: endpoint.clone(),
                message: e.message,
            }
        } else {
            ClientError::Transport {
                endpoint: endpoint.clone(),
                message: e.message,
            }
        }
    })?;

    tracing::debug!("{} answered with status {}", endpoint, response.status);

    if response.status != 200 {
        return Err(ClientError::Status {
            endpoint,
            status: response.status,
            body: response.body,
        });
    }

    Ok(ProviderResponse {
        endpoint,
        body: response.body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, StubTransport};

    #[test]
    fn test_callback_params_from_query() {
        let params = CallbackParams::from_query("?code=abc&socialNetwork=VK&code=def");
        assert_eq!(params.first("code"), Some("abc"));
        assert_eq!(params.first("socialNetwork"), Some("VK"));
        assert_eq!(params.first("state"), None);
    }

    #[test]
    fn test_callback_params_merges_fragment() {
        let params = CallbackParams::from_callback_url(
            "http://localhost:8080/auth/get_token?socialNetwork=FB&groupID=42#access_token=USER&expires_in=0",
        )
        .unwrap();
        assert_eq!(params.first("socialNetwork"), Some("FB"));
        assert_eq!(params.first("groupID"), Some("42"));
        assert_eq!(params.first("access_token"), Some("USER"));
    }

    #[test]
    fn test_callback_params_require() {
        let params = CallbackParams::new().with("code", "").with("state", "x");
        match params.require("code") {
            Err(ClientError::MissingParam(key)) => assert_eq!(key, "code"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(params.require("state").unwrap(), "x");
    }

    #[test]
    fn test_redirect_uri() {
        assert_eq!(
            redirect_uri("http://localhost:8080/auth/get_token", SocialNetworkName::Odnoklassniki)
                .unwrap(),
            "http://localhost:8080/auth/get_token?socialNetwork=OK"
        );
        assert!(redirect_uri("not a url", SocialNetworkName::Vk).is_err());
    }

    #[test]
    fn test_build_url_without_params_has_no_query() {
        let url = build_url("https://api.vk.com", "/method/groups.get", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.vk.com/method/groups.get");

        let url = build_url("https://api.vk.com", "/method/wall.post", &[("message", "a b&c")])
            .unwrap();
        assert_eq!(url.query(), Some("message=a+b%26c"));
    }

    #[test]
    fn test_parse_credentials_hides_raw_input() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Creds {
            app_id: String,
        }

        let err = parse_credentials::<Creds>(SocialNetworkName::Vk, r#"{"secure_key":"hunter2"}"#)
            .unwrap_err();
        assert!(matches!(err, ClientError::Credentials { .. }));
        assert!(!err.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_fetch_non_200_keeps_status_and_body() {
        let stub = StubTransport::new().respond(Method::Get, "/access_token", 401, "denied");
        let request = HttpRequest::get(
            Url::parse("https://oauth.vk.com/access_token?client_secret=s3cr3t").unwrap(),
        );

        let err = fetch(&stub, request).await.unwrap_err();
        match &err {
            ClientError::Status {
                endpoint,
                status,
                body,
            } => {
                assert_eq!(endpoint, "https://oauth.vk.com/access_token");
                assert_eq!(*status, 401);
                assert_eq!(body, "denied");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!err.to_string().contains("s3cr3t"));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_cancelled() {
        let stub = StubTransport::new().time_out(Method::Get, "/slow");
        let request = HttpRequest::get(Url::parse("https://api.ok.ru/slow").unwrap());
        let err = fetch(&stub, request).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled { .. }));
    }
}
