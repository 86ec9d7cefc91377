//! VK platform implementation

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ClientError;
use crate::http::{HttpRequest, HttpTransport};
use crate::platforms::{
    build_url, expose, fetch, parse_credentials, CallbackParams, ClientResult, ProviderPage,
    ProviderResponse, SocialNetworkClient,
};
use crate::types::SocialNetworkName;

const API_VERSION: &str = "5.131";
const SCOPE: &str = "offline,groups,photos,video,pages,wall";

#[derive(Debug, Deserialize)]
struct VkCredentials {
    #[serde(default)]
    app_id: String,
    #[serde(default, deserialize_with = "crate::platforms::secret")]
    secure_key: Option<SecretString>,
    #[serde(default)]
    user_id: String,
    #[serde(default, deserialize_with = "crate::platforms::secret")]
    access_token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_code: i64,
    error_msg: String,
}

/// `{"response": ...}` on success, `{"error": {...}}` on an API-level failure
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct GroupsResponse {
    #[serde(default)]
    items: Vec<Group>,
}

#[derive(Debug, Deserialize)]
struct Group {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(rename = "photo_200", default)]
    image: String,
}

#[derive(Debug, Deserialize)]
struct WallPostResponse {
    post_id: i64,
}

fn unwrap_envelope<T: serde::de::DeserializeOwned>(response: &ProviderResponse) -> ClientResult<T> {
    let envelope: Envelope<T> = response.json()?;

    if let Some(error) = envelope.error {
        return Err(ClientError::Api {
            endpoint: response.endpoint.clone(),
            code: error.error_code,
            message: error.error_msg,
        });
    }

    envelope.response.ok_or_else(|| ClientError::Decode {
        endpoint: response.endpoint.clone(),
        message: "missing response field".to_string(),
        body: response.body.clone(),
    })
}

/// VK client
///
/// Authorization goes through `oauth.vk.com`, everything else through the
/// versioned method API on `api.vk.com`.
pub struct VkClient {
    transport: Arc<dyn HttpTransport>,
    auth_api_url: String,
    work_api_url: String,
    redirect_uri: String,
}

impl VkClient {
    pub const AUTH_API_URL: &'static str = "https://oauth.vk.com";
    pub const WORK_API_URL: &'static str = "https://api.vk.com";

    pub fn new(transport: Arc<dyn HttpTransport>, redirect_uri: String) -> Self {
        Self {
            transport,
            auth_api_url: Self::AUTH_API_URL.to_string(),
            work_api_url: Self::WORK_API_URL.to_string(),
            redirect_uri,
        }
    }

    fn credentials(&self, raw: &str) -> ClientResult<VkCredentials> {
        parse_credentials(SocialNetworkName::Vk, raw)
    }
}

#[async_trait]
impl SocialNetworkClient for VkClient {
    fn network(&self) -> SocialNetworkName {
        SocialNetworkName::Vk
    }

    fn auth_url(&self, credentials: &str) -> ClientResult<String> {
        let credentials = self.credentials(credentials)?;

        let url = build_url(
            &self.auth_api_url,
            "/authorize",
            &[
                ("client_id", credentials.app_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
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
        let code = params.require("code")?;

        let url = build_url(
            &self.auth_api_url,
            "/access_token",
            &[
                ("client_id", credentials.app_id.as_str()),
                ("client_secret", expose(&credentials.secure_key)),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ],
        )?;

        let response = fetch(self.transport.as_ref(), HttpRequest::get(url)).await?;
        let token: TokenResponse = response.json()?;

        Ok(token.access_token)
    }

    async fn account_pages(
        &self,
        credentials: &str,
        access_token: &str,
    ) -> ClientResult<Vec<ProviderPage>> {
        let credentials = self.credentials(credentials)?;

        let url = build_url(
            &self.work_api_url,
            "/method/groups.get",
            &[
                ("access_token", access_token),
                ("user_id", credentials.user_id.as_str()),
                ("extended", "1"),
                ("filter", "admin"),
                ("fields", "id,name,photo_200"),
                ("v", API_VERSION),
            ],
        )?;

        let response = fetch(self.transport.as_ref(), HttpRequest::get(url)).await?;
        let groups: GroupsResponse = unwrap_envelope(&response)?;

        Ok(groups
            .items
            .into_iter()
            .map(|group| ProviderPage {
                id: group.id.to_string(),
                name: group.name,
                image: group.image,
                ..Default::default()
            })
            .collect())
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
            "/method/wall.post",
            &[
                ("owner_id", target_id),
                ("access_token", expose(&credentials.access_token)),
                ("from_group", "1"),
                ("message", body),
                ("v", API_VERSION),
            ],
        )?;

        let response = fetch(self.transport.as_ref(), HttpRequest::get(url)).await?;
        let post: WallPostResponse = unwrap_envelope(&response)?;

        tracing::debug!("Posted to VK wall {}: post {}", target_id, post.post_id);
        Ok(post.post_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, StubTransport};

    const CREDENTIALS: &str =
        r#"{"app_id":"51234","secure_key":"s3cr3t","service_key":"svc","user_id":"77","access_token":"GROUP"}"#;
    const REDIRECT: &str = "http://localhost:8080/auth/get_token?socialNetwork=VK";

    fn client(stub: StubTransport) -> (VkClient, Arc<StubTransport>) {
        let stub = Arc::new(stub);
        (VkClient::new(stub.clone(), REDIRECT.to_string()), stub)
    }

    #[test]
    fn test_auth_url() {
        let (client, _) = client(StubTransport::new());
        let url = url::Url::parse(&client.auth_url(CREDENTIALS).unwrap()).unwrap();
        let params = CallbackParams::from_query(url.query().unwrap());

        assert_eq!(url.host_str(), Some("oauth.vk.com"));
        assert_eq!(url.path(), "/authorize");
        assert_eq!(params.first("client_id"), Some("51234"));
        assert_eq!(params.first("redirect_uri"), Some(REDIRECT));
        assert_eq!(params.first("response_type"), Some("code"));
        assert_eq!(params.first("scope"), Some(SCOPE));
    }

    #[test]
    fn test_auth_url_ignores_unused_credential_keys() {
        let (client, _) = client(StubTransport::new());
        let url = client
            .auth_url(r#"{"app_id":"9","service_key":"svc","extra":1}"#)
            .unwrap();
        assert!(url.contains("client_id=9"));
        assert!(!url.contains("svc"));
    }

    #[test]
    fn test_auth_url_rejects_bad_credentials() {
        let (client, _) = client(StubTransport::new());
        let err = client.auth_url("not json").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Credentials {
                network: SocialNetworkName::Vk,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_access_token_exchange() {
        let (client, stub) = client(StubTransport::new().respond(
            Method::Get,
            "/access_token",
            200,
            r#"{"access_token":"T","expires_in":3600,"user_id":1}"#,
        ));

        let params = CallbackParams::new().with("code", "abc");
        let token = client.access_token(CREDENTIALS, &params).await.unwrap();
        assert_eq!(token, "T");

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query_param("client_secret").as_deref(), Some("s3cr3t"));
        assert_eq!(requests[0].query_param("code").as_deref(), Some("abc"));
        assert_eq!(requests[0].query_param("redirect_uri").as_deref(), Some(REDIRECT));
    }

    #[tokio::test]
    async fn test_access_token_missing_code_makes_no_request() {
        let (client, stub) = client(StubTransport::new());
        let err = client
            .access_token(CREDENTIALS, &CallbackParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingParam(ref key) if key == "code"));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn test_access_token_non_200() {
        let (client, _) = client(StubTransport::new().respond(
            Method::Get,
            "/access_token",
            401,
            r#"{"error":"invalid_grant"}"#,
        ));
        let params = CallbackParams::new().with("code", "abc");
        let err = client.access_token(CREDENTIALS, &params).await.unwrap_err();
        match err {
            ClientError::Status { status, body, .. } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_account_pages() {
        let (client, stub) = client(StubTransport::new().respond(
            Method::Get,
            "/method/groups.get",
            200,
            r#"{"response":{"count":2,"items":[
                {"id":101,"name":"News","photo_200":"https://vk/101.png"},
                {"id":202,"name":"Blog"}
            ]}}"#,
        ));

        let pages = client.account_pages(CREDENTIALS, "USER").await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].id, "101");
        assert_eq!(pages[0].image, "https://vk/101.png");
        assert_eq!(pages[1].name, "Blog");
        assert_eq!(pages[1].image, "");

        let request = &stub.requests()[0];
        assert_eq!(request.query_param("filter").as_deref(), Some("admin"));
        assert_eq!(request.query_param("user_id").as_deref(), Some("77"));
        assert_eq!(request.query_param("v").as_deref(), Some(API_VERSION));
    }

    #[tokio::test]
    async fn test_api_error_envelope() {
        let (client, _) = client(StubTransport::new().respond(
            Method::Get,
            "/method/groups.get",
            200,
            r#"{"error":{"error_code":5,"error_msg":"User authorization failed"}}"#,
        ));

        let err = client.account_pages(CREDENTIALS, "USER").await.unwrap_err();
        match err {
            ClientError::Api { code, message, .. } => {
                assert_eq!(code, 5);
                assert_eq!(message, "User authorization failed");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_post() {
        let (client, stub) = client(StubTransport::new().respond(
            Method::Get,
            "/method/wall.post",
            200,
            r#"{"response":{"post_id":4242}}"#,
        ));

        let id = client.create_post(CREDENTIALS, "-101", "Hello").await.unwrap();
        assert_eq!(id, "4242");

        let request = &stub.requests()[0];
        assert_eq!(request.query_param("owner_id").as_deref(), Some("-101"));
        assert_eq!(request.query_param("access_token").as_deref(), Some("GROUP"));
        assert_eq!(request.query_param("from_group").as_deref(), Some("1"));
        assert_eq!(request.query_param("message").as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_unimplemented_operations() {
        let (client, _) = client(StubTransport::new());
        assert!(matches!(
            client.delete_post().await,
            Err(ClientError::NotImplemented(_))
        ));
        assert!(matches!(
            client.upload_image().await,
            Err(ClientError::NotImplemented(_))
        ));
    }
}
