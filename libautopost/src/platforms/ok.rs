//! OK (Odnoklassniki) platform implementation
//!
//! Page listing takes three kinds of calls: the user's groups, one batched
//! info lookup for the groups the user administers, then one photo lookup per
//! page for its preview image. Photo lookups run concurrently and a failed
//! lookup only costs that page its image.

use async_trait::async_trait;
use futures::future::join_all;
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

const SCOPE: &str = "VALUABLE_ACCESS;LONG_ACCESS_TOKEN;PHOTO_CONTENT;GROUP_CONTENT;VIDEO_CONTENT";
const ADMIN_STATUS: &str = "ADMIN";

#[derive(Debug, Deserialize)]
struct OkCredentials {
    #[serde(default)]
    app_id: String,
    #[serde(default)]
    public_key: String,
    #[serde(default, deserialize_with = "crate::platforms::secret")]
    secret_key: Option<SecretString>,
    #[serde(default, deserialize_with = "crate::platforms::secret")]
    access_token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserGroupsResponse {
    #[serde(default)]
    groups: Vec<UserGroup>,
}

#[derive(Debug, Deserialize)]
struct UserGroup {
    #[serde(rename = "groupId")]
    group_id: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct GroupInfo {
    uid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    photo_id: String,
}

#[derive(Debug, Deserialize)]
struct PhotoInfoResponse {
    photo: PhotoInfo,
}

#[derive(Debug, Deserialize)]
struct PhotoInfo {
    #[serde(default)]
    pic128x128: String,
}

/// OK reports API failures with status 200 and an `error_code` object
fn check_api_error(response: &ProviderResponse) -> ClientResult<()> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&response.body) else {
        return Ok(());
    };

    match value.get("error_code").and_then(|code| code.as_i64()) {
        Some(code) => Err(ClientError::Api {
            endpoint: response.endpoint.clone(),
            code,
            message: value
                .get("error_msg")
                .and_then(|msg| msg.as_str())
                .unwrap_or_default()
                .to_string(),
        }),
        None => Ok(()),
    }
}

/// Wrap post text into a mediatopic attachment
fn attachment(body: &str) -> String {
    serde_json::json!({
        "media": [{"type": "text", "text": body}]
    })
    .to_string()
}

/// OK client
pub struct OkClient {
    transport: Arc<dyn HttpTransport>,
    auth_api_url: String,
    work_api_url: String,
    redirect_uri: String,
}

impl OkClient {
    pub const AUTH_API_URL: &'static str = "https://connect.ok.ru";
    pub const WORK_API_URL: &'static str = "https://api.ok.ru";

    pub fn new(transport: Arc<dyn HttpTransport>, redirect_uri: String) -> Self {
        Self {
            transport,
            auth_api_url: Self::AUTH_API_URL.to_string(),
            work_api_url: Self::WORK_API_URL.to_string(),
            redirect_uri,
        }
    }

    fn credentials(&self, raw: &str) -> ClientResult<OkCredentials> {
        parse_credentials(SocialNetworkName::Odnoklassniki, raw)
    }

    /// GET a signed-session API method and reject API-level errors
    async fn call(
        &self,
        credentials: &OkCredentials,
        access_token: &str,
        method: &str,
        params: &[(&str, &str)],
    ) -> ClientResult<ProviderResponse> {
        let mut query = vec![
            ("application_key", credentials.public_key.as_str()),
            ("access_token", access_token),
            ("session_secret_key", expose(&credentials.secret_key)),
            ("format", "json"),
        ];
        query.extend_from_slice(params);

        let url = build_url(&self.work_api_url, method, &query)?;
        let response = fetch(self.transport.as_ref(), HttpRequest::get(url)).await?;
        check_api_error(&response)?;

        Ok(response)
    }

    async fn image_url(
        &self,
        credentials: &OkCredentials,
        access_token: &str,
        photo_id: &str,
    ) -> ClientResult<String> {
        let response = self
            .call(
                credentials,
                access_token,
                "/api/photos/getPhotoInfo",
                &[("photo_id", photo_id), ("fields", "photo.PIC128X128")],
            )
            .await?;

        let info: PhotoInfoResponse = response.json()?;
        Ok(info.photo.pic128x128)
    }

    async fn pages_info(
        &self,
        credentials: &OkCredentials,
        access_token: &str,
        group_ids: &[String],
    ) -> ClientResult<Vec<ProviderPage>> {
        let uids = group_ids.join(",");
        let response = self
            .call(
                credentials,
                access_token,
                "/api/group/getInfo",
                &[
                    ("uids", uids.as_str()),
                    ("fields", "name,description,photo_id,uid"),
                ],
            )
            .await?;
        let groups: Vec<GroupInfo> = response.json()?;

        let images = join_all(groups.iter().map(|group| async move {
            if group.photo_id.is_empty() {
                return String::new();
            }

            match self.image_url(credentials, access_token, &group.photo_id).await {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(
                        "Failed to get image info for OK photo {}: {}",
                        group.photo_id,
                        e
                    );
                    String::new()
                }
            }
        }))
        .await;

        Ok(groups
            .into_iter()
            .zip(images)
            .map(|(group, image)| ProviderPage {
                id: group.uid,
                name: group.name,
                description: group.description,
                image,
                access_token: None,
            })
            .collect())
    }
}

#[async_trait]
impl SocialNetworkClient for OkClient {
    fn network(&self) -> SocialNetworkName {
        SocialNetworkName::Odnoklassniki
    }

    fn auth_url(&self, credentials: &str) -> ClientResult<String> {
        let credentials = self.credentials(credentials)?;

        let url = build_url(
            &self.auth_api_url,
            "/oauth/authorize",
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
            &self.work_api_url,
            "/oauth/token.do",
            &[
                ("code", code),
                ("client_id", credentials.app_id.as_str()),
                ("client_secret", expose(&credentials.secret_key)),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ],
        )?;

        let response = fetch(self.transport.as_ref(), HttpRequest::post(url)).await?;
        check_api_error(&response)?;
        let token: TokenResponse = response.json()?;

        Ok(token.access_token)
    }

    async fn account_pages(
        &self,
        credentials: &str,
        access_token: &str,
    ) -> ClientResult<Vec<ProviderPage>> {
        let credentials = self.credentials(credentials)?;

        let response = self
            .call(&credentials, access_token, "/api/group/getUserGroupsV2", &[])
            .await?;
        let data: UserGroupsResponse = response.json()?;

        let admin_ids: Vec<String> = data
            .groups
            .into_iter()
            .filter(|group| group.status == ADMIN_STATUS)
            .map(|group| group.group_id)
            .collect();

        if admin_ids.is_empty() {
            tracing::debug!("OK account administers no groups");
            return Ok(Vec::new());
        }

        self.pages_info(&credentials, access_token, &admin_ids).await
    }

    async fn create_post(
        &self,
        credentials: &str,
        target_id: &str,
        body: &str,
    ) -> ClientResult<String> {
        let credentials = self.credentials(credentials)?;
        let attachment = attachment(body);

        let url = build_url(
            &self.work_api_url,
            "/api/mediatopic/post",
            &[
                ("application_key", credentials.public_key.as_str()),
                ("access_token", expose(&credentials.access_token)),
                ("type", "GROUP_THEME"),
                ("gid", target_id),
                ("attachment", attachment.as_str()),
            ],
        )?;

        let response = fetch(self.transport.as_ref(), HttpRequest::get(url)).await?;
        check_api_error(&response)?;

        // The topic id comes back as a bare JSON string
        let id = serde_json::from_str::<String>(&response.body)
            .unwrap_or_else(|_| response.body.trim().to_string());

        tracing::debug!("Posted to OK group {}: topic {}", target_id, id);
        Ok(id)
    }
}
