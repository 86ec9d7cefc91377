//! Post submission through the stored account and page

use chrono::Utc;
use serde::Serialize;

use crate::error::{AutopostError, Result};
use crate::service::SocialNetworkService;
use crate::types::{PostData, SocialNetworkName, SocialNetworkPost};

/// A post accepted by the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedPost {
    pub post: SocialNetworkPost,
    /// Id assigned by the provider
    pub provider_post_id: String,
}

/// Copy of `credentials` whose `access_token` key is set to `token`
fn with_access_token(credentials: &str, token: &str) -> Result<String> {
    let mut value: serde_json::Value = serde_json::from_str(credentials).map_err(|_| {
        AutopostError::validation(
            "account credentials are not valid JSON",
            "credentials",
            "json",
        )
    })?;

    let object = value.as_object_mut().ok_or_else(|| {
        AutopostError::validation(
            "account credentials must be a JSON object",
            "credentials",
            "json",
        )
    })?;
    object.insert(
        "access_token".to_string(),
        serde_json::Value::String(token.to_string()),
    );

    Ok(value.to_string())
}

impl SocialNetworkService {
    /// Accept a post for `project` on `network`
    ///
    /// Posts are not persisted yet; the call only records the request.
    pub async fn create_post(&self, network: &str, project: &str, post: &PostData) -> Result<()> {
        let network = SocialNetworkName::parse(network)?;
        tracing::info!(
            "Accepted post for {} project {} ({} characters)",
            network,
            project,
            post.text.chars().count()
        );
        Ok(())
    }

    /// Publish `post` to the page stored for `(network, project)`
    ///
    /// The page token is preferred over the account token. The image of the
    /// post is not uploaded.
    pub async fn publish_post(
        &self,
        network: &str,
        project: &str,
        post: PostData,
    ) -> Result<PublishedPost> {
        let account = self.get_account(network).await?;
        let client = self.client(account.social_network)?;

        let page = self
            .find_pages(Some(account.id), Some(project))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AutopostError::NotFound(format!(
                    "no {} page stored for project {}",
                    account.social_network, project
                ))
            })?;

        let token = page
            .access_token
            .as_ref()
            .or(account.access_token.as_ref())
            .filter(|token| !token.token.is_empty())
            .ok_or_else(|| {
                AutopostError::validation(
                    format!(
                        "no access token for {} page {}",
                        account.social_network, page.page_id
                    ),
                    "accessToken",
                    "required",
                )
            })?;

        let credentials = with_access_token(&account.credentials, &token.token)?;

        let provider_post_id = client
            .create_post(&credentials, &page.page_id, &post.message())
            .await
            .map_err(AutopostError::provider(account.social_network, "create post"))?;

        tracing::info!(
            "Published {} post {} to page {}",
            account.social_network,
            provider_post_id,
            page.page_id
        );

        Ok(PublishedPost {
            post: SocialNetworkPost {
                id: None,
                page: page.id,
                post_data: post,
                published_at: Utc::now(),
            },
            provider_post_id,
        })
    }
}
