//! Core domain types for Autopost

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AutopostError;

/// Facebook long-lived user tokens are valid for 60 days
pub const FACEBOOK_TOKEN_LIFETIME_DAYS: i64 = 60;

/// Closed set of supported social networks
///
/// The wire and storage form is the short upper-case code (`VK`, `OK`, `FB`,
/// `TWI`). `TWI` is reserved: it validates but has no client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocialNetworkName {
    #[serde(rename = "VK")]
    Vk,
    #[serde(rename = "OK")]
    Odnoklassniki,
    #[serde(rename = "FB")]
    Facebook,
    #[serde(rename = "TWI")]
    Twitter,
}

impl SocialNetworkName {
    pub const ALL: [SocialNetworkName; 4] = [
        SocialNetworkName::Vk,
        SocialNetworkName::Odnoklassniki,
        SocialNetworkName::Facebook,
        SocialNetworkName::Twitter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SocialNetworkName::Vk => "VK",
            SocialNetworkName::Odnoklassniki => "OK",
            SocialNetworkName::Facebook => "FB",
            SocialNetworkName::Twitter => "TWI",
        }
    }

    /// Validate a raw network name
    ///
    /// Returns a validation error naming the `socialNetworkName` field when the
    /// value is not one of the known codes. Matching is exact.
    pub fn parse(value: &str) -> Result<Self, AutopostError> {
        Self::ALL
            .into_iter()
            .find(|network| network.as_str() == value)
            .ok_or_else(|| {
                AutopostError::validation(
                    format!("social network {} is not valid", value),
                    "socialNetworkName",
                    "oneof",
                )
            })
    }
}

impl FromStr for SocialNetworkName {
    type Err = AutopostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SocialNetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth access token attached to an account or a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "Token")]
    pub token: String,
    /// Absolute RFC 3339 timestamp, empty when the provider gives no fixed expiry
    #[serde(rename = "ExpiresIn", default)]
    pub expires_in: String,
}

impl AccessToken {
    /// Build a token whose expiry follows the provider policy at `now`
    pub fn issued(network: SocialNetworkName, token: String, now: DateTime<Utc>) -> Self {
        Self {
            token,
            expires_in: token_expiry(network, now),
        }
    }
}

/// Stored credential set bound to exactly one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialNetworkAccount {
    /// Row id assigned by storage; zero until the account is stored
    pub id: i64,
    pub social_network: SocialNetworkName,
    /// Opaque provider-specific JSON (app id, secrets, ...)
    pub credentials: String,
    pub access_token: Option<AccessToken>,
}

impl SocialNetworkAccount {
    pub fn new(social_network: SocialNetworkName, credentials: String) -> Self {
        Self {
            id: 0,
            social_network,
            credentials,
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialNetworkPageInfo {
    #[serde(rename = "title")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "previewImage", default)]
    pub preview_image: String,
}

/// Provider-side publishing target administered by an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialNetworkPage {
    pub id: i64,
    pub account_id: i64,
    /// Logical grouping that tells pages of the same account apart
    pub project: String,
    /// Provider-assigned id, kept as a string since id schemes differ
    pub page_id: String,
    pub page_info: SocialNetworkPageInfo,
    pub access_token: Option<AccessToken>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostData {
    pub text: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub url: String,
}

impl PostData {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Message body sent to providers: the text followed by the link, if any
    pub fn message(&self) -> String {
        if self.url.is_empty() {
            self.text.clone()
        } else if self.text.is_empty() {
            self.url.clone()
        } else {
            format!("{}\n\n{}", self.text, self.url)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialNetworkPost {
    pub id: Option<i64>,
    pub page: i64,
    pub post_data: PostData,
    pub published_at: DateTime<Utc>,
}

/// Provider-specific token expiry policy
///
/// Facebook long-lived tokens expire after a fixed horizon; every other
/// provider reports invalidation itself, so the expiry is left empty.
pub fn token_expiry(network: SocialNetworkName, now: DateTime<Utc>) -> String {
    match network {
        SocialNetworkName::Facebook => (now + Duration::days(FACEBOOK_TOKEN_LIFETIME_DAYS))
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        SocialNetworkName::Vk | SocialNetworkName::Odnoklassniki | SocialNetworkName::Twitter => {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_known_networks() {
        assert_eq!(SocialNetworkName::parse("VK").unwrap(), SocialNetworkName::Vk);
        assert_eq!(
            SocialNetworkName::parse("OK").unwrap(),
            SocialNetworkName::Odnoklassniki
        );
        assert_eq!(
            SocialNetworkName::parse("FB").unwrap(),
            SocialNetworkName::Facebook
        );
        assert_eq!(
            SocialNetworkName::parse("TWI").unwrap(),
            SocialNetworkName::Twitter
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_lowercase() {
        for raw in ["", "vk", "VKontakte", "IG", " FB"] {
            let err = SocialNetworkName::parse(raw).unwrap_err();
            assert!(err.is_validation(), "{raw:?} should fail validation");
            match err {
                AutopostError::Validation { field, .. } => assert_eq!(field, "socialNetworkName"),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_display_matches_wire_code() {
        for network in SocialNetworkName::ALL {
            assert_eq!(network.to_string(), network.as_str());
            let json = serde_json::to_string(&network).unwrap();
            assert_eq!(json, format!("\"{}\"", network.as_str()));
        }
    }

    #[test]
    fn test_facebook_expiry_is_sixty_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            token_expiry(SocialNetworkName::Facebook, now),
            "2024-04-30T12:00:00Z"
        );
    }

    #[test]
    fn test_other_networks_have_no_fixed_expiry() {
        let now = Utc::now();
        assert_eq!(token_expiry(SocialNetworkName::Vk, now), "");
        assert_eq!(token_expiry(SocialNetworkName::Odnoklassniki, now), "");
        assert_eq!(token_expiry(SocialNetworkName::Twitter, now), "");
    }

    #[test]
    fn test_access_token_json_shape() {
        let token = AccessToken {
            token: "T".to_string(),
            expires_in: String::new(),
        };
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json, serde_json::json!({"Token": "T", "ExpiresIn": ""}));
    }

    #[test]
    fn test_page_info_json_shape() {
        let info = SocialNetworkPageInfo {
            name: "News".to_string(),
            description: "Daily".to_string(),
            preview_image: "https://img/1.png".to_string(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "News",
                "description": "Daily",
                "previewImage": "https://img/1.png"
            })
        );
    }

    #[test]
    fn test_post_message_appends_link() {
        let post = PostData {
            text: "Hello".to_string(),
            image: String::new(),
            url: "https://example.com/a".to_string(),
        };
        assert_eq!(post.message(), "Hello\n\nhttps://example.com/a");
        assert_eq!(PostData::text("Only text").message(), "Only text");
    }
}
