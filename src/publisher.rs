//! Publishing posts to a social network.

use crate::utils::truncate_chars;
use crate::{PageMetadata, PromoError};
use async_trait::async_trait;
use std::path::PathBuf;

#[cfg(feature = "twitter")]
pub use x::{posting_enabled, XCredentials, XEndpoints, XPublisher};

pub const MAX_ALT_TEXT_CHARS: usize = 420;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest {
    pub text: String,
    /// Image attached to the post; `None` posts text only
    pub image: Option<PathBuf>,
    pub alt_text: Option<String>,
}

impl PostRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
            alt_text: None,
        }
    }

    pub fn with_image(mut self, image: PathBuf) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_alt_text(mut self, alt_text: Option<String>) -> Self {
        self.alt_text = alt_text;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub id: String,
    /// Public link, when the account name could be resolved
    pub url: Option<String>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    /// `AuthError` means publishing is not enabled or not authorized and the
    /// post should be skipped.
    async fn publish(&self, post: &PostRequest) -> Result<PublishedPost, PromoError>;
}

/// Image description for screen readers: the page title, else its description.
pub fn alt_text_for(meta: &PageMetadata) -> Option<String> {
    meta.resolved_title()
        .or_else(|| meta.resolved_description())
        .map(|text| truncate_chars(text.trim(), MAX_ALT_TEXT_CHARS))
        .filter(|text| !text.is_empty())
}

#[cfg(feature = "twitter")]
mod x {
    use super::*;
    use crate::attempts::{first_success, is_retryable_publish_failure};
    use reqwest::multipart::{Form, Part};
    use reqwest::{Client, RequestBuilder, StatusCode};
    use serde_json::Value;
    use std::fmt;
    use tracing::{debug, info, instrument, warn};

    const SERVICE: &str = "X";
    const POST_SWITCH: &str = "TWITTER_POST";
    const TOKEN_VAR: &str = "TWITTER_ACCESS_TOKEN";

    /// Whether the posting switch holds one of the accepted "on" values.
    pub fn posting_enabled(switch: Option<&str>) -> bool {
        matches!(switch, Some("1" | "true" | "TRUE" | "yes" | "YES"))
    }

    /// A pre-issued OAuth 2.0 user access token.
    #[derive(Clone)]
    pub struct XCredentials {
        access_token: String,
    }

    impl fmt::Debug for XCredentials {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("XCredentials")
                .field("access_token", &"<redacted>")
                .finish()
        }
    }

    impl XCredentials {
        pub fn new(access_token: impl Into<String>) -> Self {
            Self {
                access_token: access_token.into(),
            }
        }

        /// Read the posting switch and the token from the environment.
        pub fn from_env() -> Result<Self, PromoError> {
            Self::from_values(
                std::env::var(POST_SWITCH).ok().as_deref(),
                std::env::var(TOKEN_VAR).ok().as_deref(),
            )
        }

        pub fn from_values(switch: Option<&str>, token: Option<&str>) -> Result<Self, PromoError> {
            if !posting_enabled(switch) {
                return Err(PromoError::AuthError(format!(
                    "set {POST_SWITCH}=1 to enable live posting"
                )));
            }
            match token.map(str::trim) {
                Some(token) if !token.is_empty() => Ok(Self::new(token)),
                _ => Err(PromoError::AuthError(format!("missing env: {TOKEN_VAR}"))),
            }
        }
    }

    /// Base URLs of the X APIs.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct XEndpoints {
        pub api_v2: String,
        pub api_v1: String,
        pub upload_v1: String,
    }

    impl Default for XEndpoints {
        fn default() -> Self {
            Self {
                api_v2: "https://api.x.com/2".to_string(),
                api_v1: "https://api.twitter.com/1.1".to_string(),
                upload_v1: "https://upload.twitter.com/1.1".to_string(),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum ApiVersion {
        V2,
        /// Only accepts OAuth 1.0a user context on x.com itself
        V1,
    }

    /// Posts through the X API with an OAuth 2.0 user access token.
    ///
    /// The v2 endpoints are tried first. The v1.1 attempt after them only
    /// succeeds against gateways that accept a bearer token there: x.com
    /// requires OAuth 1.0a user context for `statuses/update.json` and
    /// `upload.twitter.com`, which this publisher does not sign.
    pub struct XPublisher {
        client: Client,
        credentials: XCredentials,
        endpoints: XEndpoints,
    }

    impl XPublisher {
        pub fn new(credentials: XCredentials) -> Self {
            Self {
                client: Client::new(),
                credentials,
                endpoints: XEndpoints::default(),
            }
        }

        pub fn from_env() -> Result<Self, PromoError> {
            XCredentials::from_env().map(Self::new)
        }

        pub fn with_endpoints(mut self, endpoints: XEndpoints) -> Self {
            self.endpoints = endpoints;
            self
        }

        fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
            request.bearer_auth(&self.credentials.access_token)
        }

        async fn upload_media(
            &self,
            version: ApiVersion,
            png: &[u8],
        ) -> Result<String, PromoError> {
            let part = Part::bytes(png.to_vec())
                .file_name("screenshot.png")
                .mime_str("image/png")
                .map_err(|e| PromoError::ExternalServiceError {
                    service: SERVICE.into(),
                    message: e.to_string(),
                })?;

            let url = match version {
                ApiVersion::V2 => format!("{}/media/upload", self.endpoints.api_v2),
                ApiVersion::V1 => format!("{}/media/upload.json", self.endpoints.upload_v1),
            };
            let mut form = Form::new().part("media", part);
            if version == ApiVersion::V2 {
                form = form.text("media_category", "tweet_image");
            }

            let body = read_json(
                self.authorized(self.client.post(&url)).multipart(form),
                "media upload",
            )
            .await?;
            media_id(&body)
                .ok_or_else(|| PromoError::ParseError("no media id in upload response".into()))
        }

        /// Best-effort: a failure only costs the description.
        async fn attach_alt_text(&self, version: ApiVersion, media_id: &str, alt_text: &str) {
            let request = match version {
                ApiVersion::V2 => self
                    .client
                    .post(format!("{}/media/metadata", self.endpoints.api_v2))
                    .json(&serde_json::json!({
                        "id": media_id,
                        "metadata": { "alt_text": { "text": alt_text } }
                    })),
                ApiVersion::V1 => self
                    .client
                    .post(format!("{}/media/metadata/create.json", self.endpoints.upload_v1))
                    .json(&serde_json::json!({
                        "media_id": media_id,
                        "alt_text": { "text": alt_text }
                    })),
            };

            match self.authorized(request).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(media_id = %media_id, "Alt text attached");
                }
                Ok(response) => warn!(status = %response.status(), "Alt text rejected"),
                Err(e) => warn!(error = %e, "Alt text request failed"),
            }
        }

        async fn username(&self) -> Option<String> {
            let request = self
                .authorized(self.client.get(format!("{}/users/me", self.endpoints.api_v2)));
            match read_json(request, "user lookup").await {
                Ok(body) => body["data"]["username"].as_str().map(str::to_string),
                Err(e) => {
                    debug!(error = %e, "Could not resolve account name");
                    None
                }
            }
        }

        async fn publish_with(
            &self,
            version: ApiVersion,
            post: &PostRequest,
            image: Option<&[u8]>,
        ) -> Result<PublishedPost, PromoError> {
            let media_id = match image {
                Some(png) => {
                    let id = self.upload_media(version, png).await?;
                    let alt_text = post.alt_text.as_deref().map(str::trim);
                    if let Some(alt) = alt_text.filter(|a| !a.is_empty()) {
                        self.attach_alt_text(version, &id, alt).await;
                    }
                    Some(id)
                }
                None => None,
            };

            match version {
                ApiVersion::V2 => {
                    let mut payload = serde_json::json!({ "text": post.text });
                    if let Some(id) = &media_id {
                        payload["media"] = serde_json::json!({ "media_ids": [id] });
                    }
                    let request = self
                        .authorized(self.client.post(format!("{}/tweets", self.endpoints.api_v2)))
                        .json(&payload);
                    let body = read_json(request, "create post").await?;
                    let id = body["data"]["id"]
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| PromoError::ParseError("no post id in response".into()))?;
                    let url = self.username().await.map(|user| status_url(&user, &id));
                    Ok(PublishedPost { id, url })
                }
                ApiVersion::V1 => {
                    let mut form = vec![("status", post.text.clone())];
                    if let Some(id) = media_id {
                        form.push(("media_ids", id));
                    }
                    let request = self
                        .authorized(
                            self.client
                                .post(format!("{}/statuses/update.json", self.endpoints.api_v1)),
                        )
                        .form(&form);
                    let body = read_json(request, "status update").await?;
                    let id = body["id_str"]
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| PromoError::ParseError("no status id in response".into()))?;
                    let url = body["user"]["screen_name"]
                        .as_str()
                        .map(|user| status_url(user, &id));
                    Ok(PublishedPost { id, url })
                }
            }
        }
    }

    #[async_trait]
    impl Publisher for XPublisher {
        fn name(&self) -> &str {
            "x"
        }

        #[instrument(skip(self, post), fields(has_image = post.image.is_some()))]
        async fn publish(&self, post: &PostRequest) -> Result<PublishedPost, PromoError> {
            let image = match &post.image {
                Some(path) if path.is_file() => Some(tokio::fs::read(path).await?),
                _ => None,
            };

            let published = first_success(
                [ApiVersion::V2, ApiVersion::V1],
                |version| self.publish_with(version, post, image.as_deref()),
                is_retryable_publish_failure,
            )
            .await?;

            info!(id = %published.id, url = ?published.url, "Post published");
            Ok(published)
        }
    }

    async fn read_json(request: RequestBuilder, what: &str) -> Result<Value, PromoError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PromoError::TimeoutError(format!("{what}: {e}"))
            } else {
                PromoError::FetchError(format!("{what}: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PromoError::FetchError(format!("{what}: {e}")))?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(PromoError::AuthError(format!("{what} was not authorized: {body}")));
        }
        if !status.is_success() {
            return Err(PromoError::ExternalServiceError {
                service: SERVICE.into(),
                message: format!("{what} returned {status}: {body}"),
            });
        }

        serde_json::from_str(&body).map_err(|e| PromoError::ParseError(format!("{what}: {e}")))
    }

    /// Media id from either upload API's answer.
    fn media_id(body: &Value) -> Option<String> {
        body["data"]["id"]
            .as_str()
            .or_else(|| body["media_id_string"].as_str())
            .map(str::to_string)
            .or_else(|| body["media_id"].as_u64().map(|id| id.to_string()))
    }

    pub fn status_url(user: &str, id: &str) -> String {
        format!("https://x.com/{user}/status/{id}")
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alt_text_prefers_title() {
        let meta = PageMetadata::from_pairs([
            ("title", "Plain Title"),
            ("og:title", "Social Title"),
            ("description", "About the page"),
        ]);
        assert_eq!(alt_text_for(&meta).as_deref(), Some("Social Title"));
    }

    #[test]
    fn test_alt_text_falls_back_and_caps() {
        let meta = PageMetadata::from_pairs([("description", "d".repeat(500).as_str())]);
        assert_eq!(alt_text_for(&meta).map(|a| a.chars().count()), Some(420));
        assert_eq!(alt_text_for(&PageMetadata::new()), None);
    }

    #[test]
    fn test_post_request_builder() {
        let post = PostRequest::text("hello")
            .with_image(PathBuf::from("out/example.com.png"))
            .with_alt_text(Some("Example".into()));
        assert_eq!(post.image.as_deref(), Some(std::path::Path::new("out/example.com.png")));
        assert_eq!(post.alt_text.as_deref(), Some("Example"));
    }
}
