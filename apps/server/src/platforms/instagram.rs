use async_trait::async_trait;
use serde_json::json;

use super::facebook::{graph_auth_url, graph_exchange_code, graph_extend_token, graph_pages};
use super::{
    AccountInfo, AdapterCore, MediaFile, OAuthGrant, PlatformAdapter, PlatformContext, PostOptions,
};
use crate::error::PlatformError;
use crate::executor::ApiRequest;
use crate::models::{Account, Platform, TokenSet};

const SCOPES: &[&str] = &[
    "instagram_basic",
    "instagram_content_publish",
    "instagram_manage_comments",
    "instagram_manage_insights",
    "pages_show_list",
    "pages_read_engagement",
];

/// Status polls before a video container is considered stuck
const CONTAINER_POLL_ATTEMPTS: u32 = 10;

/// Instagram professional accounts through the Graph API
pub struct InstagramAdapter {
    core: AdapterCore,
}

impl InstagramAdapter {
    pub fn new(ctx: PlatformContext, account: Option<Account>) -> Self {
        Self {
            core: AdapterCore::new(Platform::Instagram, ctx, account),
        }
    }

    async fn create_container(
        &self,
        ig_user_id: &str,
        token: &str,
        file: &MediaFile,
        caption: Option<&str>,
        carousel_item: bool,
    ) -> Result<String, PlatformError> {
        let mut fields = vec![("access_token", token.to_string())];

        if file.is_video() {
            fields.push(("video_url", file.url.clone()));
            let media_type = if carousel_item { "VIDEO" } else { "REELS" };
            fields.push(("media_type", media_type.to_string()));
        } else {
            fields.push(("image_url", file.url.clone()));
        }
        if carousel_item {
            fields.push(("is_carousel_item", "true".to_string()));
        }
        if let Some(caption) = caption {
            fields.push(("caption", caption.to_string()));
        }

        let response = self
            .core
            .call(
                ApiRequest::post(format!("{}/{}/media", self.core.endpoints().api_base, ig_user_id))
                    .form(fields),
            )
            .await?;
        response.require_string("/id")
    }

    /// Video containers are processed asynchronously by Instagram
    async fn wait_until_ready(&self, container_id: &str, token: &str) -> Result<(), PlatformError> {
        for _ in 0..CONTAINER_POLL_ATTEMPTS {
            let response = self
                .core
                .call(
                    ApiRequest::get(format!("{}/{}", self.core.endpoints().api_base, container_id))
                        .query("fields", "status_code")
                        .query("access_token", token),
                )
                .await?;

            match response.string_at("/status_code").as_deref() {
                Some("FINISHED") | None => return Ok(()),
                Some("ERROR") | Some("EXPIRED") => {
                    return Err(PlatformError::Api {
                        status: response.status,
                        message: format!("Instagram could not process media {}", container_id),
                    })
                }
                Some(_) => tokio::time::sleep(self.core.backoff_unit() * 2).await,
            }
        }

        Err(PlatformError::InvalidResponse(format!(
            "Instagram media {} was not ready in time",
            container_id
        )))
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AdapterCore {
        &mut self.core
    }

    fn scopes(&self) -> &'static [&'static str] {
        SCOPES
    }

    fn auth_url(&mut self, redirect_uri: &str, state: &str) -> Result<String, PlatformError> {
        graph_auth_url(&self.core, SCOPES, redirect_uri, state)
    }

    async fn handle_callback(
        &mut self,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<OAuthGrant, PlatformError> {
        self.core.consume_state(state)?;
        let user_tokens = graph_exchange_code(&self.core, code, redirect_uri).await?;

        let pages = graph_pages(
            &self.core,
            &user_tokens.access_token,
            "id,name,access_token,instagram_business_account{id,username}",
        )
        .await?;

        let (page, ig) = pages
            .iter()
            .find_map(|page| {
                page.get("instagram_business_account")
                    .filter(|ig| ig.get("id").is_some())
                    .map(|ig| (page, ig))
            })
            .ok_or_else(|| {
                PlatformError::Auth(
                    "No Instagram professional account is linked to this login".to_string(),
                )
            })?;

        let ig_id = ig
            .get("id")
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
            .ok_or_else(|| PlatformError::InvalidResponse("instagram account without id".to_string()))?;
        let username = ig
            .get("username")
            .and_then(|v| v.as_str())
            .unwrap_or(&ig_id)
            .to_string();
        let page_id = page.get("id").and_then(|v| v.as_str()).unwrap_or_default();

        let tokens = match page.get("access_token").and_then(|v| v.as_str()) {
            Some(token) => TokenSet {
                access_token: token.to_string(),
                refresh_token: None,
                expires_at: None,
            },
            None => user_tokens,
        };

        Ok(OAuthGrant {
            tokens,
            platform_user_id: ig_id,
            platform_username: username,
            metadata: json!({ "page_id": page_id }),
        })
    }

    async fn refresh_token(&mut self) -> Result<TokenSet, PlatformError> {
        let tokens = graph_extend_token(&self.core).await?;
        self.core.apply_tokens(tokens.clone());
        Ok(tokens)
    }

    async fn publish(
        &mut self,
        content: &str,
        media: &[MediaFile],
        _options: &PostOptions,
    ) -> Result<String, PlatformError> {
        let account = self.core.account()?;
        let ig_user_id = account.platform_user_id.clone();
        let token = account.access_token.clone();
        let api = self.core.endpoints().api_base.clone();

        let creation_id = match media {
            [single] => {
                self.create_container(&ig_user_id, &token, single, Some(content), false)
                    .await?
            }
            files => {
                let mut children = Vec::with_capacity(files.len());
                for file in files {
                    children.push(
                        self.create_container(&ig_user_id, &token, file, None, true)
                            .await?,
                    );
                }
                let response = self
                    .core
                    .call(ApiRequest::post(format!("{}/{}/media", api, ig_user_id)).form([
                        ("media_type", "CAROUSEL".to_string()),
                        ("children", children.join(",")),
                        ("caption", content.to_string()),
                        ("access_token", token.clone()),
                    ]))
                    .await?;
                response.require_string("/id")?
            }
        };

        if media.iter().any(MediaFile::is_video) {
            self.wait_until_ready(&creation_id, &token).await?;
        }

        let response = self
            .core
            .call(
                ApiRequest::post(format!("{}/{}/media_publish", api, ig_user_id)).form([
                    ("creation_id", creation_id),
                    ("access_token", token),
                ]),
            )
            .await?;
        response.require_string("/id")
    }

    async fn fetch_account_info(&self) -> Result<AccountInfo, PlatformError> {
        let account = self.core.account()?;
        let response = self
            .core
            .call(
                ApiRequest::get(format!(
                    "{}/{}",
                    self.core.endpoints().api_base,
                    account.platform_user_id
                ))
                .query("fields", "username,name,followers_count,follows_count,media_count")
                .query("access_token", account.access_token.as_str()),
            )
            .await?;

        Ok(AccountInfo {
            username: response.require_string("/username")?,
            display_name: response.string_at("/name"),
            followers_count: response.i64_at("/followers_count").unwrap_or(0),
            following_count: response.i64_at("/follows_count").unwrap_or(0),
            posts_count: response.i64_at("/media_count").unwrap_or(0),
            error: None,
        })
    }
}
