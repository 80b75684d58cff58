use async_trait::async_trait;
use serde_json::json;

use super::{
    authorize_url, token_set_from, AccountInfo, AdapterCore, MediaFile, OAuthGrant,
    PlatformAdapter, PlatformContext, PostOptions,
};
use crate::error::PlatformError;
use crate::executor::ApiRequest;
use crate::models::{Account, Platform, TokenSet};

const SCOPES: &[&str] = &[
    "pages_manage_posts",
    "pages_read_engagement",
    "pages_show_list",
    "public_profile",
];

/// Facebook Pages through the Graph API
pub struct FacebookAdapter {
    core: AdapterCore,
}

impl FacebookAdapter {
    pub fn new(ctx: PlatformContext, account: Option<Account>) -> Self {
        Self {
            core: AdapterCore::new(Platform::Facebook, ctx, account),
        }
    }

    /// Page the account publishes to
    fn page_id(&self) -> Result<String, PlatformError> {
        let account = self.core.account()?;
        Ok(account
            .metadata_str("page_id")
            .unwrap_or(&account.platform_user_id)
            .to_string())
    }

    async fn upload_photo(
        &self,
        page_id: &str,
        token: &str,
        file: &MediaFile,
        caption: Option<&str>,
        published: bool,
    ) -> Result<String, PlatformError> {
        let mut fields = vec![
            ("url", file.url.clone()),
            ("access_token", token.to_string()),
            ("published", published.to_string()),
        ];
        if let Some(caption) = caption {
            fields.push(("caption", caption.to_string()));
        }

        let response = self
            .core
            .call(ApiRequest::post(format!("{}/{}/photos", self.core.endpoints().api_base, page_id)).form(fields))
            .await?;

        // Published photos return the feed story id as post_id
        response
            .string_at("/post_id")
            .map(Ok)
            .unwrap_or_else(|| response.require_string("/id"))
    }
}

// =============================================================================
// Graph API helpers shared with Instagram
// =============================================================================

pub(crate) fn graph_auth_url(
    core: &AdapterCore,
    scopes: &[&str],
    redirect_uri: &str,
    state: &str,
) -> Result<String, PlatformError> {
    let (client_id, _) = core.credentials()?;
    let scope = scopes.join(",");
    authorize_url(
        core,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("state", state),
            ("scope", scope.as_str()),
            ("response_type", "code"),
        ],
    )
}

pub(crate) async fn graph_exchange_code(
    core: &AdapterCore,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenSet, PlatformError> {
    let (client_id, client_secret) = core.credentials()?;
    let response = core
        .call(
            ApiRequest::get(&core.endpoints().token_url)
                .query("client_id", client_id)
                .query("client_secret", client_secret)
                .query("redirect_uri", redirect_uri)
                .query("code", code),
        )
        .await
        .map_err(PlatformError::into_auth)?;
    token_set_from(&response)
}

/// Trades the current token for a fresh long-lived one
pub(crate) async fn graph_extend_token(core: &AdapterCore) -> Result<TokenSet, PlatformError> {
    let (client_id, client_secret) = core.credentials()?;
    let current = core.account()?.access_token.clone();
    let response = core
        .call(
            ApiRequest::get(&core.endpoints().token_url)
                .query("grant_type", "fb_exchange_token")
                .query("client_id", client_id)
                .query("client_secret", client_secret)
                .query("fb_exchange_token", current),
        )
        .await
        .map_err(|e| match e {
            PlatformError::Auth(reason) | PlatformError::BadRequest(reason) => {
                PlatformError::ReauthRequired {
                    platform: core.platform(),
                    reason,
                }
            }
            other => other,
        })?;
    token_set_from(&response)
}

/// Pages managed by the user behind `user_token`
pub(crate) async fn graph_pages(
    core: &AdapterCore,
    user_token: &str,
    fields: &str,
) -> Result<Vec<serde_json::Value>, PlatformError> {
    let response = core
        .call(
            ApiRequest::get(format!("{}/me/accounts", core.endpoints().api_base))
                .query("fields", fields)
                .query("access_token", user_token),
        )
        .await
        .map_err(PlatformError::into_auth)?;

    Ok(response
        .body
        .get("data")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default())
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
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

        let me = self
            .core
            .call(
                ApiRequest::get(format!("{}/me", self.core.endpoints().api_base))
                    .query("fields", "id,name")
                    .query("access_token", user_tokens.access_token.as_str()),
            )
            .await
            .map_err(PlatformError::into_auth)?;
        let user_id = me.require_string("/id")?;
        let user_name = me.string_at("/name").unwrap_or_else(|| user_id.clone());

        let pages = graph_pages(&self.core, &user_tokens.access_token, "id,name,access_token").await?;

        // Page tokens derived from a long-lived user token do not expire
        let grant = match pages.first() {
            Some(page) => {
                let page_id = page
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| PlatformError::InvalidResponse("page without id".to_string()))?;
                let page_name = page.get("name").and_then(|v| v.as_str()).unwrap_or(page_id);
                let page_token = page
                    .get("access_token")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);

                OAuthGrant {
                    tokens: match page_token {
                        Some(token) => TokenSet {
                            access_token: token,
                            refresh_token: None,
                            expires_at: None,
                        },
                        None => user_tokens,
                    },
                    platform_user_id: page_id.to_string(),
                    platform_username: page_name.to_string(),
                    metadata: json!({ "user_id": user_id, "page_id": page_id, "page_name": page_name }),
                }
            }
            None => OAuthGrant {
                tokens: user_tokens,
                platform_user_id: user_id.clone(),
                platform_username: user_name,
                metadata: json!({ "user_id": user_id }),
            },
        };

        Ok(grant)
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
        options: &PostOptions,
    ) -> Result<String, PlatformError> {
        let page_id = self.page_id()?;
        let token = self.core.account()?.access_token.clone();
        let api = self.core.endpoints().api_base.clone();

        match media {
            [] => {
                let mut fields = vec![
                    ("message", content.to_string()),
                    ("access_token", token),
                ];
                if let Some(link) = &options.link {
                    fields.push(("link", link.clone()));
                }
                let response = self
                    .core
                    .call(ApiRequest::post(format!("{}/{}/feed", api, page_id)).form(fields))
                    .await?;
                response.require_string("/id")
            }
            [video] if video.is_video() => {
                let response = self
                    .core
                    .call(
                        ApiRequest::post(format!("{}/{}/videos", api, page_id)).form([
                            ("file_url", video.url.clone()),
                            ("description", content.to_string()),
                            ("access_token", token),
                        ]),
                    )
                    .await?;
                response.require_string("/id")
            }
            [photo] => {
                self.upload_photo(&page_id, &token, photo, Some(content), true)
                    .await
            }
            files => {
                if files.iter().any(MediaFile::is_video) {
                    return Err(PlatformError::Unsupported(
                        "Facebook multi-attachment posts accept images only".to_string(),
                    ));
                }

                let mut fields = vec![
                    ("message".to_string(), content.to_string()),
                    ("access_token".to_string(), token.clone()),
                ];
                for (index, file) in files.iter().enumerate() {
                    let media_id = self
                        .upload_photo(&page_id, &token, file, None, false)
                        .await?;
                    fields.push((
                        format!("attached_media[{}]", index),
                        json!({ "media_fbid": media_id }).to_string(),
                    ));
                }

                let response = self
                    .core
                    .call(ApiRequest::post(format!("{}/{}/feed", api, page_id)).form(fields))
                    .await?;
                response.require_string("/id")
            }
        }
    }

    async fn fetch_account_info(&self) -> Result<AccountInfo, PlatformError> {
        let page_id = self.page_id()?;
        let account = self.core.account()?;
        let response = self
            .core
            .call(
                ApiRequest::get(format!("{}/{}", self.core.endpoints().api_base, page_id))
                    .query("fields", "id,name,fan_count,followers_count")
                    .query("access_token", account.access_token.as_str()),
            )
            .await?;

        let name = response.require_string("/name")?;
        Ok(AccountInfo {
            username: name.clone(),
            display_name: Some(name),
            followers_count: response
                .i64_at("/followers_count")
                .or_else(|| response.i64_at("/fan_count"))
                .unwrap_or(0),
            following_count: 0,
            posts_count: 0,
            error: None,
        })
    }
}
