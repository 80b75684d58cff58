use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    authorize_url, token_set_from, AccountInfo, AdapterCore, MediaFile, OAuthGrant,
    PlatformAdapter, PlatformContext, PostOptions,
};
use crate::error::PlatformError;
use crate::executor::ApiRequest;
use crate::models::{Account, ActionType, Platform, TokenSet};

const SCOPES: &[&str] = &["openid", "profile", "email", "w_member_social"];

const UPLOAD_MECHANISM: &str = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest";

/// LinkedIn members through the v2 REST API.
///
/// LinkedIn issues no refresh tokens: an expired token always means the
/// member has to authorize again.
pub struct LinkedInAdapter {
    core: AdapterCore,
}

impl LinkedInAdapter {
    pub fn new(ctx: PlatformContext, account: Option<Account>) -> Self {
        Self {
            core: AdapterCore::new(Platform::LinkedIn, ctx, account),
        }
    }

    fn author_urn(&self) -> Result<String, PlatformError> {
        let account = self.core.account()?;
        Ok(account
            .metadata_str("organization_urn")
            .or_else(|| account.metadata_str("person_urn"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("urn:li:person:{}", account.platform_user_id)))
    }

    /// Registers an asset and uploads its bytes; returns the asset URN
    async fn upload_asset(
        &self,
        token: &str,
        author: &str,
        file: &MediaFile,
    ) -> Result<String, PlatformError> {
        let data = file.data.clone().ok_or_else(|| {
            PlatformError::Unsupported(format!(
                "LinkedIn uploads need file contents; {} was given by URL only",
                file.url
            ))
        })?;

        self.core.check_rate_limit(ActionType::Media).await?;

        let recipe = if file.is_video() {
            "urn:li:digitalmediaRecipe:feedshare-video"
        } else {
            "urn:li:digitalmediaRecipe:feedshare-image"
        };
        let registration = self
            .core
            .call(
                ApiRequest::post(format!("{}/assets", self.core.endpoints().api_base))
                    .query("action", "registerUpload")
                    .bearer(token)
                    .json(json!({
                        "registerUploadRequest": {
                            "recipes": [recipe],
                            "owner": author,
                            "serviceRelationships": [{
                                "relationshipType": "OWNER",
                                "identifier": "urn:li:userGeneratedContent"
                            }]
                        }
                    })),
            )
            .await?;

        let upload_url = registration
            .require_string(&format!("/value/uploadMechanism/{}/uploadUrl", UPLOAD_MECHANISM))?;
        let asset = registration.require_string("/value/asset")?;

        self.core
            .call(
                ApiRequest::put(upload_url)
                    .bearer(token)
                    .bytes(&file.mime_type, data),
            )
            .await?;

        self.core.record_action(ActionType::Media).await;
        Ok(asset)
    }
}

fn share_content(content: &str, category: &str, media: Vec<Value>) -> Value {
    let mut share = json!({
        "shareCommentary": { "text": content },
        "shareMediaCategory": category,
    });
    if !media.is_empty() {
        share["media"] = Value::Array(media);
    }
    share
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
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
        let (client_id, _) = self.core.credentials()?;
        let scope = SCOPES.join(" ");
        authorize_url(
            &self.core,
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("state", state),
                ("scope", scope.as_str()),
            ],
        )
    }

    async fn handle_callback(
        &mut self,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<OAuthGrant, PlatformError> {
        self.core.consume_state(state)?;
        let (client_id, client_secret) = self.core.credentials()?;

        let response = self
            .core
            .call(ApiRequest::post(&self.core.endpoints().token_url).form([
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ]))
            .await
            .map_err(PlatformError::into_auth)?;
        let mut tokens = token_set_from(&response)?;
        tokens.refresh_token = None;

        let profile = self
            .core
            .call(
                ApiRequest::get(format!("{}/userinfo", self.core.endpoints().api_base))
                    .bearer(&tokens.access_token),
            )
            .await
            .map_err(PlatformError::into_auth)?;

        let member_id = profile.require_string("/sub")?;
        let name = profile
            .string_at("/name")
            .unwrap_or_else(|| member_id.clone());

        Ok(OAuthGrant {
            tokens,
            metadata: json!({ "person_urn": format!("urn:li:person:{}", member_id) }),
            platform_user_id: member_id,
            platform_username: name,
        })
    }

    async fn refresh_token(&mut self) -> Result<TokenSet, PlatformError> {
        Err(PlatformError::ReauthRequired {
            platform: Platform::LinkedIn,
            reason: "LinkedIn does not support token refresh".to_string(),
        })
    }

    async fn publish(
        &mut self,
        content: &str,
        media: &[MediaFile],
        options: &PostOptions,
    ) -> Result<String, PlatformError> {
        let token = self.core.account()?.access_token.clone();
        let author = self.author_urn()?;

        let share = if !media.is_empty() {
            let mut assets = Vec::with_capacity(media.len());
            for file in media {
                let asset = self.upload_asset(&token, &author, file).await?;
                assets.push(json!({ "status": "READY", "media": asset }));
            }
            let category = if media.iter().any(MediaFile::is_video) {
                "VIDEO"
            } else {
                "IMAGE"
            };
            share_content(content, category, assets)
        } else if let Some(link) = &options.link {
            share_content(
                content,
                "ARTICLE",
                vec![json!({ "status": "READY", "originalUrl": link })],
            )
        } else {
            share_content(content, "NONE", Vec::new())
        };

        let response = self
            .core
            .call(
                ApiRequest::post(format!("{}/ugcPosts", self.core.endpoints().api_base))
                    .bearer(&token)
                    .header("X-Restli-Protocol-Version", "2.0.0")
                    .json(json!({
                        "author": author,
                        "lifecycleState": "PUBLISHED",
                        "specificContent": { "com.linkedin.ugc.ShareContent": share },
                        "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
                    })),
            )
            .await?;
        response.require_string("/id")
    }

    async fn fetch_account_info(&self) -> Result<AccountInfo, PlatformError> {
        let token = &self.core.account()?.access_token;
        let response = self
            .core
            .call(
                ApiRequest::get(format!("{}/userinfo", self.core.endpoints().api_base))
                    .bearer(token),
            )
            .await?;

        let name = response.require_string("/name")?;
        Ok(AccountInfo {
            username: name.clone(),
            display_name: Some(name),
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            error: None,
        })
    }
}
