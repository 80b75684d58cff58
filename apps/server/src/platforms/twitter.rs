use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;

use super::oauth::{code_challenge, generate_code_verifier};
use super::{
    authorize_url, token_set_from, AccountInfo, AdapterCore, MediaFile, OAuthGrant,
    PlatformAdapter, PlatformContext, PostOptions,
};
use crate::error::PlatformError;
use crate::executor::ApiRequest;
use crate::models::{Account, ActionType, Platform, TokenSet};

const SCOPES: &[&str] = &[
    "tweet.read",
    "tweet.write",
    "users.read",
    "offline.access",
    "media.write",
];

/// Twitter/X through API v2 with OAuth 2.0 PKCE
pub struct TwitterAdapter {
    core: AdapterCore,
}

impl TwitterAdapter {
    pub fn new(ctx: PlatformContext, account: Option<Account>) -> Self {
        Self {
            core: AdapterCore::new(Platform::Twitter, ctx, account),
        }
    }

    fn upload_base(&self) -> &str {
        let endpoints = self.core.endpoints();
        endpoints
            .upload_base
            .as_deref()
            .unwrap_or(&endpoints.api_base)
    }

    async fn upload_media(&self, token: &str, file: &MediaFile) -> Result<String, PlatformError> {
        let data = file.data.as_ref().ok_or_else(|| {
            PlatformError::Unsupported(format!(
                "Twitter uploads need file contents; {} was given by URL only",
                file.url
            ))
        })?;

        self.core.check_rate_limit(ActionType::Media).await?;

        let category = if file.is_video() {
            "tweet_video"
        } else {
            "tweet_image"
        };
        let response = self
            .core
            .call(
                ApiRequest::post(format!("{}/media/upload", self.upload_base()))
                    .bearer(token)
                    .form([
                        ("media_data", STANDARD.encode(data)),
                        ("media_category", category.to_string()),
                    ]),
            )
            .await?;

        self.core.record_action(ActionType::Media).await;
        response.require_string("/media_id_string")
    }

    async fn token_request(&self, fields: Vec<(&str, String)>) -> Result<TokenSet, PlatformError> {
        let (client_id, client_secret) = self.core.credentials()?;
        let response = self
            .core
            .call(
                ApiRequest::post(&self.core.endpoints().token_url)
                    .basic_auth(client_id, client_secret)
                    .form(fields),
            )
            .await?;
        token_set_from(&response)
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AdapterCore {
        &mut self.core
    }

    fn scopes(&self) -> &'static [&'static str] {
        SCOPES
    }

    /// Generates a PKCE pair and keeps the verifier in the session for `state`
    fn auth_url(&mut self, redirect_uri: &str, state: &str) -> Result<String, PlatformError> {
        let (client_id, _) = self.core.credentials()?;
        let verifier = generate_code_verifier();
        let challenge = code_challenge(&verifier);
        let scope = SCOPES.join(" ");

        let url = authorize_url(
            &self.core,
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("state", state),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )?;

        self.core
            .sessions()
            .attach_verifier(state, Platform::Twitter, verifier);
        Ok(url)
    }

    async fn handle_callback(
        &mut self,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<OAuthGrant, PlatformError> {
        let session = self.core.consume_state(state)?;
        let verifier = session
            .code_verifier
            .ok_or_else(|| PlatformError::InvalidState("missing PKCE verifier".to_string()))?;
        let (client_id, _) = self.core.credentials()?;

        let tokens = self
            .token_request(vec![
                ("code", code.to_string()),
                ("grant_type", "authorization_code".to_string()),
                ("client_id", client_id.to_string()),
                ("redirect_uri", redirect_uri.to_string()),
                ("code_verifier", verifier),
            ])
            .await
            .map_err(PlatformError::into_auth)?;

        let me = self
            .core
            .call(
                ApiRequest::get(format!("{}/users/me", self.core.endpoints().api_base))
                    .query("user.fields", "name,username")
                    .bearer(&tokens.access_token),
            )
            .await
            .map_err(PlatformError::into_auth)?;

        let user_id = me.require_string("/data/id")?;
        let username = me.require_string("/data/username")?;

        Ok(OAuthGrant {
            tokens,
            platform_user_id: user_id,
            platform_username: username.clone(),
            metadata: json!({ "username": username }),
        })
    }

    async fn refresh_token(&mut self) -> Result<TokenSet, PlatformError> {
        let refresh_token = self
            .core
            .account()?
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PlatformError::ReauthRequired {
                platform: Platform::Twitter,
                reason: "no refresh token stored".to_string(),
            })?;
        let (client_id, _) = self.core.credentials()?;

        let tokens = self
            .token_request(vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token),
                ("client_id", client_id.to_string()),
            ])
            .await
            .map_err(|e| match e {
                // A revoked or already-rotated refresh token
                PlatformError::BadRequest(reason) | PlatformError::Auth(reason) => {
                    PlatformError::ReauthRequired {
                        platform: Platform::Twitter,
                        reason,
                    }
                }
                other => other,
            })?;

        self.core.apply_tokens(tokens.clone());
        Ok(tokens)
    }

    async fn publish(
        &mut self,
        content: &str,
        media: &[MediaFile],
        options: &PostOptions,
    ) -> Result<String, PlatformError> {
        let token = self.core.account()?.access_token.clone();

        let mut media_ids = Vec::with_capacity(media.len());
        for file in media {
            media_ids.push(self.upload_media(&token, file).await?);
        }

        let mut tweet = json!({ "text": content });
        if !media_ids.is_empty() {
            tweet["media"] = json!({ "media_ids": media_ids });
        }
        if let Some(reply_to) = &options.reply_to {
            tweet["reply"] = json!({ "in_reply_to_tweet_id": reply_to });
        }

        let response = self
            .core
            .call(
                ApiRequest::post(format!("{}/tweets", self.core.endpoints().api_base))
                    .bearer(&token)
                    .json(tweet),
            )
            .await?;
        response.require_string("/data/id")
    }

    async fn fetch_account_info(&self) -> Result<AccountInfo, PlatformError> {
        let token = &self.core.account()?.access_token;
        let response = self
            .core
            .call(
                ApiRequest::get(format!("{}/users/me", self.core.endpoints().api_base))
                    .query("user.fields", "name,username,public_metrics")
                    .bearer(token),
            )
            .await?;

        Ok(AccountInfo {
            username: response.require_string("/data/username")?,
            display_name: response.string_at("/data/name"),
            followers_count: response
                .i64_at("/data/public_metrics/followers_count")
                .unwrap_or(0),
            following_count: response
                .i64_at("/data/public_metrics/following_count")
                .unwrap_or(0),
            posts_count: response
                .i64_at("/data/public_metrics/tweet_count")
                .unwrap_or(0),
            error: None,
        })
    }
}
