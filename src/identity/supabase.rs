//! Hosted identity provider client (Supabase GoTrue API).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::{CookieJar, Identity, IdentityError, Resolution, Role, SessionCookie, SessionCookies, SessionResolver, SessionTokens};
use crate::config::IdentityConfig;
use crate::quota::Tier;

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    subscription_tier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserRecord,
}

impl UserRecord {
    fn into_identity(self) -> Identity {
        let tier = self
            .app_metadata
            .subscription_tier
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(Tier::Free);
        Identity {
            user_id: self.id,
            email: self.email.unwrap_or_default(),
            role: Role::from_claim(self.app_metadata.role.as_deref()),
            tier,
        }
    }
}

/// Resolves sessions against the hosted auth service.
pub struct SupabaseResolver {
    client: reqwest::Client,
    base: Url,
    anon_key: String,
    cookies: SessionCookies,
    refresh_margin_secs: i64,
}

impl SupabaseResolver {
    pub fn new(config: &IdentityConfig, cookies: SessionCookies) -> Result<Self, IdentityError> {
        let base = Url::parse(&config.url).map_err(|e| IdentityError::Malformed(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base,
            anon_key: config.anon_key.clone(),
            cookies,
            refresh_margin_secs: config.refresh_margin_secs as i64,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base.join(path).map_err(|e| IdentityError::Malformed(e.to_string()))
    }

    /// `Ok(None)` when the provider rejects the token.
    async fn fetch_user(&self, access_token: &str) -> Result<Option<Identity>, IdentityError> {
        let response = self
            .client
            .get(self.endpoint("/auth/v1/user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let user: UserRecord = response.json().await?;
                Ok(Some(user.into_identity()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            other => Err(IdentityError::UnexpectedStatus(other.as_u16())),
        }
    }

    /// `Ok(None)` when the refresh token is invalid or already used.
    async fn refresh(&self, refresh_token: &str) -> Result<Option<(Identity, SessionTokens)>, IdentityError> {
        let mut url = self.endpoint("/auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: TokenResponse = response.json().await?;
                let expires_at = body
                    .expires_at
                    .or_else(|| body.expires_in.map(|secs| Utc::now().timestamp() + secs))
                    .ok_or_else(|| IdentityError::Malformed("token response without expiry".into()))?;
                let tokens = SessionTokens {
                    access_token: body.access_token,
                    refresh_token: body.refresh_token,
                    expires_at,
                };
                Ok(Some((body.user.into_identity(), tokens)))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Ok(None),
            other => Err(IdentityError::UnexpectedStatus(other.as_u16())),
        }
    }
}

#[async_trait]
impl SessionResolver for SupabaseResolver {
    async fn resolve(&self, jar: &CookieJar) -> Result<Resolution, IdentityError> {
        if !self.cookies.present_in(jar) {
            return Ok(Resolution::anonymous());
        }

        let now = Utc::now().timestamp();
        let expiring = jar
            .get(&self.cookies.expires)
            .and_then(|v| v.parse::<i64>().ok())
            .map(|expires_at| expires_at <= now + self.refresh_margin_secs)
            .unwrap_or(false);

        if let Some(access_token) = jar.get(&self.cookies.access) {
            if !expiring {
                if let Some(identity) = self.fetch_user(access_token).await? {
                    return Ok(Resolution::authenticated(identity));
                }
            }
        }

        if let Some(refresh_token) = jar.get(&self.cookies.refresh) {
            if let Some((identity, tokens)) = self.refresh(refresh_token).await? {
                tracing::debug!(user_id = %identity.user_id, "Session refreshed");
                return Ok(Resolution::rotated(identity, self.cookies.issue(&tokens)));
            }
        }

        Ok(Resolution::cleared(self.cookies.clear()))
    }

    async fn sign_out(&self, jar: &CookieJar) -> Result<Vec<SessionCookie>, IdentityError> {
        if let Some(access_token) = jar.get(&self.cookies.access) {
            let response = self
                .client
                .post(self.endpoint("/auth/v1/logout")?)
                .header("apikey", &self.anon_key)
                .bearer_auth(access_token)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() && status != StatusCode::UNAUTHORIZED {
                return Err(IdentityError::UnexpectedStatus(status.as_u16()));
            }
        }
        Ok(self.cookies.clear())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_record_maps_claims() {
        let user: UserRecord = serde_json::from_value(serde_json::json!({
            "id": "3f1c",
            "email": "ops@rekonnlabs.com",
            "app_metadata": { "role": "admin", "subscription_tier": "pro" }
        }))
        .unwrap();
        let identity = user.into_identity();
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.tier, Tier::Pro);
    }

    #[test]
    fn test_email_domain_grants_nothing() {
        let user: UserRecord = serde_json::from_value(serde_json::json!({
            "id": "3f1c",
            "email": "someone@rekonnlabs.com"
        }))
        .unwrap();
        let identity = user.into_identity();
        assert_eq!(identity.role, Role::User);
        assert_eq!(identity.tier, Tier::Free);
    }

    #[tokio::test]
    async fn test_no_cookies_skips_network() {
        let mut config = IdentityConfig::default();
        // Unroutable: any request would fail.
        config.url = "http://127.0.0.1:1".into();
        let resolver = SupabaseResolver::new(&config, SessionCookies::from_config(&config, false)).unwrap();
        let resolution = resolver.resolve(&CookieJar::default()).await.unwrap();
        assert!(resolution.identity.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_an_error() {
        let mut config = IdentityConfig::default();
        config.url = "http://127.0.0.1:1".into();
        let resolver = SupabaseResolver::new(&config, SessionCookies::from_config(&config, false)).unwrap();

        let mut headers = axum::http::HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, "sb-access-token=abc".parse().unwrap());
        let result = resolver.resolve(&CookieJar::from_headers(&headers)).await;
        assert!(matches!(result, Err(IdentityError::Transport(_))));
    }
}
