//! GoTrue (Supabase Auth) REST client.

use crate::{AuthBackend, AuthError, AuthResult, Session, User};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fixitkit_config::Config;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, warn};

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Pull a human-readable message out of a GoTrue error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(String::from))
        })
        .unwrap_or_else(|| "request rejected".to_string())
}

/// Token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserResponse> for User {
    fn from(user: UserResponse) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.expires_in));

        Session {
            user: self.user.into(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// [`AuthBackend`] over the GoTrue REST endpoints.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http_client: Client,
    supabase_url: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(supabase_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let supabase_url: String = supabase_url.into();
        Self {
            http_client: Client::new(),
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    /// Build a client from validated configuration.
    pub fn from_config(config: &Config) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self::new(&config.supabase_url, &config.supabase_anon_key))
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url, path)
    }

    /// Read a failed response into an error, logging only a body summary.
    async fn failure(response: Response, context: &'static str) -> (StatusCode, String) {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(
            status = %status,
            body_summary = %summarize_response_body(&body),
            "{} failed",
            context
        );
        (status, error_message(&body))
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> AuthResult<Result<TokenResponse, (StatusCode, String)>> {
        let url = self.auth_url(&format!("token?grant_type={}", grant_type));
        debug!(grant_type, "Requesting token grant");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(Err(Self::failure(response, "Token grant").await));
        }

        Ok(Ok(response.json().await?))
    }
}

fn api_error(status: StatusCode, message: String) -> AuthError {
    AuthError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl AuthBackend for SupabaseAuthClient {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Option<Session>> {
        debug!(email = %email, "Signing up");

        let response = self
            .http_client
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = Self::failure(response, "Sign up").await;
            return Err(api_error(status, message));
        }

        // With autoconfirm on the body is a full token response; otherwise
        // it is just the pending user.
        let body: serde_json::Value = response.json().await?;
        if body.get("access_token").is_some() {
            let tokens: TokenResponse = serde_json::from_value(body)?;
            Ok(Some(tokens.into_session()))
        } else {
            Ok(None)
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        debug!(email = %email, "Attempting email/password login");

        let grant = self
            .token_grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        match grant {
            Ok(tokens) => Ok(tokens.into_session()),
            Err((status, message)) if status.is_client_error() => {
                Err(AuthError::InvalidCredentials(message))
            }
            Err((status, message)) => Err(api_error(status, message)),
        }
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .http_client
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = Self::failure(response, "Logout").await;
            return Err(api_error(status, message));
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> AuthResult<User> {
        let response = self
            .http_client
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = Self::failure(response, "Session verification").await;
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(AuthError::SessionInvalid(message));
            }
            return Err(api_error(status, message));
        }

        let user: UserResponse = response.json().await?;
        debug!(user_id = %user.id, "Session verified with server");
        Ok(user.into())
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<Session> {
        let grant = self
            .token_grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await?;

        match grant {
            Ok(tokens) => Ok(tokens.into_session()),
            Err((status, message)) if status.is_client_error() => {
                Err(AuthError::TokenRefresh(message))
            }
            Err((status, message)) => Err(api_error(status, message)),
        }
    }
}
