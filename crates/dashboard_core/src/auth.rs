use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use shared::{
    domain::UserProfile,
    protocol::{AuthResponse, LoginRequest, ProfileUpdate, RegisterRequest, UserResponse},
};
use tokio::sync::RwLock;
use tracing::info;

use crate::store::{read_success, trim_trailing_slash};

/// Holds the opaque bearer credential shared by every HTTP collaborator.
/// The token is whatever `/auth/login` returned; nothing here inspects it.
pub struct AuthSession {
    token: RwLock<Option<String>>,
}

impl AuthSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            token: RwLock::new(None),
        })
    }

    pub fn with_token(token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            token: RwLock::new(Some(token.into())),
        })
    }

    pub async fn bearer_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

/// Client for the `/auth` endpoints: the session collaborator the task
/// dashboard depends on but never calls itself. Login and register store
/// the issued token into the shared [`AuthSession`].
pub struct AuthClient {
    http: Client,
    server_url: String,
    session: Arc<AuthSession>,
}

impl AuthClient {
    pub fn new(server_url: impl Into<String>, session: Arc<AuthSession>) -> Self {
        Self {
            http: Client::new(),
            server_url: trim_trailing_slash(server_url.into()),
            session,
        }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile> {
        let response = self
            .http
            .post(format!("{}/auth/register", self.server_url))
            .json(request)
            .send()
            .await
            .context("register request failed")?;
        let body: AuthResponse = read_success(response)
            .await?
            .json()
            .await
            .context("invalid register response")?;
        self.session.set_token(body.data.token).await;
        info!(user_id = %body.data.user.id, "registered and signed in");
        Ok(body.data.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let response = self
            .http
            .post(format!("{}/auth/login", self.server_url))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .context("login request failed")?;
        let body: AuthResponse = read_success(response)
            .await?
            .json()
            .await
            .context("invalid login response")?;
        self.session.set_token(body.data.token).await;
        info!(user_id = %body.data.user.id, "signed in");
        Ok(body.data.user)
    }

    pub async fn me(&self) -> Result<UserProfile> {
        let response = self
            .authorize(self.http.get(format!("{}/auth/me", self.server_url)))
            .await
            .send()
            .await
            .context("profile request failed")?;
        let body: UserResponse = read_success(response)
            .await?
            .json()
            .await
            .context("invalid profile response")?;
        Ok(body.data.user)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        let response = self
            .authorize(
                self.http
                    .put(format!("{}/auth/profile", self.server_url))
                    .json(update),
            )
            .await
            .send()
            .await
            .context("profile update request failed")?;
        let body: UserResponse = read_success(response)
            .await?
            .json()
            .await
            .context("invalid profile update response")?;
        Ok(body.data.user)
    }

    /// Drops the stored credential. Purely local; the token stays valid
    /// server-side until it expires.
    pub async fn logout(&self) {
        self.session.clear().await;
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.bearer_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
