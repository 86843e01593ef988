// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Practice backend client
//!
//! Thin reqwest wrapper over the REST API. Authenticated calls carry the
//! session token in the `x-auth-token` header; a 401/403 on such a call is
//! reported as [`ApiError::TokenRejected`] so the session can force a logout.
//!
//! # Example
//!
//! ```no_run
//! use clinic_session::api::{ApiClient, AuthBackend};
//! use clinic_session::models::Credentials;
//!
//! # async fn example() -> Result<(), clinic_session::api::ApiError> {
//! let mut client = ApiClient::new("http://localhost:5000", 30)?;
//! let token = client.login(&Credentials::new("me@example.com", "secret")).await?;
//! client.set_token(Some(token));
//! let declarations = client.list_declarations().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Article, ArticleDraft, Credentials, Declaration, GalleryImage, User};

/// Default backend endpoint.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Header carrying the session token.
pub const AUTH_HEADER: &str = "x-auth-token";

/// Shown when the backend rejects a login without saying why.
const LOGIN_FAILED_MESSAGE: &str = "Login failed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Login rejected (bad email or password)
    #[error("{0}")]
    Credentials(String),

    /// Token missing from the backend's point of view: expired, revoked or forged
    #[error("session token was rejected by the server")]
    TokenRejected,

    /// An authenticated call was attempted with no token attached
    #[error("not signed in")]
    NotAuthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True for errors that mean the current token is no longer usable.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::TokenRejected)
    }

    /// True when the backend could not be reached at all.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Backend error body: `{"msg": "..."}` or `{"errors": [{"msg": "..."}]}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorBody>,
}

impl ErrorBody {
    fn message(self) -> Option<String> {
        self.msg
            .or_else(|| self.errors.into_iter().find_map(|e| e.msg))
            .filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// The two backend calls the session lifecycle depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a token.
    async fn login(&self, credentials: &Credentials) -> Result<String, ApiError>;

    /// Validate a token and return the profile it belongs to.
    async fn current_user(&self, token: &str) -> Result<User, ApiError>;

    /// Attach (or detach) the token used by later authenticated calls.
    fn set_token(&mut self, token: Option<String>);
}

/// HTTP client for the practice backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::NotAuthenticated)?;
        Ok(self.request(method, path).header(AUTH_HEADER, token))
    }

    /// Send a request and map non-success statuses. `authenticated` decides
    /// whether a 401/403 means a dead token or bad credentials.
    async fn send(&self, builder: RequestBuilder, authenticated: bool) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body.message();
        tracing::debug!(
            "API_ERROR | status={} authenticated={} msg={:?}",
            status.as_u16(),
            authenticated,
            message
        );

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if authenticated => ApiError::TokenRejected,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST if !authenticated => {
                ApiError::Credentials(message.unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_string()))
            }
            StatusCode::NOT_FOUND => ApiError::NotFound(message.unwrap_or_else(|| "resource".to_string())),
            _ => ApiError::Server {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            },
        })
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder, authenticated: bool) -> Result<T, ApiError> {
        let response = self.send(builder, authenticated).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Wake a sleeping backend host. Errors are only useful for diagnostics.
    pub async fn ping(&self) -> Result<(), ApiError> {
        self.send(self.request(Method::GET, "/api/ping"), false).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    pub async fn list_declarations(&self) -> Result<Vec<Declaration>, ApiError> {
        self.json(self.authed(Method::GET, "/api/declarations")?, true).await
    }

    /// Public submission; no token required.
    pub async fn submit_declaration(&self, declaration: &Declaration) -> Result<(), ApiError> {
        self.send(self.request(Method::POST, "/api/declarations").json(declaration), false)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Articles
    // ------------------------------------------------------------------

    /// Published articles, as shown on the public site.
    pub async fn list_published_articles(&self) -> Result<Vec<Article>, ApiError> {
        self.json(self.request(Method::GET, "/api/articles"), false).await
    }

    /// Every article including drafts.
    pub async fn list_all_articles(&self) -> Result<Vec<Article>, ApiError> {
        self.json(self.authed(Method::GET, "/api/articles/all")?, true).await
    }

    /// Any article by id, drafts included. Admin only.
    pub async fn get_article(&self, id: &str) -> Result<Article, ApiError> {
        let path = format!("/api/articles/admin/{}", id);
        self.json(self.authed(Method::GET, &path)?, true).await
    }

    pub async fn create_article(&self, draft: &ArticleDraft) -> Result<Article, ApiError> {
        self.json(self.authed(Method::POST, "/api/articles")?.json(draft), true)
            .await
    }

    pub async fn update_article(&self, id: &str, draft: &ArticleDraft) -> Result<Article, ApiError> {
        let path = format!("/api/articles/{}", id);
        self.json(self.authed(Method::PUT, &path)?.json(draft), true).await
    }

    pub async fn delete_article(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/api/articles/{}", id);
        self.send(self.authed(Method::DELETE, &path)?, true).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Gallery
    // ------------------------------------------------------------------

    pub async fn list_gallery(&self) -> Result<Vec<GalleryImage>, ApiError> {
        self.json(self.authed(Method::GET, "/api/gallery")?, true).await
    }

    pub async fn delete_gallery_image(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/api/gallery/{}", id);
        self.send(self.authed(Method::DELETE, &path)?, true).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<String, ApiError> {
        let builder = self.request(Method::POST, "/api/auth").json(credentials);
        let body: TokenResponse = self.json(builder, false).await?;
        Ok(body.token)
    }

    async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        let builder = self.request(Method::GET, "/api/auth").header(AUTH_HEADER, token);
        self.json(builder, true).await
    }

    fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }
}
