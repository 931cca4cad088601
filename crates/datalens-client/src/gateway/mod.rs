//! HTTP gateway for the platform REST API.
//!
//! Single point of outbound request construction, auth-header injection and
//! 401-driven token refresh. Requests carry `Authorization: Bearer <token>`
//! when an access token is held and `X-Project-ID` when a project is
//! selected. A 401 triggers exactly one shared refresh call followed by a
//! single retry of the original request; a failed refresh ends the session.

pub mod single_flight;

use std::sync::{Arc, RwLock};

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{
    AuthResponse, BlogPost, BlogPostRequest, Page, Project, ProjectRequest, ProjectStats,
    SnowflakeStage, TokenPair, User,
};
use crate::notify::Notifier;
use crate::paths;
use crate::storage::{slots, Storage};
use single_flight::SingleFlight;

/// Header carrying the current project selection.
pub const PROJECT_HEADER: &str = "X-Project-ID";

const FALLBACK_ERROR_MESSAGE: &str = "An error occurred";

/// Shared holder for the bearer token pair.
#[derive(Clone, Default)]
struct TokenCell {
    inner: Arc<RwLock<TokenState>>,
}

#[derive(Default)]
struct TokenState {
    access: Option<String>,
    refresh: Option<String>,
}

impl TokenCell {
    fn set_pair(&self, pair: &TokenPair) {
        let mut state = self.inner.write().expect("token lock poisoned");
        state.access = Some(pair.access_token.clone());
        state.refresh = Some(pair.refresh_token.clone());
    }

    fn set_access(&self, token: &str) {
        let mut state = self.inner.write().expect("token lock poisoned");
        state.access = Some(token.to_string());
    }

    fn restore(&self, access: Option<String>, refresh: Option<String>) {
        let mut state = self.inner.write().expect("token lock poisoned");
        state.access = access;
        state.refresh = refresh;
    }

    /// Drops both tokens. Returns whether anything was actually held.
    fn clear(&self) -> bool {
        let mut state = self.inner.write().expect("token lock poisoned");
        let had_tokens = state.access.is_some() || state.refresh.is_some();
        state.access = None;
        state.refresh = None;
        had_tokens
    }

    fn access(&self) -> Option<String> {
        self.inner.read().expect("token lock poisoned").access.clone()
    }

    fn refresh(&self) -> Option<String> {
        self.inner.read().expect("token lock poisoned").refresh.clone()
    }
}

/// HTTP client for the platform API.
#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenCell,
    project: Arc<RwLock<Option<String>>>,
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    refresh_flight: Arc<SingleFlight<Result<TokenPair, ApiError>>>,
}

impl Gateway {
    /// Create a new gateway against the configured backend.
    pub fn new(
        config: &ClientConfig,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens: TokenCell::default(),
            project: Arc::new(RwLock::new(None)),
            storage,
            notifier,
            refresh_flight: Arc::new(SingleFlight::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ---- token custody ----

    /// Adopt a full token pair, persisting it to the token slots.
    pub fn adopt_tokens(&self, pair: &TokenPair) {
        self.tokens.set_pair(pair);
        self.persist_slot(slots::ACCESS_TOKEN, &pair.access_token);
        self.persist_slot(slots::REFRESH_TOKEN, &pair.refresh_token);
    }

    /// Adopt an access token alone (OAuth callback path); any held refresh
    /// token is kept.
    pub fn adopt_access_token(&self, token: &str) {
        self.tokens.set_access(token);
        self.persist_slot(slots::ACCESS_TOKEN, token);
    }

    /// Drop tokens from memory and storage without firing the
    /// session-expired side effect (explicit logout).
    pub fn clear_tokens(&self) {
        self.tokens.clear();
        self.remove_slot(slots::ACCESS_TOKEN);
        self.remove_slot(slots::REFRESH_TOKEN);
    }

    /// Restore tokens from the persisted slots.
    pub fn load_tokens(&self) -> Result<(), ApiError> {
        let access = self.storage.read(slots::ACCESS_TOKEN)?;
        let refresh = self.storage.read(slots::REFRESH_TOKEN)?;
        self.tokens.restore(access, refresh);
        Ok(())
    }

    /// Currently held access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.tokens.access()
    }

    /// Currently held refresh token, if any.
    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.refresh()
    }

    /// Select the project whose id is attached to outbound requests.
    pub fn set_project_context(&self, project_id: Option<String>) {
        *self.project.write().expect("project lock poisoned") = project_id;
    }

    fn project_context(&self) -> Option<String> {
        self.project.read().expect("project lock poisoned").clone()
    }

    fn persist_slot(&self, slot: &str, value: &str) {
        if let Err(err) = self.storage.write(slot, value) {
            tracing::warn!(error = %err, slot, "failed to persist slot");
        }
    }

    fn remove_slot(&self, slot: &str) {
        if let Err(err) = self.storage.remove(slot) {
            tracing::warn!(error = %err, slot, "failed to clear slot");
        }
    }

    /// Terminal refresh failure: drop all credentials and fire the
    /// session-expired side effect once.
    fn expire_session(&self) {
        if self.tokens.clear() {
            self.remove_slot(slots::ACCESS_TOKEN);
            self.remove_slot(slots::REFRESH_TOKEN);
            self.notifier.session_expired();
        }
    }

    // ---- request pipeline ----

    /// Build and dispatch a request. The request is constructed fresh on
    /// every call so a retry picks up the current token pair.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let mut request = self.http.request(method, self.url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.tokens.access() {
            request = request.bearer_auth(token);
        }
        if let Some(project_id) = self.project_context() {
            request = request.header(PROJECT_HEADER, project_id);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) => Ok(response),
            Err(err) => {
                let err = ApiError::from(err);
                self.notifier.error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Dispatch with the 401 refresh protocol: on a 401, run the shared
    /// refresh and retry the original request exactly once.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let response = self.dispatch(method.clone(), path, query, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return self.ensure_success(response).await;
        }

        if self.tokens.refresh().is_none() {
            self.expire_session();
            return Err(ApiError::SessionExpired);
        }

        if let Err(err) = self.refresh_tokens().await {
            tracing::debug!(error = %err, "token refresh failed");
            self.expire_session();
            return Err(ApiError::SessionExpired);
        }

        let retried = self.dispatch(method, path, query, body).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            // The retry is never allowed to trigger a second refresh.
            self.expire_session();
            return Err(ApiError::SessionExpired);
        }
        self.ensure_success(retried).await
    }

    /// Dispatch without the refresh protocol. Used for the stateless auth
    /// endpoints, where a 401 means bad credentials rather than an expired
    /// session.
    async fn send_public(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let response = self.dispatch(method, path, query, body).await?;
        self.ensure_success(response).await
    }

    async fn ensure_success(&self, response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = Self::error_message(response.json::<Value>().await.ok());
        self.notifier.error(&message);
        Err(ApiError::Api { status, message })
    }

    /// Extract a human-readable message from an error body. The auth
    /// endpoints use `detail`, the resource endpoints use `error`.
    fn error_message(body: Option<Value>) -> String {
        body.as_ref()
            .and_then(|body| {
                ["detail", "error", "message"]
                    .iter()
                    .find_map(|key| body.get(key).and_then(Value::as_str))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string())
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    fn encode<T: serde::Serialize>(body: &T) -> Result<Value, ApiError> {
        serde_json::to_value(body).map_err(|err| ApiError::Decode(err.to_string()))
    }

    // ---- token refresh ----

    /// Refresh the token pair. Concurrent callers share one in-flight
    /// refresh call; the rotated pair is persisted before anyone proceeds.
    async fn refresh_tokens(&self) -> Result<TokenPair, ApiError> {
        let this = self.clone();
        self.refresh_flight
            .run(move || async move { this.request_refresh().await })
            .await
    }

    async fn request_refresh(&self) -> Result<TokenPair, ApiError> {
        let refresh_token = self.tokens.refresh().ok_or(ApiError::NotAuthenticated)?;

        let response = self
            .http
            .post(self.url(paths::AUTH_REFRESH))
            .query(&[("refresh_token", refresh_token.as_str())])
            .send()
            .await
            .map_err(ApiError::from)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = Self::error_message(response.json::<Value>().await.ok());
            return Err(ApiError::Api { status, message });
        }

        let pair: TokenPair = Self::decode(response).await?;
        self.adopt_tokens(&pair);
        tracing::debug!("token pair rotated");
        Ok(pair)
    }

    // ---- auth endpoints ----

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .send_public(Method::POST, paths::AUTH_LOGIN, &[], Some(&body))
            .await?;
        Self::decode(response).await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        locale: &str,
    ) -> Result<(), ApiError> {
        let body = json!({ "email": email, "password": password, "locale": locale });
        self.send_public(Method::POST, paths::AUTH_REGISTER, &[], Some(&body))
            .await?;
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), ApiError> {
        let query = [("token", token.to_string())];
        self.send_public(Method::POST, paths::AUTH_VERIFY_EMAIL, &query, None)
            .await?;
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let query = [("email", email.to_string())];
        self.send_public(Method::POST, paths::AUTH_REQUEST_PASSWORD_RESET, &query, None)
            .await?;
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        let query = [
            ("token", token.to_string()),
            ("new_password", new_password.to_string()),
        ];
        self.send_public(Method::POST, paths::AUTH_RESET_PASSWORD, &query, None)
            .await?;
        Ok(())
    }

    // ---- user endpoints ----

    pub async fn current_user(&self) -> Result<User, ApiError> {
        let response = self.send(Method::GET, paths::USERS_ME, &[], None).await?;
        Self::decode(response).await
    }

    // ---- project endpoints ----

    pub async fn active_projects(&self) -> Result<Vec<Project>, ApiError> {
        let response = self
            .send(Method::GET, paths::PROJECTS_ACTIVE, &[], None)
            .await?;
        Self::decode(response).await
    }

    pub async fn all_projects(&self) -> Result<Vec<Project>, ApiError> {
        let response = self.send(Method::GET, paths::PROJECTS, &[], None).await?;
        Self::decode(response).await
    }

    pub async fn create_project(&self, request: &ProjectRequest) -> Result<Project, ApiError> {
        let body = Self::encode(request)?;
        let response = self
            .send(Method::POST, paths::PROJECTS, &[], Some(&body))
            .await?;
        Self::decode(response).await
    }

    pub async fn update_project(
        &self,
        id: &str,
        request: &ProjectRequest,
    ) -> Result<Project, ApiError> {
        let body = Self::encode(request)?;
        let response = self
            .send(Method::PUT, &paths::project(id), &[], Some(&body))
            .await?;
        Self::decode(response).await
    }

    pub async fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, &paths::project(id), &[], None)
            .await?;
        Ok(())
    }

    pub async fn archive_project(&self, id: &str) -> Result<(), ApiError> {
        self.send(Method::PATCH, &paths::project_archive(id), &[], None)
            .await?;
        Ok(())
    }

    pub async fn restore_project(&self, id: &str) -> Result<(), ApiError> {
        self.send(Method::PATCH, &paths::project_restore(id), &[], None)
            .await?;
        Ok(())
    }

    pub async fn search_projects(&self, query: &str) -> Result<Vec<Project>, ApiError> {
        let query = [("q", query.to_string())];
        let response = self
            .send(Method::GET, paths::PROJECTS_SEARCH, &query, None)
            .await?;
        Self::decode(response).await
    }

    pub async fn active_project_count(&self) -> Result<u64, ApiError> {
        let response = self
            .send(Method::GET, paths::PROJECTS_COUNT, &[], None)
            .await?;
        Self::decode(response).await
    }

    pub async fn project_stats(&self) -> Result<ProjectStats, ApiError> {
        let response = self
            .send(Method::GET, paths::PROJECTS_STATS, &[], None)
            .await?;
        Self::decode(response).await
    }

    pub async fn recent_projects(&self, limit: u32) -> Result<Vec<Project>, ApiError> {
        let query = [("limit", limit.to_string())];
        let response = self
            .send(Method::GET, paths::PROJECTS_RECENT, &query, None)
            .await?;
        Self::decode(response).await
    }

    pub async fn project_stages(&self, id: &str) -> Result<Vec<SnowflakeStage>, ApiError> {
        let response = self
            .send(Method::GET, &paths::project_stages(id), &[], None)
            .await?;
        Self::decode(response).await
    }

    // ---- blog endpoints ----

    pub async fn published_posts(&self, page: u32, size: u32) -> Result<Page<BlogPost>, ApiError> {
        let query = [("page", page.to_string()), ("size", size.to_string())];
        let response = self
            .send(Method::GET, paths::BLOG_POSTS, &query, None)
            .await?;
        Self::decode(response).await
    }

    pub async fn my_posts(&self, page: u32, size: u32) -> Result<Page<BlogPost>, ApiError> {
        let query = [("page", page.to_string()), ("size", size.to_string())];
        let response = self
            .send(Method::GET, paths::BLOG_MY_POSTS, &query, None)
            .await?;
        Self::decode(response).await
    }

    pub async fn pending_posts(&self, page: u32, size: u32) -> Result<Page<BlogPost>, ApiError> {
        let query = [("page", page.to_string()), ("size", size.to_string())];
        let response = self
            .send(Method::GET, paths::BLOG_PENDING_POSTS, &query, None)
            .await?;
        Self::decode(response).await
    }

    pub async fn create_post(&self, request: &BlogPostRequest) -> Result<BlogPost, ApiError> {
        let body = Self::encode(request)?;
        let response = self
            .send(Method::POST, paths::BLOG_POSTS, &[], Some(&body))
            .await?;
        Self::decode(response).await
    }

    pub async fn update_post(
        &self,
        id: &str,
        request: &BlogPostRequest,
    ) -> Result<BlogPost, ApiError> {
        let body = Self::encode(request)?;
        let response = self
            .send(Method::PUT, &paths::blog_post(id), &[], Some(&body))
            .await?;
        Self::decode(response).await
    }

    pub async fn delete_post(&self, id: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, &paths::blog_post(id), &[], None)
            .await?;
        Ok(())
    }

    pub async fn submit_post(&self, id: &str) -> Result<BlogPost, ApiError> {
        let response = self
            .send(Method::POST, &paths::blog_post_submit(id), &[], None)
            .await?;
        Self::decode(response).await
    }

    pub async fn approve_post(&self, id: &str) -> Result<BlogPost, ApiError> {
        let response = self
            .send(Method::POST, &paths::blog_post_approve(id), &[], None)
            .await?;
        Self::decode(response).await
    }

    pub async fn reject_post(&self, id: &str, reason: Option<&str>) -> Result<BlogPost, ApiError> {
        let query: Vec<(&str, String)> = reason
            .map(|reason| vec![("reason", reason.to_string())])
            .unwrap_or_default();
        let response = self
            .send(Method::POST, &paths::blog_post_reject(id), &query, None)
            .await?;
        Self::decode(response).await
    }
}
