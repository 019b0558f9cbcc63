//! HTTP client
//!
//! Every request goes through [`ApiClient::send`], which attaches the bearer
//! token from session storage, unwraps the response envelope and handles the
//! 401 → refresh → replay-once flow.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use crate::api::auth::{RefreshPhase, TokenRefresher};
use crate::api::envelope::{self, Reply};
use crate::config::ClientConfig;
use crate::storage::{SessionStorage, TOKEN_KEY, USER_KEY};
use crate::{Result, StorefrontError};

pub const REFRESH_PATH: &str = "/api/Account/refresh-token";
pub const JSON_PATCH: &str = "application/json-patch+json";

/// A request description that can be sent again after a token refresh.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub content_type: Option<&'static str>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, content_type: None }
    }

    pub fn get(path: impl Into<String>) -> Self { Self::new(Method::GET, path) }
    pub fn post(path: impl Into<String>) -> Self { Self::new(Method::POST, path) }
    pub fn put(path: impl Into<String>) -> Self { Self::new(Method::PUT, path) }
    pub fn delete(path: impl Into<String>) -> Self { Self::new(Method::DELETE, path) }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = Some(content_type);
        self
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    refresh_timeout: Duration,
    storage: Arc<dyn SessionStorage>,
    refresher: TokenRefresher,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            base_url: config.backend_url.clone(),
            refresh_timeout: config.refresh_timeout,
            storage,
            refresher: TokenRefresher::new(),
        })
    }

    pub fn base_url(&self) -> &str { &self.base_url }
    pub fn storage(&self) -> &Arc<dyn SessionStorage> { &self.storage }
    pub fn refresh_phase(&self) -> RefreshPhase { self.refresher.phase() }

    pub fn current_token(&self) -> Result<Option<String>> {
        Ok(self.storage.get(TOKEN_KEY)?.filter(|t| !t.trim().is_empty()))
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        self.storage.set(TOKEN_KEY, token)
    }

    /// Drops the stored credentials. Callers observe the change through storage.
    pub fn logout(&self) -> Result<()> {
        info!("clearing stored credentials");
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<Reply> {
        let token = self.current_token()?;
        let response = self.dispatch(request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return self.read(request, response).await;
        }

        warn!(method = %request.method, path = %request.path, "request unauthorized");
        if request.path.starts_with(REFRESH_PATH) {
            self.logout()?;
            return Err(StorefrontError::Unauthorized);
        }

        let fresh = self.recover_token(token.as_deref()).await?;
        let response = self.dispatch(request, Some(&fresh)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path, "replayed request still unauthorized");
            self.logout()?;
            return Err(StorefrontError::Unauthorized);
        }
        self.read(request, response).await
    }

    async fn recover_token(&self, used: Option<&str>) -> Result<String> {
        let current = || self.current_token().ok().flatten();
        let result = self
            .refresher
            .recover(used, current, || async {
                let token = self.refresh_token().await?;
                self.set_token(&token)?;
                Ok(token)
            })
            .await;
        if result.is_err() {
            self.logout()?;
        }
        result
    }

    /// Cookie-based refresh-token exchange. Sent without a bearer header.
    pub async fn refresh_token(&self) -> Result<String> {
        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        let response = self
            .http
            .get(&url)
            .timeout(self.refresh_timeout)
            .header("X-Request-Id", Uuid::new_v4().to_string())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "refresh token request failed");
                StorefrontError::Transport(e)
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(StorefrontError::Unauthorized);
        }
        let text = response.text().await?;
        let body = parse_body(&text);
        if !status.is_success() {
            return Err(StorefrontError::Api {
                status: status.as_u16(),
                message: envelope::message(&body).unwrap_or_else(|| "Token refresh failed".to_string()),
            });
        }
        envelope::access_token(&body).ok_or_else(|| {
            error!("refresh response did not contain a usable token");
            StorefrontError::Api { status: status.as_u16(), message: "Invalid token response format".to_string() }
        })
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.path);
        let request_id = Uuid::new_v4();
        debug!(%request_id, method = %request.method, %url, "sending request");

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header("X-Request-Id", request_id.to_string());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, request.content_type.unwrap_or("application/json"))
                .body(serde_json::to_vec(body)?);
        }

        builder.send().await.map_err(|e| {
            error!(%request_id, path = %request.path, error = %e, "request failed");
            StorefrontError::Transport(e)
        })
    }

    async fn read(&self, request: &ApiRequest, response: Response) -> Result<Reply> {
        let status = response.status();
        let text = response.text().await?;
        let body = parse_body(&text);

        if !status.is_success() {
            let message = envelope::message(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("Request failed").to_string()
            });
            error!(method = %request.method, path = %request.path, status = status.as_u16(), %message, "backend rejected request");
            return Err(StorefrontError::Api { status: status.as_u16(), message });
        }

        debug!(method = %request.method, path = %request.path, status = status.as_u16(), "request succeeded");
        Ok(Reply::from_body(body))
    }
}

/// Empty bodies read as null and non-JSON bodies as a string.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_body(" plain-token "), json!("plain-token"));
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get("/api/Order").query("page", 2).query("pageSize", 10);
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string()), ("pageSize".to_string(), "10".to_string())]);
        let request = ApiRequest::post("/api/Cart/items").json(&json!({"quantity": 1})).unwrap().content_type(JSON_PATCH);
        assert_eq!(request.content_type, Some(JSON_PATCH));
        assert!(request.body.is_some());
    }
}
