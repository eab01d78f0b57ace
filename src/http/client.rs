//! Resilient HTTP client for one downstream service.
//!
//! # Responsibilities
//! - Resolve paths against the service base URL
//! - Attach default headers and one `x-request-id` per logical call
//! - Run every request through the dependency's `ResilientClient`
//! - Decode JSON bodies, treating undecodable payloads as permanent failures
//!
//! # Design Decisions
//! - The request is rebuilt for every attempt; bodies are buffered bytes
//! - The request ID is reused across retries so the dependency can
//!   correlate them

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::config::DependencyConfig;
use crate::http::transport::{TransportError, TransportResponse};
use crate::resilience::client::ResilientClient;
use crate::resilience::outcome::{CallOutcome, FailureCause, ResilienceError};
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::timeouts::CallContext;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Per-call additions to a request, applied on every attempt.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: HeaderMap,
    query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header for this call only. Overrides a default header of the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    base_url: String,
    http: reqwest::Client,
    default_headers: HeaderMap,
    resilient: ResilientClient,
}

impl ServiceClient {
    /// Client for dependency `name` at `base_url`.
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        registry: Arc<BreakerRegistry>,
    ) -> Result<Self, url::ParseError> {
        let parsed = url::Url::parse(base_url)?;
        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            default_headers: HeaderMap::new(),
            resilient: ResilientClient::new(name, registry),
        })
    }

    pub fn from_config(dependency: &DependencyConfig, registry: Arc<BreakerRegistry>) -> Result<Self, url::ParseError> {
        Self::new(dependency.name.clone(), &dependency.base_url, registry)
    }

    /// Header sent with every request.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Use a preconfigured `reqwest` client (pooling, TLS, proxies).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn dependency(&self) -> &str {
        self.resilient.dependency()
    }

    pub fn resilient(&self) -> &ResilientClient {
        &self.resilient
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str) -> CallOutcome<TransportResponse> {
        self.get_with(path, &RequestOptions::default()).await
    }

    /// GET with per-call headers and query parameters.
    pub async fn get_with(&self, path: &str, options: &RequestOptions) -> CallOutcome<TransportResponse> {
        self.send(Method::GET, path, None, options, &CallContext::new()).await
    }

    pub async fn delete(&self, path: &str) -> CallOutcome<TransportResponse> {
        self.send(Method::DELETE, path, None, &RequestOptions::default(), &CallContext::new())
            .await
    }

    pub async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> CallOutcome<TransportResponse> {
        self.send_json(Method::POST, path, body, &RequestOptions::default(), &CallContext::new())
            .await
    }

    pub async fn put_json<B: Serialize>(&self, path: &str, body: &B) -> CallOutcome<TransportResponse> {
        self.send_json(Method::PUT, path, body, &RequestOptions::default(), &CallContext::new())
            .await
    }

    /// GET and decode the body as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> CallOutcome<T> {
        self.get_json_with(path, &RequestOptions::default()).await
    }

    /// [`get_json`](Self::get_json) with per-call headers and query parameters.
    pub async fn get_json_with<T: DeserializeOwned>(&self, path: &str, options: &RequestOptions) -> CallOutcome<T> {
        self.send_and_then(Method::GET, path, None, options, &CallContext::new(), |r| r.json())
            .await
    }

    /// POST `body` as JSON and decode the response as `T`.
    pub async fn post_json_for<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> CallOutcome<T> {
        match self.encode(body) {
            Ok(bytes) => {
                self.send_and_then(
                    Method::POST,
                    path,
                    Some(bytes),
                    &RequestOptions::default(),
                    &CallContext::new(),
                    |r| r.json(),
                )
                .await
            }
            Err(failure) => failure,
        }
    }

    /// [`get_json`](Self::get_json) with a fallback for an open circuit or
    /// an exhausted retry budget.
    pub async fn get_json_or_else<T, G>(&self, path: &str, fallback: G) -> CallOutcome<T>
    where
        T: DeserializeOwned,
        G: FnOnce(&ResilienceError) -> T,
    {
        let outcome = self.get_json(path).await;
        self.resilient.degrade(outcome, fallback)
    }

    /// Serialize `body` and send it with `options` and `ctx`.
    pub async fn send_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        options: &RequestOptions,
        ctx: &CallContext,
    ) -> CallOutcome<TransportResponse> {
        match self.encode(body) {
            Ok(bytes) => self.send(method, path, Some(bytes), options, ctx).await,
            Err(failure) => failure,
        }
    }

    /// Issue `method path` through the resilient call path.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        options: &RequestOptions,
        ctx: &CallContext,
    ) -> CallOutcome<TransportResponse> {
        self.send_and_then(method, path, body, options, ctx, Ok).await
    }

    async fn send_and_then<T, M>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        options: &RequestOptions,
        ctx: &CallContext,
        finish: M,
    ) -> CallOutcome<T>
    where
        M: FnOnce(TransportResponse) -> Result<T, TransportError>,
    {
        let url = self.url(path);
        let request_id = ctx.request_id.to_string();

        tracing::debug!(
            dependency = %self.dependency(),
            method = %method,
            url = %url,
            query = options.query.len(),
            request_id = %request_id,
            "Calling dependency"
        );

        self.resilient
            .execute_and_then(
                ctx,
                || {
                    let mut request = self
                        .http
                        .request(method.clone(), &url)
                        .headers(self.default_headers.clone())
                        .headers(options.headers.clone())
                        .header(X_REQUEST_ID, &request_id);
                    if !options.query.is_empty() {
                        request = request.query(&options.query);
                    }
                    if let Some(bytes) = &body {
                        request = request.header(CONTENT_TYPE, "application/json").body(bytes.clone());
                    }
                    async move {
                        let response = request.send().await.map_err(TransportError::from)?;
                        TransportResponse::read(response).await
                    }
                },
                finish,
            )
            .await
    }

    /// Encode a JSON body. A failure never reaches the dependency but is
    /// still reported as the call's outcome.
    fn encode<B: Serialize, T>(&self, body: &B) -> Result<Vec<u8>, CallOutcome<T>> {
        serde_json::to_vec(body).map_err(|e| {
            let error = TransportError::InvalidRequest(format!("JSON encode failed: {}", e));
            tracing::warn!(dependency = %self.dependency(), error = %error, "Unusable request");
            let failure = ResilienceError::Permanent {
                dependency: self.dependency().to_string(),
                cause: FailureCause::Transport(error),
            };
            self.resilient
                .registry()
                .observer()
                .on_outcome(self.dependency(), Some(&failure));
            CallOutcome::Failure(failure)
        })
    }
}
