// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport to the identity API.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::{json, Value};

use crate::error::Error;

/// Header carrying the tenant audience on authenticated requests.
pub const AUDIENCE_HEADER: &str = "X-JWT-AUD";

/// Request body payloads the identity API accepts.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// Options for a single API request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Per-request audience override; empty means "use the client default".
    pub audience: String,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { method: Method::GET, headers: Vec::new(), body: None, audience: String::new() }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self { method: Method::POST, ..Self::default() }
    }

    pub fn post_json(body: Value) -> Self {
        Self { method: Method::POST, body: Some(RequestBody::Json(body)), ..Self::default() }
    }

    pub fn post_form(fields: Vec<(String, String)>) -> Self {
        Self { method: Method::POST, body: Some(RequestBody::Form(fields)), ..Self::default() }
    }

    pub fn put_json(body: Value) -> Self {
        Self { method: Method::PUT, body: Some(RequestBody::Json(body)), ..Self::default() }
    }

    pub fn delete_json(body: Value) -> Self {
        Self { method: Method::DELETE, body: Some(RequestBody::Json(body)), ..Self::default() }
    }

    /// Attach a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Scope this request to a different audience than the client default.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }
}

/// HTTP client wrapper for the identity API.
///
/// Clone is cheap; the inner `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct Api {
    base_url: String,
    http: reqwest::Client,
}

impl Api {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.into(), http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue a request and parse the response.
    ///
    /// Success bodies with a JSON content type are decoded; anything else is
    /// wrapped as `{"data": <raw text>}`. Non-success statuses become
    /// [`Error::AuthRejected`] with the message rewritten from the server's
    /// error envelope when one is present.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, Error> {
        let mut req = self.http.request(options.method.clone(), self.url(path));
        for (name, value) in &options.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        match &options.body {
            Some(RequestBody::Json(body)) => req = req.json(body),
            Some(RequestBody::Form(fields)) => req = req.form(fields),
            None => {}
        }

        let resp = req.send().await?;
        let status = resp.status();
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));
        let text = resp.text().await?;

        if !status.is_success() {
            let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            return Err(Error::rejected(status.as_u16(), &body));
        }

        if !is_json {
            return Ok(json!({ "data": text }));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| Error::Network(format!("invalid json response: {e}")))
    }
}
