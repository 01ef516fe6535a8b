// ABOUTME: Axum HTTP testing utilities for integration tests
// ABOUTME: Drives routers through tower oneshot and decodes JSON and SSE bodies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;

/// SSE bodies in these tests always terminate; this bounds a hung stream
const SSE_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Helper to build and execute HTTP requests against Axum routers
pub struct AxumTestRequest {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl AxumTestRequest {
    fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_owned(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a new GET request
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Create a new POST request
    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Create a new PATCH request
    #[allow(dead_code)]
    pub fn patch(uri: &str) -> Self {
        Self::new(Method::PATCH, uri)
    }

    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Add an `Authorization` header
    pub fn auth(self, bearer: &str) -> Self {
        self.header(header::AUTHORIZATION.as_str(), bearer)
    }

    /// Add JSON body to the request
    pub fn json<T: Serialize>(mut self, data: &T) -> Self {
        self.body = Some(serde_json::to_string(data).expect("Failed to serialize JSON"));
        self.headers.push((
            header::CONTENT_TYPE.as_str().to_owned(),
            "application/json".to_owned(),
        ));
        self
    }

    async fn execute(self, app: Router) -> Response<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }

        let request = builder
            .body(Body::from(self.body.unwrap_or_default()))
            .expect("Failed to build request");

        app.oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    /// Execute the request against an Axum router
    pub async fn send(self, app: Router) -> AxumTestResponse {
        let response = self.execute(app).await;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body")
            .to_vec();
        AxumTestResponse { status, body }
    }

    /// Execute a request whose SSE body ends on its own, reading it to the end
    #[allow(dead_code)]
    pub async fn send_sse(self, app: Router) -> AxumTestResponse {
        let response = self.execute(app).await;
        let status = response.status();
        let body = tokio::time::timeout(SSE_READ_TIMEOUT, to_bytes(response.into_body(), usize::MAX))
            .await
            .expect("SSE stream did not finish")
            .expect("Failed to read SSE body")
            .to_vec();
        AxumTestResponse { status, body }
    }
}

/// Wrapper around Axum HTTP response for testing
pub struct AxumTestResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl AxumTestResponse {
    /// Get the response status code as u16 for easy assertion
    pub const fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Get the response body as a JSON value
    pub fn json<T: serde::de::DeserializeOwned>(self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to deserialize JSON response")
    }

    /// Get the response body as a string
    pub fn text(self) -> String {
        String::from_utf8(self.body).expect("Failed to decode response as UTF-8")
    }

    /// Every `data:` frame of an SSE body, decoded as JSON
    #[allow(dead_code)]
    pub fn sse_events(self) -> Vec<Value> {
        self.text()
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim()).expect("SSE data is not JSON"))
            .collect()
    }

    /// Assert that the status code matches
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {}: {}",
            expected,
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }
}
