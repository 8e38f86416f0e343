//! The single HTTP bridge every tool call goes through.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::environment::EnvironmentResolver;
use crate::error::{BridgeError, TransportError};

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Result of a best-effort JSON parse. Serialized untagged, so a raw body
/// appears on the wire as the exact text in a JSON string.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonOrText {
    Parsed(Value),
    Raw(String),
}

impl JsonOrText {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => JsonOrText::Parsed(value),
            Err(_) => JsonOrText::Raw(text.to_string()),
        }
    }
}

/// One outbound call, built fresh per tool invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    pub path: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub environment: Option<String>,
    pub base_url_override: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
            environment: None,
            base_url_override: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_base_url_override(mut self, url: Option<String>) -> Self {
        self.base_url_override = url;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub url: String,
    pub status: u16,
    pub data: JsonOrText,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Performs exactly one network exchange. No retries, no timeouts of its own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url =
            reqwest::Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
                url: request.url.clone(),
                reason: e.to_string(),
            })?;

        let mut builder = self.http.request(request.method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: request.url.clone(),
                source,
            })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|source| TransportError::Body {
                url: request.url.clone(),
                source,
            })?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Clone)]
pub struct RequestBridge {
    resolver: EnvironmentResolver,
    transport: Arc<dyn Transport>,
}

impl RequestBridge {
    pub fn new(resolver: EnvironmentResolver, transport: Arc<dyn Transport>) -> Self {
        Self {
            resolver,
            transport,
        }
    }

    /// Build the wire request for `spec`. Fails only when no base URL resolves.
    pub fn prepare(&self, spec: &RequestSpec) -> Result<HttpRequest, BridgeError> {
        let base_url = self.resolver.resolve(
            spec.environment.as_deref(),
            spec.base_url_override.as_deref(),
        )?;
        let url = format!("{}{}", base_url.trim_end_matches('/'), spec.path);

        let mut headers = BTreeMap::from([(
            "Content-Type".to_string(),
            DEFAULT_CONTENT_TYPE.to_string(),
        )]);
        for (name, value) in &spec.headers {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }

        let body = match &spec.body {
            Some(body) if method_allows_body(&spec.method) => Some(body.to_string()),
            _ => None,
        };

        Ok(HttpRequest {
            method: spec.method.clone(),
            url,
            headers,
            body,
        })
    }

    pub async fn execute(&self, spec: &RequestSpec) -> Result<ResponseEnvelope, BridgeError> {
        let request = self.prepare(spec)?;
        let url = request.url.clone();
        tracing::debug!(method = %request.method, url = %url, "forwarding request");

        let response = self.transport.send(request).await?;
        tracing::debug!(url = %url, status = response.status, "backend responded");

        Ok(ResponseEnvelope {
            url,
            status: response.status,
            data: JsonOrText::parse(&response.body),
        })
    }
}

fn method_allows_body(method: &Method) -> bool {
    *method != Method::GET && *method != Method::HEAD
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Records every request and answers from a queue of canned responses.
    #[derive(Default)]
    pub struct StubTransport {
        pub requests: Mutex<Vec<HttpRequest>>,
        responses: Mutex<VecDeque<HttpResponse>>,
    }

    impl StubTransport {
        pub fn responding(status: u16, body: &str) -> Arc<Self> {
            let stub = Self::default();
            stub.responses.lock().unwrap().push_back(HttpResponse {
                status,
                body: body.to_string(),
            });
            Arc::new(stub)
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(HttpResponse {
                    status: 200,
                    body: "{}".to_string(),
                }))
        }
    }
}
