use std::sync::Arc;

use bytes::Bytes;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::csrf::csrf_token;
use crate::error::ClientError;
use crate::retry::{is_idempotent, run_with_retry};

/// What to send. `method: None` means GET and is treated as idempotent.
#[derive(Debug, Clone, Default)]
pub struct RequestSpec {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body)
            .map_err(|err| ClientError::InvalidRequest(err.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// Response body, shaped by the response `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Bytes(Bytes),
    Empty,
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        match self {
            ResponseBody::Json(value) => {
                serde_json::from_value(value).map_err(|err| ClientError::Body(err.to_string()))
            }
            other => Err(ClientError::Body(format!("expected a JSON body, got {other:?}"))),
        }
    }

    async fn read(response: reqwest::Response) -> Result<Self, ClientError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ClientError::Body(err.to_string()))?;

        if bytes.is_empty() {
            Ok(ResponseBody::Empty)
        } else if content_type.contains("json") {
            serde_json::from_slice(&bytes)
                .map(ResponseBody::Json)
                .map_err(|err| ClientError::Body(err.to_string()))
        } else if content_type.starts_with("text/") {
            Ok(ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned()))
        } else {
            Ok(ResponseBody::Bytes(bytes))
        }
    }
}

/// Credentialed HTTP client: cookies persist across calls, the CSRF cookie is
/// echoed as a header, and idempotent requests are retried on network failure.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base: Url,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.base_url)
            .map_err(|err| ClientError::InvalidRequest(format!("base url: {err}")))?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|err| ClientError::InvalidRequest(err.to_string()))?;

        Ok(Self {
            http,
            jar,
            base,
            config,
        })
    }

    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|err| ClientError::InvalidRequest(format!("{path}: {err}")))
    }

    pub async fn send(&self, path: &str, spec: &RequestSpec) -> Result<ResponseBody, ClientError> {
        let url = self.url(path)?;
        let url = &url;
        let idempotent = is_idempotent(spec.method.as_ref());
        run_with_retry(&self.config.retry, idempotent, move |attempt| {
            self.attempt(url, spec, attempt)
        })
        .await
    }

    pub async fn get(&self, path: &str) -> Result<ResponseBody, ClientError> {
        self.send(path, &RequestSpec::new()).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ResponseBody, ClientError> {
        let spec = RequestSpec::new().method(Method::POST).json(body)?;
        self.send(path, &spec).await
    }

    async fn attempt(
        &self,
        url: &Url,
        spec: &RequestSpec,
        attempt: u32,
    ) -> Result<ResponseBody, ClientError> {
        let method = spec.method.clone().unwrap_or(Method::GET);
        debug!(%method, %url, attempt, "sending request");

        let mut request = self
            .http
            .request(method, url.clone())
            .headers(spec.headers.clone());
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(token) = csrf_token(&self.jar, url, &self.config.csrf_cookie) {
            request = request.header(self.config.csrf_header.as_str(), token);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ClientError::from_transport)?;
        let status = response.status();
        let body = ResponseBody::read(response).await?;
        if status.is_success() {
            Ok(body)
        } else {
            debug!(%status, %url, "request rejected");
            Err(ClientError::Status { status, body })
        }
    }
}
