use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

/// A fully expanded request, ready to be put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestParts {
    pub method: String,
    pub url: url::Url,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

/// Response as seen by post-hooks. Header names are lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponseParts {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("timeout")]
    Timeout,
    #[error("connect/dns/tls error: {0}")]
    Network(String),
    #[error("response too large (>{max_bytes} bytes)")]
    ResponseTooLarge { max_bytes: usize },
    #[error("http error: {0}")]
    Other(String),
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(
        &self,
        req: HttpRequestParts,
        timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<HttpResponseParts, HttpError>;
}

pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pepper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Other(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(
        &self,
        req: HttpRequestParts,
        timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<HttpResponseParts, HttpError> {
        let method = reqwest::Method::from_bytes(req.method.as_bytes())
            .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
        let mut rb = self.client.request(method, req.url).timeout(timeout);

        for (k, v) in req.headers {
            rb = rb.header(k, v);
        }
        rb = rb.body(req.body);

        let mut resp = rb.send().await.map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();

        let mut headers = BTreeMap::new();
        for (k, v) in resp.headers().iter() {
            if let Ok(s) = v.to_str() {
                headers.insert(k.as_str().to_ascii_lowercase(), s.to_string());
            }
        }

        if resp
            .content_length()
            .is_some_and(|len| len > max_response_bytes as u64)
        {
            return Err(HttpError::ResponseTooLarge { max_bytes: max_response_bytes });
        }

        // Read chunk by chunk so a lying or absent Content-Length can't blow the cap.
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(map_reqwest_error)? {
            if body.len() + chunk.len() > max_response_bytes {
                return Err(HttpError::ResponseTooLarge { max_bytes: max_response_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponseParts { status, headers, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        return HttpError::Timeout;
    }
    if e.is_builder() {
        return HttpError::InvalidRequest(e.to_string());
    }
    if e.is_connect() || e.is_request() {
        return HttpError::Network(e.to_string());
    }
    HttpError::Other(e.to_string())
}
