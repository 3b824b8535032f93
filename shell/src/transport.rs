//! Executes the core's HTTP effects.

use std::time::Duration;

use async_trait::async_trait;
use crux_http::protocol::{HttpHeader, HttpRequest, HttpResponse};
use shared::capabilities::{transport_failure, REQUEST_ID_HEADER};
use url::Url;

use crate::config::ShellConfig;
use crate::error::ShellError;

/// Carries one [`HttpRequest`] to the dispatch service. Failures that
/// produce no HTTP response are reported with
/// [`transport_failure`] rather than an error.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: &HttpRequest) -> HttpResponse;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    timeout_ms: u64,
}

impl ReqwestTransport {
    pub fn new(config: &ShellConfig) -> Result<Self, ShellError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout_ms: config.request_timeout_ms,
        })
    }

    /// Parses the request url, refusing anything outside the configured
    /// service.
    pub fn target(&self, request: &HttpRequest) -> Result<Url, String> {
        let url = Url::parse(&request.url).map_err(|e| format!("invalid url '{}': {e}", request.url))?;
        if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path()) {
            return Err(format!("{url} is outside the dispatch service"));
        }
        Ok(url)
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let url = self.target(request)?;
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| format!("invalid method '{}': {e}", request.method))?;

        let mut builder = self.client.request(method, url);
        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| self.classify(&e))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some(HttpHeader {
                    name: name.as_str().to_string(),
                    value: value.to_string(),
                })
            })
            .collect();
        let body = response.bytes().await.map_err(|e| self.classify(&e))?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }

    fn classify(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("timed out after {}ms", self.timeout_ms)
        } else {
            err.to_string()
        }
    }
}

fn request_id(request: &HttpRequest) -> &str {
    request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(REQUEST_ID_HEADER))
        .map_or("-", |h| h.value.as_str())
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> HttpResponse {
        tracing::trace!(
            method = %request.method,
            url = %request.url,
            request_id = request_id(request),
            "sending request"
        );
        match self.send(request).await {
            Ok(response) => response,
            Err(reason) => {
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    request_id = request_id(request),
                    reason = %reason,
                    "request failed before a response"
                );
                transport_failure(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> ReqwestTransport {
        let config = ShellConfig::from_lookup(|name| {
            (name == "TAXI_DASH_BASE_URL").then(|| base.to_string())
        })
        .unwrap();
        ReqwestTransport::new(&config).unwrap()
    }

    fn get(url: &str) -> HttpRequest {
        HttpRequest {
            method: "GET".into(),
            url: url.into(),
            headers: vec![HttpHeader {
                name: "x-request-id".into(),
                value: "abc".into(),
            }],
            body: Vec::new(),
        }
    }

    #[test]
    fn accepts_urls_under_base_prefix() {
        let t = transport("http://localhost:8000/api");
        let url = t.target(&get("http://localhost:8000/api/estado")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/estado");
    }

    #[test]
    fn refuses_other_origins() {
        let t = transport("http://localhost:8000");
        assert!(t.target(&get("http://evil.example.com/estado")).is_err());
        assert!(t.target(&get("https://localhost:8000/estado")).is_err());
    }

    #[test]
    fn refuses_paths_outside_prefix() {
        let t = transport("http://localhost:8000/api");
        assert!(t.target(&get("http://localhost:8000/admin")).is_err());
    }

    #[test]
    fn request_id_read_from_headers() {
        assert_eq!(request_id(&get("http://localhost:8000/estado")), "abc");
    }

    #[tokio::test]
    async fn refused_request_reported_in_band() {
        let t = transport("http://localhost:8000");
        let response = t.execute(&get("http://evil.example.com/estado")).await;
        let reported = transport_failure("x");
        assert_eq!(response.status, reported.status);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert!(body["transport_error"]
            .as_str()
            .unwrap()
            .contains("outside the dispatch service"));
    }
}
