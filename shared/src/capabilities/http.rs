//! Dispatch-service rules layered over `crux_http`: which paths and headers
//! the core may send, and how the shell's answer is classified.

use crux_http::Http;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::event::Event;

pub const MAX_PATH_LENGTH: usize = 2048;
pub const MAX_REQUEST_BODY_SIZE: usize = 64 * 1024;
pub const MAX_HEADER_NAME_LENGTH: usize = 256;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;
pub const MAX_HEADERS_COUNT: usize = 32;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Status the shell answers with when a request never reached the service.
/// The body is [`TransportFailure`] JSON.
pub const TRANSPORT_FAILURE_STATUS: u16 = 503;

/// A path relative to the dispatch service base URL. Requests are always
/// joined onto that base, so the core can only address endpoints on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServicePath(String);

impl ServicePath {
    pub fn new(path: impl Into<String>) -> Result<Self, HttpError> {
        let path = path.into();

        if path.len() > MAX_PATH_LENGTH {
            return Err(HttpError::InvalidPath {
                path: Self::truncate(&path),
                reason: format!("path exceeds maximum length of {MAX_PATH_LENGTH} bytes"),
            });
        }

        if !path.starts_with('/') {
            return Err(HttpError::InvalidPath {
                path,
                reason: "path must start with '/'".to_string(),
            });
        }

        // "//host" would be resolved by the shell as a network-path reference
        if path.starts_with("//") {
            return Err(HttpError::InvalidPath {
                path,
                reason: "path must not name another host".to_string(),
            });
        }

        if path.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(HttpError::InvalidPath {
                path: Self::truncate(&path),
                reason: "path contains whitespace or control characters".to_string(),
            });
        }

        if path.split('/').any(|segment| segment == "..") {
            return Err(HttpError::InvalidPath {
                path,
                reason: "path traversal is not allowed".to_string(),
            });
        }

        Ok(Self(path))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn truncate(path: &str) -> String {
        if path.len() <= 100 {
            path.to_string()
        } else {
            let cut: String = path.chars().take(100).collect();
            format!("{cut}...")
        }
    }
}

impl std::fmt::Display for ServicePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HttpHeaders {
    headers: Vec<(String, String)>,
}

impl HttpHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HttpError> {
        if self.headers.len() >= MAX_HEADERS_COUNT {
            return Err(HttpError::TooManyHeaders {
                count: self.headers.len(),
                max: MAX_HEADERS_COUNT,
            });
        }

        let name = name.into();
        let value = value.into();

        Self::validate_header_name(&name)?;
        Self::validate_header_value(&name, &value)?;

        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value));

        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn validate_header_name(name: &str) -> Result<(), HttpError> {
        if name.is_empty() {
            return Err(HttpError::InvalidHeader {
                name: String::new(),
                reason: "header name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_HEADER_NAME_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.chars().take(50).collect(),
                reason: format!(
                    "header name exceeds maximum length of {MAX_HEADER_NAME_LENGTH} bytes"
                ),
            });
        }

        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!("invalid character '{c}' in header name"),
            });
        }

        let managed = [
            "host",
            "content-length",
            "transfer-encoding",
            REQUEST_ID_HEADER,
        ];
        if managed.iter().any(|m| name.eq_ignore_ascii_case(m)) {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "this header is managed by the transport".to_string(),
            });
        }

        Ok(())
    }

    fn validate_header_value(name: &str, value: &str) -> Result<(), HttpError> {
        if value.len() > MAX_HEADER_VALUE_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!(
                    "header value exceeds maximum length of {MAX_HEADER_VALUE_LENGTH} bytes"
                ),
            });
        }

        if value.chars().any(|c| matches!(c, '\r' | '\n' | '\0')) {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header value contains invalid characters (CR, LF, or NULL)".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }

    #[must_use]
    pub const fn has_request_body(&self) -> bool {
        matches!(self, Self::Post)
    }
}


/// One call to the dispatch service, validated before it is handed to
/// `crux_http`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    method: HttpMethod,
    path: ServicePath,
    headers: HttpHeaders,
    body: Option<Vec<u8>>,
    request_id: String,
}

impl ServiceRequest {
    #[must_use]
    pub fn new(method: HttpMethod, path: ServicePath) -> Self {
        Self {
            method,
            path,
            headers: HttpHeaders::new(),
            body: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn get(path: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Get, ServicePath::new(path)?))
    }

    pub fn post(path: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Post, ServicePath::new(path)?))
    }

    pub fn delete(path: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Delete, ServicePath::new(path)?))
    }

    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, HttpError> {
        self.headers.insert(name, value)?;
        Ok(self)
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, HttpError> {
        if !self.method.has_request_body() {
            return Err(HttpError::InvalidRequest {
                reason: format!("{} requests cannot have a body", self.method.as_str()),
            });
        }

        let body = serde_json::to_vec(value).map_err(|e| HttpError::SerializationError {
            message: e.to_string(),
        })?;

        if body.len() > MAX_REQUEST_BODY_SIZE {
            return Err(HttpError::BodyTooLarge {
                size: body.len(),
                max: MAX_REQUEST_BODY_SIZE,
            });
        }

        self.headers.insert("Content-Type", "application/json")?;
        self.body = Some(body);
        Ok(self)
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub const fn path(&self) -> &ServicePath {
        &self.path
    }

    #[must_use]
    pub const fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Joins the path onto `base`, keeping any prefix the base carries.
    pub fn url(&self, base: &Url) -> Result<Url, HttpError> {
        let relative = self.path.as_str().trim_start_matches('/');
        base.join(relative).map_err(|e| HttpError::InvalidRequest {
            reason: format!("cannot resolve {}: {e}", self.path),
        })
    }

    /// Hands the request to `crux_http`. `callback` maps the classified
    /// result to the event fed back into the core.
    pub fn send<F>(self, base: &Url, http: &Http<Event>, callback: F) -> Result<(), HttpError>
    where
        F: FnOnce(HttpResult) -> Event + Send + 'static,
    {
        let url = self.url(base)?;
        let mut builder = match self.method {
            HttpMethod::Get => http.get(url.as_str()),
            HttpMethod::Post => http.post(url.as_str()),
            HttpMethod::Delete => http.delete(url.as_str()),
        };
        builder = builder.header(REQUEST_ID_HEADER, self.request_id.as_str());
        for (name, value) in self.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = self.body {
            builder = builder.body_bytes(body);
        }

        tracing::debug!(
            method = self.method.as_str(),
            path = %self.path,
            request_id = %self.request_id,
            "http request queued"
        );
        builder.send(move |result| callback(from_crux(result)));
        Ok(())
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("too many headers: {count} exceeds maximum of {max}")]
    TooManyHeaders { count: usize, max: usize },

    #[error("request body too large: {size} bytes exceeds maximum of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("serialization error: {message}")]
    SerializationError { message: String },

    #[error("connection failed: {message}")]
    ConnectionError { message: String },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl HttpError {
    /// True when the request never produced a response from the service.
    #[must_use]
    pub const fn is_network_failure(&self) -> bool {
        matches!(self, Self::ConnectionError { .. })
    }

    /// True when the request was rejected before it left the core.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath { .. }
                | Self::InvalidHeader { .. }
                | Self::TooManyHeaders { .. }
                | Self::BodyTooLarge { .. }
                | Self::InvalidRequest { .. }
                | Self::SerializationError { .. }
        )
    }
}

/// Status and body of a service answer, with headers already consumed by
/// the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub const fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn with_json<T: Serialize>(status: u16, value: &T) -> Result<Self, HttpError> {
        let body = serde_json::to_vec(value).map_err(|e| HttpError::SerializationError {
            message: e.to_string(),
        })?;
        Ok(Self::new(status, body))
    }

    #[must_use]
    pub const fn status_only(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_string(&self) -> Result<String, HttpError> {
        String::from_utf8(self.body.clone()).map_err(|e| HttpError::InvalidResponse {
            reason: format!("body is not valid UTF-8: {e}"),
        })
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::InvalidResponse {
            reason: format!("failed to parse JSON: {e}"),
        })
    }

    /// Sorts the shell's answer into a service response or a transport
    /// failure the shell reported in-band.
    pub fn classify(self) -> HttpResult {
        if self.status == TRANSPORT_FAILURE_STATUS {
            if let Ok(failure) = serde_json::from_slice::<TransportFailure>(&self.body) {
                return Err(HttpError::ConnectionError {
                    message: failure.transport_error,
                });
            }
        }
        Ok(self)
    }
}

pub type HttpResult = Result<HttpResponse, HttpError>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransportFailure {
    transport_error: String,
}

/// The response a shell sends back when the request could not be delivered,
/// e.g. connection refused or timed out.
#[must_use]
pub fn transport_failure(reason: impl Into<String>) -> crux_http::protocol::HttpResponse {
    let failure = TransportFailure {
        transport_error: reason.into(),
    };
    crux_http::protocol::HttpResponse {
        status: TRANSPORT_FAILURE_STATUS,
        headers: Vec::new(),
        body: serde_json::to_vec(&failure).unwrap_or_default(),
    }
}

fn from_crux(result: crux_http::Result<crux_http::Response<Vec<u8>>>) -> HttpResult {
    match result {
        Ok(mut response) => {
            let status = u16::from(response.status());
            HttpResponse::new(status, response.take_body().unwrap_or_default()).classify()
        }
        // crux_http reports non-2xx statuses as errors; keep them as responses
        Err(crux_http::Error::Http(err)) => {
            HttpResponse::new(u16::from(err.code), err.body.unwrap_or_default()).classify()
        }
        Err(other) => Err(HttpError::ConnectionError {
            message: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_validation_valid() {
        let path = ServicePath::new("/taxis/7").unwrap();
        assert_eq!(path.as_str(), "/taxis/7");
    }

    #[test]
    fn test_path_validation_relative() {
        assert!(matches!(
            ServicePath::new("taxis"),
            Err(HttpError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_path_validation_other_host() {
        assert!(ServicePath::new("//evil.example.com/estado").is_err());
    }

    #[test]
    fn test_path_validation_traversal() {
        assert!(ServicePath::new("/taxis/../admin").is_err());
    }

    #[test]
    fn test_path_validation_whitespace() {
        assert!(ServicePath::new("/taxis/ 7").is_err());
        assert!(ServicePath::new("/estado\r\n").is_err());
    }

    #[test]
    fn test_path_validation_too_long() {
        let long = format!("/{}", "a".repeat(MAX_PATH_LENGTH));
        assert!(ServicePath::new(long).is_err());
    }

    #[test]
    fn test_header_validation_empty_name() {
        let mut headers = HttpHeaders::new();
        assert!(headers.insert("", "value").is_err());
    }

    #[test]
    fn test_header_validation_invalid_chars() {
        let mut headers = HttpHeaders::new();
        assert!(headers.insert("Header:Name", "value").is_err());
    }

    #[test]
    fn test_header_validation_crlf_injection() {
        let mut headers = HttpHeaders::new();
        assert!(headers.insert("X-Test", "value\r\nInjected: yes").is_err());
    }

    #[test]
    fn test_header_validation_managed() {
        let mut headers = HttpHeaders::new();
        assert!(headers.insert("Content-Length", "4").is_err());
        assert!(headers.insert("host", "example.com").is_err());
        assert!(headers.insert("x-request-id", "mine").is_err());
    }

    #[test]
    fn test_header_case_insensitive_replace() {
        let mut headers = HttpHeaders::new();
        headers.insert("Accept", "text/plain").unwrap();
        headers.insert("accept", "application/json").unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("ACCEPT"), Some("application/json"));
    }

    #[test]
    fn test_too_many_headers() {
        let mut headers = HttpHeaders::new();
        for i in 0..MAX_HEADERS_COUNT {
            headers.insert(format!("X-H{i}"), "v").unwrap();
        }
        assert!(matches!(
            headers.insert("X-Overflow", "v"),
            Err(HttpError::TooManyHeaders { .. })
        ));
    }

    #[test]
    fn test_get_cannot_have_body() {
        let result = ServiceRequest::get("/estado").unwrap().with_json(&"x");
        assert!(matches!(result, Err(HttpError::InvalidRequest { .. })));
    }

    #[test]
    fn test_post_json_sets_content_type() {
        let request = ServiceRequest::post("/taxis")
            .unwrap()
            .with_json(&serde_json::json!({"model": "Kia Niro"}))
            .unwrap();
        assert_eq!(request.headers().get("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(request.body().unwrap()).unwrap();
        assert_eq!(body["model"], "Kia Niro");
    }

    #[test]
    fn test_body_too_large() {
        let big = "x".repeat(MAX_REQUEST_BODY_SIZE + 1);
        let result = ServiceRequest::post("/clientes").unwrap().with_json(&big);
        assert!(matches!(result, Err(HttpError::BodyTooLarge { .. })));
    }

    #[test]
    fn test_request_ids_unique() {
        let a = ServiceRequest::get("/estado").unwrap();
        let b = ServiceRequest::get("/estado").unwrap();
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn test_url_keeps_base_prefix() {
        let base = Url::parse("http://localhost:8000/api/").unwrap();
        let request = ServiceRequest::delete("/taxis/12").unwrap();
        assert_eq!(
            request.url(&base).unwrap().as_str(),
            "http://localhost:8000/api/taxis/12"
        );
    }

    #[test]
    fn test_response_classification() {
        assert!(HttpResponse::status_only(204).is_success());
        assert!(HttpResponse::status_only(409).is_client_error());
        assert!(HttpResponse::status_only(503).is_server_error());
        assert!(!HttpResponse::status_only(503).is_success());
    }

    #[test]
    fn test_response_json_parse_error() {
        let response = HttpResponse::new(200, b"not json".to_vec());
        let result: Result<serde_json::Value, _> = response.json();
        assert!(matches!(result, Err(HttpError::InvalidResponse { .. })));
    }

    #[test]
    fn test_transport_failure_is_connection_error() {
        let reported = transport_failure("connection refused");
        let result = HttpResponse::new(reported.status, reported.body).classify();
        assert_eq!(
            result,
            Err(HttpError::ConnectionError {
                message: "connection refused".into()
            })
        );
    }

    #[test]
    fn test_service_503_stays_a_response() {
        let response =
            HttpResponse::with_json(503, &serde_json::json!({"detail": "maintenance"})).unwrap();
        assert_eq!(response.clone().classify(), Ok(response));
        assert_eq!(
            HttpResponse::status_only(503).classify(),
            Ok(HttpResponse::status_only(503))
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(HttpError::ConnectionError {
            message: "refused".into()
        }
        .is_network_failure());
        assert!(HttpError::InvalidPath {
            path: "x".into(),
            reason: "y".into()
        }
        .is_local());
        assert!(!HttpError::InvalidResponse { reason: "x".into() }.is_network_failure());
    }
}
