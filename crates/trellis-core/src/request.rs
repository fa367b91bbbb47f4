//! HTTP Request types

use crate::{Error, Result};
use bytes::Bytes;
use smallvec::SmallVec;
use std::collections::HashMap;
use trellis_router::{Method, Params};

/// HTTP Request
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
    /// `http` or `https`, when known
    pub scheme: Option<String>,
    /// Request headers (stack-allocated for small header counts)
    pub headers: SmallVec<[(String, String); 16]>,
    /// Request body
    pub body: Bytes,
    /// Route parameters (populated by the router after a match)
    pub params: Params,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            scheme: None,
            headers: SmallVec::new(),
            body: Bytes::new(),
            params: Params::new(),
        }
    }

    /// Convert from an `http` crate request
    pub fn from_http(request: http::Request<Bytes>) -> Result<Self> {
        let (parts, body) = request.into_parts();
        let method: Method = parts
            .method
            .as_str()
            .parse()
            .map_err(|_| Error::InvalidRequest(format!("unsupported method {}", parts.method)))?;

        let mut headers: SmallVec<[(String, String); 16]> = SmallVec::new();
        for (name, value) in &parts.headers {
            let value = value.to_str().map_err(|_| {
                Error::InvalidRequest(format!("header `{name}` is not visible ASCII"))
            })?;
            headers.push((name.as_str().to_string(), value.to_string()));
        }
        if let Some(authority) = parts.uri.authority() {
            if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("host")) {
                headers.push(("host".to_string(), authority.as_str().to_string()));
            }
        }

        Ok(Self {
            method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            scheme: parts.uri.scheme_str().map(str::to_string),
            headers,
            body,
            params: Params::new(),
        })
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get content-type header
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Host header, without the port
    pub fn host(&self) -> Option<&str> {
        self.header("host")
            .map(|h| h.rsplit_once(':').map_or(h, |(host, _)| host))
    }

    /// Whether the request arrived over HTTPS, directly or via a proxy
    /// that sets `x-forwarded-proto`
    pub fn is_secure(&self) -> bool {
        if self.scheme.as_deref() == Some("https") {
            return true;
        }
        self.header("x-forwarded-proto")
            .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
            .unwrap_or(false)
    }

    /// Whether the client explicitly asks for JSON; a missing `Accept` or a
    /// bare `*/*` does not count
    pub fn accepts_json(&self) -> bool {
        self.header("accept")
            .map(|v| v.contains("application/json"))
            .unwrap_or(false)
    }

    /// Get a route parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Path plus query string, as sent by the client
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// Parse query string into key-value pairs
    pub fn query_params(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        if let Some(query) = &self.query {
            for pair in query.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    params.insert(urlencoding_decode(key), urlencoding_decode(value));
                }
            }
        }
        params
    }
}

/// Builder for constructing requests
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Create a new builder
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request: Request::new(method, path),
        }
    }

    /// Set query string
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.request.query = Some(query.into());
        self
    }

    /// Set scheme
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.request.scheme = Some(scheme.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), value.into()));
        self
    }

    /// Set body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Build the request
    pub fn build(self) -> Request {
        self.request
    }
}

/// Percent-decode a query component; invalid UTF-8 is replaced
fn urlencoding_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_header() {
        let req = RequestBuilder::new(Method::Get, "/")
            .header("Content-Type", "application/json")
            .build();

        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_query_params() {
        let req = RequestBuilder::new(Method::Get, "/")
            .query("foo=bar&baz=qux%20quux&name=J%C3%B6rg&bad=%zz")
            .build();

        let params = req.query_params();
        assert_eq!(params.get("foo"), Some(&"bar".to_string()));
        assert_eq!(params.get("baz"), Some(&"qux quux".to_string()));
        assert_eq!(params.get("name"), Some(&"Jörg".to_string()));
        assert_eq!(params.get("bad"), Some(&"%zz".to_string()));
    }

    #[test]
    fn test_is_secure() {
        let plain = Request::new(Method::Get, "/");
        assert!(!plain.is_secure());

        let direct = RequestBuilder::new(Method::Get, "/").scheme("https").build();
        assert!(direct.is_secure());

        let proxied = RequestBuilder::new(Method::Get, "/")
            .header("X-Forwarded-Proto", "HTTPS")
            .build();
        assert!(proxied.is_secure());
    }

    #[test]
    fn test_host_strips_port() {
        let req = RequestBuilder::new(Method::Get, "/")
            .header("Host", "example.com:8080")
            .build();
        assert_eq!(req.host(), Some("example.com"));
    }

    #[test]
    fn test_accepts_json_needs_explicit_media_type() {
        let json = RequestBuilder::new(Method::Get, "/")
            .header("Accept", "text/html, application/json;q=0.9")
            .build();
        let browser = RequestBuilder::new(Method::Get, "/").header("Accept", "*/*").build();
        assert!(json.accepts_json());
        assert!(!browser.accepts_json());
        assert!(!Request::new(Method::Get, "/").accepts_json());
    }

    #[test]
    fn test_from_http() {
        let http_req = http::Request::builder()
            .method("PATCH")
            .uri("https://example.com/users/7?x=1")
            .header("accept", "application/json")
            .body(Bytes::from_static(b"{}"))
            .unwrap();

        let req = Request::from_http(http_req).unwrap();
        assert_eq!(req.method, Method::Patch);
        assert_eq!(req.path, "/users/7");
        assert_eq!(req.query.as_deref(), Some("x=1"));
        assert!(req.is_secure());
        assert_eq!(req.host(), Some("example.com"));
        assert_eq!(req.path_and_query(), "/users/7?x=1");
        assert_eq!(&req.body[..], b"{}");
    }

    #[test]
    fn test_from_http_rejects_unknown_method() {
        let http_req = http::Request::builder()
            .method("BREW")
            .uri("/pot")
            .body(Bytes::new())
            .unwrap();
        assert!(matches!(
            Request::from_http(http_req),
            Err(Error::InvalidRequest(_))
        ));
    }
}
