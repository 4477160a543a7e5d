//! Network capability: `net.fetch` and `net.proxyFetch`

use crate::script::Value;
use async_trait::async_trait;
use reqwest::Url;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Build a request from a script's `(url, options)` arguments.
    ///
    /// `options.body` that is not a string is sent as JSON.
    pub(super) fn from_script(url: &str, options: Option<&Value>) -> Self {
        let mut request = Self::get(url);
        let Some(Value::Object(options)) = options else {
            return request;
        };
        if let Some(method) = options.get("method").filter(|m| !m.is_nullish()) {
            request.method = method.to_string().to_uppercase();
        }
        if let Some(Value::Object(headers)) = options.get("headers") {
            request.headers = headers
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect();
        }
        request.body = match options.get("body") {
            None | Some(Value::Undefined | Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(
                other
                    .to_json()
                    .map_or_else(|| other.to_string(), |json| json.to_string()),
            ),
        };
        request
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl FetchResponse {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Response object handed to scripts. `text()` and `json()` read `body`.
    pub(super) fn to_value(&self) -> Value {
        Value::object([
            ("status", Value::from(f64::from(self.status))),
            ("ok", Value::Bool(self.is_ok())),
            ("statusText", Value::string(&self.status_text)),
            (
                "headers",
                Value::object(
                    self.headers
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::string(v))),
                ),
            ),
            ("body", Value::string(&self.body)),
        ])
    }
}

/// Performs HTTP requests for sandboxed programs.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, String>;
}

/// [`HttpFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a program's request into a reqwest request without sending it.
    pub fn build(&self, request: FetchRequest) -> Result<reqwest::Request, String> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| format!("invalid HTTP method: {}", request.method))?;
        let mut builder = self.client.request(method, &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder
            .build()
            .map_err(|e| format!("invalid request for {}: {e}", request.url))
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, String> {
        let request = self.build(request)?;
        let resp = self
            .client
            .execute(request)
            .await
            .map_err(|e| format!("Request failed: {e}"))?;
        let status = resp.status();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {e}"))?;

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

/// Rewrite `target` to go through the proxy endpoint.
///
/// A relative endpoint is resolved against `origin` the way a browser resolves
/// a same-origin path; an absolute one is used as is. The target is added as
/// the `url` query parameter.
pub fn proxy_url(origin: &str, endpoint: &str, target: &str) -> Result<String, String> {
    let base = Url::parse(origin).map_err(|e| format!("invalid origin '{origin}': {e}"))?;
    let mut url = base
        .join(endpoint)
        .map_err(|e| format!("invalid proxy endpoint '{endpoint}': {e}"))?;
    url.query_pairs_mut().append_pair("url", target);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_url_encodes_target() {
        let origin = "http://localhost:8080";
        assert_eq!(
            proxy_url(origin, "/api/proxy", "https://a.com/x?q=1&r=2").unwrap(),
            "http://localhost:8080/api/proxy?url=https%3A%2F%2Fa.com%2Fx%3Fq%3D1%26r%3D2"
        );
        assert_eq!(
            proxy_url(origin, "https://proxy.io/p?token=t", "http://b").unwrap(),
            "https://proxy.io/p?token=t&url=http%3A%2F%2Fb"
        );
        assert!(proxy_url("not a url", "/api/proxy", "http://b").is_err());
    }

    #[test]
    fn test_default_proxy_builds_a_sendable_request() {
        let config = trx_config::SandboxConfig::default();
        let url = proxy_url(&config.origin, &config.proxy_endpoint, "https://example.com/").unwrap();
        let request = ReqwestFetcher::new().build(FetchRequest::get(url)).unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/api/proxy");
        assert_eq!(request.url().query(), Some("url=https%3A%2F%2Fexample.com%2F"));
    }

    #[test]
    fn test_relative_url_is_rejected_before_sending() {
        let err = ReqwestFetcher::new()
            .build(FetchRequest::get("/api/proxy"))
            .unwrap_err();
        assert!(err.starts_with("invalid request for /api/proxy"));
    }

    #[test]
    fn test_request_from_script_options() {
        let options = Value::object([
            ("method", Value::string("post")),
            (
                "headers",
                Value::object([("Content-Type", Value::string("application/json"))]),
            ),
            ("body", Value::object([("a", Value::from(1))])),
        ]);
        let request = FetchRequest::from_script("http://x", Some(&options));
        assert_eq!(request.method, "POST");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert_eq!(request.body.as_deref(), Some(r#"{"a":1}"#));

        let plain = FetchRequest::from_script("http://x", None);
        assert_eq!(plain, FetchRequest::get("http://x"));
    }

    #[test]
    fn test_response_value() {
        let resp = FetchResponse {
            status: 404,
            status_text: "Not Found".to_string(),
            headers: BTreeMap::new(),
            body: "missing".to_string(),
        };
        let Value::Object(map) = resp.to_value() else {
            panic!("expected object");
        };
        assert_eq!(map["ok"], Value::Bool(false));
        assert_eq!(map["status"], Value::Number(404.0));
        assert_eq!(map["body"], Value::string("missing"));
    }
}
