//! Minimal HTTP client for the coordinator API

use anyhow::{bail, Context, Result};
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Uri};
use serde_json::Value;

pub struct ApiClient {
    http: Client<HttpConnector>,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let base = endpoint.trim_end_matches('/').to_string();
        base.parse::<Uri>()
            .with_context(|| format!("Invalid coordinator endpoint '{}'", endpoint))?;
        if !base.starts_with("http://") {
            bail!("Coordinator endpoint must be an http:// URL, got '{}'", endpoint);
        }
        Ok(Self {
            http: Client::new(),
            base,
            token,
        })
    }

    fn url(&self, route: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}/api/{}", self.base, route);
        for (i, (key, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    /// GET `/api/<route>` and return the decoded JSON body. Non-2xx
    /// responses become errors carrying the server's message.
    pub async fn get(&self, route: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(route, params);
        tracing::debug!("GET {}", url);

        let mut request = Request::get(&url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        let request = request.body(Body::empty()).context("Failed to build request")?;

        let response = self
            .http
            .request(request)
            .await
            .with_context(|| format!("Failed to reach coordinator at {}", self.base))?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .context("Failed to read response body")?;
        let body: Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Coordinator returned non-JSON response ({})", status))?;

        if !status.is_success() {
            bail!("{} ({})", error_message(&body), status);
        }
        Ok(body)
    }
}

fn error_message(body: &Value) -> String {
    body.get("error")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_query_urls() {
        let client = ApiClient::new("http://127.0.0.1:8265/", None).unwrap();
        assert_eq!(
            client.url("launch_profiling", &[("node_id", "a b/c"), ("pid", "42")]),
            "http://127.0.0.1:8265/api/launch_profiling?node_id=a%20b%2Fc&pid=42"
        );
        assert_eq!(client.url("nodes", &[]), "http://127.0.0.1:8265/api/nodes");
    }

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(ApiClient::new("https://coordinator:8265", None).is_err());
        assert!(ApiClient::new("not a url", None).is_err());
    }

    #[test]
    fn extracts_server_error_messages() {
        assert_eq!(error_message(&json!({"error": "unknown node 'C'"})), "unknown node 'C'");
        assert_eq!(
            error_message(&json!({"success": false, "message": "Unknown key"})),
            "Unknown key"
        );
        assert_eq!(error_message(&json!([1])), "[1]");
    }
}
