//! Polygon REST client.
//!
//! One shared `reqwest::Client` with a bounded per-request timeout. Every call
//! is a single GET with the API key appended as the `apiKey` query parameter.

use reqwest::Url;
use serde_json::Value;
use std::fmt;

use crate::tools::request::ApiRequest;
use crate::types::{Error, Result, UpstreamConfig};

const API_KEY_PARAM: &str = "apiKey";

/// Longest upstream error detail carried into a tool result.
const MAX_ERROR_DETAIL: usize = 300;

#[derive(Clone)]
pub struct PolygonClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl PolygonClient {
    /// Build the client. Fails when the API key is absent or the base URL is unusable.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::config("POLYGON_API_KEY is not set in the environment or .env file")
            })?
            .to_string();

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::config(format!("invalid base URL '{}': {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Resolve the full URL for a request, without the API key.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(request.segments());
        Ok(url)
    }

    /// Perform the GET and decode the JSON body.
    pub async fn get_json(&self, request: &ApiRequest) -> Result<Value> {
        let url = self.url_for(request)?;
        tracing::debug!(path = %request.path(), "upstream request");

        let response = self
            .http
            .get(url)
            .query(request.query_pairs())
            .query(&[(API_KEY_PARAM, self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "HTTP {} for {}{}",
                status,
                request.path(),
                error_detail(&body)
            )));
        }

        Ok(response.json::<Value>().await?)
    }
}

impl fmt::Debug for PolygonClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolygonClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Pull a human-readable message out of an upstream error body.
fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string());

    if message.is_empty() {
        return String::new();
    }
    let truncated: String = message.chars().take(MAX_ERROR_DETAIL).collect();
    format!(": {truncated}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(base_url: &str, api_key: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            base_url: base_url.to_string(),
            api_key: api_key.map(str::to_string),
            request_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = PolygonClient::new(&config("https://api.polygon.io", None)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("POLYGON_API_KEY"));

        let err = PolygonClient::new(&config("https://api.polygon.io", Some(""))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(PolygonClient::new(&config("not a url", Some("k"))).is_err());
        assert!(PolygonClient::new(&config("mailto:ops@example.com", Some("k"))).is_err());
    }

    #[test]
    fn test_url_for_encodes_segments() {
        let client = PolygonClient::new(&config("https://api.polygon.io", Some("k"))).unwrap();
        let url = client
            .url_for(&ApiRequest::new(["v2", "aggs", "ticker", "AAPL", "prev"]))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.polygon.io/v2/aggs/ticker/AAPL/prev");

        let url = client
            .url_for(&ApiRequest::new(["v3", "reference", "tickers", "BRK/A"]))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.polygon.io/v3/reference/tickers/BRK%2FA");
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let client = PolygonClient::new(&config("http://127.0.0.1:8080/proxy/", Some("k"))).unwrap();
        let url = client.url_for(&ApiRequest::new(["v1", "marketstatus", "now"])).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/proxy/v1/marketstatus/now");
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = PolygonClient::new(&config("https://api.polygon.io", Some("sekrit"))).unwrap();
        assert!(!format!("{client:?}").contains("sekrit"));
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(r#"{"status":"ERROR","error":"Unknown API Key"}"#),
            ": Unknown API Key"
        );
        assert_eq!(error_detail("  "), "");
        assert_eq!(error_detail("boom"), ": boom");
    }
}
