//! Google Programmable Search (Custom Search JSON API) client.

use super::{FetchError, SearchItem, SearchPage, SearchProvider, SearchRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the search API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub api_key: String,
    pub cse_id: String,
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key: String::new(),
            cse_id: String::new(),
            timeout_seconds: 30,
        }
    }
}

/// Search API response body (only the parts we use).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(default)]
    search_information: Option<SearchInformation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchInformation {
    /// The API reports this as a decimal string.
    #[serde(default)]
    total_results: Option<String>,
}

/// HTTP client for the Custom Search JSON API.
pub struct GoogleSearchClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl GoogleSearchClient {
    /// Create a client. Fails if credentials are missing.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        if config.api_key.trim().is_empty() {
            return Err(FetchError::MissingCredentials("api_key"));
        }
        if config.cse_id.trim().is_empty() {
            return Err(FetchError::MissingCredentials("cse_id"));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(FetchError::Request)?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn query_params(&self, request: &SearchRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("key", self.config.api_key.clone()),
            ("cx", self.config.cse_id.clone()),
            ("q", request.query.clone()),
            ("num", request.num.to_string()),
            ("start", request.start.to_string()),
        ];
        if let Some(ref gl) = request.gl {
            params.push(("gl", gl.clone()));
        }
        params
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, FetchError> {
        debug!(
            "Requesting '{}' start={} num={}",
            request.query, request.start, request.num
        );

        let response = self
            .http_client
            .get(&self.config.endpoint)
            .query(&self.query_params(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    FetchError::Connect(self.config.endpoint.clone())
                } else {
                    FetchError::Request(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api { status, body });
        }

        let body = response.text().await.map_err(FetchError::Request)?;
        parse_response(&body)
    }
}

/// Decode a Custom Search response body into a page.
fn parse_response(body: &str) -> Result<SearchPage, FetchError> {
    let parsed: CustomSearchResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let total_results = parsed
        .search_information
        .and_then(|info| info.total_results)
        .and_then(|total| total.trim().parse::<u64>().ok());

    Ok(SearchPage {
        items: parsed.items,
        total_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "kind": "customsearch#search",
            "searchInformation": {"searchTime": 0.41, "totalResults": "2340000"},
            "items": [
                {"title": "Pizza Calories", "link": "https://www.a.com/pizza",
                 "displayLink": "www.a.com", "snippet": "A slice has...",
                 "formattedUrl": "https://www.a.com/pizza"},
                {"title": "Nutrition", "link": "https://b.org/n", "displayLink": "b.org"}
            ]
        }"#;

        let page = parse_response(body).unwrap();
        assert_eq!(page.total_results, Some(2_340_000));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].display_link, "www.a.com");
        assert_eq!(page.items[1].snippet, "");
        assert_eq!(page.items[1].formatted_url, None);
    }

    #[test]
    fn test_parse_response_without_items() {
        let page = parse_response(r#"{"searchInformation": {"totalResults": "0"}}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_results, Some(0));
    }

    #[test]
    fn test_parse_response_garbage() {
        assert!(matches!(
            parse_response("<html>"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_missing_credentials() {
        let config = ClientConfig::default();
        assert!(matches!(
            GoogleSearchClient::new(config),
            Err(FetchError::MissingCredentials("api_key"))
        ));

        let config = ClientConfig {
            api_key: "key".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            GoogleSearchClient::new(config),
            Err(FetchError::MissingCredentials("cse_id"))
        ));
    }

    #[test]
    fn test_query_params() {
        let client = GoogleSearchClient::new(ClientConfig {
            api_key: "k".to_string(),
            cse_id: "c".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        let request = SearchRequest {
            query: "Calories in Pizza".to_string(),
            start: 11,
            num: 5,
            gl: Some("us".to_string()),
        };
        let params = client.query_params(&request);
        assert!(params.contains(&("q", "Calories in Pizza".to_string())));
        assert!(params.contains(&("start", "11".to_string())));
        assert!(params.contains(&("num", "5".to_string())));
        assert!(params.contains(&("gl", "us".to_string())));
    }
}
