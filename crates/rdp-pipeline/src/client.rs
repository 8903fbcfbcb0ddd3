//! HTTP client for the upstream retail API
//!
//! Fetches one page of raw records per call. The client distinguishes three
//! failure kinds so the external scheduler can act on them: a rejected
//! credential (fatal), a transport fault (retryable), and a response that
//! breaks the documented envelope contract (fatal). Retry policy itself
//! lives in the scheduler, not here.

use crate::config::{PipelineConfig, API_TIMEOUT_SECS};
use rdp_common::{RdpError, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// One page of raw records from the upstream API
#[derive(Debug, Clone)]
pub struct Page {
    /// Raw records under the envelope's `items` key. Opaque at this layer;
    /// the normalizer gives them shape.
    pub items: Vec<Value>,
    /// Total records available upstream, as reported by the envelope
    pub total_items: u64,
}

impl Page {
    /// True when no records remain at or after the requested cursor.
    /// A normal terminal condition, not an error.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// API client for the upstream retail data provider
pub struct SourceClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SourceClient {
    /// Create a new client from a validated pipeline configuration
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Fetch one page of products (`GET /products?limit=N`)
    #[instrument(skip(self))]
    pub async fn fetch_products(&self, limit: u32) -> Result<Page> {
        self.fetch_page("products", &[("limit", limit.to_string())])
            .await
    }

    /// Fetch one page of customers (`GET /customers?limit=N`)
    #[instrument(skip(self))]
    pub async fn fetch_customers(&self, limit: u32) -> Result<Page> {
        self.fetch_page("customers", &[("limit", limit.to_string())])
            .await
    }

    /// Fetch one page of sales at or after `start_sales_id` (inclusive)
    /// (`GET /sales?start_sales_id=ID&limit=N`)
    #[instrument(skip(self))]
    pub async fn fetch_sales(&self, start_sales_id: i64, limit: u32) -> Result<Page> {
        self.fetch_page(
            "sales",
            &[
                ("start_sales_id", start_sales_id.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Perform a single bounded-timeout request and validate the
    /// `{items: [...], total_items: int}` envelope
    async fn fetch_page(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Page> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.api_key)
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RdpError::authentication(format!(
                "upstream rejected the credential (endpoint: /{endpoint})"
            )));
        }
        if !status.is_success() {
            return Err(RdpError::transport(format!(
                "GET /{endpoint} returned {status}"
            )));
        }

        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            RdpError::shape(format!("response body is not valid JSON (endpoint: /{endpoint}): {e}"))
        })?;

        let items = match payload.get("items") {
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(RdpError::shape(format!(
                    "'items' is not a list (endpoint: /{endpoint})"
                )))
            },
            None => {
                return Err(RdpError::shape(format!(
                    "'items' key missing from response (endpoint: /{endpoint})"
                )))
            },
        };
        let total_items = payload
            .get("total_items")
            .and_then(Value::as_u64)
            .unwrap_or(items.len() as u64);

        debug!(
            endpoint = %endpoint,
            fetched = items.len(),
            total_items = total_items,
            "Fetched page"
        );

        Ok(Page { items, total_items })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> PipelineConfig {
        PipelineConfig {
            api_base_url: server.uri(),
            api_key: "FAKE_KEY_123".to_string(),
            page_size: 250,
            database_url: "postgres://unused".to_string(),
            bronze_root: PathBuf::from("data/bronze"),
        }
    }

    #[tokio::test]
    async fn test_fetch_sales_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sales"))
            .and(query_param("start_sales_id", "1"))
            .and(query_param("limit", "250"))
            .and(header("Authorization", "FAKE_KEY_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": 1, "customer_id": "CS000001", "items": []}],
                "total_items": 1
            })))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let page = client.fetch_sales(1, 250).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_items, 1);
        assert!(!page.is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sales"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [],
                "total_items": 120
            })))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let page = client.fetch_sales(9_999, 250).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let err = client.fetch_products(10).await.unwrap_err();
        assert!(matches!(err, RdpError::Authentication(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let err = client.fetch_customers(10).await.unwrap_err();
        assert!(matches!(err, RdpError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_items_not_a_list_is_shape_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": "oops",
                "total_items": 0
            })))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let err = client.fetch_products(10).await.unwrap_err();
        assert!(matches!(err, RdpError::ShapeValidation(_)));
    }

    #[tokio::test]
    async fn test_missing_items_key_is_shape_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"total_items": 3})),
            )
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let err = client.fetch_products(10).await.unwrap_err();
        assert!(matches!(err, RdpError::ShapeValidation(_)));
    }
}
