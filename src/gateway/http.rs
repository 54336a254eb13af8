use crate::config::GatewayConfig;
use crate::gateway::{
    ExecutionResult, GatewayError, QueryGateway, Row, SchemaContext, SchemaProvider,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

/// Talks to the hosted store's RPC endpoints.
///
/// `rpc/execute_readonly_query` runs inside a read-only transaction on the
/// server side and `rpc/get_schema_context` returns tables, views and enums.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExecuteResponse {
    Envelope {
        rows: Vec<Row>,
        #[serde(default)]
        row_count: Option<usize>,
        #[serde(default)]
        truncated: Option<bool>,
    },
    Bare(Vec<Row>),
}

#[derive(Deserialize)]
struct RpcError {
    message: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| {
                GatewayError::ConfigError("base_url is required for the http gateway".to_string())
            })?
            .trim_end_matches('/')
            .to_string();

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            timeout,
        })
    }

    async fn rpc(&self, function: &str, body: serde_json::Value) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GatewayError::ConfigError("api_key is required for the http gateway".to_string())
        })?;

        let url = format!("{}/rpc/{}", self.base_url, function);
        debug!("Calling gateway RPC: {}", url);

        let response = self
            .client
            .post(&url)
            .header("apikey", api_key)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::ConnectionError(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::ConnectionError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            error!("Gateway RPC {} failed with {}: {}", function, status, text);
            return Err(GatewayError::Query(rpc_error_message(&text)));
        }

        Ok(text)
    }
}

// Database errors come back as {"message", "details", "hint"}; keep all of it
// since the classifier matches on the text.
fn rpc_error_message(body: &str) -> String {
    match serde_json::from_str::<RpcError>(body) {
        Ok(err) => {
            let mut message = err.message;
            for extra in [err.details, err.hint].into_iter().flatten() {
                message.push_str(" (");
                message.push_str(&extra);
                message.push(')');
            }
            message
        }
        Err(_) => body.to_string(),
    }
}

#[async_trait]
impl QueryGateway for HttpGateway {
    async fn execute(&self, sql: &str, row_cap: usize) -> Result<ExecutionResult, GatewayError> {
        let body = json!({
            "query_text": sql.trim().trim_end_matches(';'),
            "row_limit": row_cap,
        });
        let text = self.rpc("execute_readonly_query", body).await?;

        let parsed: ExecuteResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Query(format!("Unexpected gateway response: {}", e)))?;

        Ok(match parsed {
            ExecuteResponse::Envelope {
                rows,
                row_count,
                truncated,
            } => {
                let mut result = ExecutionResult::capped(rows, row_cap);
                result.truncated |= truncated.unwrap_or(false);
                if let Some(reported) = row_count {
                    debug!("Gateway reported {} rows", reported);
                }
                result
            }
            ExecuteResponse::Bare(rows) => ExecutionResult::capped(rows, row_cap),
        })
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl SchemaProvider for HttpGateway {
    async fn fetch_schema(&self) -> Result<SchemaContext, GatewayError> {
        let text = self.rpc("get_schema_context", json!({})).await?;
        serde_json::from_str(&text)
            .map_err(|e| GatewayError::Query(format!("Unexpected schema response: {}", e)))
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}
