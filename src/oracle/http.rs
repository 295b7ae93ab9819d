//! HTTP decision oracle
//!
//! POSTs the cycle context as JSON and returns the raw reply for the schema
//! boundary to parse.

use super::{DecisionOracle, OracleContext};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Reply fields that may wrap the decision text
const WRAPPER_FIELDS: &[&str] = &["decision", "content", "text", "output"];

/// Configuration for the HTTP oracle
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub endpoint: String,
    /// Sent as a bearer token when set
    pub api_key: Option<String>,
    pub timeout: Duration,
}

pub struct HttpOracle {
    config: OracleConfig,
    client: Client,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Unwrap `{"content": "..."}` style replies; anything else is returned as is
    fn unwrap_reply(body: String) -> String {
        let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(&body)
        else {
            return body;
        };
        WRAPPER_FIELDS
            .iter()
            .find_map(|field| match map.get(*field) {
                Some(serde_json::Value::String(text)) => Some(text.clone()),
                Some(value @ serde_json::Value::Object(_)) => Some(value.to_string()),
                _ => None,
            })
            .unwrap_or(body)
    }
}

#[async_trait]
impl DecisionOracle for HttpOracle {
    async fn decide(&self, context: &OracleContext) -> anyhow::Result<String> {
        tracing::debug!(endpoint = %self.config.endpoint, symbol = %context.symbol, "Requesting decision");

        let mut request = self.client.post(&self.config.endpoint).json(context);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Oracle error: {} - {}", status, body);
        }

        Ok(Self::unwrap_reply(response.text().await?))
    }

    fn name(&self) -> &str {
        "http"
    }
}
