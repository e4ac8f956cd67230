use log::debug;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc endpoint returned {0}")]
    Status(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// JSON-RPC 2.0 client. `request` is lenient (HTTP-level non-OK becomes
/// `None`, for polling call sites that treat no answer as "unready");
/// `request_ok` turns non-OK into a hard error carrying the status text.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    endpoint: String,
    client: reqwest::Client,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        JsonRpcClient {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Option<Value>, RpcError> {
        let body = envelope(method, params);
        debug!("POST {} method={}", self.endpoint, method);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            debug!("rpc {} answered {}", method, response.status());
            return Ok(None);
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;

        Ok(Some(parsed))
    }

    pub async fn request_ok(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = envelope(method, params);
        debug!("POST {} method={}", self.endpoint, method);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status(
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| status.to_string()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}

fn envelope(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": Uuid::new_v4().to_string(),
        "method": method,
        "params": params,
    })
}
