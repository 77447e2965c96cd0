use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::config::SwapConfig;
use crate::error::OracleError;
use crate::oracle::{describe_revert, CallTransport};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (CallObject, &'a str),
}

#[derive(Serialize)]
struct CallObject {
    to: String,
    data: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    data: Option<serde_json::Value>,
}

/// JSON-RPC `eth_call` transport for the on-chain oracles.
pub struct JsonRpcTransport {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Transport for the endpoint named by `rpcUrl`.
    pub fn from_config(config: &SwapConfig) -> Self {
        Self::new(config.rpc_url.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CallTransport for JsonRpcTransport {
    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, OracleError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: "eth_call",
            params: (
                CallObject {
                    to: to.to_string(),
                    data: format!("0x{}", hex::encode(data)),
                },
                "latest",
            ),
        };

        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        interpret(response)
    }
}

fn interpret(response: RpcResponse) -> Result<Vec<u8>, OracleError> {
    if let Some(error) = response.error {
        let revert_data = error
            .data
            .as_ref()
            .and_then(|d| d.as_str())
            .and_then(|s| hex::decode(s.trim_start_matches("0x")).ok());
        return Err(match revert_data {
            Some(bytes) => OracleError::Reverted(describe_revert(&bytes)),
            None => OracleError::Transport(format!("rpc error {}: {}", error.code, error.message)),
        });
    }

    let result = response
        .result
        .ok_or_else(|| OracleError::InvalidResponse("missing result".to_string()))?;
    hex::decode(result.trim_start_matches("0x"))
        .map_err(|e| OracleError::InvalidResponse(format!("result is not hex: {e}")))
}
