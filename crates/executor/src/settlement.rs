//! Settlement layer client.
//!
//! The worker hands the prepared swap instruction to an external chain
//! client and waits for confirmation. Modeled as a trait so tests inject a
//! fake settlement and the worker's state machine can be driven without a
//! chain.

use crate::error::{Error, Result};
use async_trait::async_trait;
use dex::SwapInstruction;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Settlement capability: submit a serialized transaction and wait for it
/// to confirm, returning the transaction signature.
#[async_trait]
pub trait Settlement: Send + Sync {
    async fn submit_and_confirm(&self, instruction: &SwapInstruction) -> Result<String>;
}

/// JSON-RPC settlement client against a chain RPC endpoint.
pub struct RpcSettlement {
    http_client: reqwest::Client,
    rpc_url: String,
    confirm_attempts: u32,
    confirm_interval: Duration,
}

impl RpcSettlement {
    /// Client with the default confirmation poll (30 x 2s).
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            rpc_url: rpc_url.into(),
            confirm_attempts: 30,
            confirm_interval: Duration::from_secs(2),
        }
    }

    async fn rpc_call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: serde_json::Value = self
            .http_client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Settlement(format!("{} request failed: {}", method, e)))?
            .json()
            .await
            .map_err(|e| Error::Settlement(format!("{} bad response: {}", method, e)))?;

        if let Some(err) = response.get("error") {
            return Err(Error::Settlement(format!("{}: {}", method, err)));
        }
        Ok(response.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl Settlement for RpcSettlement {
    async fn submit_and_confirm(&self, instruction: &SwapInstruction) -> Result<String> {
        let result = self
            .rpc_call(
                "sendTransaction",
                json!([instruction.transaction_base64, {"encoding": "base64"}]),
            )
            .await?;

        let signature = result
            .as_str()
            .ok_or_else(|| Error::Settlement("sendTransaction returned no signature".to_string()))?
            .to_string();

        debug!("Submitted transaction {}, awaiting confirmation", signature);

        for _ in 0..self.confirm_attempts {
            let statuses = self
                .rpc_call("getSignatureStatuses", json!([[signature]]))
                .await?;

            let status = statuses
                .get("value")
                .and_then(|v| v.get(0))
                .filter(|v| !v.is_null());

            if let Some(status) = status {
                if let Some(err) = status.get("err").filter(|e| !e.is_null()) {
                    return Err(Error::Settlement(format!(
                        "transaction {} failed on chain: {}",
                        signature, err
                    )));
                }
                let confirmation = status
                    .get("confirmationStatus")
                    .and_then(|c| c.as_str())
                    .unwrap_or("");
                if confirmation == "confirmed" || confirmation == "finalized" {
                    info!("Transaction {} {}", signature, confirmation);
                    return Ok(signature);
                }
            }

            tokio::time::sleep(self.confirm_interval).await;
        }

        Err(Error::Settlement(format!(
            "transaction {} not confirmed in time",
            signature
        )))
    }
}
