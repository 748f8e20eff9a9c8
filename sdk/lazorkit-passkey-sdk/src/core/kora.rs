use crate::core::paymaster::{Paymaster, PaymasterError};
use crate::core::transaction::TransactionEnvelope;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::debug;

/// [`Paymaster`] speaking the Kora JSON-RPC protocol.
pub struct KoraPaymaster {
    http: reqwest::Client,
    url: String,
    fee_payer: OnceCell<Pubkey>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl KoraPaymaster {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            fee_payer: OnceCell::new(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, PaymasterError> {
        debug!(method, "kora request");
        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| PaymasterError::new(format!("{method}: request failed: {e}")))?
            .json()
            .await
            .map_err(|e| PaymasterError::new(format!("{method}: bad response: {e}")))?;

        if let Some(error) = response.error {
            let logs = error.data.as_ref().map(extract_logs).unwrap_or_default();
            return Err(PaymasterError::new(format!(
                "{method}: {} (code {})",
                error.message, error.code
            ))
            .with_logs(logs));
        }
        response
            .result
            .ok_or_else(|| PaymasterError::new(format!("{method}: empty result")))
    }
}

/// Simulation logs appear either as `data.logs` or as `data` itself.
fn extract_logs(data: &Value) -> Vec<String> {
    let lines = match data {
        Value::Array(lines) => lines,
        Value::Object(map) => match map.get("logs") {
            Some(Value::Array(lines)) => lines,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    lines
        .iter()
        .filter_map(|line| line.as_str().map(str::to_string))
        .collect()
}

fn parse_field<T: FromStr>(result: &Value, field: &str) -> Result<T, PaymasterError>
where
    T::Err: std::fmt::Display,
{
    let text = result
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| PaymasterError::new(format!("missing `{field}` in response")))?;
    T::from_str(text).map_err(|e| PaymasterError::new(format!("invalid `{field}`: {e}")))
}

#[async_trait]
impl Paymaster for KoraPaymaster {
    async fn fee_payer(&self) -> Result<Pubkey, PaymasterError> {
        self.fee_payer
            .get_or_try_init(|| async {
                let result = self.call("getPayerSigner", json!({})).await?;
                parse_field(&result, "signer_address")
            })
            .await
            .copied()
    }

    async fn sign_and_send(
        &self,
        transaction: &TransactionEnvelope,
    ) -> Result<Signature, PaymasterError> {
        let encoded = transaction
            .to_base64()
            .map_err(|e| PaymasterError::new(e.to_string()))?;
        let result = self
            .call("signAndSendTransaction", json!({ "transaction": encoded }))
            .await?;
        parse_field(&result, "signature")
    }
}
