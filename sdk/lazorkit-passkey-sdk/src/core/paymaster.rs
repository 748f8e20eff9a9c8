use crate::core::transaction::TransactionEnvelope;
use crate::error::mentions_invalid_account_data;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::fmt;

/// Rejection from the relayer, with simulation logs when it provided them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymasterError {
    pub message: String,
    pub logs: Vec<String>,
}

impl PaymasterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            logs: Vec::new(),
        }
    }

    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }

    pub fn is_invalid_account_data(&self) -> bool {
        mentions_invalid_account_data(&self.message)
            || self.logs.iter().any(|line| mentions_invalid_account_data(line))
    }
}

impl fmt::Display for PaymasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PaymasterError {}

/// Fee-sponsoring relayer that countersigns as fee payer and forwards.
#[async_trait]
pub trait Paymaster: Send + Sync {
    /// Account the relayer signs and pays fees with.
    async fn fee_payer(&self) -> Result<Pubkey, PaymasterError>;

    async fn sign_and_send(
        &self,
        transaction: &TransactionEnvelope,
    ) -> Result<Signature, PaymasterError>;
}
