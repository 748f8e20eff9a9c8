use crate::core::connection::{AccountFilter, SolConnection};
use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::address_lookup_table::state::AddressLookupTable;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// [`SolConnection`] backed by a JSON-RPC node.
#[derive(Clone)]
pub struct RpcConnection {
    client: Arc<RpcClient>,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl RpcConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_client(Arc::new(RpcClient::new(url.into())))
    }

    pub fn from_client(client: Arc<RpcClient>) -> Self {
        Self {
            client,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }
}

fn to_rpc_filter(filter: &AccountFilter) -> RpcFilterType {
    match filter {
        AccountFilter::DataSize(size) => RpcFilterType::DataSize(*size),
        AccountFilter::Memcmp { offset, bytes } => {
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(*offset, bytes.clone()))
        },
    }
}

#[async_trait]
impl SolConnection for RpcConnection {
    async fn get_account(
        &self,
        pubkey: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<Option<Account>, Box<dyn Error + Send + Sync>> {
        Ok(self
            .client
            .get_account_with_commitment(pubkey, commitment)
            .await?
            .value)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
        commitment: CommitmentConfig,
    ) -> Result<Vec<(Pubkey, Account)>, Box<dyn Error + Send + Sync>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(filters.iter().map(to_rpc_filter).collect()),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(commitment),
                ..Default::default()
            },
            ..Default::default()
        };
        Ok(self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await?)
    }

    async fn get_address_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<Option<AddressLookupTableAccount>, Box<dyn Error + Send + Sync>> {
        let Some(account) = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await?
            .value
        else {
            return Ok(None);
        };
        let table = AddressLookupTable::deserialize(&account.data)?;
        Ok(Some(AddressLookupTableAccount {
            key: *address,
            addresses: table.addresses.to_vec(),
        }))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, Box<dyn Error + Send + Sync>> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let deadline = tokio::time::Instant::now() + self.confirm_timeout;
        loop {
            let status = self
                .client
                .get_signature_status_with_commitment(signature, commitment)
                .await?;
            match status {
                Some(Ok(())) => return Ok(()),
                Some(Err(e)) => return Err(format!("transaction {signature} failed: {e}").into()),
                None => debug!(%signature, "awaiting confirmation"),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(format!(
                    "transaction {signature} not confirmed within {:?}",
                    self.confirm_timeout
                )
                .into());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
