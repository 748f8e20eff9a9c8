use crate::core::connection::{AccountFilter, SolConnection};
use crate::core::constants::DEFAULT_PROGRAM_ID;
use crate::error::{LazorSdkError, Result};
use crate::state::{AnchorAccount, WalletDevice, WalletState};
use crate::types::{CredentialHash, LocatedWallet};
use crate::utils::{self, derive_wallet_state_pda};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

/// Finds the smart wallet a credential controls by scanning device accounts.
#[derive(Debug, Clone)]
pub struct SmartWalletLocator {
    /// Program ID of the LazorKit contract
    pub program_id: Pubkey,

    /// Freshness of the scan
    pub commitment: CommitmentConfig,
}

impl Default for SmartWalletLocator {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM_ID, CommitmentConfig::processed())
    }
}

impl SmartWalletLocator {
    pub fn new(program_id: Pubkey, commitment: CommitmentConfig) -> Self {
        Self {
            program_id,
            commitment,
        }
    }

    /// Look up the wallet bound to `credential_hash`.
    ///
    /// Absence is an ordinary outcome and is returned as `Ok(None)`; only RPC
    /// failures and undecodable accounts are errors.
    pub async fn locate(
        &self,
        connection: &impl SolConnection,
        credential_hash: &CredentialHash,
    ) -> Result<Option<LocatedWallet>> {
        let filters = [
            AccountFilter::DataSize(WalletDevice::LEN as u64),
            AccountFilter::Memcmp {
                offset: WalletDevice::CREDENTIAL_HASH_OFFSET,
                bytes: credential_hash.as_bytes().to_vec(),
            },
        ];
        let mut matches = connection
            .get_program_accounts(&self.program_id, &filters, self.commitment)
            .await
            .map_err(|e| LazorSdkError::Connection(e.to_string()))?;

        if matches.len() > 1 {
            warn!(
                credential_hash = %credential_hash,
                count = matches.len(),
                "multiple wallet devices share a credential hash, using the first"
            );
        }
        let Some((wallet_device, account)) = matches.drain(..).next() else {
            debug!(credential_hash = %credential_hash, "no smart wallet for credential");
            return Ok(None);
        };

        let device = WalletDevice::try_from_account_data(&account.data)?;
        let smart_wallet = device.smart_wallet();
        debug!(%smart_wallet, %wallet_device, "located smart wallet");
        Ok(Some(LocatedWallet {
            smart_wallet,
            wallet_device,
            device,
        }))
    }
}

/// Read the wallet state (nonce holder) at the given commitment
pub async fn fetch_wallet_state(
    connection: &impl SolConnection,
    program_id: &Pubkey,
    smart_wallet: &Pubkey,
    commitment: CommitmentConfig,
) -> Result<WalletState> {
    let (address, _) = derive_wallet_state_pda(program_id, smart_wallet);
    utils::fetch_required_account(connection, &address, commitment).await
}
