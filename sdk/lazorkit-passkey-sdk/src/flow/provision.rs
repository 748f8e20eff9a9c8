use crate::basic::actions::CreateSmartWalletBuilder;
use crate::basic::wallet::SmartWalletLocator;
use crate::core::connection::SolConnection;
use crate::core::paymaster::Paymaster;
use crate::error::{LazorSdkError, Result};
use crate::types::{LocatedWallet, PasskeyCredential};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, instrument};

/// Creates the smart wallet for a credential the locator could not find.
///
/// Creation is not an authorized action, so no passkey signature is needed;
/// the relayer pays and signs.
#[derive(Debug, Clone)]
pub struct WalletProvisioner {
    pub program_id: Pubkey,
    pub policy_program: Pubkey,
    pub locator: SmartWalletLocator,
    /// Commitment the creation transaction must reach
    pub confirm_commitment: CommitmentConfig,
}

impl WalletProvisioner {
    pub fn new(
        program_id: Pubkey,
        policy_program: Pubkey,
        locator: SmartWalletLocator,
        confirm_commitment: CommitmentConfig,
    ) -> Self {
        Self {
            program_id,
            policy_program,
            locator,
            confirm_commitment,
        }
    }

    /// Submit the creation once, wait for confirmation and look the wallet
    /// up again. A wallet that is still missing is fatal and never retried.
    #[instrument(skip_all, fields(credential_hash = %credential.credential_hash()))]
    pub async fn provision(
        &self,
        connection: &impl SolConnection,
        paymaster: &impl Paymaster,
        credential: &PasskeyCredential,
    ) -> Result<LocatedWallet> {
        let payer = paymaster
            .fee_payer()
            .await
            .map_err(|source| LazorSdkError::Paymaster {
                attempts: 1,
                source,
            })?;

        let builder = CreateSmartWalletBuilder::new()
            .with_program_id(self.program_id)
            .with_policy_program(self.policy_program)
            .with_payer(payer)
            .with_credential(credential.clone());
        let smart_wallet = builder.smart_wallet();
        let tx = builder.build_transaction(connection).await?;

        info!(?smart_wallet, "creating smart wallet");
        let signature = paymaster
            .sign_and_send(&tx)
            .await
            .map_err(|source| LazorSdkError::Paymaster {
                attempts: 1,
                source,
            })?;

        connection
            .confirm_transaction(&signature, self.confirm_commitment)
            .await
            .map_err(|e| LazorSdkError::Transaction(format!("wallet creation {signature}: {e}")))?;
        info!(%signature, "smart wallet creation confirmed");

        let hash = credential.credential_hash();
        self.locator
            .locate(connection, &hash)
            .await?
            .ok_or_else(|| LazorSdkError::WalletNotProvisioned(hash.to_string()))
    }
}
