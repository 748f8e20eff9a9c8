use crate::basic::actions::ChunkPlan;
use crate::basic::wallet::{fetch_wallet_state, SmartWalletLocator};
use crate::config::LazorConfig;
use crate::core::connection::SolConnection;
use crate::core::paymaster::Paymaster;
use crate::core::signer::PasskeySigner;
use crate::error::{FlowError, FlowStage, LazorSdkError, StageContext};
use crate::flow::authorization::AuthorizationSigner;
use crate::flow::nonce::{NonceOutcome, NonceSync, NonceSynchronizer};
use crate::flow::provision::WalletProvisioner;
use crate::flow::submitter::StagedExecutionSubmitter;
use crate::types::{LocatedWallet, PasskeyCredential};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, instrument};

/// Wallet lookup result, noting whether this call created it.
#[derive(Debug, Clone)]
pub struct ReadyWallet {
    pub located: LocatedWallet,
    pub provisioned: bool,
}

/// Passkey smart wallet client. Owns its collaborators; nothing is global.
pub struct PasskeyWalletClient<C, P, S> {
    connection: C,
    paymaster: P,
    signer: S,
    config: LazorConfig,
}

impl<C, P, S> PasskeyWalletClient<C, P, S>
where
    C: SolConnection,
    P: Paymaster,
    S: PasskeySigner,
{
    pub fn new(connection: C, paymaster: P, signer: S, config: LazorConfig) -> Self {
        Self {
            connection,
            paymaster,
            signer,
            config,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn paymaster(&self) -> &P {
        &self.paymaster
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn config(&self) -> &LazorConfig {
        &self.config
    }

    pub fn locator(&self) -> SmartWalletLocator {
        SmartWalletLocator::new(self.config.program_id, self.config.optimistic())
    }

    pub fn provisioner(&self) -> WalletProvisioner {
        WalletProvisioner::new(
            self.config.program_id,
            self.config.default_policy_program_id,
            self.locator(),
            self.config.settled(),
        )
    }

    pub fn nonce_synchronizer(&self) -> NonceSynchronizer {
        NonceSynchronizer::new(
            self.config.program_id,
            self.config.optimistic(),
            self.config.settled(),
            self.config.nonce_sync.clone(),
        )
    }

    pub fn authorization_signer(&self) -> AuthorizationSigner {
        AuthorizationSigner::new(self.config.signing_timeout())
    }

    pub fn submitter(&self) -> StagedExecutionSubmitter {
        StagedExecutionSubmitter::from_config(&self.config)
    }

    /// Counterfactual wallet address; valid before the wallet exists.
    pub fn smart_wallet_address(&self, credential: &PasskeyCredential) -> Pubkey {
        credential.smart_wallet_address(&self.config.program_id)
    }

    /// Locate the credential's wallet, creating it when absent.
    pub async fn ensure_wallet(
        &self,
        credential: &PasskeyCredential,
    ) -> Result<ReadyWallet, FlowError> {
        let hash = credential.credential_hash();
        if let Some(located) = self
            .locator()
            .locate(&self.connection, &hash)
            .await
            .at_stage(FlowStage::Locate)?
        {
            return Ok(ReadyWallet {
                located,
                provisioned: false,
            });
        }

        info!(credential_hash = %hash, "no smart wallet yet, provisioning");
        let located = self
            .provisioner()
            .provision(&self.connection, &self.paymaster, credential)
            .await
            .at_stage(FlowStage::Provision)?;
        Ok(ReadyWallet {
            located,
            provisioned: true,
        })
    }

    /// Authorize `instructions` with the passkey and run them from the smart
    /// wallet. Returns the execute-chunk signature.
    #[instrument(skip_all, fields(credential_hash = %credential.credential_hash()))]
    pub async fn sign_and_send(
        &self,
        credential: &PasskeyCredential,
        instructions: Vec<Instruction>,
    ) -> Result<Signature, FlowError> {
        if instructions.is_empty() {
            return Err(FlowError::new(
                FlowStage::Prepare,
                LazorSdkError::InvalidInput("no instructions to send".into()),
            ));
        }
        let payer = self
            .paymaster
            .fee_payer()
            .await
            .map_err(|source| LazorSdkError::Paymaster {
                attempts: 1,
                source,
            })
            .at_stage(FlowStage::Prepare)?;

        let wallet = self.ensure_wallet(credential).await?;
        let located = wallet.located;

        // A wallet created just now has nothing in flight to wait for.
        let sync = if wallet.provisioned {
            let state = fetch_wallet_state(
                &self.connection,
                &self.config.program_id,
                &located.smart_wallet,
                self.config.optimistic(),
            )
            .await
            .at_stage(FlowStage::NonceSync)?;
            NonceSync {
                state,
                outcome: NonceOutcome::InSync,
            }
        } else {
            self.nonce_synchronizer()
                .synchronize(&self.connection, &located.smart_wallet)
                .await
                .at_stage(FlowStage::NonceSync)?
        };
        info!(
            smart_wallet = %located.smart_wallet,
            nonce = sync.nonce(),
            outcome = ?sync.outcome,
            "nonce ready"
        );

        let plan = ChunkPlan::new(
            self.config.program_id,
            payer,
            &located,
            &sync.state,
            credential,
            instructions,
            unix_timestamp(),
            self.config.expiry_seconds,
        )
        .at_stage(FlowStage::Authorize)?;

        let authorization = self
            .authorization_signer()
            .authorize(&self.signer, credential, plan.authorization_message())
            .await
            .at_stage(FlowStage::Authorize)?;

        self.submitter()
            .submit(
                &self.connection,
                &self.paymaster,
                &located,
                &sync.state,
                &plan,
                &authorization,
            )
            .await
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
