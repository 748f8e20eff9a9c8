use crate::basic::actions::{ChunkPlan, CreateChunkBuilder, ExecuteChunkBuilder};
use crate::config::{IntegrityPolicy, LazorConfig, RetryPolicy};
use crate::core::connection::SolConnection;
use crate::core::paymaster::Paymaster;
use crate::core::transaction::TransactionEnvelope;
use crate::error::{FlowError, FlowStage, LazorSdkError, Result, StageContext};
use crate::state::{AnchorAccount, Chunk, WalletDevice, WalletState};
use crate::types::{LocatedWallet, SignedAuthorization};
use crate::utils::{derive_wallet_device_pda, fetch_account};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::{debug, error, info, instrument, warn};

/// Drives one authorized action through create-chunk and execute-chunk.
///
/// ```text
/// check chunk ──exists──────────────────────┐
///      │ absent                             v
///      └─> stage (retry) ─> confirm ─> execute (once) ─> confirm ─> signature
/// ```
#[derive(Debug, Clone)]
pub struct StagedExecutionSubmitter {
    pub program_id: Pubkey,
    pub lookup_table: Option<Pubkey>,
    pub retry: RetryPolicy,
    pub integrity: IntegrityPolicy,
    pub optimistic: CommitmentConfig,
    pub settled: CommitmentConfig,
}

impl StagedExecutionSubmitter {
    pub fn from_config(config: &LazorConfig) -> Self {
        Self {
            program_id: config.program_id,
            lookup_table: config.lookup_table,
            retry: config.retry.clone(),
            integrity: config.integrity_policy,
            optimistic: config.optimistic(),
            settled: config.settled(),
        }
    }

    /// Recompute the device address from (smart wallet, credential hash) and
    /// compare it, plus the device account's presence, with what was located.
    pub async fn verify_device(
        &self,
        connection: &impl SolConnection,
        located: &LocatedWallet,
        plan: &ChunkPlan,
    ) -> Result<()> {
        let (derived, _) =
            derive_wallet_device_pda(&self.program_id, &located.smart_wallet, &plan.credential_hash);
        if derived != located.wallet_device {
            error!(
                %derived,
                on_chain = %located.wallet_device,
                credential_hash = %plan.credential_hash,
                "CRITICAL: wallet device mismatch"
            );
            if self.integrity == IntegrityPolicy::Strict {
                return Err(LazorSdkError::DeviceMismatch {
                    derived,
                    on_chain: located.wallet_device,
                });
            }
        }

        match fetch_account::<WalletDevice>(connection, &located.wallet_device, self.optimistic)
            .await
        {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                error!(wallet_device = %located.wallet_device, "CRITICAL: wallet device account missing");
                match self.integrity {
                    IntegrityPolicy::Strict => {
                        Err(LazorSdkError::DeviceMissing(located.wallet_device))
                    },
                    IntegrityPolicy::Warn => Ok(()),
                }
            },
            Err(e @ LazorSdkError::InvalidAccountData(_)) => {
                error!(wallet_device = %located.wallet_device, error = %e, "CRITICAL: wallet device account unreadable");
                match self.integrity {
                    IntegrityPolicy::Strict => Err(e),
                    IntegrityPolicy::Warn => Ok(()),
                }
            },
            Err(e) => {
                warn!(error = %e, "could not verify wallet device account");
                Ok(())
            },
        }
    }

    /// The chunk already staged for the plan's nonce, read at the optimistic
    /// commitment. A failed read counts as absent; an account that exists but
    /// does not decode is an error since create-chunk could not succeed either.
    pub async fn find_chunk(
        &self,
        connection: &impl SolConnection,
        chunk: &Pubkey,
    ) -> Result<Option<Chunk>> {
        match connection.get_account(chunk, self.optimistic).await {
            Ok(Some(account)) if !account.data.is_empty() => {
                Chunk::try_from_account_data(&account.data).map(Some)
            },
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(%chunk, error = %e, "chunk lookup failed, treating as absent");
                Ok(None)
            },
        }
    }

    async fn load_lookup_table(
        &self,
        connection: &impl SolConnection,
    ) -> Option<AddressLookupTableAccount> {
        let address = self.lookup_table?;
        match connection.get_address_lookup_table(&address).await {
            Ok(Some(table)) => {
                debug!(%address, entries = table.addresses.len(), "loaded lookup table");
                Some(table)
            },
            Ok(None) => {
                warn!(%address, "lookup table not found, sending uncompressed");
                None
            },
            Err(e) => {
                warn!(%address, error = %e, "lookup table load failed, sending uncompressed");
                None
            },
        }
    }

    /// Submit create-chunk with linear backoff, then wait for confirmation.
    #[instrument(skip_all, fields(smart_wallet = %plan.smart_wallet, nonce = plan.nonce))]
    pub async fn stage(
        &self,
        connection: &impl SolConnection,
        paymaster: &impl Paymaster,
        plan: &ChunkPlan,
        authorization: &SignedAuthorization,
    ) -> Result<Signature> {
        let table = self.load_lookup_table(connection).await;
        let tx = CreateChunkBuilder::new(plan, authorization)
            .with_lookup_table(table)
            .build_transaction(connection)
            .await?;

        let signature = self.send_with_retry(paymaster, &tx).await?;
        connection
            .confirm_transaction(&signature, self.settled)
            .await
            .map_err(|e| LazorSdkError::Transaction(format!("create chunk {signature}: {e}")))?;
        info!(%signature, "chunk created");
        Ok(signature)
    }

    async fn send_with_retry(
        &self,
        paymaster: &impl Paymaster,
        tx: &TransactionEnvelope,
    ) -> Result<Signature> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            debug!(attempt, versioned = tx.is_versioned(), "submitting create chunk");
            let err = match paymaster.sign_and_send(tx).await {
                Ok(signature) => return Ok(signature),
                Err(err) => err,
            };

            if err.is_invalid_account_data() {
                warn!(
                    attempt,
                    error = %err,
                    "invalid account data (0x2), settled nonce is probably still behind"
                );
            } else {
                warn!(attempt, error = %err, "paymaster rejected create chunk");
            }
            for line in &err.logs {
                warn!(attempt, log = %line, "simulation log");
            }

            if attempt >= max_attempts {
                return Err(LazorSdkError::Paymaster {
                    attempts: attempt,
                    source: err,
                });
            }
            let delay = self.retry.delay_for(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying create chunk");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Submit execute-chunk once and wait for confirmation. `chunk` is the
    /// staged account whose vault and refund address the execution pays into.
    #[instrument(skip_all, fields(smart_wallet = %plan.smart_wallet, nonce = plan.nonce))]
    pub async fn execute(
        &self,
        connection: &impl SolConnection,
        paymaster: &impl Paymaster,
        plan: &ChunkPlan,
        state: &WalletState,
        chunk: &Chunk,
    ) -> Result<Signature> {
        let tx = ExecuteChunkBuilder::new(plan, state, chunk)
            .build_transaction(connection)
            .await?;
        let signature = paymaster
            .sign_and_send(&tx)
            .await
            .map_err(|source| {
                for line in &source.logs {
                    warn!(log = %line, "simulation log");
                }
                LazorSdkError::Paymaster {
                    attempts: 1,
                    source,
                }
            })?;

        connection
            .confirm_transaction(&signature, self.settled)
            .await
            .map_err(|e| LazorSdkError::Transaction(format!("execute chunk {signature}: {e}")))?;
        info!(%signature, "chunk executed");
        Ok(signature)
    }

    /// Check, stage if needed, execute. Returns the execute signature.
    pub async fn submit(
        &self,
        connection: &impl SolConnection,
        paymaster: &impl Paymaster,
        located: &LocatedWallet,
        state: &WalletState,
        plan: &ChunkPlan,
        authorization: &SignedAuthorization,
    ) -> std::result::Result<Signature, FlowError> {
        self.verify_device(connection, located, plan)
            .await
            .at_stage(FlowStage::Stage)?;

        let existing = self
            .find_chunk(connection, &plan.chunk)
            .await
            .at_stage(FlowStage::Stage)?;
        let chunk = match existing {
            Some(chunk) => {
                info!(chunk = %plan.chunk, nonce = plan.nonce, "chunk already staged, skipping create");
                chunk
            },
            None => {
                self.stage(connection, paymaster, plan, authorization)
                    .await
                    .at_stage(FlowStage::Stage)?;
                plan.staged_chunk()
            },
        };

        self.execute(connection, paymaster, plan, state, &chunk)
            .await
            .at_stage(FlowStage::Execute)
    }
}
