use crate::basic::wallet::fetch_wallet_state;
use crate::config::{NonceSyncConfig, NonceSyncPolicy};
use crate::core::connection::SolConnection;
use crate::error::{LazorSdkError, Result};
use crate::state::WalletState;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, instrument, warn};

/// How the settled view compared to the optimistic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceOutcome {
    /// Settled nonce already matched
    InSync,
    /// Settled nonce matched after polling
    CaughtUp { attempts: u32 },
    /// Ceiling reached without agreement; proceeding anyway
    Lagging { settled: u64 },
    /// Settled view could not be read; proceeding anyway
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct NonceSync {
    /// Optimistic wallet state; its nonce is the one to authorize
    pub state: WalletState,
    pub outcome: NonceOutcome,
}

impl NonceSync {
    pub fn nonce(&self) -> u64 {
        self.state.last_nonce
    }
}

/// Waits for the settled view of a wallet's nonce to reach the optimistic one,
/// so a new chunk is not staged against a nonce the relayer cannot see yet.
#[derive(Debug, Clone)]
pub struct NonceSynchronizer {
    pub program_id: Pubkey,
    pub optimistic: CommitmentConfig,
    pub settled: CommitmentConfig,
    pub config: NonceSyncConfig,
}

impl NonceSynchronizer {
    pub fn new(
        program_id: Pubkey,
        optimistic: CommitmentConfig,
        settled: CommitmentConfig,
        config: NonceSyncConfig,
    ) -> Self {
        Self {
            program_id,
            optimistic,
            settled,
            config,
        }
    }

    /// Poll the settled view every `interval_ms`, at most `max_attempts` times.
    ///
    /// Failing to read the optimistic state is an error. Failing to read the
    /// settled state, or running out of attempts, is logged and tolerated
    /// unless the policy is [`NonceSyncPolicy::Strict`], which turns the
    /// exhausted case into [`LazorSdkError::NonceLag`].
    #[instrument(skip(self, connection))]
    pub async fn synchronize(
        &self,
        connection: &impl SolConnection,
        smart_wallet: &Pubkey,
    ) -> Result<NonceSync> {
        let state =
            fetch_wallet_state(connection, &self.program_id, smart_wallet, self.optimistic).await?;
        let optimistic = state.last_nonce;
        debug!(optimistic, "optimistic nonce");

        match self.settled_nonce(connection, smart_wallet).await {
            Ok(settled) if settled >= optimistic => {
                return Ok(NonceSync {
                    state,
                    outcome: NonceOutcome::InSync,
                });
            },
            Ok(settled) => debug!(settled, optimistic, "settled nonce behind"),
            Err(e) => {
                warn!(error = %e, "could not read settled nonce, proceeding");
                return Ok(NonceSync {
                    state,
                    outcome: NonceOutcome::Unavailable,
                });
            },
        }

        let mut last_seen = None;
        for attempt in 1..=self.config.max_attempts {
            tokio::time::sleep(self.config.interval()).await;
            match self.settled_nonce(connection, smart_wallet).await {
                Ok(settled) if settled >= optimistic => {
                    info!(attempt, settled, "settled nonce caught up");
                    return Ok(NonceSync {
                        state,
                        outcome: NonceOutcome::CaughtUp { attempts: attempt },
                    });
                },
                Ok(settled) => {
                    debug!(attempt, settled, optimistic, "waiting for settled nonce");
                    last_seen = Some(settled);
                },
                Err(e) => warn!(attempt, error = %e, "settled nonce read failed"),
            }
        }

        let settled = last_seen.unwrap_or_default();
        match self.config.policy {
            NonceSyncPolicy::BestEffort => {
                warn!(
                    optimistic,
                    settled,
                    attempts = self.config.max_attempts,
                    "settled nonce did not catch up, proceeding best-effort"
                );
                Ok(NonceSync {
                    state,
                    outcome: NonceOutcome::Lagging { settled },
                })
            },
            NonceSyncPolicy::Strict => Err(LazorSdkError::NonceLag {
                optimistic,
                settled,
            }),
        }
    }

    async fn settled_nonce(
        &self,
        connection: &impl SolConnection,
        smart_wallet: &Pubkey,
    ) -> Result<u64> {
        fetch_wallet_state(connection, &self.program_id, smart_wallet, self.settled)
            .await
            .map(|state| state.last_nonce)
    }
}
