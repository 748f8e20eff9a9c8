//! Client configuration.

use crate::core::constants::{DEFAULT_LOOKUP_TABLE, DEFAULT_POLICY_PROGRAM_ID, DEFAULT_PROGRAM_ID};
use crate::error::{LazorSdkError, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::pubkey::Pubkey;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// What to do when the recomputed wallet device address disagrees with the
/// address the locator returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityPolicy {
    /// Log the mismatch as critical and continue
    #[default]
    Warn,
    /// Abort before staging
    Strict,
}

/// What to do when the settled nonce never catches up with the optimistic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceSyncPolicy {
    /// Warn and proceed with the optimistic nonce
    #[default]
    BestEffort,
    /// Fail with a nonce lag error
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonceSyncConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
    pub policy: NonceSyncPolicy,
}

impl Default for NonceSyncConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_attempts: 30,
            policy: NonceSyncPolicy::BestEffort,
        }
    }
}

impl NonceSyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Relayer retry schedule for the create-chunk submission.
///
/// The wait before retry `i` (1-based) is `base_delay_ms + step_ms * (i - 1)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub step_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 2_000,
            step_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `failed_attempt` (1-based).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let step = self
            .step_ms
            .saturating_mul(u64::from(failed_attempt.saturating_sub(1)));
        Duration::from_millis(self.base_delay_ms.saturating_add(step))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazorConfig {
    pub rpc_url: String,
    pub paymaster_url: String,
    #[serde(with = "pubkey_string")]
    pub program_id: Pubkey,
    #[serde(with = "pubkey_string")]
    pub default_policy_program_id: Pubkey,
    /// Lookup table attached to create-chunk transactions, if any
    #[serde(with = "option_pubkey_string")]
    pub lookup_table: Option<Pubkey>,
    /// Lifetime of an authorization challenge
    pub expiry_seconds: i64,
    /// Upper bound on the passkey ceremony
    pub signing_timeout_ms: u64,
    /// Freshness used for low-latency reads
    pub optimistic_commitment: CommitmentLevel,
    /// Freshness used for settled reads and confirmations
    pub settled_commitment: CommitmentLevel,
    pub integrity_policy: IntegrityPolicy,
    pub nonce_sync: NonceSyncConfig,
    pub retry: RetryPolicy,
}

impl Default for LazorConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            paymaster_url: "https://kora.devnet.lazorkit.com".to_string(),
            program_id: DEFAULT_PROGRAM_ID,
            default_policy_program_id: DEFAULT_POLICY_PROGRAM_ID,
            lookup_table: Some(DEFAULT_LOOKUP_TABLE),
            expiry_seconds: 300,
            signing_timeout_ms: 60_000,
            optimistic_commitment: CommitmentLevel::Processed,
            settled_commitment: CommitmentLevel::Confirmed,
            integrity_policy: IntegrityPolicy::Warn,
            nonce_sync: NonceSyncConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl LazorConfig {
    /// Defaults overlaid with environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LAZORKIT_RPC_URL`: Solana RPC endpoint
    /// - `LAZORKIT_PAYMASTER_URL`: Kora paymaster endpoint
    /// - `LAZORKIT_PROGRAM_ID`: LazorKit program id
    /// - `LAZORKIT_LOOKUP_TABLE`: lookup table address, `none` to disable
    /// - `LAZORKIT_STRICT_INTEGRITY`: `true`/`1` to fail on device mismatch
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = env::var("LAZORKIT_RPC_URL") {
            config.rpc_url = url;
        }
        if let Ok(url) = env::var("LAZORKIT_PAYMASTER_URL") {
            config.paymaster_url = url;
        }
        if let Ok(id) = env::var("LAZORKIT_PROGRAM_ID") {
            config.program_id = parse_pubkey("LAZORKIT_PROGRAM_ID", &id)?;
        }
        if let Ok(table) = env::var("LAZORKIT_LOOKUP_TABLE") {
            config.lookup_table = match table.trim() {
                "" | "none" => None,
                other => Some(parse_pubkey("LAZORKIT_LOOKUP_TABLE", other)?),
            };
        }
        if let Ok(strict) = env::var("LAZORKIT_STRICT_INTEGRITY") {
            if strict.eq_ignore_ascii_case("true") || strict == "1" {
                config.integrity_policy = IntegrityPolicy::Strict;
            }
        }
        Ok(config)
    }

    pub fn optimistic(&self) -> CommitmentConfig {
        CommitmentConfig {
            commitment: self.optimistic_commitment,
        }
    }

    pub fn settled(&self) -> CommitmentConfig {
        CommitmentConfig {
            commitment: self.settled_commitment,
        }
    }

    pub fn signing_timeout(&self) -> Duration {
        Duration::from_millis(self.signing_timeout_ms)
    }
}

fn parse_pubkey(name: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim())
        .map_err(|e| LazorSdkError::Config(format!("{name}: invalid pubkey {value:?}: {e}")))
}

mod pubkey_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let text = String::deserialize(deserializer)?;
        Pubkey::from_str(&text).map_err(serde::de::Error::custom)
    }
}

mod option_pubkey_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(
        key: &Option<Pubkey>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match key {
            Some(key) => serializer.serialize_some(&key.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Pubkey>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| Pubkey::from_str(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
