use crate::core::paymaster::PaymasterError;
use crate::core::signer::SignerError;
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use thiserror::Error;

/// SDK-specific error types for LazorKit passkey operations
#[derive(Debug, Error)]
pub enum LazorSdkError {
    /// Connection or RPC error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Account not found on-chain
    #[error("Account not found: {0}")]
    AccountNotFound(Pubkey),

    /// Invalid account data or deserialization error
    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),

    /// Borsh serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] std::io::Error),

    /// DER signature could not be parsed
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Credential id or public key coordinates are unusable
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// The passkey ceremony did not complete
    #[error("User declined to sign: {0}")]
    UserDeclined(#[from] SignerError),

    /// The relayer rejected a submission on the final attempt
    #[error("Paymaster rejected transaction after {attempts} attempt(s): {source}")]
    Paymaster {
        attempts: u32,
        #[source]
        source: PaymasterError,
    },

    /// Wallet record still missing after a confirmed creation transaction
    #[error("Smart wallet not found after creation (credential hash {0})")]
    WalletNotProvisioned(String),

    /// Recomputed device address disagrees with the located one
    #[error("Wallet device mismatch: derived {derived}, on-chain {on_chain}")]
    DeviceMismatch { derived: Pubkey, on_chain: Pubkey },

    /// Settled nonce never caught up with the optimistic one
    #[error("Nonce not settled: optimistic {optimistic}, settled {settled}")]
    NonceLag { optimistic: u64, settled: u64 },

    /// Transaction could not be built or did not confirm
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Configuration value could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Caller supplied arguments the flow cannot act on
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Wallet device account absent although its wallet was located
    #[error("Wallet device account missing: {0}")]
    DeviceMissing(Pubkey),
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, LazorSdkError>;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserDeclined,
    TransientNetwork,
    StateRace,
    IntegrityMismatch,
    FatalProvisioning,
    InvalidInput,
    /// An account exists but does not decode as the expected layout.
    CorruptState,
}

/// Custom program error raised when an account fails to deserialize.
const INVALID_ACCOUNT_DATA_CODE: &str = "0x2";

impl LazorSdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LazorSdkError::UserDeclined(_) => ErrorKind::UserDeclined,
            LazorSdkError::NonceLag { .. } => ErrorKind::StateRace,
            LazorSdkError::DeviceMismatch { .. } | LazorSdkError::DeviceMissing(_) => {
                ErrorKind::IntegrityMismatch
            },
            LazorSdkError::WalletNotProvisioned(_) => ErrorKind::FatalProvisioning,
            // Located earlier but not visible at the commitment read now.
            LazorSdkError::AccountNotFound(_) => ErrorKind::StateRace,
            LazorSdkError::InvalidAccountData(_) | LazorSdkError::SerializationError(_) => {
                ErrorKind::CorruptState
            },
            LazorSdkError::MalformedSignature(_)
            | LazorSdkError::InvalidCredential(_)
            | LazorSdkError::Config(_)
            | LazorSdkError::InvalidInput(_) => ErrorKind::InvalidInput,
            LazorSdkError::Connection(_)
            | LazorSdkError::Paymaster { .. }
            | LazorSdkError::Transaction(_) => ErrorKind::TransientNetwork,
        }
    }

    /// True when the chain reported the program's "invalid account data" code,
    /// which usually means the settled nonce had not caught up yet.
    pub fn is_invalid_account_data(&self) -> bool {
        match self {
            LazorSdkError::Paymaster { source, .. } => source.is_invalid_account_data(),
            other => mentions_invalid_account_data(&other.to_string()),
        }
    }
}

pub(crate) fn mentions_invalid_account_data(text: &str) -> bool {
    let needle = format!("custom program error: {INVALID_ACCOUNT_DATA_CODE}");
    let code_match = text.match_indices(&needle).any(|(at, _)| {
        text[at + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_alphanumeric())
    });
    code_match || text.contains("InvalidAccountData") || text.contains("invalid account data")
}

//=============================================================================
// Stage-carrying error
//=============================================================================

/// Step of the sign-and-send flow at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Prepare,
    Locate,
    Provision,
    NonceSync,
    Authorize,
    Stage,
    Execute,
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowStage::Prepare => "prepare",
            FlowStage::Locate => "locate wallet",
            FlowStage::Provision => "create wallet",
            FlowStage::NonceSync => "nonce sync",
            FlowStage::Authorize => "authorize",
            FlowStage::Stage => "create chunk",
            FlowStage::Execute => "execute chunk",
        };
        f.write_str(name)
    }
}

/// Fatal failure of the flow, tagged with the step it happened in.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct FlowError {
    pub stage: FlowStage,
    #[source]
    pub source: LazorSdkError,
}

impl FlowError {
    pub fn new(stage: FlowStage, source: LazorSdkError) -> Self {
        Self { stage, source }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn is_user_declined(&self) -> bool {
        self.kind() == ErrorKind::UserDeclined
    }
}

/// Extension to tag a `Result` with the stage it belongs to.
pub trait StageContext<T> {
    fn at_stage(self, stage: FlowStage) -> std::result::Result<T, FlowError>;
}

impl<T> StageContext<T> for Result<T> {
    fn at_stage(self, stage: FlowStage) -> std::result::Result<T, FlowError> {
        self.map_err(|source| FlowError::new(stage, source))
    }
}

/// Maps a raw chain or relayer error message to text fit for an end user.
pub fn user_message(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains("insufficient funds") || lower.contains("insufficient lamports") {
        return "Insufficient balance to complete this transaction.".to_string();
    }
    if lower.contains("blockhash not found") || lower.contains("block height exceeded") {
        return "The transaction expired before it was processed. Please try again.".to_string();
    }
    if mentions_invalid_account_data(raw) {
        return "Wallet state is still settling. Please try again in a few seconds.".to_string();
    }
    if lower.contains("user rejected")
        || lower.contains("notallowederror")
        || lower.contains("user declined")
    {
        return "The signing request was cancelled.".to_string();
    }
    if lower.contains("timeout") || lower.contains("timed out") {
        return "The network took too long to respond. Please try again.".to_string();
    }
    if lower.contains("simulation failed") {
        return "The transaction was rejected during simulation.".to_string();
    }
    "Transaction failed. Please try again.".to_string()
}
