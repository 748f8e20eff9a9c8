pub mod advanced;
pub mod basic;
pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod flow;
pub mod identity;
pub mod message;
pub mod state;
pub mod types;
pub mod utils;

pub use crate::config::{IntegrityPolicy, LazorConfig, NonceSyncPolicy, RetryPolicy};
pub use crate::core::connection::SolConnection;
pub use crate::core::kora::KoraPaymaster;
pub use crate::core::paymaster::{Paymaster, PaymasterError};
pub use crate::core::rpc::RpcConnection;
pub use crate::core::signer::{Assertion, AssertionRequest, PasskeySigner, SignerError};
pub use crate::core::transaction::TransactionEnvelope;
pub use crate::error::{ErrorKind, FlowError, FlowStage, LazorSdkError, Result};
pub use crate::flow::client::PasskeyWalletClient;
pub use crate::types::{CredentialHash, LocatedWallet, PasskeyCredential};
pub use crate::utils::{derive_smart_wallet_pda, derive_wallet_device_pda};
