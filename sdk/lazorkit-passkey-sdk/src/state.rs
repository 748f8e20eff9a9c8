//! Client-side views of the LazorKit program accounts.
//!
//! Every account is stored as an 8-byte Anchor discriminator followed by the
//! Borsh encoded fields. Public keys are kept as raw bytes so the layout does
//! not depend on how a given `Pubkey` version implements Borsh.

use crate::error::{LazorSdkError, Result};
use crate::types::{CredentialHash, PasskeyPublicKey};
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

pub const DISCRIMINATOR_LEN: usize = 8;

/// `sha256("account:<Name>")[..8]`
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("account:{name}").as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

pub trait AnchorAccount: BorshSerialize + BorshDeserialize + Sized {
    const NAME: &'static str;

    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        account_discriminator(Self::NAME)
    }

    /// Decode account data. Trailing bytes (reserved space) are ignored.
    fn try_from_account_data(data: &[u8]) -> Result<Self> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(LazorSdkError::InvalidAccountData(format!(
                "{} account data too small ({} bytes)",
                Self::NAME,
                data.len()
            )));
        }
        if data[..DISCRIMINATOR_LEN] != Self::discriminator() {
            return Err(LazorSdkError::InvalidAccountData(format!(
                "discriminator mismatch for {}",
                Self::NAME
            )));
        }
        Self::deserialize(&mut &data[DISCRIMINATOR_LEN..]).map_err(|e| {
            LazorSdkError::InvalidAccountData(format!("Failed to parse {}: {}", Self::NAME, e))
        })
    }

    fn to_account_data(&self) -> Result<Vec<u8>> {
        let mut data = Self::discriminator().to_vec();
        self.serialize(&mut data)?;
        Ok(data)
    }
}

/// Per-wallet state holding the replay nonce and policy binding
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct WalletState {
    pub bump: u8,
    pub wallet_id: u64,
    pub last_nonce: u64,
    pub referral: [u8; 32],
    pub policy_program: [u8; 32],
    pub policy_data: Vec<u8>,
}

impl AnchorAccount for WalletState {
    const NAME: &'static str = "WalletState";
}

impl WalletState {
    pub fn referral(&self) -> Pubkey {
        Pubkey::new_from_array(self.referral)
    }

    pub fn policy_program(&self) -> Pubkey {
        Pubkey::new_from_array(self.policy_program)
    }
}

/// Binds one passkey to a smart wallet
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct WalletDevice {
    pub passkey_public_key: [u8; 33],
    pub credential_hash: [u8; 32],
    pub smart_wallet: [u8; 32],
    pub bump: u8,
}

impl AnchorAccount for WalletDevice {
    const NAME: &'static str = "WalletDevice";
}

impl WalletDevice {
    /// Total account size including the discriminator.
    pub const LEN: usize = DISCRIMINATOR_LEN + 33 + 32 + 32 + 1;

    /// Byte offset of `credential_hash` within the account data.
    pub const CREDENTIAL_HASH_OFFSET: usize = DISCRIMINATOR_LEN + 33;

    pub fn new(
        passkey_public_key: &PasskeyPublicKey,
        credential_hash: &CredentialHash,
        smart_wallet: &Pubkey,
        bump: u8,
    ) -> Self {
        Self {
            passkey_public_key: passkey_public_key.0,
            credential_hash: credential_hash.0,
            smart_wallet: smart_wallet.to_bytes(),
            bump,
        }
    }

    pub fn smart_wallet(&self) -> Pubkey {
        Pubkey::new_from_array(self.smart_wallet)
    }
}

/// Staged, already-authorized batch of CPIs awaiting execution
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Chunk {
    pub owner_wallet_address: [u8; 32],
    pub cpi_hash: [u8; 32],
    pub authorized_nonce: u64,
    pub authorized_timestamp: i64,
    pub rent_refund_address: [u8; 32],
    pub vault_index: u8,
}

impl AnchorAccount for Chunk {
    const NAME: &'static str = "Chunk";
}

impl Chunk {
    /// Total account size including the discriminator.
    pub const LEN: usize = DISCRIMINATOR_LEN + 32 + 32 + 8 + 8 + 32 + 1;

    /// Byte offset of `rent_refund_address` within the account data.
    pub const RENT_REFUND_OFFSET: usize = DISCRIMINATOR_LEN + 32 + 32 + 8 + 8;

    /// Byte offset of `vault_index` within the account data.
    pub const VAULT_INDEX_OFFSET: usize = Self::RENT_REFUND_OFFSET + 32;

    pub fn owner_wallet_address(&self) -> Pubkey {
        Pubkey::new_from_array(self.owner_wallet_address)
    }

    pub fn rent_refund_address(&self) -> Pubkey {
        Pubkey::new_from_array(self.rent_refund_address)
    }
}
