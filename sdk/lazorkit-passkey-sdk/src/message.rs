//! Canonical authorization challenge signed by the passkey.

use crate::error::Result;
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

/// Smart wallet action being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum SmartWalletAction {
    CreateChunk,
}

/// Every field the verifier rebuilds before checking the passkey signature.
/// Field order is the wire order; changing it invalidates signatures.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AuthorizationMessage {
    pub action: SmartWalletAction,
    pub nonce: u64,
    pub timestamp: i64,
    pub expires_at: i64,
    pub payer: [u8; 32],
    pub smart_wallet: [u8; 32],
    pub credential_hash: [u8; 32],
    pub passkey_public_key: [u8; 33],
    /// Hash of the policy check instruction
    pub policy_hash: [u8; 32],
    /// Hash of the CPI batch staged in the chunk
    pub cpi_hash: [u8; 32],
}

impl AuthorizationMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    /// 32-byte challenge handed to the credential ceremony
    pub fn challenge(&self) -> Result<[u8; 32]> {
        Ok(Sha256::digest(self.to_bytes()?).into())
    }

    pub fn payer(&self) -> Pubkey {
        Pubkey::new_from_array(self.payer)
    }

    pub fn smart_wallet(&self) -> Pubkey {
        Pubkey::new_from_array(self.smart_wallet)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthorizationMessage {
        AuthorizationMessage {
            action: SmartWalletAction::CreateChunk,
            nonce: 5,
            timestamp: 1_700_000_000,
            expires_at: 1_700_000_300,
            payer: [1u8; 32],
            smart_wallet: [2u8; 32],
            credential_hash: [3u8; 32],
            passkey_public_key: [4u8; 33],
            policy_hash: [5u8; 32],
            cpi_hash: [6u8; 32],
        }
    }

    #[test]
    fn any_field_change_changes_challenge() {
        let base = sample().challenge().unwrap();
        let mut other = sample();
        other.nonce += 1;
        assert_ne!(other.challenge().unwrap(), base);
        let mut other = sample();
        other.cpi_hash[0] ^= 1;
        assert_ne!(other.challenge().unwrap(), base);
        assert_eq!(sample().challenge().unwrap(), base);
    }

    #[test]
    fn expiry_window() {
        let msg = sample();
        assert!(!msg.is_expired(1_700_000_300));
        assert!(msg.is_expired(1_700_000_301));
    }
}
