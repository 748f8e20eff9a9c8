use crate::core::connection::SolConnection;
use crate::core::constants::{
    CHUNK_SEED, CONFIG_SEED, POLICY_REGISTRY_SEED, SMART_WALLET_SEED, VAULT_SEED,
    WALLET_DEVICE_SEED, WALLET_STATE_SEED,
};
use crate::error::{LazorSdkError, Result};
use crate::state::AnchorAccount;
use crate::types::CredentialHash;
use sha2::{Digest, Sha256};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

//=============================================================================
// PDA Derivation Helpers
//=============================================================================

/// Derive the smart wallet PDA from its wallet id
pub fn derive_smart_wallet_pda(program_id: &Pubkey, wallet_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SMART_WALLET_SEED, &wallet_id.to_le_bytes()], program_id)
}

/// Derive the wallet state PDA (nonce holder) from the smart wallet
pub fn derive_wallet_state_pda(program_id: &Pubkey, smart_wallet: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[WALLET_STATE_SEED, smart_wallet.as_ref()], program_id)
}

/// Derive the wallet device PDA binding a credential to a smart wallet
pub fn derive_wallet_device_pda(
    program_id: &Pubkey,
    smart_wallet: &Pubkey,
    credential_hash: &CredentialHash,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[
            WALLET_DEVICE_SEED,
            smart_wallet.as_ref(),
            credential_hash.as_bytes(),
        ],
        program_id,
    )
}

/// Derive the chunk PDA staged for a given nonce
pub fn derive_chunk_pda(program_id: &Pubkey, smart_wallet: &Pubkey, nonce: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[CHUNK_SEED, smart_wallet.as_ref(), &nonce.to_le_bytes()],
        program_id,
    )
}

pub fn derive_config_pda(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CONFIG_SEED], program_id)
}

pub fn derive_policy_registry_pda(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POLICY_REGISTRY_SEED], program_id)
}

/// Derive one of the fee vault PDAs
pub fn derive_vault_pda(program_id: &Pubkey, index: u8) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, &[index]], program_id)
}

//=============================================================================
// Hashing
//=============================================================================

/// Anchor instruction discriminator: `sha256("<namespace>:<name>")[..8]`
pub fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Hash binding instruction data to the program and ordered account metas.
///
/// `sha256(sha256(data) || sha256(program_id || (key || is_signer || is_writable)*))`
pub fn compute_instruction_hash(
    data: &[u8],
    accounts: &[AccountMeta],
    program_id: &Pubkey,
) -> [u8; 32] {
    let data_hash = Sha256::digest(data);

    let mut accounts_hasher = Sha256::new();
    accounts_hasher.update(program_id.as_ref());
    for meta in accounts {
        accounts_hasher.update(meta.pubkey.as_ref());
        accounts_hasher.update([meta.is_signer as u8]);
        accounts_hasher.update([meta.is_writable as u8]);
    }
    let accounts_hash = accounts_hasher.finalize();

    let mut combined = Sha256::new();
    combined.update(data_hash);
    combined.update(accounts_hash);
    combined.finalize().into()
}

//=============================================================================
// Account Fetching & Parsing
//=============================================================================

/// Fetch and decode an Anchor account, `None` when it does not exist
pub async fn fetch_account<T: AnchorAccount>(
    connection: &impl SolConnection,
    address: &Pubkey,
    commitment: CommitmentConfig,
) -> Result<Option<T>> {
    let account = connection
        .get_account(address, commitment)
        .await
        .map_err(|e| LazorSdkError::Connection(e.to_string()))?;

    match account {
        Some(account) if !account.data.is_empty() => {
            T::try_from_account_data(&account.data).map(Some)
        },
        _ => Ok(None),
    }
}

/// Fetch and decode an Anchor account that must exist
pub async fn fetch_required_account<T: AnchorAccount>(
    connection: &impl SolConnection,
    address: &Pubkey,
    commitment: CommitmentConfig,
) -> Result<T> {
    fetch_account(connection, address, commitment)
        .await?
        .ok_or(LazorSdkError::AccountNotFound(*address))
}
