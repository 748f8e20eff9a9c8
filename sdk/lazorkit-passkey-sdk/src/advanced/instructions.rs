use crate::core::constants::{
    PASSKEY_PUBLIC_KEY_SIZE, SECP256R1_PROGRAM_ID, SECP256R1_SIGNATURE_SIZE,
};
use crate::error::Result;
use crate::types::{CredentialHash, PasskeyPublicKey};
use crate::utils::{
    derive_config_pda, derive_policy_registry_pda, derive_smart_wallet_pda, derive_vault_pda,
    derive_wallet_device_pda, derive_wallet_state_pda, sighash,
};
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::{system_program, sysvar};

//=============================================================================
// Instruction arguments
//=============================================================================

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CreateSmartWalletArgs {
    pub passkey_public_key: [u8; PASSKEY_PUBLIC_KEY_SIZE],
    pub credential_hash: [u8; 32],
    pub init_policy_data: Vec<u8>,
    pub wallet_id: u64,
    /// Lamports moved from the payer into the new wallet
    pub amount: u64,
    pub referral_address: Option<[u8; 32]>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CreateChunkArgs {
    pub passkey_public_key: [u8; PASSKEY_PUBLIC_KEY_SIZE],
    pub signature: Vec<u8>,
    pub client_data_json_raw: Vec<u8>,
    pub authenticator_data_raw: Vec<u8>,
    /// Index of the secp256r1 verification instruction in the transaction
    pub verify_instruction_index: u8,
    pub policy_data: Vec<u8>,
    /// Fee vault (0..32) chosen off-chain
    pub vault_index: u8,
    pub timestamp: i64,
    pub expires_at: i64,
    pub credential_hash: [u8; 32],
    pub cpi_hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ExecuteChunkArgs {
    pub instruction_data_list: Vec<Vec<u8>>,
    /// Account split points between CPIs (n-1 entries for n instructions)
    pub split_index: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PolicyArgs {
    pub wallet_id: u64,
    pub passkey_public_key: [u8; PASSKEY_PUBLIC_KEY_SIZE],
}

fn anchor_data<T: BorshSerialize>(name: &str, args: &T) -> Result<Vec<u8>> {
    let mut data = sighash("global", name).to_vec();
    args.serialize(&mut data)?;
    Ok(data)
}

//=============================================================================
// Default policy program
//=============================================================================

pub fn init_policy_data(wallet_id: u64, passkey: &PasskeyPublicKey) -> Result<Vec<u8>> {
    anchor_data(
        "init_policy",
        &PolicyArgs {
            wallet_id,
            passkey_public_key: passkey.0,
        },
    )
}

pub fn check_policy_data(wallet_id: u64, passkey: &PasskeyPublicKey) -> Result<Vec<u8>> {
    anchor_data(
        "check_policy",
        &PolicyArgs {
            wallet_id,
            passkey_public_key: passkey.0,
        },
    )
}

/// Accounts the default policy's `check_policy` reads.
pub fn check_policy_accounts(wallet_device: &Pubkey, smart_wallet: &Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(*wallet_device, false),
        AccountMeta::new_readonly(*smart_wallet, false),
    ]
}

//=============================================================================
// LazorKit program
//=============================================================================

pub fn create_smart_wallet(
    program_id: &Pubkey,
    payer: &Pubkey,
    policy_program: &Pubkey,
    args: CreateSmartWalletArgs,
) -> Result<Instruction> {
    let (smart_wallet, _) = derive_smart_wallet_pda(program_id, args.wallet_id);
    let (wallet_state, _) = derive_wallet_state_pda(program_id, &smart_wallet);
    let (wallet_device, _) = derive_wallet_device_pda(
        program_id,
        &smart_wallet,
        &CredentialHash(args.credential_hash),
    );

    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(derive_policy_registry_pda(program_id).0, false),
        AccountMeta::new(smart_wallet, false),
        AccountMeta::new(wallet_state, false),
        AccountMeta::new(wallet_device, false),
        AccountMeta::new_readonly(derive_config_pda(program_id).0, false),
        AccountMeta::new_readonly(*policy_program, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: anchor_data("create_smart_wallet", &args)?,
    })
}

/// Accounts fixed by the program for a create-chunk call
pub struct CreateChunkAccounts {
    pub payer: Pubkey,
    pub smart_wallet: Pubkey,
    pub wallet_device: Pubkey,
    pub policy_program: Pubkey,
    pub chunk: Pubkey,
}

pub fn create_chunk(
    program_id: &Pubkey,
    keys: &CreateChunkAccounts,
    args: &CreateChunkArgs,
    policy_accounts: Vec<AccountMeta>,
) -> Result<Instruction> {
    let (wallet_state, _) = derive_wallet_state_pda(program_id, &keys.smart_wallet);

    let mut accounts = vec![
        AccountMeta::new(keys.payer, true),
        AccountMeta::new_readonly(derive_config_pda(program_id).0, false),
        AccountMeta::new(keys.smart_wallet, false),
        AccountMeta::new(wallet_state, false),
        AccountMeta::new_readonly(keys.wallet_device, false),
        AccountMeta::new_readonly(derive_policy_registry_pda(program_id).0, false),
        AccountMeta::new_readonly(keys.policy_program, false),
        AccountMeta::new(keys.chunk, false),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    accounts.extend(policy_accounts);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: anchor_data("create_chunk", args)?,
    })
}

/// Accounts fixed by the program for an execute-chunk call
pub struct ExecuteChunkAccounts {
    pub payer: Pubkey,
    pub smart_wallet: Pubkey,
    pub referral: Pubkey,
    pub vault_index: u8,
    pub chunk: Pubkey,
    pub rent_refund: Pubkey,
}

pub fn execute_chunk(
    program_id: &Pubkey,
    keys: &ExecuteChunkAccounts,
    args: &ExecuteChunkArgs,
    cpi_accounts: Vec<AccountMeta>,
) -> Result<Instruction> {
    let (wallet_state, _) = derive_wallet_state_pda(program_id, &keys.smart_wallet);
    let (vault, _) = derive_vault_pda(program_id, keys.vault_index);

    let mut accounts = vec![
        AccountMeta::new(keys.payer, true),
        AccountMeta::new_readonly(derive_config_pda(program_id).0, false),
        AccountMeta::new(keys.smart_wallet, false),
        AccountMeta::new(wallet_state, false),
        AccountMeta::new(keys.referral, false),
        AccountMeta::new(vault, false),
        AccountMeta::new(keys.chunk, false),
        AccountMeta::new(keys.rent_refund, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    accounts.extend(cpi_accounts);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: anchor_data("execute_chunk", args)?,
    })
}

//=============================================================================
// Secp256r1 precompile
//=============================================================================

const SIGNATURE_OFFSETS_START: usize = 2;
const SIGNATURE_OFFSETS_SIZE: usize = 14;
const DATA_START: usize = SIGNATURE_OFFSETS_START + SIGNATURE_OFFSETS_SIZE;

/// Build the precompile instruction verifying one WebAuthn signature.
///
/// The signed message is `authenticatorData || sha256(clientDataJSON)`.
/// Layout: `[count, pad, offsets(14), pubkey(33), signature(64), message]`.
pub fn secp256r1_verify(
    passkey: &PasskeyPublicKey,
    signature: &[u8; SECP256R1_SIGNATURE_SIZE],
    authenticator_data: &[u8],
    client_data_json: &[u8],
) -> Instruction {
    let mut message = authenticator_data.to_vec();
    message.extend_from_slice(&Sha256::digest(client_data_json));

    let public_key_offset = DATA_START;
    let signature_offset = public_key_offset + PASSKEY_PUBLIC_KEY_SIZE;
    let message_offset = signature_offset + SECP256R1_SIGNATURE_SIZE;

    let mut data = Vec::with_capacity(message_offset + message.len());
    data.push(1u8);
    data.push(0u8);
    for (offset, index) in [
        (signature_offset as u16, u16::MAX),
        (public_key_offset as u16, u16::MAX),
    ] {
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&index.to_le_bytes());
    }
    data.extend_from_slice(&(message_offset as u16).to_le_bytes());
    data.extend_from_slice(&(message.len() as u16).to_le_bytes());
    data.extend_from_slice(&u16::MAX.to_le_bytes());
    data.extend_from_slice(passkey.as_bytes());
    data.extend_from_slice(signature);
    data.extend_from_slice(&message);

    Instruction {
        program_id: SECP256R1_PROGRAM_ID,
        accounts: vec![],
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::DEFAULT_PROGRAM_ID;

    #[test]
    fn verify_instruction_layout() {
        let passkey = PasskeyPublicKey([2u8; 33]);
        let ix = secp256r1_verify(&passkey, &[7u8; 64], &[1u8; 37], b"{}");
        let data = &ix.data;
        assert_eq!(data[0], 1);
        let u16_at = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]) as usize;
        let sig_at = u16_at(2);
        let key_at = u16_at(6);
        let msg_at = u16_at(10);
        let msg_len = u16_at(12);
        assert_eq!(&data[key_at..key_at + 33], &[2u8; 33]);
        assert_eq!(&data[sig_at..sig_at + 64], &[7u8; 64]);
        assert_eq!(msg_len, 37 + 32);
        assert_eq!(&data[msg_at..msg_at + 37], &[1u8; 37]);
        assert_eq!(data.len(), msg_at + msg_len);
    }

    #[test]
    fn create_chunk_args_follow_discriminator() {
        let args = CreateChunkArgs {
            passkey_public_key: [3u8; 33],
            signature: vec![1; 64],
            client_data_json_raw: vec![2; 10],
            authenticator_data_raw: vec![3; 37],
            verify_instruction_index: 0,
            policy_data: vec![],
            vault_index: 5,
            timestamp: 10,
            expires_at: 310,
            credential_hash: [4u8; 32],
            cpi_hash: [5u8; 32],
        };
        let keys = CreateChunkAccounts {
            payer: Pubkey::new_unique(),
            smart_wallet: Pubkey::new_unique(),
            wallet_device: Pubkey::new_unique(),
            policy_program: Pubkey::new_unique(),
            chunk: Pubkey::new_unique(),
        };
        let ix = create_chunk(&DEFAULT_PROGRAM_ID, &keys, &args, vec![]).unwrap();
        assert_eq!(&ix.data[..8], &sighash("global", "create_chunk"));
        let decoded = CreateChunkArgs::try_from_slice(&ix.data[8..]).unwrap();
        assert_eq!(decoded, args);
        assert!(ix.accounts[0].is_signer);
    }
}
