use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

// Program IDs for Devnet/Mainnet deployments
pub const DEFAULT_PROGRAM_ID: Pubkey = pubkey!("Gsuz7YcA5sbMGVRXT3xSYhJBessW4xFC4xYsihNCqMFh");
pub const DEFAULT_POLICY_PROGRAM_ID: Pubkey =
    pubkey!("BiE9vSdz9MidUiyjVYsu3PG4C1fbPZ8CVPADA9jRfXw7");
pub const SECP256R1_PROGRAM_ID: Pubkey = pubkey!("Secp256r1SigVerify1111111111111111111111111");

// Shared address lookup table for the program's static accounts
pub const DEFAULT_LOOKUP_TABLE: Pubkey = pubkey!("6FztWHetKgJdfeBYmX1T71Ws41ePD39fQska48NhNk8");

// PDA seeds
pub const SMART_WALLET_SEED: &[u8] = b"smart_wallet";
pub const WALLET_STATE_SEED: &[u8] = b"wallet_state";
pub const WALLET_DEVICE_SEED: &[u8] = b"wallet_device";
pub const CHUNK_SEED: &[u8] = b"chunk";
pub const CONFIG_SEED: &[u8] = b"config";
pub const POLICY_REGISTRY_SEED: &[u8] = b"policy_registry";
pub const VAULT_SEED: &[u8] = b"lazorkit_vault";

/// Number of fee vaults the program shards payments across.
pub const VAULT_COUNT: u8 = 32;

pub const PASSKEY_PUBLIC_KEY_SIZE: usize = 33;
pub const SECP256R1_SIGNATURE_SIZE: usize = 64;
