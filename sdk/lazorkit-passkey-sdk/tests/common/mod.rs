#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use borsh::BorshDeserialize;
use lazorkit_passkey_sdk::advanced::instructions::{
    CreateChunkArgs, CreateSmartWalletArgs, ExecuteChunkArgs,
};
use lazorkit_passkey_sdk::config::LazorConfig;
use lazorkit_passkey_sdk::core::connection::{AccountFilter, SolConnection};
use lazorkit_passkey_sdk::core::constants::{DEFAULT_PROGRAM_ID, SECP256R1_PROGRAM_ID};
use lazorkit_passkey_sdk::core::paymaster::{Paymaster, PaymasterError};
use lazorkit_passkey_sdk::core::signer::{
    Assertion, AssertionRequest, PasskeySigner, SignerError,
};
use lazorkit_passkey_sdk::core::transaction::TransactionEnvelope;
use lazorkit_passkey_sdk::state::{AnchorAccount, Chunk, WalletDevice, WalletState};
use lazorkit_passkey_sdk::types::{
    CredentialHash, LocatedWallet, PasskeyCredential, PasskeyPublicKey,
};
use lazorkit_passkey_sdk::utils::{
    derive_chunk_pda, derive_smart_wallet_pda, derive_vault_pda, derive_wallet_device_pda,
    derive_wallet_state_pda, sighash,
};
use p256::ecdsa::signature::{Signer as _, Verifier as _};
use p256::ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

pub const RP_ID: &str = "portal.lazor.sh";

/// Config pointed at the mock program, without a lookup table.
pub fn test_config() -> LazorConfig {
    LazorConfig {
        program_id: DEFAULT_PROGRAM_ID,
        lookup_table: None,
        ..LazorConfig::default()
    }
}

//=============================================================================
// Mock chain + relayer
//=============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    CreateWallet,
    CreateChunk,
    ExecuteChunk,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct SendRecord {
    pub kind: TxKind,
    pub at: Instant,
    pub versioned: bool,
    pub accepted: bool,
}

struct SettledLag {
    stale: Account,
    /// Stale reads left before the settled view catches up; `None` never does
    remaining: Option<u32>,
}

#[derive(Default)]
struct ChainState {
    accounts: HashMap<Pubkey, Account>,
    settled_lag: HashMap<Pubkey, SettledLag>,
    settled_unavailable: bool,
    unconfirmed: HashSet<Pubkey>,
    drop_wallet_creation: bool,
    lookup_tables: HashMap<Pubkey, AddressLookupTableAccount>,
    failures: HashMap<TxKind, VecDeque<PaymasterError>>,
    sends: Vec<SendRecord>,
    confirmations: u32,
    executed_instructions: usize,
}

/// In-memory chain that also plays the relayer. Cloning shares state.
#[derive(Clone)]
pub struct MockChain {
    pub program_id: Pubkey,
    pub fee_payer: Pubkey,
    state: Arc<Mutex<ChainState>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

fn is_optimistic(commitment: CommitmentConfig) -> bool {
    commitment.commitment == CommitmentLevel::Processed
}

fn program_account(owner: &Pubkey, data: Vec<u8>) -> Account {
    Account {
        lamports: 1_000_000,
        data,
        owner: *owner,
        executable: false,
        rent_epoch: 0,
    }
}

fn rejected(message: impl Into<String>) -> PaymasterError {
    PaymasterError::new(message)
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID,
            fee_payer: Pubkey::new_unique(),
            state: Arc::new(Mutex::new(ChainState::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().expect("mock chain poisoned")
    }

    /// Write wallet state and device accounts as wallet creation would.
    pub fn seed_wallet(&self, credential: &PasskeyCredential, nonce: u64) -> LocatedWallet {
        let hash = credential.credential_hash();
        let (smart_wallet, bump) = derive_smart_wallet_pda(&self.program_id, credential.wallet_id());
        let (wallet_device, device_bump) =
            derive_wallet_device_pda(&self.program_id, &smart_wallet, &hash);
        self.write_wallet(
            smart_wallet,
            WalletState {
                bump,
                wallet_id: credential.wallet_id(),
                last_nonce: nonce,
                referral: [0u8; 32],
                policy_program: [0u8; 32],
                policy_data: vec![],
            },
        );
        let device = WalletDevice::new(&credential.public_key, &hash, &smart_wallet, device_bump);
        self.write(&wallet_device, &device);
        LocatedWallet {
            smart_wallet,
            wallet_device,
            device,
        }
    }

    fn write_wallet(&self, smart_wallet: Pubkey, state: WalletState) {
        let (address, _) = derive_wallet_state_pda(&self.program_id, &smart_wallet);
        self.write(&address, &state);
    }

    pub fn write<T: AnchorAccount>(&self, address: &Pubkey, value: &T) {
        let data = value.to_account_data().expect("serialize account");
        self.lock()
            .accounts
            .insert(*address, program_account(&self.program_id, data));
    }

    pub fn move_account(&self, from: &Pubkey, to: &Pubkey) {
        let mut state = self.lock();
        if let Some(account) = state.accounts.remove(from) {
            state.accounts.insert(*to, account);
        }
    }

    /// Overwrite the account's discriminator so it no longer decodes.
    pub fn corrupt(&self, address: &Pubkey) {
        if let Some(account) = self.lock().accounts.get_mut(address) {
            account.data[..8].fill(0);
        }
    }

    pub fn remove(&self, address: &Pubkey) {
        self.lock().accounts.remove(address);
    }

    pub fn read<T: AnchorAccount>(&self, address: &Pubkey) -> Option<T> {
        self.lock()
            .accounts
            .get(address)
            .map(|account| T::try_from_account_data(&account.data).expect("decode account"))
    }

    pub fn wallet_state(&self, smart_wallet: &Pubkey) -> Option<WalletState> {
        self.read(&derive_wallet_state_pda(&self.program_id, smart_wallet).0)
    }

    pub fn chunk(&self, smart_wallet: &Pubkey, nonce: u64) -> Option<Chunk> {
        self.read(&derive_chunk_pda(&self.program_id, smart_wallet, nonce).0)
    }

    /// Stage a chunk as if another device had already submitted it.
    pub fn seed_chunk(&self, smart_wallet: &Pubkey, nonce: u64, vault_index: u8) -> Pubkey {
        let (address, _) = derive_chunk_pda(&self.program_id, smart_wallet, nonce);
        self.write(
            &address,
            &Chunk {
                owner_wallet_address: smart_wallet.to_bytes(),
                cpi_hash: [0u8; 32],
                authorized_nonce: nonce,
                authorized_timestamp: 0,
                rent_refund_address: self.fee_payer.to_bytes(),
                vault_index,
            },
        );
        address
    }

    /// Make settled reads of the wallet state report `stale_nonce` for the
    /// next `reads` reads, or forever when `reads` is `None`.
    pub fn set_settled_lag(&self, smart_wallet: &Pubkey, stale_nonce: u64, reads: Option<u32>) {
        let (address, _) = derive_wallet_state_pda(&self.program_id, smart_wallet);
        let mut current: WalletState = self.read(&address).expect("wallet state seeded");
        current.last_nonce = stale_nonce;
        let stale = program_account(
            &self.program_id,
            current.to_account_data().expect("serialize account"),
        );
        self.lock().settled_lag.insert(
            address,
            SettledLag {
                stale,
                remaining: reads,
            },
        );
    }

    /// Keep `address` visible only at the processed commitment, as if the
    /// transaction that wrote it had landed but not yet confirmed.
    pub fn hide_from_settled(&self, address: &Pubkey) {
        self.lock().unconfirmed.insert(*address);
    }

    pub fn set_settled_unavailable(&self, unavailable: bool) {
        self.lock().settled_unavailable = unavailable;
    }

    /// Accept wallet creation transactions without creating anything.
    pub fn drop_wallet_creation(&self) {
        self.lock().drop_wallet_creation = true;
    }

    pub fn add_lookup_table(&self, table: AddressLookupTableAccount) {
        self.lock().lookup_tables.insert(table.key, table);
    }

    /// Queue relayer rejections for the next sends of `kind`.
    pub fn fail_next(&self, kind: TxKind, errors: impl IntoIterator<Item = PaymasterError>) {
        self.lock()
            .failures
            .entry(kind)
            .or_default()
            .extend(errors);
    }

    pub fn sends(&self) -> Vec<SendRecord> {
        self.lock().sends.clone()
    }

    pub fn sends_of(&self, kind: TxKind) -> Vec<SendRecord> {
        self.sends().into_iter().filter(|s| s.kind == kind).collect()
    }

    pub fn confirmations(&self) -> u32 {
        self.lock().confirmations
    }

    pub fn executed_instructions(&self) -> usize {
        self.lock().executed_instructions
    }

    fn classify(&self, instructions: &[Instruction]) -> (TxKind, Option<Instruction>) {
        let names = [
            (TxKind::CreateWallet, "create_smart_wallet"),
            (TxKind::CreateChunk, "create_chunk"),
            (TxKind::ExecuteChunk, "execute_chunk"),
        ];
        for ix in instructions.iter().filter(|ix| ix.program_id == self.program_id) {
            for (kind, name) in names {
                if ix.data.len() >= 8 && ix.data[..8] == sighash("global", name) {
                    return (kind, Some(ix.clone()));
                }
            }
        }
        (TxKind::Unknown, None)
    }

    fn apply(
        &self,
        kind: TxKind,
        ix: &Instruction,
        all: &[Instruction],
    ) -> Result<(), PaymasterError> {
        match kind {
            TxKind::CreateWallet => self.apply_create_wallet(ix),
            TxKind::CreateChunk => self.apply_create_chunk(ix, all),
            TxKind::ExecuteChunk => self.apply_execute_chunk(ix),
            TxKind::Unknown => Err(rejected("unknown instruction")),
        }
    }

    fn apply_create_wallet(&self, ix: &Instruction) -> Result<(), PaymasterError> {
        let args = CreateSmartWalletArgs::try_from_slice(&ix.data[8..])
            .map_err(|e| rejected(format!("bad create_smart_wallet args: {e}")))?;
        if self.lock().drop_wallet_creation {
            return Ok(());
        }
        let (smart_wallet, bump) = derive_smart_wallet_pda(&self.program_id, args.wallet_id);
        let (state_address, _) = derive_wallet_state_pda(&self.program_id, &smart_wallet);
        if self.lock().accounts.contains_key(&state_address) {
            return Err(rejected("custom program error: 0x0 (account already in use)"));
        }
        let hash = CredentialHash(args.credential_hash);
        let (wallet_device, device_bump) =
            derive_wallet_device_pda(&self.program_id, &smart_wallet, &hash);
        if ix.accounts[4].pubkey != wallet_device {
            return Err(rejected("ConstraintSeeds: wallet_device"));
        }

        self.write_wallet(
            smart_wallet,
            WalletState {
                bump,
                wallet_id: args.wallet_id,
                last_nonce: 0,
                referral: args.referral_address.unwrap_or([0u8; 32]),
                policy_program: ix.accounts[6].pubkey.to_bytes(),
                policy_data: vec![],
            },
        );
        let device = WalletDevice::new(
            &PasskeyPublicKey(args.passkey_public_key),
            &hash,
            &smart_wallet,
            device_bump,
        );
        self.write(&wallet_device, &device);
        Ok(())
    }

    fn apply_create_chunk(&self, ix: &Instruction, all: &[Instruction]) -> Result<(), PaymasterError> {
        let args = CreateChunkArgs::try_from_slice(&ix.data[8..])
            .map_err(|e| rejected(format!("bad create_chunk args: {e}")))?;
        verify_secp256r1(all)?;

        let smart_wallet = ix.accounts[2].pubkey;
        let chunk_address = ix.accounts[7].pubkey;
        let (state_address, _) = derive_wallet_state_pda(&self.program_id, &smart_wallet);
        let mut state: WalletState = self
            .read(&state_address)
            .ok_or_else(|| rejected("custom program error: 0xbc4 (account not initialized)"))?;

        let (expected_chunk, _) = derive_chunk_pda(&self.program_id, &smart_wallet, state.last_nonce);
        if chunk_address != expected_chunk {
            return Err(rejected(
                "Transaction simulation failed: Error processing Instruction 1: custom program error: 0x2",
            )
            .with_logs(vec![
                "Program log: chunk seeds do not match the wallet nonce".to_string(),
            ]));
        }
        if self.lock().accounts.contains_key(&chunk_address) {
            return Err(rejected("custom program error: 0x0 (account already in use)"));
        }

        self.write(
            &chunk_address,
            &Chunk {
                owner_wallet_address: smart_wallet.to_bytes(),
                cpi_hash: args.cpi_hash,
                authorized_nonce: state.last_nonce,
                authorized_timestamp: args.timestamp,
                rent_refund_address: ix.accounts[0].pubkey.to_bytes(),
                vault_index: args.vault_index,
            },
        );
        state.last_nonce += 1;
        self.write(&state_address, &state);
        Ok(())
    }

    fn apply_execute_chunk(&self, ix: &Instruction) -> Result<(), PaymasterError> {
        let args = ExecuteChunkArgs::try_from_slice(&ix.data[8..])
            .map_err(|e| rejected(format!("bad execute_chunk args: {e}")))?;
        let chunk_address = ix.accounts[6].pubkey;
        let mut state = self.lock();
        let chunk = match state.accounts.get(&chunk_address) {
            Some(account) => Chunk::try_from_account_data(&account.data)
                .map_err(|e| rejected(format!("bad chunk: {e}")))?,
            None => return Err(rejected("custom program error: 0xbc4 (chunk not initialized)")),
        };
        if ix.accounts[5].pubkey != derive_vault_pda(&self.program_id, chunk.vault_index).0 {
            return Err(rejected("execute_chunk: vault does not match chunk"));
        }
        if ix.accounts[7].pubkey != chunk.rent_refund_address() {
            return Err(rejected("execute_chunk: rent refund does not match chunk"));
        }
        state.accounts.remove(&chunk_address);
        state.executed_instructions += args.instruction_data_list.len();
        Ok(())
    }
}

/// Check the precompile instruction the way the runtime would.
fn verify_secp256r1(instructions: &[Instruction]) -> Result<(), PaymasterError> {
    let ix = instructions
        .iter()
        .find(|ix| ix.program_id == SECP256R1_PROGRAM_ID)
        .ok_or_else(|| rejected("missing secp256r1 instruction"))?;
    let data = &ix.data;
    let read_u16 = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]) as usize;
    let signature_offset = read_u16(2);
    let public_key_offset = read_u16(6);
    let message_offset = read_u16(10);
    let message_len = read_u16(12);

    let key = VerifyingKey::from_sec1_bytes(&data[public_key_offset..public_key_offset + 33])
        .map_err(|_| rejected("secp256r1: bad public key"))?;
    let signature = P256Signature::from_slice(&data[signature_offset..signature_offset + 64])
        .map_err(|_| rejected("secp256r1: bad signature"))?;
    key.verify(&data[message_offset..message_offset + message_len], &signature)
        .map_err(|_| rejected("secp256r1: signature verification failed"))
}

#[async_trait]
impl SolConnection for MockChain {
    async fn get_account(
        &self,
        pubkey: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<Option<Account>, Box<dyn Error + Send + Sync>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !is_optimistic(commitment) {
            if state.settled_unavailable {
                return Err("settled view unavailable".into());
            }
            let caught_up = match state.settled_lag.get_mut(pubkey) {
                Some(SettledLag {
                    remaining: Some(0), ..
                }) => true,
                Some(lag) => {
                    if let Some(left) = lag.remaining.as_mut() {
                        *left -= 1;
                    }
                    return Ok(Some(lag.stale.clone()));
                },
                None => false,
            };
            if caught_up {
                state.settled_lag.remove(pubkey);
            }
            if state.unconfirmed.contains(pubkey) {
                return Ok(None);
            }
        }
        Ok(state.accounts.get(pubkey).cloned())
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
        _commitment: CommitmentConfig,
    ) -> Result<Vec<(Pubkey, Account)>, Box<dyn Error + Send + Sync>> {
        let state = self.lock();
        let mut found: Vec<_> = state
            .accounts
            .iter()
            .filter(|(_, account)| account.owner == *program_id)
            .filter(|(_, account)| filters.iter().all(|f| f.matches(&account.data)))
            .map(|(key, account)| (*key, account.clone()))
            .collect();
        found.sort_by_key(|(key, _)| *key);
        Ok(found)
    }

    async fn get_address_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<Option<AddressLookupTableAccount>, Box<dyn Error + Send + Sync>> {
        Ok(self.lock().lookup_tables.get(address).cloned())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, Box<dyn Error + Send + Sync>> {
        Ok(Hash::new_unique())
    }

    async fn confirm_transaction(
        &self,
        _signature: &Signature,
        _commitment: CommitmentConfig,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.lock().confirmations += 1;
        Ok(())
    }
}

#[async_trait]
impl Paymaster for MockChain {
    async fn fee_payer(&self) -> Result<Pubkey, PaymasterError> {
        Ok(self.fee_payer)
    }

    async fn sign_and_send(
        &self,
        transaction: &TransactionEnvelope,
    ) -> Result<Signature, PaymasterError> {
        let tables: Vec<_> = self.lock().lookup_tables.values().cloned().collect();
        let instructions = transaction
            .decompile(&tables)
            .map_err(|e| rejected(format!("undecodable transaction: {e}")))?;
        let (kind, ix) = self.classify(&instructions);

        let injected = self.lock().failures.get_mut(&kind).and_then(VecDeque::pop_front);
        let outcome = match (injected, ix) {
            (Some(err), _) => Err(err),
            (None, Some(ix)) => self.apply(kind, &ix, &instructions),
            (None, None) => Err(rejected("no program instruction in transaction")),
        };

        self.lock().sends.push(SendRecord {
            kind,
            at: Instant::now(),
            versioned: transaction.is_versioned(),
            accepted: outcome.is_ok(),
        });
        outcome.map(|()| Signature::new_unique())
    }
}

//=============================================================================
// Software passkey
//=============================================================================

struct PasskeyInner {
    key: SigningKey,
    credential: PasskeyCredential,
    decline: Mutex<Option<SignerError>>,
    calls: AtomicU32,
    last_request: Mutex<Option<AssertionRequest>>,
}

/// P-256 key that answers assertion requests like a platform authenticator.
#[derive(Clone)]
pub struct SoftwarePasskey {
    inner: Arc<PasskeyInner>,
}

impl Default for SoftwarePasskey {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwarePasskey {
    pub fn new() -> Self {
        let key = SigningKey::from_slice(&rand::random::<[u8; 32]>()).expect("valid scalar");
        let point = key.verifying_key().to_encoded_point(true);
        let mut public_key = [0u8; 33];
        public_key.copy_from_slice(point.as_bytes());
        let credential_id = rand::random::<[u8; 16]>().to_vec();

        Self {
            inner: Arc::new(PasskeyInner {
                key,
                credential: PasskeyCredential::new(credential_id, PasskeyPublicKey(public_key)),
                decline: Mutex::new(None),
                calls: AtomicU32::new(0),
                last_request: Mutex::new(None),
            }),
        }
    }

    pub fn credential(&self) -> PasskeyCredential {
        self.inner.credential.clone()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from(&self.inner.key)
    }

    /// Answer every following request with `error`.
    pub fn decline_with(&self, error: SignerError) {
        *self.inner.decline.lock().expect("passkey poisoned") = Some(error);
    }

    pub fn calls(&self) -> u32 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<AssertionRequest> {
        self.inner.last_request.lock().expect("passkey poisoned").clone()
    }
}

pub fn client_data_json(challenge: &[u8]) -> Vec<u8> {
    format!(
        r#"{{"type":"webauthn.get","challenge":"{}","origin":"https://{RP_ID}","crossOrigin":false}}"#,
        URL_SAFE_NO_PAD.encode(challenge)
    )
    .into_bytes()
}

pub fn authenticator_data() -> Vec<u8> {
    let mut data = Sha256::digest(RP_ID.as_bytes()).to_vec();
    // user present + user verified
    data.push(0x05);
    data.extend_from_slice(&0u32.to_be_bytes());
    data
}

#[async_trait]
impl PasskeySigner for SoftwarePasskey {
    async fn get_assertion(&self, request: AssertionRequest) -> Result<Assertion, SignerError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.last_request.lock().expect("passkey poisoned") = Some(request.clone());

        if let Some(error) = self.inner.decline.lock().expect("passkey poisoned").clone() {
            return Err(error);
        }
        if !request
            .allow_credentials
            .contains(&self.inner.credential.credential_id)
        {
            return Err(SignerError::NoMatchingCredential);
        }

        let client_data_json = client_data_json(&request.challenge);
        let authenticator_data = authenticator_data();
        let mut signed = authenticator_data.clone();
        signed.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature: P256Signature = self.inner.key.sign(&signed);

        Ok(Assertion {
            signature: signature.to_der().as_bytes().to_vec(),
            authenticator_data,
            client_data_json,
        })
    }
}
