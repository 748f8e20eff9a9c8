use crate::advanced::instructions::{
    self, CreateChunkAccounts, CreateChunkArgs, CreateSmartWalletArgs, ExecuteChunkAccounts,
};
use crate::basic::proxy::CpiBundle;
use crate::core::connection::SolConnection;
use crate::core::constants::{DEFAULT_POLICY_PROGRAM_ID, DEFAULT_PROGRAM_ID, VAULT_COUNT};
use crate::core::transaction::{legacy_to_versioned, TransactionEnvelope};
use crate::error::{LazorSdkError, Result};
use crate::message::{AuthorizationMessage, SmartWalletAction};
use crate::state::{Chunk, WalletState};
use crate::types::{
    CredentialHash, LocatedWallet, PasskeyCredential, PasskeyPublicKey, SignedAuthorization,
};
use crate::utils::{compute_instruction_hash, derive_chunk_pda, derive_smart_wallet_pda};
use rand::Rng;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{AddressLookupTableAccount, Message};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;

async fn latest_blockhash(connection: &impl SolConnection) -> Result<Hash> {
    connection
        .get_latest_blockhash()
        .await
        .map_err(|e| LazorSdkError::Connection(e.to_string()))
}

fn legacy(instructions: &[Instruction], payer: &Pubkey, blockhash: Hash) -> Transaction {
    let mut message = Message::new(instructions, Some(payer));
    message.recent_blockhash = blockhash;
    Transaction::new_unsigned(message)
}

//=============================================================================
// Wallet creation
//=============================================================================

pub struct CreateSmartWalletBuilder {
    payer: Option<Pubkey>,
    credential: Option<PasskeyCredential>,
    program_id: Pubkey,
    policy_program: Pubkey,
    amount: u64,
    referral: Option<Pubkey>,
}

impl Default for CreateSmartWalletBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CreateSmartWalletBuilder {
    pub fn new() -> Self {
        Self {
            payer: None,
            credential: None,
            program_id: DEFAULT_PROGRAM_ID,
            policy_program: DEFAULT_POLICY_PROGRAM_ID,
            amount: 0,
            referral: None,
        }
    }

    pub fn with_payer(mut self, payer: Pubkey) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn with_credential(mut self, credential: PasskeyCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = program_id;
        self
    }

    pub fn with_policy_program(mut self, policy_program: Pubkey) -> Self {
        self.policy_program = policy_program;
        self
    }

    pub fn with_amount(mut self, lamports: u64) -> Self {
        self.amount = lamports;
        self
    }

    pub fn with_referral(mut self, referral: Pubkey) -> Self {
        self.referral = Some(referral);
        self
    }

    /// Smart wallet address the transaction will create
    pub fn smart_wallet(&self) -> Option<Pubkey> {
        self.credential
            .as_ref()
            .map(|c| derive_smart_wallet_pda(&self.program_id, c.wallet_id()).0)
    }

    pub fn build_instruction(&self) -> Result<Instruction> {
        let payer = self
            .payer
            .ok_or_else(|| LazorSdkError::InvalidInput("Payer required".into()))?;
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| LazorSdkError::InvalidInput("Credential required".into()))?;

        let wallet_id = credential.wallet_id();
        // The program reserves id 0.
        if wallet_id == 0 {
            return Err(LazorSdkError::InvalidCredential(
                "credential hash maps to reserved wallet id 0".into(),
            ));
        }

        let args = CreateSmartWalletArgs {
            passkey_public_key: credential.public_key.0,
            credential_hash: credential.credential_hash().0,
            init_policy_data: instructions::init_policy_data(wallet_id, &credential.public_key)?,
            wallet_id,
            amount: self.amount,
            referral_address: self.referral.map(|r| r.to_bytes()),
        };
        instructions::create_smart_wallet(&self.program_id, &payer, &self.policy_program, args)
    }

    pub async fn build_transaction(
        &self,
        connection: &impl SolConnection,
    ) -> Result<TransactionEnvelope> {
        let ix = self.build_instruction()?;
        let payer = ix.accounts[0].pubkey;
        let blockhash = latest_blockhash(connection).await?;
        Ok(TransactionEnvelope::Legacy(legacy(&[ix], &payer, blockhash)))
    }
}

//=============================================================================
// Staged execution
//=============================================================================

/// Everything fixed for one staged action: wallet, nonce, CPIs and policy check.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub program_id: Pubkey,
    pub payer: Pubkey,
    pub smart_wallet: Pubkey,
    pub wallet_device: Pubkey,
    pub wallet_id: u64,
    pub nonce: u64,
    pub credential_hash: CredentialHash,
    pub passkey: PasskeyPublicKey,
    pub policy_program: Pubkey,
    pub policy_data: Vec<u8>,
    pub policy_accounts: Vec<AccountMeta>,
    pub cpi: CpiBundle,
    pub chunk: Pubkey,
    pub vault_index: u8,
    pub timestamp: i64,
    pub expires_at: i64,
}

impl ChunkPlan {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        program_id: Pubkey,
        payer: Pubkey,
        located: &LocatedWallet,
        state: &WalletState,
        credential: &PasskeyCredential,
        cpi_instructions: Vec<Instruction>,
        timestamp: i64,
        expiry_seconds: i64,
    ) -> Result<Self> {
        if cpi_instructions.is_empty() {
            return Err(LazorSdkError::InvalidInput("at least one instruction required".into()));
        }
        let cpi = CpiBundle::new(located.smart_wallet).with_instructions(cpi_instructions);
        let policy_program = match state.policy_program() {
            key if key == Pubkey::default() => DEFAULT_POLICY_PROGRAM_ID,
            key => key,
        };
        let policy_data = instructions::check_policy_data(state.wallet_id, &credential.public_key)?;
        let policy_accounts =
            instructions::check_policy_accounts(&located.wallet_device, &located.smart_wallet);
        let (chunk, _) = derive_chunk_pda(&program_id, &located.smart_wallet, state.last_nonce);

        Ok(Self {
            program_id,
            payer,
            smart_wallet: located.smart_wallet,
            wallet_device: located.wallet_device,
            wallet_id: state.wallet_id,
            nonce: state.last_nonce,
            credential_hash: credential.credential_hash(),
            passkey: credential.public_key,
            policy_program,
            policy_data,
            policy_accounts,
            cpi,
            chunk,
            vault_index: rand::thread_rng().gen_range(0..VAULT_COUNT),
            timestamp,
            expires_at: timestamp.saturating_add(expiry_seconds),
        })
    }

    pub fn with_vault_index(mut self, vault_index: u8) -> Self {
        self.vault_index = vault_index % VAULT_COUNT;
        self
    }

    /// The chunk account create-chunk writes for this plan when the plan's
    /// payer is the one that stages it.
    pub fn staged_chunk(&self) -> Chunk {
        Chunk {
            owner_wallet_address: self.smart_wallet.to_bytes(),
            cpi_hash: self.cpi.cpi_hash(),
            authorized_nonce: self.nonce,
            authorized_timestamp: self.timestamp,
            rent_refund_address: self.payer.to_bytes(),
            vault_index: self.vault_index,
        }
    }

    pub fn policy_hash(&self) -> [u8; 32] {
        compute_instruction_hash(&self.policy_data, &self.policy_accounts, &self.policy_program)
    }

    pub fn authorization_message(&self) -> AuthorizationMessage {
        AuthorizationMessage {
            action: SmartWalletAction::CreateChunk,
            nonce: self.nonce,
            timestamp: self.timestamp,
            expires_at: self.expires_at,
            payer: self.payer.to_bytes(),
            smart_wallet: self.smart_wallet.to_bytes(),
            credential_hash: self.credential_hash.0,
            passkey_public_key: self.passkey.0,
            policy_hash: self.policy_hash(),
            cpi_hash: self.cpi.cpi_hash(),
        }
    }
}

pub struct CreateChunkBuilder<'a> {
    plan: &'a ChunkPlan,
    authorization: &'a SignedAuthorization,
    lookup_table: Option<AddressLookupTableAccount>,
}

impl<'a> CreateChunkBuilder<'a> {
    pub fn new(plan: &'a ChunkPlan, authorization: &'a SignedAuthorization) -> Self {
        Self {
            plan,
            authorization,
            lookup_table: None,
        }
    }

    pub fn with_lookup_table(mut self, table: Option<AddressLookupTableAccount>) -> Self {
        self.lookup_table = table;
        self
    }

    /// `[secp256r1 verify, create_chunk]`
    pub fn build_instructions(&self) -> Result<Vec<Instruction>> {
        let signature = &self.authorization.signature;
        let message = &self.authorization.message;

        let verify = instructions::secp256r1_verify(
            &signature.passkey_public_key,
            &signature.signature,
            &signature.authenticator_data_raw,
            &signature.client_data_json_raw,
        );

        let args = CreateChunkArgs {
            passkey_public_key: signature.passkey_public_key.0,
            signature: signature.signature.to_vec(),
            client_data_json_raw: signature.client_data_json_raw.clone(),
            authenticator_data_raw: signature.authenticator_data_raw.clone(),
            verify_instruction_index: 0,
            policy_data: self.plan.policy_data.clone(),
            vault_index: self.plan.vault_index,
            timestamp: message.timestamp,
            expires_at: message.expires_at,
            credential_hash: message.credential_hash,
            cpi_hash: message.cpi_hash,
        };
        let keys = CreateChunkAccounts {
            payer: self.plan.payer,
            smart_wallet: self.plan.smart_wallet,
            wallet_device: self.plan.wallet_device,
            policy_program: self.plan.policy_program,
            chunk: self.plan.chunk,
        };
        let create = instructions::create_chunk(
            &self.plan.program_id,
            &keys,
            &args,
            self.plan.policy_accounts.clone(),
        )?;
        Ok(vec![verify, create])
    }

    /// Legacy without a lookup table, v0 compressed through it otherwise.
    pub async fn build_transaction(
        &self,
        connection: &impl SolConnection,
    ) -> Result<TransactionEnvelope> {
        let ixs = self.build_instructions()?;
        let blockhash = latest_blockhash(connection).await?;
        let tx = legacy(&ixs, &self.plan.payer, blockhash);
        match &self.lookup_table {
            Some(table) => Ok(TransactionEnvelope::Versioned(legacy_to_versioned(
                &tx,
                &self.plan.payer,
                blockhash,
                std::slice::from_ref(table),
            )?)),
            None => Ok(TransactionEnvelope::Legacy(tx)),
        }
    }
}

pub struct ExecuteChunkBuilder<'a> {
    plan: &'a ChunkPlan,
    referral: Pubkey,
    chunk: &'a Chunk,
}

impl<'a> ExecuteChunkBuilder<'a> {
    /// `chunk` is the staged account; its vault and refund address win over
    /// the plan's in case another submitter staged it.
    pub fn new(plan: &'a ChunkPlan, state: &WalletState, chunk: &'a Chunk) -> Self {
        Self {
            plan,
            referral: state.referral(),
            chunk,
        }
    }

    pub fn build_instruction(&self) -> Result<Instruction> {
        let keys = ExecuteChunkAccounts {
            payer: self.plan.payer,
            smart_wallet: self.plan.smart_wallet,
            referral: self.referral,
            vault_index: self.chunk.vault_index,
            chunk: self.plan.chunk,
            rent_refund: self.chunk.rent_refund_address(),
        };
        instructions::execute_chunk(
            &self.plan.program_id,
            &keys,
            &self.plan.cpi.execute_args()?,
            self.plan.cpi.accounts(),
        )
    }

    pub async fn build_transaction(
        &self,
        connection: &impl SolConnection,
    ) -> Result<TransactionEnvelope> {
        let ix = self.build_instruction()?;
        let blockhash = latest_blockhash(connection).await?;
        Ok(TransactionEnvelope::Legacy(legacy(&[ix], &self.plan.payer, blockhash)))
    }
}
