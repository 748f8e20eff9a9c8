use crate::advanced::instructions::ExecuteChunkArgs;
use crate::error::{LazorSdkError, Result};
use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

/// Packs the caller's instructions into the shape `execute_chunk` expects:
/// one data blob per CPI and a flat account list where every CPI contributes
/// its program id followed by its metas.
///
/// The smart wallet PDA signs via `invoke_signed`, so its signer flag is cleared.
#[derive(Debug, Clone)]
pub struct CpiBundle {
    smart_wallet: Pubkey,
    instructions: Vec<Instruction>,
}

impl CpiBundle {
    pub fn new(smart_wallet: Pubkey) -> Self {
        Self {
            smart_wallet,
            instructions: Vec::new(),
        }
    }

    pub fn add_instruction(mut self, ix: Instruction) -> Self {
        self.instructions.push(ix);
        self
    }

    pub fn with_instructions(mut self, ixs: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(ixs);
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Flattened account list passed as remaining accounts.
    pub fn accounts(&self) -> Vec<AccountMeta> {
        let mut accounts = Vec::new();
        for ix in &self.instructions {
            accounts.push(AccountMeta::new_readonly(ix.program_id, false));
            for meta in &ix.accounts {
                let mut meta = meta.clone();
                if meta.pubkey == self.smart_wallet {
                    meta.is_signer = false;
                }
                accounts.push(meta);
            }
        }
        accounts
    }

    /// Cumulative account counts at which each CPI after the first starts.
    pub fn split_index(&self) -> Result<Vec<u8>> {
        let mut splits = Vec::new();
        let mut cursor = 0usize;
        let count = self.instructions.len();
        for ix in self.instructions.iter().take(count.saturating_sub(1)) {
            cursor += 1 + ix.accounts.len();
            let index = u8::try_from(cursor).map_err(|_| {
                LazorSdkError::Transaction(format!("too many CPI accounts ({cursor})"))
            })?;
            splits.push(index);
        }
        Ok(splits)
    }

    pub fn execute_args(&self) -> Result<ExecuteChunkArgs> {
        Ok(ExecuteChunkArgs {
            instruction_data_list: self.instructions.iter().map(|ix| ix.data.clone()).collect(),
            split_index: self.split_index()?,
        })
    }

    /// Hash binding the CPI data and accounts, signed into the authorization.
    ///
    /// `sha256(sha256(data_0 || .. || data_n) || sha256((key || is_signer || is_writable)*))`
    pub fn cpi_hash(&self) -> [u8; 32] {
        let mut data_hasher = Sha256::new();
        for ix in &self.instructions {
            data_hasher.update(&ix.data);
        }

        let mut accounts_hasher = Sha256::new();
        for meta in self.accounts() {
            accounts_hasher.update(meta.pubkey.as_ref());
            accounts_hasher.update([meta.is_signer as u8]);
            accounts_hasher.update([meta.is_writable as u8]);
        }

        let mut combined = Sha256::new();
        combined.update(data_hasher.finalize());
        combined.update(accounts_hasher.finalize());
        combined.finalize().into()
    }
}
