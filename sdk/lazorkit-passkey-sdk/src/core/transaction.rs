//! Transaction shapes handed to the relayer.

use crate::error::{LazorSdkError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use solana_sdk::compute_budget;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, CompiledInstruction, Instruction};
use solana_sdk::message::{v0, AddressLookupTableAccount, MessageHeader, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, VersionedTransaction};

/// A transaction in one of the two wire formats, fixed when it is built.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEnvelope {
    Legacy(Transaction),
    Versioned(VersionedTransaction),
}

impl TransactionEnvelope {
    pub fn is_versioned(&self) -> bool {
        matches!(self, TransactionEnvelope::Versioned(_))
    }

    pub fn fee_payer(&self) -> Option<Pubkey> {
        match self {
            TransactionEnvelope::Legacy(tx) => tx.message.account_keys.first().copied(),
            TransactionEnvelope::Versioned(tx) => {
                tx.message.static_account_keys().first().copied()
            },
        }
    }

    pub fn recent_blockhash(&self) -> Hash {
        match self {
            TransactionEnvelope::Legacy(tx) => tx.message.recent_blockhash,
            TransactionEnvelope::Versioned(tx) => *tx.message.recent_blockhash(),
        }
    }

    pub fn signatures(&self) -> &[Signature] {
        match self {
            TransactionEnvelope::Legacy(tx) => &tx.signatures,
            TransactionEnvelope::Versioned(tx) => &tx.signatures,
        }
    }

    /// Bincode wire bytes, as sent over RPC.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            TransactionEnvelope::Legacy(tx) => bincode::serialize(tx),
            TransactionEnvelope::Versioned(tx) => bincode::serialize(tx),
        };
        bytes.map_err(|e| LazorSdkError::Transaction(format!("Failed to serialize: {e}")))
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.serialize()?))
    }

    /// Rebuild the instruction list. Versioned messages that load addresses
    /// need the referenced tables.
    pub fn decompile(&self, lookup_tables: &[AddressLookupTableAccount]) -> Result<Vec<Instruction>> {
        match self {
            TransactionEnvelope::Legacy(tx) => Ok(decompile_instructions(
                &tx.message.header,
                &tx.message.account_keys,
                tx.message.account_keys.len(),
                &tx.message.instructions,
            )),
            TransactionEnvelope::Versioned(tx) => match &tx.message {
                VersionedMessage::Legacy(message) => Ok(decompile_instructions(
                    &message.header,
                    &message.account_keys,
                    message.account_keys.len(),
                    &message.instructions,
                )),
                VersionedMessage::V0(message) => {
                    let keys = resolve_v0_keys(message, lookup_tables)?;
                    Ok(decompile_instructions(
                        &message.header,
                        &keys.keys,
                        message.account_keys.len(),
                        &message.instructions,
                    )
                    .into_iter()
                    .map(|mut ix| {
                        for meta in ix.accounts.iter_mut() {
                            if keys.loaded_writable.contains(&meta.pubkey) {
                                meta.is_writable = true;
                            }
                        }
                        ix
                    })
                    .collect())
                },
            },
        }
    }
}

impl From<Transaction> for TransactionEnvelope {
    fn from(tx: Transaction) -> Self {
        TransactionEnvelope::Legacy(tx)
    }
}

impl From<VersionedTransaction> for TransactionEnvelope {
    fn from(tx: VersionedTransaction) -> Self {
        TransactionEnvelope::Versioned(tx)
    }
}

/// Recompile a legacy transaction as a v0 message paid by `payer`.
///
/// Compute budget instructions are dropped since the relayer sets its own.
/// The result is unsigned; every required signature slot is left default.
pub fn legacy_to_versioned(
    tx: &Transaction,
    payer: &Pubkey,
    recent_blockhash: Hash,
    lookup_tables: &[AddressLookupTableAccount],
) -> Result<VersionedTransaction> {
    let instructions: Vec<Instruction> = decompile_instructions(
        &tx.message.header,
        &tx.message.account_keys,
        tx.message.account_keys.len(),
        &tx.message.instructions,
    )
    .into_iter()
    .filter(|ix| ix.program_id != compute_budget::id())
    .collect();

    versioned_from_instructions(payer, &instructions, recent_blockhash, lookup_tables)
}

/// Compile instructions into an unsigned v0 transaction.
pub fn versioned_from_instructions(
    payer: &Pubkey,
    instructions: &[Instruction],
    recent_blockhash: Hash,
    lookup_tables: &[AddressLookupTableAccount],
) -> Result<VersionedTransaction> {
    let message = v0::Message::try_compile(payer, instructions, lookup_tables, recent_blockhash)
        .map_err(|e| LazorSdkError::Transaction(format!("Failed to compile v0 message: {e}")))?;
    let required = message.header.num_required_signatures as usize;
    Ok(VersionedTransaction {
        signatures: vec![Signature::default(); required],
        message: VersionedMessage::V0(message),
    })
}

fn is_signer_index(header: &MessageHeader, index: usize) -> bool {
    index < header.num_required_signatures as usize
}

fn is_writable_index(header: &MessageHeader, index: usize, static_len: usize) -> bool {
    let signed = header.num_required_signatures as usize;
    if index < signed {
        index < signed.saturating_sub(header.num_readonly_signed_accounts as usize)
    } else if index < static_len {
        index < static_len.saturating_sub(header.num_readonly_unsigned_accounts as usize)
    } else {
        false
    }
}

fn decompile_instructions(
    header: &MessageHeader,
    keys: &[Pubkey],
    static_len: usize,
    compiled: &[CompiledInstruction],
) -> Vec<Instruction> {
    compiled
        .iter()
        .filter_map(|ix| {
            let program_id = *keys.get(ix.program_id_index as usize)?;
            let accounts = ix
                .accounts
                .iter()
                .map(|&index| {
                    let index = index as usize;
                    keys.get(index).map(|key| AccountMeta {
                        pubkey: *key,
                        is_signer: is_signer_index(header, index),
                        is_writable: is_writable_index(header, index, static_len),
                    })
                })
                .collect::<Option<Vec<_>>>()?;
            Some(Instruction {
                program_id,
                accounts,
                data: ix.data.clone(),
            })
        })
        .collect()
}

struct ResolvedKeys {
    keys: Vec<Pubkey>,
    loaded_writable: Vec<Pubkey>,
}

fn resolve_v0_keys(
    message: &v0::Message,
    lookup_tables: &[AddressLookupTableAccount],
) -> Result<ResolvedKeys> {
    let mut writable = Vec::new();
    let mut readonly = Vec::new();
    for lookup in &message.address_table_lookups {
        let table = lookup_tables
            .iter()
            .find(|table| table.key == lookup.account_key)
            .ok_or_else(|| {
                LazorSdkError::Transaction(format!(
                    "lookup table {} not provided",
                    lookup.account_key
                ))
            })?;
        let fetch = |index: &u8| {
            table.addresses.get(*index as usize).copied().ok_or_else(|| {
                LazorSdkError::Transaction(format!(
                    "index {index} out of range for lookup table {}",
                    table.key
                ))
            })
        };
        for index in &lookup.writable_indexes {
            writable.push(fetch(index)?);
        }
        for index in &lookup.readonly_indexes {
            readonly.push(fetch(index)?);
        }
    }

    let mut keys = message.account_keys.clone();
    keys.extend(writable.iter().copied());
    keys.extend(readonly);
    Ok(ResolvedKeys {
        keys,
        loaded_writable: writable,
    })
}
