use crate::codec::P1363_LEN;
use crate::error::Result;
use crate::identity;
use crate::message::AuthorizationMessage;
use crate::state::WalletDevice;
use crate::utils;
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// SHA-256 digest of the raw credential id bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CredentialHash(pub [u8; 32]);

impl CredentialHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialHash({})", hex::encode(self.0))
    }
}

impl fmt::Display for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Compressed secp256r1 public key (prefix 0x02/0x03 followed by X)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PasskeyPublicKey(pub [u8; 33]);

impl PasskeyPublicKey {
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }
}

impl fmt::Debug for PasskeyPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasskeyPublicKey({})", hex::encode(self.0))
    }
}

/// A registered passkey as handed over by the identity backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasskeyCredential {
    /// Raw credential id bytes, exactly as the authenticator issued them
    pub credential_id: Vec<u8>,

    /// Compressed public key
    pub public_key: PasskeyPublicKey,
}

impl PasskeyCredential {
    pub fn new(credential_id: Vec<u8>, public_key: PasskeyPublicKey) -> Self {
        Self {
            credential_id,
            public_key,
        }
    }

    /// Build a credential from the backend's text encoding: a base64 or
    /// base64url credential id and hex encoded affine coordinates.
    pub fn from_encoded(credential_id: &str, x_hex: &str, y_hex: &str) -> Result<Self> {
        Ok(Self {
            credential_id: identity::decode_credential_id(credential_id)?,
            public_key: identity::compress_public_key(x_hex, y_hex)?,
        })
    }

    pub fn credential_hash(&self) -> CredentialHash {
        identity::credential_hash(&self.credential_id)
    }

    pub fn wallet_id(&self) -> u64 {
        identity::wallet_id(&self.credential_hash())
    }

    /// Address the smart wallet has (or will have) on-chain for this passkey.
    pub fn smart_wallet_address(&self, program_id: &Pubkey) -> Pubkey {
        utils::derive_smart_wallet_pda(program_id, self.wallet_id()).0
    }
}

/// Passkey assertion packaged for the create-chunk instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasskeySignature {
    pub passkey_public_key: PasskeyPublicKey,

    /// Low-S normalized `r || s`
    pub signature: [u8; P1363_LEN],

    pub client_data_json_raw: Vec<u8>,

    pub authenticator_data_raw: Vec<u8>,
}

/// Result of a successful wallet lookup
#[derive(Debug, Clone)]
pub struct LocatedWallet {
    /// Smart wallet PDA (holds funds, signs CPIs)
    pub smart_wallet: Pubkey,

    /// Wallet device PDA binding the passkey to the wallet
    pub wallet_device: Pubkey,

    /// Decoded device account
    pub device: WalletDevice,
}

/// Authorization message together with the passkey's signature over it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAuthorization {
    pub message: AuthorizationMessage,
    pub signature: PasskeySignature,
}
