//! Deterministic identity primitives derived from a passkey credential.

use crate::error::{LazorSdkError, Result};
use crate::types::{CredentialHash, PasskeyPublicKey};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Converts base64url text to standard base64 with padding restored.
pub fn base64url_to_base64(input: &str) -> Result<String> {
    let mut out: String = input
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    match out.len() % 4 {
        0 => {},
        2 => out.push_str("=="),
        3 => out.push('='),
        _ => {
            return Err(LazorSdkError::InvalidCredential(format!(
                "base64url string has invalid length {}",
                out.len()
            )))
        },
    }
    Ok(out)
}

/// Decodes a credential id given as base64url (padded or not) or standard base64.
pub fn decode_credential_id(encoded: &str) -> Result<Vec<u8>> {
    let standard = base64url_to_base64(encoded.trim_end_matches('='))?;
    let bytes = STANDARD
        .decode(&standard)
        .map_err(|e| LazorSdkError::InvalidCredential(format!("bad credential id: {e}")))?;
    if bytes.is_empty() {
        return Err(LazorSdkError::InvalidCredential(
            "credential id is empty".to_string(),
        ));
    }
    Ok(bytes)
}

pub fn credential_hash(credential_id: &[u8]) -> CredentialHash {
    CredentialHash(Sha256::digest(credential_id).into())
}

/// First eight bytes of the credential hash, little-endian.
pub fn wallet_id(hash: &CredentialHash) -> u64 {
    let mut le = [0u8; 8];
    le.copy_from_slice(&hash.0[..8]);
    u64::from_le_bytes(le)
}

/// Compresses hex encoded affine coordinates into the 33-byte SEC1 form.
///
/// Coordinates may carry a `0x` prefix and may be shorter than 32 bytes when
/// the backend dropped leading zeros. The point must lie on P-256.
pub fn compress_public_key(x_hex: &str, y_hex: &str) -> Result<PasskeyPublicKey> {
    let x = decode_coordinate(x_hex, "x")?;
    let y = decode_coordinate(y_hex, "y")?;

    let mut uncompressed = [0u8; 65];
    uncompressed[0] = 0x04;
    uncompressed[1..33].copy_from_slice(&x);
    uncompressed[33..].copy_from_slice(&y);
    p256::PublicKey::from_sec1_bytes(&uncompressed).map_err(|_| {
        LazorSdkError::InvalidCredential("public key is not a point on P-256".to_string())
    })?;

    let mut compressed = [0u8; 33];
    compressed[0] = if y[31] & 1 == 0 { 0x02 } else { 0x03 };
    compressed[1..].copy_from_slice(&x);
    Ok(PasskeyPublicKey(compressed))
}

fn decode_coordinate(hex_str: &str, name: &str) -> Result<[u8; 32]> {
    let trimmed = hex_str.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(&padded)
        .map_err(|e| LazorSdkError::InvalidCredential(format!("bad {name} coordinate: {e}")))?;
    if bytes.is_empty() || bytes.len() > 32 {
        return Err(LazorSdkError::InvalidCredential(format!(
            "{name} coordinate must be 1..=32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}
