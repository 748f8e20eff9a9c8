//! Conversion of WebAuthn ECDSA signatures from ASN.1 DER to the fixed-width
//! `r || s` (IEEE P1363) layout expected by the secp256r1 precompile.

use crate::error::{LazorSdkError, Result};
use p256::ecdsa::Signature;

/// Width in bytes of one P-256 scalar.
pub const SCALAR_LEN: usize = 32;
/// Width in bytes of a P1363 encoded P-256 signature.
pub const P1363_LEN: usize = 2 * SCALAR_LEN;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

/// Converts a DER `SEQUENCE { r INTEGER, s INTEGER }` into 64 raw bytes.
///
/// Each integer has its DER sign padding stripped and is right-aligned in its
/// 32-byte half, so short values come out left-padded with zeros.
pub fn der_to_p1363(der: &[u8]) -> Result<[u8; P1363_LEN]> {
    let mut reader = DerReader::new(der);
    let body = reader.read_tlv(TAG_SEQUENCE)?;
    if !reader.is_empty() {
        return Err(malformed("trailing bytes after sequence"));
    }

    let mut inner = DerReader::new(body);
    let r = inner.read_tlv(TAG_INTEGER)?;
    let s = inner.read_tlv(TAG_INTEGER)?;
    if !inner.is_empty() {
        return Err(malformed("sequence holds more than two integers"));
    }

    let mut out = [0u8; P1363_LEN];
    write_scalar(&mut out[..SCALAR_LEN], r)?;
    write_scalar(&mut out[SCALAR_LEN..], s)?;
    Ok(out)
}

/// Rewrites `s` as `n - s` when it lies in the upper half of the curve order.
/// The on-chain verifier only accepts low-S signatures.
pub fn normalize_low_s(raw: &[u8; P1363_LEN]) -> Result<[u8; P1363_LEN]> {
    let signature = Signature::from_slice(raw)
        .map_err(|e| malformed(&format!("not a valid P-256 signature: {e}")))?;
    let normalized = signature.normalize_s().unwrap_or(signature);

    let mut out = [0u8; P1363_LEN];
    out.copy_from_slice(&normalized.to_bytes());
    Ok(out)
}

fn write_scalar(dst: &mut [u8], mut value: &[u8]) -> Result<()> {
    if value.is_empty() {
        return Err(malformed("empty integer"));
    }
    while value.len() > SCALAR_LEN && value[0] == 0 {
        value = &value[1..];
    }
    if value.len() > SCALAR_LEN {
        return Err(malformed("integer wider than 32 bytes"));
    }
    let offset = SCALAR_LEN - value.len();
    dst[offset..].copy_from_slice(value);
    Ok(())
}

fn malformed(reason: &str) -> LazorSdkError {
    LazorSdkError::MalformedSignature(reason.to_string())
}

struct DerReader<'a> {
    data: &'a [u8],
}

impl<'a> DerReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(malformed("unexpected end of input"));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn read_tlv(&mut self, tag: u8) -> Result<&'a [u8]> {
        let found = self.take(1)?[0];
        if found != tag {
            return Err(malformed(&format!(
                "expected tag {tag:#04x}, found {found:#04x}"
            )));
        }
        let len = match self.take(1)?[0] {
            short @ 0x00..=0x7f => short as usize,
            0x81 => {
                let long = self.take(1)?[0];
                if long < 0x80 {
                    return Err(malformed("non-minimal length encoding"));
                }
                long as usize
            },
            other => {
                return Err(malformed(&format!("unsupported length byte {other:#04x}")));
            },
        };
        self.take(len)
    }
}
