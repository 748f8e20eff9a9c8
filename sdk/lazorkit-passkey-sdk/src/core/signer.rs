use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Parameters of a WebAuthn `navigator.credentials.get` style ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionRequest {
    /// Bytes to be signed (placed base64url encoded in clientDataJSON)
    pub challenge: Vec<u8>,
    /// Raw credential ids the authenticator may use
    pub allow_credentials: Vec<Vec<u8>>,
    pub user_verification_required: bool,
    pub timeout: Duration,
}

/// Authenticator response to an [`AssertionRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// ASN.1 DER encoded ECDSA signature
    pub signature: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("user cancelled the passkey prompt")]
    Cancelled,

    #[error("no matching credential on this device")]
    NoMatchingCredential,

    #[error("passkey ceremony timed out")]
    TimedOut,

    #[error("platform authenticator error: {0}")]
    Platform(String),
}

/// Abstraction for the platform credential API holding the passkey.
/// This allows the SDK to work with:
/// 1. Browser or native WebAuthn bridges
/// 2. Software keys in tests and CLIs
#[async_trait]
pub trait PasskeySigner: Send + Sync {
    /// Run a user-verified signing ceremony. Never retried by the SDK.
    async fn get_assertion(&self, request: AssertionRequest) -> Result<Assertion, SignerError>;
}
