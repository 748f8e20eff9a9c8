use crate::codec::{der_to_p1363, normalize_low_s};
use crate::core::signer::{AssertionRequest, PasskeySigner};
use crate::error::{LazorSdkError, Result};
use crate::message::AuthorizationMessage;
use crate::types::{PasskeyCredential, PasskeySignature, SignedAuthorization};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Runs the passkey ceremony over an authorization challenge and packages the
/// result for the create-chunk instruction.
#[derive(Debug, Clone)]
pub struct AuthorizationSigner {
    /// Timeout handed to the platform prompt
    pub timeout: Duration,
}

impl Default for AuthorizationSigner {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl AuthorizationSigner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The request presented to the authenticator. `allow_credentials` holds
    /// the raw credential id bytes, never a re-encoded form.
    pub fn assertion_request(
        &self,
        credential: &PasskeyCredential,
        message: &AuthorizationMessage,
    ) -> Result<AssertionRequest> {
        Ok(AssertionRequest {
            challenge: message.challenge()?.to_vec(),
            allow_credentials: vec![credential.credential_id.clone()],
            user_verification_required: true,
            timeout: self.timeout,
        })
    }

    /// Ask the user to sign. A failed ceremony surfaces as
    /// [`LazorSdkError::UserDeclined`] and is not retried.
    #[instrument(skip_all, fields(nonce = message.nonce))]
    pub async fn authorize(
        &self,
        signer: &impl PasskeySigner,
        credential: &PasskeyCredential,
        message: AuthorizationMessage,
    ) -> Result<SignedAuthorization> {
        let request = self.assertion_request(credential, &message)?;

        let assertion = signer.get_assertion(request).await.map_err(|e| {
            warn!(error = %e, "passkey ceremony did not complete");
            LazorSdkError::UserDeclined(e)
        })?;

        let raw = der_to_p1363(&assertion.signature)?;
        let signature = normalize_low_s(&raw)?;
        info!("authorization signed");

        Ok(SignedAuthorization {
            message,
            signature: PasskeySignature {
                passkey_public_key: credential.public_key,
                signature,
                client_data_json_raw: assertion.client_data_json,
                authenticator_data_raw: assertion.authenticator_data,
            },
        })
    }
}
