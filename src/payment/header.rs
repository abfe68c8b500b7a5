//! Builds the opaque payment-proof header value for a 402 retry.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::payment::challenge::PaymentChallenge;
use crate::payment::signer::PaymentSigner;

/// The signed authorization document. Bound to the chosen challenge
/// option field-for-field, plus a validity window and a fresh nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    pub from: String,
    pub pay_to: String,
    pub max_amount_required: String,
    pub asset: String,
    pub resource: String,
    pub network: String,
    pub valid_after: i64,
    pub valid_before: i64,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// The full proof document that gets base64-encoded into the header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub payload: ProofPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPayload {
    pub authorization: PaymentAuthorization,
    /// Base64 signature over the canonical authorization JSON.
    pub signature: String,
    /// Base64 public key the signature verifies against.
    pub signer: String,
}

/// Turn the raw body of a payment-required response into a header value.
///
/// Always builds against the first accepted option. No side effects
/// beyond the signing call.
pub fn build_payment_header(
    signer: &dyn PaymentSigner,
    challenge_body: &str,
) -> Result<String, PaymentError> {
    let challenge = PaymentChallenge::parse(challenge_body)?;
    let accept = challenge.accepted();

    let now = Utc::now().timestamp();
    let authorization = PaymentAuthorization {
        from: signer.address(),
        pay_to: accept.pay_to.clone(),
        max_amount_required: accept.max_amount_required.clone(),
        asset: accept.asset.clone(),
        resource: accept.resource.clone(),
        network: accept.network.clone(),
        valid_after: now,
        valid_before: now + accept.max_timeout_seconds as i64,
        nonce: Uuid::new_v4().to_string(),
        extra: accept.extra.clone(),
    };

    let message = serde_json::to_vec(&authorization)
        .map_err(|e| PaymentError::Signing(format!("Failed to encode authorization: {e}")))?;
    let signature = signer.sign(&message)?;

    let proof = PaymentProof {
        x402_version: challenge.x402_version,
        scheme: accept.scheme.clone(),
        network: accept.network.clone(),
        payload: ProofPayload {
            authorization,
            signature: STANDARD.encode(signature),
            signer: signer.address(),
        },
    };

    let json = serde_json::to_vec(&proof)
        .map_err(|e| PaymentError::Signing(format!("Failed to encode proof: {e}")))?;
    Ok(STANDARD.encode(json))
}
