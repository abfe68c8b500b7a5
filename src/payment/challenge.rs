//! Payment-required challenge document.

use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

/// The body of a 402 response: a version plus a list of acceptable
/// payment options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChallenge {
    pub x402_version: u32,
    pub accepts: Vec<AcceptedPayment>,
}

/// One acceptable payment option, copied verbatim from the challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedPayment {
    pub scheme: String,
    pub network: String,
    pub max_amount_required: String,
    pub resource: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentChallenge {
    /// Parse the raw body of a payment-required response.
    pub fn parse(body: &str) -> Result<Self, PaymentError> {
        let challenge: Self = serde_json::from_str(body)
            .map_err(|e| PaymentError::InvalidChallenge(e.to_string()))?;
        if challenge.accepts.is_empty() {
            return Err(PaymentError::InvalidChallenge(
                "accepts list is empty".into(),
            ));
        }
        Ok(challenge)
    }

    /// The option the proof will be built against — always the first
    /// entry of the accepts list.
    pub fn accepted(&self) -> &AcceptedPayment {
        &self.accepts[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn challenge_json() -> String {
        serde_json::json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact",
                "network": "base-sepolia",
                "maxAmountRequired": "10000",
                "resource": "https://provider.example/generate-video",
                "description": "video generation",
                "mimeType": "application/json",
                "payTo": "0xabc",
                "maxTimeoutSeconds": 60,
                "asset": "0xusdc",
                "extra": {"name": "USDC"}
            }]
        })
        .to_string()
    }

    #[test]
    fn parses_a_well_formed_challenge() {
        let challenge = PaymentChallenge::parse(&challenge_json()).unwrap();
        assert_eq!(challenge.x402_version, 1);
        assert_eq!(challenge.accepted().pay_to, "0xabc");
        assert_eq!(challenge.accepted().max_amount_required, "10000");
    }

    #[test]
    fn rejects_unparsable_body() {
        let err = PaymentChallenge::parse("not json").unwrap_err();
        assert!(matches!(err, PaymentError::InvalidChallenge(_)));
    }

    #[test]
    fn rejects_empty_accepts_list() {
        let body = serde_json::json!({"x402Version": 1, "accepts": []}).to_string();
        let err = PaymentChallenge::parse(&body).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidChallenge(_)));
    }

    #[test]
    fn always_selects_the_first_accepted_option() {
        let body = serde_json::json!({
            "x402Version": 1,
            "accepts": [
                {
                    "scheme": "exact", "network": "base", "maxAmountRequired": "1",
                    "resource": "r1", "payTo": "first", "maxTimeoutSeconds": 30, "asset": "a1"
                },
                {
                    "scheme": "exact", "network": "base", "maxAmountRequired": "2",
                    "resource": "r2", "payTo": "second", "maxTimeoutSeconds": 30, "asset": "a2"
                }
            ]
        })
        .to_string();

        for _ in 0..3 {
            let challenge = PaymentChallenge::parse(&body).unwrap();
            assert_eq!(challenge.accepted().pay_to, "first");
        }
    }
}
