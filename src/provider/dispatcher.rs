//! Provider request dispatcher — one authorized call, with 402 recovery.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::DispatchError;
use crate::payment::{PaymentSigner, build_payment_header};
use crate::provider::request::GenerationRequest;

/// Executes exactly one logical provider request per call.
///
/// With a signer attached, calls are payment-capable: a 402 response is
/// answered by building a proof header and reissuing the identical
/// request once. Without one, a bearer credential is required up front —
/// no credential means no network call at all.
pub struct Dispatcher {
    client: reqwest::Client,
    base_url: String,
    bearer: Option<SecretString>,
    signer: Option<Arc<dyn PaymentSigner>>,
}

impl Dispatcher {
    pub fn new(config: &ProviderConfig, signer: Option<Arc<dyn PaymentSigner>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer: config.bearer_token.clone(),
            signer,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn payment_capable(&self) -> bool {
        self.signer.is_some()
    }

    /// Issue the request once with the given proof header attached.
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        proof: &str,
    ) -> Result<reqwest::Response, DispatchError> {
        let mut req = self
            .client
            .request(method, url)
            .header("use-payment", if self.payment_capable() { "true" } else { "false" })
            .header("payment-proof", proof);
        if !self.payment_capable() {
            if let Some(bearer) = &self.bearer {
                req = req.bearer_auth(bearer.expose_secret());
            }
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    /// One logical call: empty proof first, then at most one retry when
    /// the provider demands payment. Returns the successful response;
    /// any other outcome is surfaced with its status and raw body.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, DispatchError> {
        if !self.payment_capable() && self.bearer.is_none() {
            return Err(DispatchError::AuthFailed);
        }

        let url = self.url(path);
        let mut resp = self.send_once(method.clone(), &url, body, "").await?;

        if resp.status() == StatusCode::PAYMENT_REQUIRED {
            if let Some(signer) = &self.signer {
                debug!(%url, "Payment required; retrying with proof header");
                let challenge = resp.text().await?;
                let proof = build_payment_header(signer.as_ref(), &challenge)?;
                resp = self.send_once(method, &url, body, &proof).await?;
            }
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DispatchError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Submit a generation job. Non-idempotent: every call creates a new
    /// provider job.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<Value, DispatchError> {
        let resp = self
            .dispatch(Method::POST, "/generate-video", Some(&request.to_wire()))
            .await?;
        Ok(resp.json().await?)
    }

    /// Check one job's status. Idempotent and safe to repeat.
    pub async fn check_status(
        &self,
        provider_ref: &str,
        model: &str,
    ) -> Result<Value, DispatchError> {
        let body = serde_json::json!({"operationName": provider_ref, "model": model});
        let resp = self
            .dispatch(Method::POST, "/check-video-status", Some(&body))
            .await?;
        Ok(resp.json().await?)
    }

    /// Fetch a completed job's media. Returns the bytes and content type.
    pub async fn download(&self, provider_ref: &str) -> Result<(Vec<u8>, String), DispatchError> {
        let path = format!("/retrieve-video?videoId={provider_ref}");
        let resp = self.dispatch(Method::GET, &path, None).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();
        let bytes = resp.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }
}
