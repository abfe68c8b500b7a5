//! Payment signer — the capability that authorizes a micropayment.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signer as _, SigningKey};

use crate::error::{ConfigError, PaymentError};

/// Produces the cryptographic authorization embedded in a payment proof.
pub trait PaymentSigner: Send + Sync {
    /// Base64-encoded public identity of the payer.
    fn address(&self) -> String;

    /// Sign the canonical authorization bytes.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, PaymentError>;
}

/// Ed25519 signer backed by a local key file.
#[derive(Debug)]
pub struct KeySigner {
    key: SigningKey,
}

impl KeySigner {
    /// Load the key from `path`, generating and saving a new one if the
    /// file does not exist. The file holds the raw 32-byte secret and is
    /// written with owner-only permissions.
    pub fn load_or_generate(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let key = SigningKey::generate(&mut rand::thread_rng());
        std::fs::write(path, key.to_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        tracing::info!(path = %path.display(), "Generated new payment signing key");
        Ok(Self { key })
    }

    fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        let raw: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            ConfigError::InvalidKeyFile(format!(
                "{}: expected 32 bytes, found {}",
                path.display(),
                bytes.len()
            ))
        })?;
        Ok(Self {
            key: SigningKey::from_bytes(&raw),
        })
    }

    /// Build a signer from raw key bytes (for tests).
    pub fn from_bytes(raw: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&raw),
        }
    }

    /// The verifying half of the key.
    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.key.verifying_key()
    }
}

impl PaymentSigner for KeySigner {
    fn address(&self) -> String {
        STANDARD.encode(self.key.verifying_key().to_bytes())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, PaymentError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}
