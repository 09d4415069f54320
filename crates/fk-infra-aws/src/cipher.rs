//! Envelope encryption for files committed next to the config
//!
//! KMS issues a fresh AES-256 data key per file. The plaintext is gzipped, sealed
//! with AES-GCM under that key, and stored as a small JSON envelope together with
//! the KMS-encrypted copy of the data key. Decryption asks KMS to unwrap the key.

use crate::error::{AwsError, Result};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::DataKeySpec;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const ENVELOPE_VERSION: u32 = 1;
const NONCE_LENGTH: usize = 12;

#[async_trait]
pub trait SecretCipher: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    async fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>>;
}

/// Serialized form of an encrypted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    /// Data key, encrypted by KMS.
    pub key: String,
    pub nonce: String,
    pub data: String,
}

impl Envelope {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(AwsError::Envelope(format!(
                "unsupported version {}",
                envelope.version
            )));
        }
        Ok(envelope)
    }

    pub fn encrypted_key(&self) -> Result<Vec<u8>> {
        decode("key", &self.key)
    }
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| AwsError::Envelope(format!("{}: {}", field, e)))
}

/// Compress and seal `plaintext` under `data_key`.
pub fn seal(data_key: &[u8], encrypted_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plaintext)?;
    let compressed = encoder.finish()?;

    let cipher = Aes256Gcm::new_from_slice(data_key)
        .map_err(|_| AwsError::Crypto("data key must be 32 bytes".to_string()))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let data = cipher
        .encrypt(&nonce, compressed.as_ref())
        .map_err(|_| AwsError::Crypto("encryption failed".to_string()))?;

    let envelope = Envelope {
        version: ENVELOPE_VERSION,
        key: STANDARD.encode(encrypted_key),
        nonce: STANDARD.encode(nonce),
        data: STANDARD.encode(data),
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

/// Open an envelope with the already unwrapped `data_key`.
pub fn unseal(data_key: &[u8], envelope: &Envelope) -> Result<Vec<u8>> {
    let nonce = decode("nonce", &envelope.nonce)?;
    if nonce.len() != NONCE_LENGTH {
        return Err(AwsError::Envelope(format!(
            "nonce must be {} bytes, got {}",
            NONCE_LENGTH,
            nonce.len()
        )));
    }
    let data = decode("data", &envelope.data)?;

    let cipher = Aes256Gcm::new_from_slice(data_key)
        .map_err(|_| AwsError::Crypto("data key must be 32 bytes".to_string()))?;
    let compressed = cipher
        .decrypt(Nonce::from_slice(&nonce), data.as_ref())
        .map_err(|_| AwsError::Crypto("decryption failed (wrong key or tampered file)".to_string()))?;

    let mut plaintext = Vec::new();
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut plaintext)?;
    Ok(plaintext)
}

/// [`SecretCipher`] backed by a KMS key.
pub struct KmsEnvelopeCipher {
    client: aws_sdk_kms::Client,
    key_id: String,
}

impl KmsEnvelopeCipher {
    /// `key_id` may be a key id, ARN or alias.
    pub fn new(client: aws_sdk_kms::Client, key_id: impl Into<String>) -> Self {
        Self {
            client,
            key_id: key_id.into(),
        }
    }
}

#[async_trait]
impl SecretCipher for KmsEnvelopeCipher {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let generated = self
            .client
            .generate_data_key()
            .key_id(&self.key_id)
            .key_spec(DataKeySpec::Aes256)
            .send()
            .await
            .map_err(|e| AwsError::api("GenerateDataKey", e))?;

        let data_key = generated.plaintext().ok_or(AwsError::MissingField {
            operation: "GenerateDataKey",
            field: "Plaintext",
        })?;
        let encrypted_key = generated.ciphertext_blob().ok_or(AwsError::MissingField {
            operation: "GenerateDataKey",
            field: "CiphertextBlob",
        })?;

        seal(data_key.as_ref(), encrypted_key.as_ref(), plaintext)
    }

    async fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        let envelope = Envelope::from_bytes(sealed)?;

        let unwrapped = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .ciphertext_blob(Blob::new(envelope.encrypted_key()?))
            .send()
            .await
            .map_err(|e| AwsError::api("Decrypt", e))?;

        let data_key = unwrapped.plaintext().ok_or(AwsError::MissingField {
            operation: "Decrypt",
            field: "Plaintext",
        })?;

        unseal(data_key.as_ref(), &envelope)
    }
}
