//! Cluster admin SSH key material
//!
//! The key pair lives under `keys/` beside the config. Only the encrypted copies
//! (`*.enc`) are meant to be committed; a `.gitignore` in the directory keeps the
//! plaintext halves out of version control.

use crate::cipher::SecretCipher;
use crate::error::{AwsError, Result};
use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::{LineEnding, PrivateKey};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PRIVATE_KEY_FILE: &str = "private_key";
pub const PUBLIC_KEY_FILE: &str = "public_key.pub";
pub const ENCRYPTED_EXTENSION: &str = "enc";
pub const DEFAULT_KEY_BITS: usize = 4096;

const GITIGNORE: &str = "*\n!*.enc\n!*.gitignore\n";
const KEY_COMMENT: &str = "fk-infra";

/// How [`KeyStore::create_or_validate`] obtained the key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMaterial {
    Generated,
    Restored,
}

pub struct KeyStore<'a> {
    dir: PathBuf,
    cipher: &'a dyn SecretCipher,
    bits: usize,
}

impl<'a> KeyStore<'a> {
    pub fn new(dir: impl Into<PathBuf>, cipher: &'a dyn SecretCipher) -> Self {
        Self {
            dir: dir.into(),
            cipher,
            bits: DEFAULT_KEY_BITS,
        }
    }

    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.bits = bits;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE)
    }

    /// Restore the key pair from its encrypted copies, or generate, write and
    /// encrypt a new one. The private key is parsed afterwards either way.
    pub async fn create_or_validate(&self) -> Result<KeyMaterial> {
        self.prepare_dir().await?;

        let material = if encrypted_path(&self.private_key_path()).exists() {
            self.decrypt_keys().await?;
            KeyMaterial::Restored
        } else {
            self.generate().await?;
            self.encrypt_file(&self.private_key_path()).await?;
            self.encrypt_file(&self.public_key_path()).await?;
            KeyMaterial::Generated
        };

        self.validate().await?;
        Ok(material)
    }

    /// Write the plaintext halves from their encrypted copies.
    pub async fn decrypt_keys(&self) -> Result<()> {
        self.decrypt_file(&self.private_key_path()).await?;
        self.decrypt_file(&self.public_key_path()).await?;
        restrict(&self.private_key_path())?;
        Ok(())
    }

    async fn prepare_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let gitignore = self.dir.join(".gitignore");
        if !gitignore.exists() {
            tokio::fs::write(&gitignore, GITIGNORE).await?;
        }
        Ok(())
    }

    async fn generate(&self) -> Result<()> {
        info!(bits = self.bits, "Generating SSH key pair");

        let bits = self.bits;
        let private = tokio::task::spawn_blocking(move || -> Result<PrivateKey> {
            let keypair = RsaKeypair::random(&mut rand::rngs::OsRng, bits)?;
            Ok(PrivateKey::new(KeypairData::from(keypair), KEY_COMMENT)?)
        })
        .await
        .map_err(|e| AwsError::Key(e.to_string()))??;

        let private_pem = private.to_openssh(LineEnding::LF)?;
        let public_line = private.public_key().to_openssh()?;

        tokio::fs::write(self.private_key_path(), private_pem.as_bytes()).await?;
        restrict(&self.private_key_path())?;
        tokio::fs::write(self.public_key_path(), format!("{}\n", public_line)).await?;
        Ok(())
    }

    async fn validate(&self) -> Result<()> {
        let content = tokio::fs::read_to_string(self.private_key_path()).await?;
        PrivateKey::from_openssh(content)?;
        debug!(dir = %self.dir.display(), "Private key is valid");
        Ok(())
    }

    async fn encrypt_file(&self, path: &Path) -> Result<()> {
        let plaintext = tokio::fs::read(path).await?;
        let sealed = self.cipher.encrypt(&plaintext).await?;
        tokio::fs::write(encrypted_path(path), sealed).await?;
        Ok(())
    }

    async fn decrypt_file(&self, path: &Path) -> Result<()> {
        let sealed = tokio::fs::read(encrypted_path(path)).await?;
        let plaintext = self.cipher.decrypt(&sealed).await?;
        tokio::fs::write(path, plaintext).await?;
        Ok(())
    }
}

/// `private_key` -> `private_key.enc`, `public_key.pub` -> `public_key.pub.enc`.
pub fn encrypted_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ENCRYPTED_EXTENSION);
    PathBuf::from(name)
}

#[cfg(unix)]
fn restrict(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEST_BITS: usize = 2048;
    const SEALED_PREFIX: &[u8] = b"sealed:";

    /// Reversible stand-in for KMS.
    #[derive(Default)]
    struct FakeCipher {
        encrypted: AtomicUsize,
        decrypted: AtomicUsize,
    }

    #[async_trait]
    impl SecretCipher for FakeCipher {
        async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
            self.encrypted.fetch_add(1, Ordering::SeqCst);
            let mut sealed = SEALED_PREFIX.to_vec();
            sealed.extend(plaintext.iter().rev());
            Ok(sealed)
        }

        async fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>> {
            self.decrypted.fetch_add(1, Ordering::SeqCst);
            let body = sealed
                .strip_prefix(SEALED_PREFIX)
                .ok_or_else(|| AwsError::Crypto("not sealed".to_string()))?;
            Ok(body.iter().rev().copied().collect())
        }
    }

    #[test]
    fn test_encrypted_path() {
        assert_eq!(
            encrypted_path(Path::new("keys/public_key.pub")),
            PathBuf::from("keys/public_key.pub.enc")
        );
    }

    #[tokio::test]
    async fn test_generates_and_encrypts_fresh_pair() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = FakeCipher::default();
        let store = KeyStore::new(dir.path().join("keys"), &cipher).with_key_bits(TEST_BITS);

        let material = store.create_or_validate().await.unwrap();

        assert_eq!(material, KeyMaterial::Generated);
        assert_eq!(cipher.encrypted.load(Ordering::SeqCst), 2);
        assert!(encrypted_path(&store.private_key_path()).exists());
        assert!(encrypted_path(&store.public_key_path()).exists());

        let public = std::fs::read_to_string(store.public_key_path()).unwrap();
        assert!(public.starts_with("ssh-rsa "));

        let gitignore = std::fs::read_to_string(store.dir().join(".gitignore")).unwrap();
        assert_eq!(gitignore, "*\n!*.enc\n!*.gitignore\n");
    }

    #[tokio::test]
    async fn test_existing_encrypted_pair_is_restored() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = FakeCipher::default();
        let store = KeyStore::new(dir.path(), &cipher).with_key_bits(TEST_BITS);
        store.create_or_validate().await.unwrap();
        let original = std::fs::read_to_string(store.private_key_path()).unwrap();

        // plaintext halves are gone on a fresh checkout
        std::fs::remove_file(store.private_key_path()).unwrap();
        std::fs::remove_file(store.public_key_path()).unwrap();

        let material = store.create_or_validate().await.unwrap();

        assert_eq!(material, KeyMaterial::Restored);
        assert_eq!(cipher.decrypted.load(Ordering::SeqCst), 2);
        assert_eq!(
            std::fs::read_to_string(store.private_key_path()).unwrap(),
            original
        );
    }

    #[tokio::test]
    async fn test_corrupt_private_key_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = FakeCipher::default();
        let store = KeyStore::new(dir.path(), &cipher);

        std::fs::write(
            encrypted_path(&store.private_key_path()),
            cipher.encrypt(b"not a key").await.unwrap(),
        )
        .unwrap();
        std::fs::write(
            encrypted_path(&store.public_key_path()),
            cipher.encrypt(b"ssh-rsa AAAA").await.unwrap(),
        )
        .unwrap();

        let err = store.create_or_validate().await.unwrap_err();
        assert!(matches!(err, AwsError::Key(_)));
    }

    #[tokio::test]
    async fn test_decrypt_without_encrypted_copies_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = FakeCipher::default();
        let store = KeyStore::new(dir.path(), &cipher);

        assert!(matches!(
            store.decrypt_keys().await,
            Err(AwsError::Io(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cipher = FakeCipher::default();
        let store = KeyStore::new(dir.path(), &cipher).with_key_bits(TEST_BITS);
        store.create_or_validate().await.unwrap();

        let mode = std::fs::metadata(store.private_key_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
