// Secret encryption (encryption-at-rest) for the stored connection string.
//
// - `ENCv1:` prefix marks protected values; anything else is read back as plaintext
// - AES-256-GCM, random 96-bit nonce per value, stored as base64(nonce || ciphertext+tag)
// - The master key is created lazily next to the site's App_Data and reused afterwards

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Context, Result};
use base64::Engine;
use log::{debug, info};
use ring::rand::{SecureRandom, SystemRandom};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const ENC_PREFIX: &str = "ENCv1:";
const KEY_BYTES: usize = 32;
const NONCE_BYTES: usize = 12;

#[derive(Debug)]
pub struct SecretProtector {
    key_path: PathBuf,
    key: OnceLock<[u8; KEY_BYTES]>,
}

impl SecretProtector {
    pub fn new(key_path: PathBuf) -> Self {
        Self {
            key_path,
            key: OnceLock::new(),
        }
    }

    pub fn is_protected(value: &str) -> bool {
        value.starts_with(ENC_PREFIX)
    }

    pub fn protect(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_BYTES];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| anyhow::anyhow!("Failed to generate nonce"))?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| anyhow::anyhow!("Secret encryption failed"))?;

        let mut blob = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(format!(
            "{}{}",
            ENC_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(blob)
        ))
    }

    pub fn unprotect(&self, value: &str) -> Result<String> {
        let Some(encoded) = value.strip_prefix(ENC_PREFIX) else {
            return Ok(value.to_string());
        };
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let blob = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("Failed to base64-decode protected secret")?;
        if blob.len() <= NONCE_BYTES {
            anyhow::bail!("Protected secret is too short");
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_BYTES);

        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| anyhow::anyhow!("Secret decryption failed (wrong key or tampered value)"))?;
        String::from_utf8(plaintext).context("Decrypted secret is not valid UTF-8")
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let key = self.key()?;
        Aes256Gcm::new_from_slice(key)
            .map_err(|_| anyhow::anyhow!("Internal error: invalid AES-256 key length"))
    }

    fn key(&self) -> Result<&[u8; KEY_BYTES]> {
        if let Some(key) = self.key.get() {
            return Ok(key);
        }
        let key = match read_key(&self.key_path)? {
            Some(key) => key,
            None => create_key(&self.key_path)?,
        };
        Ok(self.key.get_or_init(|| key))
    }
}

fn read_key(path: &Path) -> Result<Option<[u8; KEY_BYTES]>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read key file {:?}", path)),
    };
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(String::from_utf8_lossy(&bytes).trim())
        .context("Key file is not valid base64")?;
    let key: [u8; KEY_BYTES] = decoded
        .try_into()
        .map_err(|_| anyhow::anyhow!("Key file has invalid length (expected {KEY_BYTES} bytes)"))?;
    debug!("[PHASE: security] [STEP: key] Loaded master key from {:?}", path);
    Ok(Some(key))
}

fn create_key(path: &Path) -> Result<[u8; KEY_BYTES]> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create key directory {:?}", parent))?;
    }

    let mut key = [0u8; KEY_BYTES];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| anyhow::anyhow!("Failed to generate master key"))?;

    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }

    match opts.open(path) {
        Ok(mut file) => {
            file.write_all(
                base64::engine::general_purpose::STANDARD
                    .encode(key)
                    .as_bytes(),
            )?;
            file.sync_all()?;
            info!("[PHASE: security] [STEP: key] Created master key at {:?}", path);
            Ok(key)
        }
        // Another process won the race; use its key so both can decrypt each other's values.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => read_key(path)?
            .ok_or_else(|| anyhow::anyhow!("Key file {:?} vanished while loading", path)),
        Err(e) => Err(e).with_context(|| format!("Failed to create key file {:?}", path)),
    }
}
