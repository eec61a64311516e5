//! Mailbox password encryption.
//!
//! AES-256 in CFB mode with a random 16-byte IV prepended to the ciphertext,
//! then base64 (no padding) for storage in the user record. The AES key is the
//! SHA-256 digest of the configured secret.

use aes::Aes256;
use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD as BASE64};
use mailsift_core::error::{MailSiftError, Result};
use mailsift_core::traits::CredentialCipher;
use rand::RngCore;
use sha2::{Digest, Sha256};

type CfbEncryptor = cfb_mode::Encryptor<Aes256>;
type CfbDecryptor = cfb_mode::Decryptor<Aes256>;

const BLOCK_SIZE: usize = 16;

/// Credential cipher keyed from a configured secret.
pub struct AesCredentialCipher {
    key: [u8; 32],
}

impl AesCredentialCipher {
    /// Build a cipher from the configured secret. Rejects an empty secret.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(MailSiftError::Security("Encryption key is empty".into()));
        }
        Ok(Self { key: derive_key(secret) })
    }

    fn encrypt_bytes(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut iv = [0u8; BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut out = Vec::with_capacity(BLOCK_SIZE + plaintext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(plaintext);
        CfbEncryptor::new(&self.key.into(), &iv.into()).encrypt(&mut out[BLOCK_SIZE..]);
        out
    }

    fn decrypt_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < BLOCK_SIZE {
            return Err(MailSiftError::Security("Ciphertext too short".into()));
        }
        let (iv, body) = data.split_at(BLOCK_SIZE);
        let mut iv_block = [0u8; BLOCK_SIZE];
        iv_block.copy_from_slice(iv);

        let mut out = body.to_vec();
        CfbDecryptor::new(&self.key.into(), &iv_block.into()).decrypt(&mut out);
        Ok(out)
    }
}

impl CredentialCipher for AesCredentialCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(BASE64.encode(self.encrypt_bytes(plaintext.as_bytes())))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let raw = BASE64
            .decode(ciphertext.trim())
            .map_err(|e| MailSiftError::Security(format!("Base64 decode failed: {e}")))?;
        let plain = self.decrypt_bytes(&raw)?;
        String::from_utf8(plain).map_err(|e| {
            tracing::warn!("Credential decryption produced invalid UTF-8");
            MailSiftError::Security(format!("Decryption produced invalid UTF-8: {e}"))
        })
    }
}

/// Derive an AES-256 key from the configured secret.
fn derive_key(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"mailsift::credentials::");
    hasher.update(secret.as_bytes());
    let result = hasher.finalize();

    let mut key = [0u8; 32];
    key.copy_from_slice(&result);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = AesCredentialCipher::new("server-secret").unwrap();
        for plain in ["", "short", "exactly16bytes!!", "a mailbox password that spans several blocks"] {
            let enc = cipher.encrypt(plain).unwrap();
            assert_eq!(cipher.decrypt(&enc).unwrap(), plain);
        }
    }

    #[test]
    fn test_iv_is_random() {
        let cipher = AesCredentialCipher::new("server-secret").unwrap();
        let a = cipher.encrypt("hunter2").unwrap();
        let b = cipher.encrypt("hunter2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_ciphertext_layout() {
        let cipher = AesCredentialCipher::new("k").unwrap();
        let raw = cipher.encrypt_bytes(b"abc");
        assert_eq!(raw.len(), BLOCK_SIZE + 3);
    }

    #[test]
    fn test_wrong_key_does_not_recover() {
        let a = AesCredentialCipher::new("key-a").unwrap();
        let b = AesCredentialCipher::new("key-b").unwrap();
        let enc = a.encrypt("correct horse battery").unwrap();
        assert_ne!(b.decrypt(&enc).ok().as_deref(), Some("correct horse battery"));
    }

    #[test]
    fn test_cfb_is_a_stream_mode() {
        let cipher = AesCredentialCipher::new("k").unwrap();
        let raw = cipher.encrypt_bytes(b"abcdefghijklmnopqrst");
        // Flipping one ciphertext bit in the last partial block flips the same
        // plaintext bit and nothing else.
        let mut tampered = raw.clone();
        tampered[BLOCK_SIZE + 17] ^= 0x01;
        let plain = cipher.decrypt_bytes(&tampered).unwrap();
        assert_eq!(&plain[..17], b"abcdefghijklmnopq");
        assert_eq!(plain[17], b'r' ^ 0x01);
        assert_eq!(&plain[18..], b"st");
    }

    #[test]
    fn test_rejects_short_and_empty() {
        assert!(AesCredentialCipher::new("").is_err());
        let cipher = AesCredentialCipher::new("k").unwrap();
        let short = BASE64.encode([1u8, 2, 3]);
        assert!(matches!(cipher.decrypt(&short), Err(MailSiftError::Security(_))));
    }
}
