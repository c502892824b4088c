//! Tamper-evident envelopes for arbitrary byte payloads.
//!
//! Wire format:
//!
//! ```text
//! base64url( [iv ++] AES-256-CBC( SHA-256(secret), SHA-512(pt) ++ pt ) )
//! ```
//!
//! The leading SHA-512 digest is checked after decryption, so ciphertext
//! corruption and decryption under the wrong key both surface as
//! [`RedirectError::TamperDetected`]. The IV is random and prepended unless
//! the envelope runs in [`IvMode::Zero`], which reproduces the legacy
//! fixed-IV format byte for byte.

use crate::error::{RedirectError, Result};
use aes::Aes256;
use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use subtle::ConstantTimeEq;

/// Size of a binary SHA-512 digest.
pub const SIGNATURE_SIZE: usize = 512 / 8;

const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// URL-safe Base64: `-` and `_` instead of `+` and `/`, no padding on
/// output, padding optional on input.
const URL_SAFE_TOKEN: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Cipher key derived from the operator secret.
///
/// The secret itself never reaches the cipher; only its SHA-256 digest does.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvelopeKey([u8; 32]);

impl EnvelopeKey {
    pub fn derive(secret: &str) -> Self {
        Self(Sha256::digest(secret.as_bytes()).into())
    }
}

impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnvelopeKey(<redacted>)")
    }
}

/// How the CBC initialization vector is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IvMode {
    /// Fresh random IV per message, carried in front of the ciphertext.
    #[default]
    Random,
    /// All-zero IV, not transmitted. Compatible with legacy tokens.
    Zero,
}

impl IvMode {
    fn next_iv(self) -> [u8; BLOCK_SIZE] {
        let mut iv = [0u8; BLOCK_SIZE];
        if self == Self::Random {
            rand::thread_rng().fill_bytes(&mut iv);
        }
        iv
    }
}

/// Encrypts and verifies payloads under one derived key.
#[derive(Debug, Clone)]
pub struct Envelope {
    key: EnvelopeKey,
    iv_mode: IvMode,
}

impl Envelope {
    pub fn new(key: EnvelopeKey, iv_mode: IvMode) -> Self {
        Self { key, iv_mode }
    }

    pub fn iv_mode(&self) -> IvMode {
        self.iv_mode
    }

    /// Sign and encrypt `plaintext`, returning raw ciphertext bytes.
    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut framed = Vec::with_capacity(SIGNATURE_SIZE + plaintext.len());
        framed.extend_from_slice(&Sha512::digest(plaintext));
        framed.extend_from_slice(plaintext);

        let iv = self.iv_mode.next_iv();
        let ciphertext = Aes256CbcEnc::new(
            GenericArray::from_slice(&self.key.0),
            GenericArray::from_slice(&iv),
        )
        .encrypt_padded_vec_mut::<Pkcs7>(&framed);

        match self.iv_mode {
            IvMode::Random => {
                let mut out = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
                out.extend_from_slice(&iv);
                out.extend_from_slice(&ciphertext);
                out
            }
            IvMode::Zero => ciphertext,
        }
    }

    /// Sign and encrypt `plaintext`, returning a URL-safe text token.
    pub fn seal_text(&self, plaintext: &[u8]) -> String {
        encode_base64_url(&self.seal(plaintext))
    }

    /// Decrypt raw ciphertext and verify its signature.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        let (iv, ciphertext) = match self.iv_mode {
            IvMode::Random => {
                if sealed.len() < BLOCK_SIZE {
                    return Err(RedirectError::TamperDetected);
                }
                let (iv, rest) = sealed.split_at(BLOCK_SIZE);
                let mut buf = [0u8; BLOCK_SIZE];
                buf.copy_from_slice(iv);
                (buf, rest)
            }
            IvMode::Zero => ([0u8; BLOCK_SIZE], sealed),
        };
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(RedirectError::TamperDetected);
        }

        let mut decrypted = Aes256CbcDec::new(
            GenericArray::from_slice(&self.key.0),
            GenericArray::from_slice(&iv),
        )
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| RedirectError::TamperDetected)?;

        if decrypted.len() < SIGNATURE_SIZE {
            return Err(RedirectError::TamperDetected);
        }
        let payload = decrypted.split_off(SIGNATURE_SIZE);
        let expected = Sha512::digest(&payload);
        if !bool::from(decrypted.as_slice().ct_eq(expected.as_slice())) {
            return Err(RedirectError::TamperDetected);
        }
        Ok(payload)
    }

    /// Decode a text token produced by [`Envelope::seal_text`] and verify it.
    pub fn open_text(&self, token: &str) -> Result<Vec<u8>> {
        let sealed = decode_base64_url(token).ok_or(RedirectError::TamperDetected)?;
        self.open(&sealed)
    }

    /// Like [`Envelope::open_text`], but an absent token is "no data".
    pub fn open_text_opt(&self, token: Option<&str>) -> Result<Option<Vec<u8>>> {
        token.map(|t| self.open_text(t)).transpose()
    }
}

/// Encode bytes as unpadded URL-safe Base64 without line breaks.
pub fn encode_base64_url(data: &[u8]) -> String {
    URL_SAFE_TOKEN.encode(data)
}

/// Decode URL-safe Base64, with or without padding.
///
/// Returns `None` for malformed input and for input that decodes to nothing.
pub fn decode_base64_url(token: &str) -> Option<Vec<u8>> {
    let trimmed: String = token.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match URL_SAFE_TOKEN.decode(trimmed) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(mode: IvMode) -> Envelope {
        Envelope::new(EnvelopeKey::derive("test secret"), mode)
    }

    #[test]
    fn text_tokens_round_trip() {
        let env = envelope(IvMode::Random);
        let token = env.seal_text(b"hello world");
        assert_eq!(env.open_text(&token).unwrap(), b"hello world");
    }

    #[test]
    fn empty_payload_round_trips() {
        let env = envelope(IvMode::Zero);
        let sealed = env.seal(b"");
        assert_eq!(env.open(&sealed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn text_tokens_use_url_safe_alphabet() {
        let env = envelope(IvMode::Random);
        for n in 0..64 {
            let token = env.seal_text(&vec![0xfbu8; n]);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
                "unexpected character in {token}"
            );
        }
    }

    #[test]
    fn padded_tokens_are_accepted() {
        let env = envelope(IvMode::Random);
        let mut token = env.seal_text(b"padding");
        while token.len() % 4 != 0 {
            token.push('=');
        }
        assert_eq!(env.open_text(&token).unwrap(), b"padding");
    }

    #[test]
    fn every_flipped_byte_is_detected() {
        for mode in [IvMode::Random, IvMode::Zero] {
            let env = envelope(mode);
            let sealed = env.seal(b"{\"method\":\"GET\",\"url\":\"/books/show/1\"}");
            for i in 0..sealed.len() {
                let mut corrupted = sealed.clone();
                corrupted[i] ^= 0x01;
                assert!(
                    matches!(env.open(&corrupted), Err(RedirectError::TamperDetected)),
                    "flip at byte {i} ({mode:?}) went unnoticed"
                );
            }
        }
    }

    #[test]
    fn wrong_key_is_tamper() {
        let sealed = envelope(IvMode::Random).seal(b"secret stuff");
        let other = Envelope::new(EnvelopeKey::derive("another secret"), IvMode::Random);
        assert!(matches!(
            other.open(&sealed),
            Err(RedirectError::TamperDetected)
        ));
    }

    #[test]
    fn malformed_input_is_tamper() {
        let env = envelope(IvMode::Random);
        for token in ["", "!!!!", "abc", "QUJD"] {
            assert!(
                matches!(env.open_text(token), Err(RedirectError::TamperDetected)),
                "{token:?} accepted"
            );
        }
        assert!(matches!(
            env.open(&[0u8; 17]),
            Err(RedirectError::TamperDetected)
        ));
    }

    #[test]
    fn absent_token_is_no_data() {
        let env = envelope(IvMode::Random);
        assert_eq!(env.open_text_opt(None).unwrap(), None);
    }

    #[test]
    fn zero_iv_is_deterministic_and_random_iv_is_not() {
        let zero = envelope(IvMode::Zero);
        assert_eq!(zero.seal(b"same"), zero.seal(b"same"));
        assert_eq!(zero.seal(b"same").len() % BLOCK_SIZE, 0);

        let random = envelope(IvMode::Random);
        let a = random.seal(b"same");
        let b = random.seal(b"same");
        assert_ne!(a, b);
        assert_eq!(random.open(&a).unwrap(), random.open(&b).unwrap());
    }

    #[test]
    fn iv_modes_are_not_interchangeable() {
        let sealed = envelope(IvMode::Zero).seal(b"legacy payload that spans blocks");
        assert!(envelope(IvMode::Random).open(&sealed).is_err());
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = EnvelopeKey::derive("hunter2");
        assert_eq!(format!("{key:?}"), "EnvelopeKey(<redacted>)");
    }
}
