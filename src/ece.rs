//! Message encryption for Web Push (`Content-Encoding: aes128gcm`).
//!
//! Seals a payload so only the subscribing browser can read it:
//!
//! ```text
//! ephemeral P-256 key ──ECDH── subscriber p256dh ─→ shared secret
//! IKM   = HKDF(salt = auth,  ikm = shared, info = "WebPush: info\0" || len||ua_pub || len||as_pub, 32)
//! CEK   = HKDF(salt = salt,  ikm = IKM,    info = "Content-Encoding: aes128gcm\0", 16)
//! NONCE = HKDF(salt = salt,  ikm = IKM,    info = "Content-Encoding: nonce\0", 12)
//! body  = salt(16) || rs(4, BE) || idlen(1) = 65 || as_pub(65) || AES-128-GCM(plaintext || 0x02)
//! ```
//!
//! The ephemeral key and salt are generated per call and never reused.
//! Payloads are sent as a single record with the minimal `0x02` delimiter
//! and no extra padding.

// Rust guideline compliant 2026-02

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use hkdf::Hkdf;
use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::EncryptError;
use crate::keys::PUBLIC_KEY_LEN;
use crate::subscription::{Subscription, AUTH_SECRET_LEN};

/// `Content-Encoding` header value for this scheme.
pub const CONTENT_ENCODING: &str = "aes128gcm";

/// Largest plaintext accepted for a single record.
pub const MAX_PLAINTEXT_LEN: usize = 4096;

/// Per-message salt length.
pub const SALT_LEN: usize = 16;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Bytes before the ciphertext: salt, record size, key id length, key id.
pub const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;

/// Final-record padding delimiter.
const RECORD_DELIMITER: u8 = 0x02;

const WEBPUSH_INFO: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";
const KEY_LEN_PREFIX: [u8; 2] = (PUBLIC_KEY_LEN as u16).to_be_bytes();

const IKM_LEN: usize = 32;
const CEK_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// A sealed, self-framing aes128gcm body.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedMessage {
    salt: [u8; SALT_LEN],
    record_size: u32,
    sender_public_key: [u8; PUBLIC_KEY_LEN],
    ciphertext: Vec<u8>,
}

impl std::fmt::Debug for EncryptedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedMessage")
            .field("record_size", &self.record_size)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

impl EncryptedMessage {
    /// Random per-message salt.
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// Declared record size from the header.
    pub fn record_size(&self) -> u32 {
        self.record_size
    }

    /// Ephemeral public key used for this message only.
    pub fn sender_public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.sender_public_key
    }

    /// AES-128-GCM output including the 16-byte tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Total framed length.
    pub fn len(&self) -> usize {
        HEADER_LEN + self.ciphertext.len()
    }

    /// Always false: a sealed message carries at least the delimiter and tag.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Frame as `salt || rs || idlen || keyid || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.len());
        body.extend_from_slice(&self.salt);
        body.extend_from_slice(&self.record_size.to_be_bytes());
        body.push(PUBLIC_KEY_LEN as u8);
        body.extend_from_slice(&self.sender_public_key);
        body.extend_from_slice(&self.ciphertext);
        body
    }

    /// Parse a framed body. Only 65-byte key ids (P-256 points) are accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncryptError> {
        if bytes.len() < HEADER_LEN + TAG_LEN {
            return Err(EncryptError::MalformedRecord);
        }
        if usize::from(bytes[SALT_LEN + 4]) != PUBLIC_KEY_LEN {
            return Err(EncryptError::MalformedRecord);
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[..SALT_LEN]);
        let mut rs = [0u8; 4];
        rs.copy_from_slice(&bytes[SALT_LEN..SALT_LEN + 4]);
        let mut sender_public_key = [0u8; PUBLIC_KEY_LEN];
        sender_public_key.copy_from_slice(&bytes[SALT_LEN + 5..HEADER_LEN]);

        Ok(Self {
            salt,
            record_size: u32::from_be_bytes(rs),
            sender_public_key,
            ciphertext: bytes[HEADER_LEN..].to_vec(),
        })
    }
}

/// Seal `plaintext` for `subscription`.
///
/// Fails with [`EncryptError::PayloadTooLarge`] before any crypto work if the
/// plaintext exceeds [`MAX_PLAINTEXT_LEN`], and with
/// [`EncryptError::InvalidSubscriberKey`] if p256dh is not a curve point.
pub fn seal(subscription: &Subscription, plaintext: &[u8]) -> Result<EncryptedMessage, EncryptError> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(EncryptError::PayloadTooLarge {
            len: plaintext.len(),
            max: MAX_PLAINTEXT_LEN,
        });
    }

    let client_public = PublicKey::from_sec1_bytes(subscription.client_public_key())
        .map_err(|_| EncryptError::InvalidSubscriberKey)?;

    let local_secret = SecretKey::random(&mut OsRng);
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|_| EncryptError::Entropy)?;

    seal_with(
        plaintext,
        &client_public,
        subscription.auth_secret(),
        &local_secret,
        salt,
    )
}

/// Deterministic core of [`seal`] given the ephemeral key and salt.
fn seal_with(
    plaintext: &[u8],
    client_public: &PublicKey,
    auth_secret: &[u8; AUTH_SECRET_LEN],
    local_secret: &SecretKey,
    salt: [u8; SALT_LEN],
) -> Result<EncryptedMessage, EncryptError> {
    let client_point = client_public.to_encoded_point(false);
    let local_point = local_secret.public_key().to_encoded_point(false);

    let shared = diffie_hellman(local_secret.to_nonzero_scalar(), client_public.as_affine());

    let info = key_info(client_point.as_bytes(), local_point.as_bytes());
    let ikm: Zeroizing<[u8; IKM_LEN]> =
        hkdf_expand(auth_secret, shared.raw_secret_bytes().as_slice(), &info)?;
    let cek: Zeroizing<[u8; CEK_LEN]> = hkdf_expand(&salt, ikm.as_slice(), CEK_INFO)?;
    let nonce: Zeroizing<[u8; NONCE_LEN]> = hkdf_expand(&salt, ikm.as_slice(), NONCE_INFO)?;

    let mut padded = Zeroizing::new(Vec::with_capacity(plaintext.len() + 1));
    padded.extend_from_slice(plaintext);
    padded.push(RECORD_DELIMITER);

    let cipher = Aes128Gcm::new_from_slice(cek.as_slice()).map_err(|_| EncryptError::Aead)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce.as_slice()), padded.as_slice())
        .map_err(|_| EncryptError::Aead)?;

    let record_size =
        u32::try_from(ciphertext.len() + HEADER_LEN).map_err(|_| EncryptError::MalformedRecord)?;

    let mut sender_public_key = [0u8; PUBLIC_KEY_LEN];
    sender_public_key.copy_from_slice(local_point.as_bytes());

    log::debug!(
        "[WebPush] Sealed {} byte payload into {} byte record",
        plaintext.len(),
        record_size
    );

    Ok(EncryptedMessage {
        salt,
        record_size,
        sender_public_key,
        ciphertext,
    })
}

/// `"WebPush: info\0" || len(ua_pub) || ua_pub || len(as_pub) || as_pub`
fn key_info(client_public: &[u8], local_public: &[u8]) -> Vec<u8> {
    let mut info = Vec::with_capacity(WEBPUSH_INFO.len() + 2 * (2 + PUBLIC_KEY_LEN));
    info.extend_from_slice(WEBPUSH_INFO);
    info.extend_from_slice(&KEY_LEN_PREFIX);
    info.extend_from_slice(client_public);
    info.extend_from_slice(&KEY_LEN_PREFIX);
    info.extend_from_slice(local_public);
    info
}

fn hkdf_expand<const N: usize>(
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
) -> Result<Zeroizing<[u8; N]>, EncryptError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0u8; N]);
    hk.expand(info, okm.as_mut_slice())
        .map_err(|_| EncryptError::KeyDerivation)?;
    Ok(okm)
}
