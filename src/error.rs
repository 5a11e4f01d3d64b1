//! Error taxonomy for web push delivery.
//!
//! Each concern gets its own enum so callers can branch on the exact
//! failure without parsing messages:
//!
//! - [`KeyError`] - server identity configuration (fatal, never retried)
//! - [`ValidationError`] - malformed subscription fields (fatal for that subscription)
//! - [`TokenError`] - VAPID token minting and verification
//! - [`EncryptError`] - payload sealing (size, subscriber key, entropy)
//! - [`TransportError`] - the injected HTTP client failed before a response arrived
//!
//! [`PushError`] wraps all of them for the dispatch path.
//!
//! Messages never include key material, only lengths and kinds.

// Rust guideline compliant 2026-02

use thiserror::Error;

/// Server identity (VAPID key pair) errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Input was not valid base64url, JSON, or DER.
    #[error("Malformed key encoding")]
    MalformedEncoding,

    /// Public key is not a 65-byte uncompressed point on P-256.
    #[error("Public key is not a valid uncompressed P-256 point")]
    InvalidPublicKey,

    /// Private key is not a valid P-256 scalar.
    #[error("Private key is not a valid P-256 scalar")]
    InvalidPrivateKey,

    /// Public key does not belong to the private key.
    #[error("Public key does not match private key")]
    KeyMismatch,

    /// Imported key is on a curve other than P-256.
    #[error("Key is not on the P-256 curve")]
    InvalidCurve,

    /// PEM armor could not be decoded or encoded.
    #[error("PEM error: {0}")]
    Pem(String),
}

/// Subscription validation errors, in the order the checks run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// `endpoint` is empty.
    #[error("Subscription endpoint is required")]
    EndpointRequired,

    /// `endpoint` is not an absolute URL.
    #[error("Subscription endpoint is not a valid absolute URL")]
    InvalidEndpoint,

    /// `endpoint` scheme is not `https`.
    #[error("Subscription endpoint must use https")]
    EndpointNotHttps,

    /// `keys.p256dh` is empty.
    #[error("Subscription p256dh key is required")]
    P256dhRequired,

    /// `keys.p256dh` is not base64url or does not decode to 65 bytes.
    #[error("Subscription p256dh key must be 65 bytes of base64url")]
    InvalidP256dh,

    /// `keys.auth` is empty.
    #[error("Subscription auth secret is required")]
    AuthRequired,

    /// `keys.auth` is not base64url or does not decode to 16 bytes.
    #[error("Subscription auth secret must be 16 bytes of base64url")]
    InvalidAuth,
}

/// VAPID token errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The key pair has no contact subject.
    #[error("VAPID subject is required before minting tokens")]
    SubjectRequired,

    /// Requested lifetime is zero or above the 24 hour ceiling.
    #[error("VAPID token TTL must be between 1 second and 24 hours, got {secs}s")]
    InvalidTtl {
        /// Requested lifetime in seconds.
        secs: i64,
    },

    /// Audience could not be derived from the endpoint.
    #[error("Cannot derive VAPID audience from endpoint")]
    InvalidAudience,

    /// ECDSA signing failed.
    #[error("VAPID signing failed")]
    Signing,

    /// Token does not have the `header.claims.signature` shape.
    #[error("Malformed VAPID token")]
    Malformed,

    /// Signature does not verify under the given public key.
    #[error("VAPID token signature is invalid")]
    BadSignature,

    /// Token was minted for a different audience.
    #[error("VAPID token audience mismatch")]
    AudienceMismatch,

    /// Token `exp` is in the past.
    #[error("VAPID token expired")]
    Expired,
}

/// Payload sealing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptError {
    /// Plaintext exceeds the single-record limit.
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Plaintext length.
        len: usize,
        /// Maximum accepted plaintext length.
        max: usize,
    },

    /// Subscriber's p256dh is not a point on P-256.
    #[error("Subscriber public key is not a valid P-256 point")]
    InvalidSubscriberKey,

    /// The OS random source failed.
    #[error("Entropy source failure")]
    Entropy,

    /// HKDF refused the requested output length.
    #[error("Key derivation failed")]
    KeyDerivation,

    /// Encrypted body does not have the aes128gcm header layout.
    #[error("Malformed aes128gcm record")]
    MalformedRecord,

    /// AES-128-GCM rejected the input.
    #[error("AEAD sealing failed")]
    Aead,
}

/// Failures of the injected HTTP transport before a status code is known.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request exceeded its deadline.
    #[error("Push request timed out")]
    Timeout,

    /// Request was cancelled by the caller.
    #[error("Push request cancelled")]
    Cancelled,

    /// Connection could not be established.
    #[error("Push service connection failed: {0}")]
    Connect(String),

    /// Any other transport failure.
    #[error("Push transport error: {0}")]
    Other(String),
}

/// Umbrella error for a single delivery attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// See [`KeyError`].
    #[error(transparent)]
    Key(#[from] KeyError),

    /// See [`ValidationError`].
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// See [`TokenError`].
    #[error(transparent)]
    Token(#[from] TokenError),

    /// See [`EncryptError`].
    #[error(transparent)]
    Encrypt(#[from] EncryptError),

    /// See [`TransportError`].
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl PushError {
    /// Whether repeating the same attempt can succeed.
    ///
    /// Entropy, signing and transport failures are transient. Configuration,
    /// validation, size and subscriber-key errors repeat identically.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Encrypt(EncryptError::Entropy) | Self::Token(TokenError::Signing) => true,
            Self::Transport(_) => true,
            Self::Key(_) | Self::Validation(_) | Self::Token(_) | Self::Encrypt(_) => false,
        }
    }
}
