//! Shared helpers for integration tests: a recording transport and the
//! browser side of RFC 8291.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use botster_push::{PushRequest, PushResponse, SubscriptionInfo, Transport, TransportError};
use hkdf::Hkdf;
use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use sha2::Sha256;

/// Records every request and answers by endpoint path (default 201).
#[derive(Debug, Default)]
pub struct RecordingTransport {
    replies: HashMap<String, Result<PushResponse, TransportError>>,
    pub requests: Mutex<Vec<PushRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests to `path` with `reply`.
    pub fn reply(mut self, path: &str, reply: Result<PushResponse, TransportError>) -> Self {
        self.replies.insert(path.to_string(), reply);
        self
    }

    pub fn requests(&self) -> Vec<PushRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: &PushRequest) -> Result<PushResponse, TransportError> {
        self.requests.lock().expect("lock").push(request.clone());
        self.replies
            .get(request.endpoint.path())
            .cloned()
            .unwrap_or_else(|| Ok(PushResponse::with_status(201)))
    }
}

/// Browser-side key material.
pub struct Browser {
    pub secret: SecretKey,
    pub auth: [u8; 16],
}

impl Browser {
    pub fn new() -> Self {
        let mut auth = [0u8; 16];
        OsRng.fill_bytes(&mut auth);
        Self {
            secret: SecretKey::random(&mut OsRng),
            auth,
        }
    }

    /// Subscription JSON as the browser would hand it over.
    pub fn subscribe(&self, endpoint: &str) -> SubscriptionInfo {
        SubscriptionInfo::new(
            endpoint,
            &BASE64URL.encode(self.secret.public_key().to_encoded_point(false).as_bytes()),
            &BASE64URL.encode(self.auth),
        )
    }

    /// Decrypt an aes128gcm body; returns the padded plaintext.
    pub fn open(&self, body: &[u8]) -> Vec<u8> {
        let salt = &body[0..16];
        let idlen = body[20] as usize;
        let as_public_bytes = &body[21..21 + idlen];
        let ciphertext = &body[21 + idlen..];

        let as_public = PublicKey::from_sec1_bytes(as_public_bytes).expect("sender key");
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), as_public.as_affine());
        let ua_public = self.secret.public_key().to_encoded_point(false);

        let mut info = b"WebPush: info\0".to_vec();
        info.extend_from_slice(&(ua_public.len() as u16).to_be_bytes());
        info.extend_from_slice(ua_public.as_bytes());
        info.extend_from_slice(&(as_public_bytes.len() as u16).to_be_bytes());
        info.extend_from_slice(as_public_bytes);

        let mut ikm = [0u8; 32];
        Hkdf::<Sha256>::new(Some(&self.auth), shared.raw_secret_bytes().as_slice())
            .expand(&info, &mut ikm)
            .expect("ikm");
        let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
        let mut cek = [0u8; 16];
        prk.expand(b"Content-Encoding: aes128gcm\0", &mut cek).expect("cek");
        let mut nonce = [0u8; 12];
        prk.expand(b"Content-Encoding: nonce\0", &mut nonce).expect("nonce");

        Aes128Gcm::new_from_slice(&cek)
            .expect("key")
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .expect("decrypt")
    }
}
