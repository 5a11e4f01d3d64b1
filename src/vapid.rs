//! VAPID token minting and verification (RFC 8292).
//!
//! A token is a compact ES256 JWT scoped to one push-service origin:
//!
//! ```text
//! base64url({"typ":"JWT","alg":"ES256"}) . base64url({"aud","exp","sub"}) . base64url(r || s)
//! ```
//!
//! and travels as `Authorization: vapid t=<token>, k=<applicationServerKey>`.
//! Tokens carry no persisted state, so a failed mint can simply be retried.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::{DateTime, Utc};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TokenError;
use crate::keys::KeyPair;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Hard ceiling on token lifetime. Longer requests are rejected, not clamped.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Encoded ES256 signature length (`r || s`, each left-padded to 32 bytes).
pub const SIGNATURE_LEN: usize = 64;

#[derive(Serialize, Deserialize)]
struct Header<'a> {
    typ: &'a str,
    alg: &'a str,
}

const HEADER: Header<'static> = Header {
    typ: "JWT",
    alg: "ES256",
};

/// JWT claims carried by a VAPID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Push-service origin the token is valid for.
    pub aud: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Sender contact URI.
    pub sub: String,
}

/// A signed VAPID token bound to one audience.
#[derive(Debug, Clone)]
pub struct AuthorizationToken {
    token: String,
    audience: String,
    expires_at: DateTime<Utc>,
    public_key: String,
}

impl AuthorizationToken {
    /// The compact JWT.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Origin this token is scoped to.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Absolute expiry.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Raw 64-byte `r || s` signature.
    pub fn signature_bytes(&self) -> Result<Vec<u8>, TokenError> {
        let (_, signature) = self.token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        BASE64URL.decode(signature).map_err(|_| TokenError::Malformed)
    }

    /// `Authorization` header value: `vapid t=<token>, k=<public key>`.
    pub fn header_value(&self) -> String {
        format!("vapid t={}, k={}", self.token, self.public_key)
    }
}

/// Reject a key pair with no contact subject.
pub fn check_subject(key_pair: &KeyPair) -> Result<(), TokenError> {
    if key_pair.subject().trim().is_empty() {
        return Err(TokenError::SubjectRequired);
    }
    Ok(())
}

/// Reject a lifetime of zero or above [`MAX_TOKEN_TTL`]; returns it in seconds.
pub fn check_ttl(ttl: Duration) -> Result<i64, TokenError> {
    let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    if ttl.is_zero() || ttl > MAX_TOKEN_TTL {
        return Err(TokenError::InvalidTtl { secs });
    }
    Ok(secs)
}

/// Mint a token for `audience` valid for `ttl` from now.
pub fn mint(
    key_pair: &KeyPair,
    audience: &str,
    ttl: Duration,
) -> Result<AuthorizationToken, TokenError> {
    mint_at(key_pair, audience, ttl, Utc::now())
}

/// Mint a token as if the current time were `now`.
pub fn mint_at(
    key_pair: &KeyPair,
    audience: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<AuthorizationToken, TokenError> {
    check_subject(key_pair)?;
    let ttl_secs = check_ttl(ttl)?;
    if audience.is_empty() || Url::parse(audience).is_err() {
        return Err(TokenError::InvalidAudience);
    }

    let expires_at = now + chrono::Duration::seconds(ttl_secs);
    let claims = Claims {
        aud: audience.to_string(),
        exp: expires_at.timestamp(),
        sub: key_pair.subject().to_string(),
    };

    let header_b64 = encode_json(&HEADER)?;
    let claims_b64 = encode_json(&claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    // ES256: ECDSA P-256 over SHA-256(signing_input)
    let signature: Signature = key_pair
        .signing_key()
        .try_sign(signing_input.as_bytes())
        .map_err(|_| TokenError::Signing)?;
    let signature_b64 = BASE64URL.encode(signature.to_bytes());

    Ok(AuthorizationToken {
        token: format!("{signing_input}.{signature_b64}"),
        audience: audience.to_string(),
        expires_at,
        public_key: key_pair.application_server_key(),
    })
}

/// Derive the VAPID audience (`scheme://host[:port]`) from an endpoint URL.
///
/// Default ports are omitted; IPv6 hosts are bracketed.
pub fn audience_for(endpoint: &Url) -> Result<String, TokenError> {
    let host = match endpoint.host().ok_or(TokenError::InvalidAudience)? {
        url::Host::Domain(domain) => domain.to_string(),
        url::Host::Ipv4(ip) => ip.to_string(),
        url::Host::Ipv6(ip) => format!("[{ip}]"),
    };
    Ok(match endpoint.port() {
        Some(port) => format!("{}://{}:{}", endpoint.scheme(), host, port),
        None => format!("{}://{}", endpoint.scheme(), host),
    })
}

/// Verify a token the way a push service would.
///
/// Checks the ES256 header, the signature under `public_key`, that `aud`
/// equals `audience`, and that `exp` is after `now`.
pub fn verify(
    token: &str,
    public_key: &VerifyingKey,
    audience: &str,
    now: DateTime<Utc>,
) -> Result<Claims, TokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header_json = BASE64URL.decode(header_b64).map_err(|_| TokenError::Malformed)?;
    let header: Header<'_> =
        serde_json::from_slice(&header_json).map_err(|_| TokenError::Malformed)?;
    if header.alg != "ES256" {
        return Err(TokenError::Malformed);
    }

    let signature_bytes = BASE64URL
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed)?;
    if signature_bytes.len() != SIGNATURE_LEN {
        return Err(TokenError::Malformed);
    }
    let signature = Signature::from_slice(&signature_bytes).map_err(|_| TokenError::Malformed)?;
    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    public_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| TokenError::BadSignature)?;

    let claims_json = BASE64URL.decode(claims_b64).map_err(|_| TokenError::Malformed)?;
    let claims: Claims =
        serde_json::from_slice(&claims_json).map_err(|_| TokenError::Malformed)?;
    if claims.aud != audience {
        return Err(TokenError::AudienceMismatch);
    }
    if claims.exp <= now.timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

/// Split an `Authorization: vapid t=..., k=...` value into `(token, key)`.
pub fn parse_header(value: &str) -> Result<(String, String), TokenError> {
    let params = value
        .trim()
        .strip_prefix("vapid ")
        .ok_or(TokenError::Malformed)?;

    let mut token = None;
    let mut key = None;
    for param in params.split(',') {
        match param.trim().split_once('=') {
            Some(("t", v)) => token = Some(v.trim().to_string()),
            Some(("k", v)) => key = Some(v.trim().to_string()),
            _ => {}
        }
    }
    match (token, key) {
        (Some(t), Some(k)) if !t.is_empty() && !k.is_empty() => Ok((t, k)),
        _ => Err(TokenError::Malformed),
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    serde_json::to_vec(value)
        .map(|json| BASE64URL.encode(json))
        .map_err(|_| TokenError::Malformed)
}
