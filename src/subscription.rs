//! Browser push subscriptions.
//!
//! [`SubscriptionInfo`] is the JSON a browser hands back from
//! `PushManager.subscribe()`:
//!
//! ```json
//! { "endpoint": "https://...", "expirationTime": null,
//!   "keys": { "p256dh": "<65 bytes b64url>", "auth": "<16 bytes b64url>" } }
//! ```
//!
//! [`SubscriptionInfo::validate`] is a pure gate that runs before any key
//! agreement or network call and yields a decoded [`Subscription`].

// Rust guideline compliant 2026-02

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{TokenError, ValidationError};
use crate::keys::PUBLIC_KEY_LEN;

/// Length of the subscription auth secret.
pub const AUTH_SECRET_LEN: usize = 16;

/// Subscription keys as sent by the browser (base64url).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Browser's P-256 ECDH public key.
    #[serde(default)]
    pub p256dh: String,
    /// Shared auth secret.
    #[serde(default)]
    pub auth: String,
}

/// Unvalidated subscription JSON as received from a client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    /// Push service endpoint URL.
    #[serde(default)]
    pub endpoint: String,
    /// Optional expiry, milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    /// Encryption keys.
    #[serde(default)]
    pub keys: SubscriptionKeys,
}

impl SubscriptionInfo {
    /// Build from the three string fields.
    pub fn new(endpoint: &str, p256dh: &str, auth: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            expiration_time: None,
            keys: SubscriptionKeys {
                p256dh: p256dh.to_string(),
                auth: auth.to_string(),
            },
        }
    }

    /// Validate and decode. Checks run in order and the first failure wins:
    ///
    /// 1. endpoint present and an absolute URL
    /// 2. endpoint scheme is `https`
    /// 3. p256dh decodes to exactly 65 bytes
    /// 4. auth decodes to exactly 16 bytes
    pub fn validate(&self) -> Result<Subscription, ValidationError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ValidationError::EndpointRequired);
        }
        let endpoint = Url::parse(endpoint).map_err(|_| ValidationError::InvalidEndpoint)?;
        if endpoint.cannot_be_a_base() || endpoint.host().is_none() {
            return Err(ValidationError::InvalidEndpoint);
        }
        if endpoint.scheme() != "https" {
            return Err(ValidationError::EndpointNotHttps);
        }

        if self.keys.p256dh.trim().is_empty() {
            return Err(ValidationError::P256dhRequired);
        }
        let client_public_key: [u8; PUBLIC_KEY_LEN] = decode_b64url(&self.keys.p256dh)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(ValidationError::InvalidP256dh)?;

        if self.keys.auth.trim().is_empty() {
            return Err(ValidationError::AuthRequired);
        }
        let auth_secret: [u8; AUTH_SECRET_LEN] = decode_b64url(&self.keys.auth)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(ValidationError::InvalidAuth)?;

        Ok(Subscription {
            endpoint,
            client_public_key,
            auth_secret,
            expiration_time: self
                .expiration_time
                .and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }
}

/// A validated subscription with decoded key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Subscription {
    endpoint: Url,
    client_public_key: [u8; PUBLIC_KEY_LEN],
    auth_secret: [u8; AUTH_SECRET_LEN],
    expiration_time: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Endpoint paths are bearer capabilities; only the origin is shown.
        f.debug_struct("Subscription")
            .field("origin", &self.endpoint.origin().ascii_serialization())
            .field("expiration_time", &self.expiration_time)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Delivery URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Subscriber's uncompressed P-256 public key.
    pub fn client_public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.client_public_key
    }

    /// Shared auth secret.
    pub fn auth_secret(&self) -> &[u8; AUTH_SECRET_LEN] {
        &self.auth_secret
    }

    /// Browser-declared expiry, if any.
    pub fn expiration_time(&self) -> Option<DateTime<Utc>> {
        self.expiration_time
    }

    /// Whether the browser-declared expiry has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time.is_some_and(|t| t <= now)
    }

    /// VAPID audience for this endpoint (`scheme://host[:port]`).
    pub fn audience(&self) -> Result<String, TokenError> {
        crate::vapid::audience_for(&self.endpoint)
    }

    /// Re-encode to the client JSON shape.
    pub fn to_info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            endpoint: self.endpoint.to_string(),
            expiration_time: self.expiration_time.map(|t| t.timestamp_millis()),
            keys: SubscriptionKeys {
                p256dh: BASE64URL.encode(self.client_public_key),
                auth: BASE64URL.encode(self.auth_secret),
            },
        }
    }
}

/// Decode base64url, tolerating trailing `=` padding some browsers emit.
fn decode_b64url(input: &str) -> Option<Vec<u8>> {
    BASE64URL
        .decode(input.trim().trim_end_matches('='))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const P256DH: &str =
        "BLMaF9ffKBiWQLCKvTHb6LO8Nb6dcUh6TItC455vu2kElga6PQvUmaFyCdykxY2nOSSL3yKgfbmFLRTUaGv4yV8";
    const AUTH: &str = "xS03Fj5ErfTNH_l9WHE9Ig";

    fn info(endpoint: &str, p256dh: &str, auth: &str) -> SubscriptionInfo {
        SubscriptionInfo::new(endpoint, p256dh, auth)
    }

    #[test]
    fn test_valid_subscription() {
        let sub = info("https://push.example/abc", P256DH, AUTH)
            .validate()
            .expect("valid subscription");
        assert_eq!(sub.endpoint().as_str(), "https://push.example/abc");
        assert_eq!(sub.client_public_key()[0], 0x04);
        assert_eq!(sub.auth_secret().len(), 16);
        assert_eq!(sub.audience().expect("aud"), "https://push.example");
    }

    #[test]
    fn test_each_failure_is_specific() {
        let cases = [
            (info("", P256DH, AUTH), ValidationError::EndpointRequired),
            (info("   ", P256DH, AUTH), ValidationError::EndpointRequired),
            (info("not a url", P256DH, AUTH), ValidationError::InvalidEndpoint),
            (info("/relative/path", P256DH, AUTH), ValidationError::InvalidEndpoint),
            (info("http://push.example/abc", P256DH, AUTH), ValidationError::EndpointNotHttps),
            (info("https://push.example/abc", "", AUTH), ValidationError::P256dhRequired),
            (info("https://push.example/abc", "!!!", AUTH), ValidationError::InvalidP256dh),
            (
                info("https://push.example/abc", &BASE64URL.encode([4u8; 64]), AUTH),
                ValidationError::InvalidP256dh,
            ),
            (info("https://push.example/abc", P256DH, ""), ValidationError::AuthRequired),
            (
                info("https://push.example/abc", P256DH, &BASE64URL.encode([1u8; 17])),
                ValidationError::InvalidAuth,
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(input.validate().unwrap_err(), expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_first_failure_wins() {
        // Both endpoint scheme and auth are wrong; the endpoint check runs first.
        let input = info("http://push.example/abc", P256DH, "short");
        assert_eq!(input.validate().unwrap_err(), ValidationError::EndpointNotHttps);
    }

    #[test]
    fn test_padded_base64_is_accepted() {
        let padded_auth = format!("{AUTH}==");
        assert!(info("https://push.example/abc", P256DH, &padded_auth).validate().is_ok());
    }

    #[test]
    fn test_browser_json_shape() {
        let json = format!(
            r#"{{"endpoint":"https://push.example/abc","expirationTime":1700000000000,"keys":{{"p256dh":"{P256DH}","auth":"{AUTH}"}}}}"#
        );
        let parsed: SubscriptionInfo = serde_json::from_str(&json).expect("parse");
        let sub = parsed.validate().expect("valid");

        let expiry = sub.expiration_time().expect("expiry");
        assert_eq!(expiry.timestamp(), 1_700_000_000);
        assert!(sub.is_expired(expiry));
        assert!(!sub.is_expired(expiry - chrono::Duration::seconds(1)));

        assert_eq!(sub.to_info(), parsed);
    }

    #[test]
    fn test_debug_omits_secrets() {
        let sub = info("https://push.example/secret-path", P256DH, AUTH)
            .validate()
            .expect("valid");
        let debug = format!("{sub:?}");
        assert!(debug.contains("https://push.example"));
        assert!(!debug.contains("secret-path"));
    }
}
