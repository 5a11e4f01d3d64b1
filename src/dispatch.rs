//! One authenticated, encrypted delivery attempt.
//!
//! ```text
//! SubscriptionInfo ─validate─→ Subscription ─seal─→ aes128gcm body
//!                                   │
//!                                   └─audience─→ VAPID token
//!                                                    ↓
//!                         POST endpoint (Authorization, TTL, ...) via Transport
//!                                                    ↓
//!                                 status ─classify─→ DeliveryOutcome
//! ```
//!
//! Validation and size errors come back as `Err` before any I/O. Anything
//! the push service answers comes back as `Ok(DeliveryOutcome)` whose
//! [`Classification`] drives the caller's retry and cleanup policy.

// Rust guideline compliant 2026-02

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ece;
use crate::error::{PushError, TokenError, TransportError};
use crate::keys::KeyPair;
use crate::subscription::{Subscription, SubscriptionInfo};
use crate::transport::{PushRequest, PushResponse, Transport};
use crate::vapid::{self, DEFAULT_TOKEN_TTL};

/// Default message TTL: how long the push service should hold an undelivered message.
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// RFC 8030 message urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    /// Deliver only on power and wifi.
    VeryLow,
    /// Deliver on power or wifi.
    Low,
    /// Deliver when not on low battery.
    Normal,
    /// Deliver immediately.
    High,
}

impl Urgency {
    /// Header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::VeryLow => "very-low",
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "very-low" => Ok(Urgency::VeryLow),
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            other => Err(format!("unknown urgency '{other}'")),
        }
    }
}

/// A notification to deliver.
#[derive(Debug, Clone)]
pub struct PushMessage {
    /// Plaintext payload; empty sends a body-less push.
    pub payload: Vec<u8>,
    /// How long the push service may hold the message.
    pub ttl: Duration,
    /// Optional delivery urgency.
    pub urgency: Option<Urgency>,
    /// Optional topic; a newer message with the same topic replaces an undelivered one.
    pub topic: Option<String>,
}

impl PushMessage {
    /// Message with default TTL and no urgency or topic.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ttl: DEFAULT_MESSAGE_TTL,
            urgency: None,
            topic: None,
        }
    }

    /// Set the message TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the urgency.
    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    /// Set the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// How a push service response should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx: delivered.
    Success,
    /// 404/410: subscription is gone; delete it.
    SubscriptionExpired,
    /// 429: retry with backoff, honoring `retry_after`.
    RateLimited,
    /// 413: payload rejected by the service; do not retry.
    PayloadTooLarge,
    /// 401/403: token rejected; check key and audience configuration.
    Unauthorized,
    /// 500/502/503/504, timeout or cancellation mid-request: retry with backoff.
    TransientServerError,
    /// Any other status, including 501 and 505: do not retry.
    PermanentClientError,
}

impl Classification {
    /// Map an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Classification::Success,
            404 | 410 => Classification::SubscriptionExpired,
            413 => Classification::PayloadTooLarge,
            429 => Classification::RateLimited,
            401 | 403 => Classification::Unauthorized,
            500 | 502 | 503 | 504 => Classification::TransientServerError,
            _ => Classification::PermanentClientError,
        }
    }

    /// Whether the same request may succeed later.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Classification::RateLimited | Classification::TransientServerError
        )
    }
}

/// Result of one delivery attempt that reached (or tried to reach) the push service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// HTTP status, or `None` when the request timed out or was cancelled in flight.
    pub status_code: Option<u16>,
    /// What the caller should do next.
    pub classification: Classification,
    /// Message resource from the `Location` header.
    pub message_id: Option<String>,
    /// Service-provided backoff hint.
    pub retry_after: Option<Duration>,
    /// Truncated response body, for diagnostics.
    pub body: String,
}

impl DeliveryOutcome {
    /// Build from a transport response.
    pub fn from_response(response: &PushResponse) -> Self {
        Self::from_response_at(response, Utc::now())
    }

    fn from_response_at(response: &PushResponse, now: DateTime<Utc>) -> Self {
        let classification = Classification::from_status(response.status);
        let retry_after = match classification {
            Classification::RateLimited | Classification::TransientServerError => response
                .header_value("Retry-After")
                .and_then(|v| parse_retry_after(v, now)),
            _ => None,
        };
        Self {
            status_code: Some(response.status),
            classification,
            message_id: response.header_value("Location").map(str::to_string),
            retry_after,
            body: response.body.clone(),
        }
    }

    /// Outcome for a request whose fate at the push service is unknown.
    pub fn interrupted() -> Self {
        Self {
            status_code: None,
            classification: Classification::TransientServerError,
            message_id: None,
            retry_after: None,
            body: String::new(),
        }
    }

    /// Whether the message was accepted.
    pub fn success(&self) -> bool {
        self.classification == Classification::Success
    }

    /// Whether the subscription should be deleted.
    pub fn is_expired(&self) -> bool {
        self.classification == Classification::SubscriptionExpired
    }
}

/// `Retry-After` as delta-seconds or an HTTP date.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    (at.with_timezone(&Utc) - now).to_std().ok()
}

/// Shared cancellation signal.
///
/// Cloning shares the flag; set it from a signal handler or another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not yet set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sends push messages on behalf of one server identity.
///
/// Construct one per process identity and share it; the key pair is
/// read-only and every send is self-contained.
#[derive(Debug)]
pub struct Dispatcher<T> {
    key_pair: KeyPair,
    transport: T,
    token_ttl: Duration,
}

impl<T: Transport> Dispatcher<T> {
    /// Dispatcher with the default 12 hour token lifetime.
    ///
    /// Fails with [`TokenError::SubjectRequired`] when the key pair has no
    /// contact subject, so a misconfigured identity never reaches a send.
    pub fn new(key_pair: KeyPair, transport: T) -> Result<Self, TokenError> {
        vapid::check_subject(&key_pair)?;
        Ok(Self {
            key_pair,
            transport,
            token_ttl: DEFAULT_TOKEN_TTL,
        })
    }

    /// Override the VAPID token lifetime; zero or more than 24 hours is rejected.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Result<Self, TokenError> {
        vapid::check_ttl(ttl)?;
        self.token_ttl = ttl;
        Ok(self)
    }

    /// Server identity.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Injected transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validate, seal, sign and send one message.
    pub fn send(
        &self,
        subscription: &SubscriptionInfo,
        message: &PushMessage,
    ) -> Result<DeliveryOutcome, PushError> {
        let subscription = subscription.validate()?;
        self.send_to(&subscription, message, None)
    }

    /// [`Dispatcher::send`] that gives up before issuing the request once
    /// `cancel` is set.
    pub fn send_with_cancel(
        &self,
        subscription: &SubscriptionInfo,
        message: &PushMessage,
        cancel: &CancelFlag,
    ) -> Result<DeliveryOutcome, PushError> {
        let subscription = subscription.validate()?;
        self.send_to(&subscription, message, Some(cancel))
    }

    /// Send to an already validated subscription.
    pub fn send_to(
        &self,
        subscription: &Subscription,
        message: &PushMessage,
        cancel: Option<&CancelFlag>,
    ) -> Result<DeliveryOutcome, PushError> {
        let request = self.build_request(subscription, message)?;
        let audience = subscription.audience()?;

        if cancel.is_some_and(CancelFlag::is_cancelled) {
            return Err(TransportError::Cancelled.into());
        }

        let response = match self.transport.send(&request) {
            Ok(response) => response,
            Err(TransportError::Timeout | TransportError::Cancelled) => {
                log::warn!("[WebPush] Request to {} interrupted; outcome unknown", audience);
                return Ok(DeliveryOutcome::interrupted());
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = DeliveryOutcome::from_response(&response);
        match outcome.classification {
            Classification::Success => {
                log::debug!("[WebPush] Delivered to {} (HTTP {})", audience, response.status);
            }
            Classification::SubscriptionExpired => {
                log::info!(
                    "[WebPush] Subscription at {} expired (HTTP {})",
                    audience,
                    response.status
                );
            }
            Classification::RateLimited => {
                log::warn!(
                    "[WebPush] Rate limited by {} (retry after {:?})",
                    audience,
                    outcome.retry_after
                );
            }
            Classification::Unauthorized => {
                log::warn!(
                    "[WebPush] {} rejected VAPID token (HTTP {}): {}",
                    audience,
                    response.status,
                    outcome.body
                );
            }
            Classification::PayloadTooLarge
            | Classification::TransientServerError
            | Classification::PermanentClientError => {
                log::warn!(
                    "[WebPush] Send to {} failed (HTTP {}): {}",
                    audience,
                    response.status,
                    outcome.body
                );
            }
        }
        Ok(outcome)
    }

    /// Build the HTTP request without sending it.
    pub fn build_request(
        &self,
        subscription: &Subscription,
        message: &PushMessage,
    ) -> Result<PushRequest, PushError> {
        let body = if message.payload.is_empty() {
            Vec::new()
        } else {
            ece::seal(subscription, &message.payload)?.to_bytes()
        };

        let audience = subscription.audience()?;
        let token = vapid::mint(&self.key_pair, &audience, self.token_ttl)?;

        let mut headers = vec![
            ("Authorization", token.header_value()),
            ("Content-Type", "application/octet-stream".to_string()),
        ];
        if !body.is_empty() {
            headers.push(("Content-Encoding", ece::CONTENT_ENCODING.to_string()));
        }
        headers.push(("TTL", message.ttl.as_secs().to_string()));
        if let Some(urgency) = message.urgency {
            headers.push(("Urgency", urgency.to_string()));
        }
        if let Some(topic) = &message.topic {
            headers.push(("Topic", topic.clone()));
        }

        Ok(PushRequest {
            endpoint: subscription.endpoint().clone(),
            headers,
            body,
        })
    }
}
