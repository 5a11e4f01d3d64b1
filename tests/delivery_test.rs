//! End-to-end single delivery through the public API.

mod common;

use std::time::Duration;

use botster_push::{
    ece, vapid, Classification, Dispatcher, KeyPair, PushError, PushMessage, PushResponse,
    TokenError, TransportError, Urgency,
};
use chrono::Utc;
use common::{Browser, RecordingTransport};

const SUBJECT: &str = "mailto:ops@example.com";

#[test]
fn test_browser_can_decrypt_and_service_can_verify() {
    let browser = Browser::new();
    let dispatcher =
        Dispatcher::new(KeyPair::generate(SUBJECT), RecordingTransport::new()).expect("dispatcher");

    let payload = br#"{"title":"Hi"}"#;
    let message = PushMessage::new(payload.to_vec()).with_urgency(Urgency::Normal);
    let outcome = dispatcher
        .send(&browser.subscribe("https://push.example/abc"), &message)
        .expect("send");
    assert!(outcome.success());
    assert_eq!(outcome.status_code, Some(201));

    let requests = dispatcher.transport().requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    // Framing: 86 header bytes + 14 plaintext + 1 delimiter + 16 tag
    assert_eq!(request.body.len(), 117);
    let framed = ece::EncryptedMessage::from_bytes(&request.body).expect("frame");
    assert_eq!(framed.record_size() as usize, framed.ciphertext().len() + ece::HEADER_LEN);

    let opened = browser.open(&request.body);
    assert_eq!(&opened[..payload.len()], payload);
    assert_eq!(opened[payload.len()..], [0x02]);

    // What the push service does with the Authorization header
    let (token, key) =
        vapid::parse_header(request.header("Authorization").expect("authorization")).expect("vapid");
    assert_eq!(key, dispatcher.key_pair().application_server_key());
    let claims = vapid::verify(
        &token,
        dispatcher.key_pair().verifying_key(),
        "https://push.example",
        Utc::now(),
    )
    .expect("verify");
    assert_eq!(claims.sub, SUBJECT);
    assert_eq!(
        vapid::verify(
            &token,
            dispatcher.key_pair().verifying_key(),
            "https://other.example",
            Utc::now()
        ),
        Err(TokenError::AudienceMismatch)
    );

    assert_eq!(request.header("Urgency"), Some("normal"));
    assert_eq!(request.header("TTL"), Some("86400"));
}

#[test]
fn test_token_lifetime_follows_dispatcher_setting() {
    let browser = Browser::new();
    let dispatcher = Dispatcher::new(KeyPair::generate(SUBJECT), RecordingTransport::new())
        .and_then(|d| d.with_token_ttl(Duration::from_secs(600)))
        .expect("dispatcher");
    dispatcher
        .send(&browser.subscribe("https://push.example/abc"), &PushMessage::new("x"))
        .expect("send");

    let request = &dispatcher.transport().requests()[0];
    let (token, _) = vapid::parse_header(request.header("Authorization").expect("auth")).expect("vapid");
    let claims = vapid::verify(
        &token,
        dispatcher.key_pair().verifying_key(),
        "https://push.example",
        Utc::now(),
    )
    .expect("verify");
    let remaining = claims.exp - Utc::now().timestamp();
    assert!((590..=600).contains(&remaining), "exp {remaining}s from now");

    let too_long = Dispatcher::new(KeyPair::generate(SUBJECT), RecordingTransport::new())
        .and_then(|d| d.with_token_ttl(Duration::from_secs(24 * 60 * 60 + 1)));
    assert_eq!(too_long.unwrap_err(), TokenError::InvalidTtl { secs: 86_401 });
}

#[test]
fn test_identity_without_subject_never_reaches_a_batch() {
    let err = Dispatcher::new(KeyPair::generate(""), RecordingTransport::new()).unwrap_err();
    assert_eq!(err, TokenError::SubjectRequired);
    assert!(!PushError::from(err).is_retryable());
}

#[test]
fn test_every_status_is_classified() {
    let table = [
        (201, Classification::Success),
        (404, Classification::SubscriptionExpired),
        (410, Classification::SubscriptionExpired),
        (413, Classification::PayloadTooLarge),
        (429, Classification::RateLimited),
        (401, Classification::Unauthorized),
        (403, Classification::Unauthorized),
        (500, Classification::TransientServerError),
        (502, Classification::TransientServerError),
        (503, Classification::TransientServerError),
        (504, Classification::TransientServerError),
        (400, Classification::PermanentClientError),
        (422, Classification::PermanentClientError),
        (501, Classification::PermanentClientError),
    ];

    let browser = Browser::new();
    for (status, expected) in table {
        let transport = RecordingTransport::new().reply("/abc", Ok(PushResponse::with_status(status)));
        let dispatcher = Dispatcher::new(KeyPair::generate(SUBJECT), transport).expect("dispatcher");
        let outcome = dispatcher
            .send(&browser.subscribe("https://push.example/abc"), &PushMessage::new("x"))
            .expect("send");
        assert_eq!(outcome.classification, expected, "HTTP {status}");
        assert_eq!(outcome.status_code, Some(status));
    }
}

#[test]
fn test_retry_hint_and_body_are_reported() {
    let browser = Browser::new();
    let response = PushResponse {
        status: 503,
        headers: vec![("retry-after".to_string(), "30".to_string())],
        body: "service unavailable".to_string(),
    };
    let transport = RecordingTransport::new().reply("/abc", Ok(response));
    let dispatcher = Dispatcher::new(KeyPair::generate(SUBJECT), transport).expect("dispatcher");

    let outcome = dispatcher
        .send(&browser.subscribe("https://push.example/abc"), &PushMessage::new("x"))
        .expect("send");
    assert_eq!(outcome.classification, Classification::TransientServerError);
    assert_eq!(outcome.retry_after, Some(Duration::from_secs(30)));
    assert_eq!(outcome.body, "service unavailable");
}

#[test]
fn test_interrupted_request_is_transient() {
    let browser = Browser::new();
    for err in [TransportError::Timeout, TransportError::Cancelled] {
        let transport = RecordingTransport::new().reply("/abc", Err(err));
        let dispatcher = Dispatcher::new(KeyPair::generate(SUBJECT), transport).expect("dispatcher");
        let outcome = dispatcher
            .send(&browser.subscribe("https://push.example/abc"), &PushMessage::new("x"))
            .expect("interruption is an outcome");
        assert_eq!(outcome.status_code, None);
        assert_eq!(outcome.classification, Classification::TransientServerError);
        assert!(outcome.classification.is_retryable());
    }
}

#[test]
fn test_endpoint_port_is_part_of_audience() {
    let browser = Browser::new();
    let dispatcher =
        Dispatcher::new(KeyPair::generate(SUBJECT), RecordingTransport::new()).expect("dispatcher");
    dispatcher
        .send(&browser.subscribe("https://push.example:8443/abc"), &PushMessage::new("x"))
        .expect("send");

    let request = &dispatcher.transport().requests()[0];
    let (token, _) = vapid::parse_header(request.header("Authorization").expect("auth")).expect("vapid");
    assert!(vapid::verify(
        &token,
        dispatcher.key_pair().verifying_key(),
        "https://push.example:8443",
        Utc::now()
    )
    .is_ok());
}
