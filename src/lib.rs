//! Botster Push - authenticated, end-to-end encrypted Web Push delivery.
//!
//! Sends notifications to browser push subscriptions with VAPID
//! authentication (RFC 8292) and `aes128gcm` payload encryption (RFC 8291),
//! without a browser or vendor SDK.
//!
//! # Architecture
//!
//! - **KeyPair** - long-lived server identity, shared read-only across sends
//! - **Dispatcher** - one validated, sealed, signed POST per subscription
//! - **BatchDispatcher** - bounded fan-out with per-subscription isolation
//! - **Transport** - injectable HTTP boundary (reqwest in production)
//!
//! # Modules
//!
//! - [`keys`] - VAPID key pair, JSON/PEM encodings
//! - [`vapid`] - ES256 token minting and verification
//! - [`subscription`] - browser subscription parsing and validation
//! - [`ece`] - RFC 8291 message sealing
//! - [`dispatch`] - single delivery and response classification
//! - [`batch`] - multi-subscription delivery
//! - [`store`] - subscription store boundary
//! - [`persistence`] - key files on disk
//! - [`config`] - configuration loading

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod ece;
pub mod error;
pub mod keys;
pub mod persistence;
pub mod store;
pub mod subscription;
pub mod transport;
pub mod vapid;

// Re-export commonly used types
pub use batch::{BatchDispatcher, BatchEntry, BatchReport};
pub use config::PushConfig;
pub use dispatch::{CancelFlag, Classification, DeliveryOutcome, Dispatcher, PushMessage, Urgency};
pub use error::{EncryptError, KeyError, PushError, TokenError, TransportError, ValidationError};
pub use keys::KeyPair;
pub use store::{MemoryStore, SubscriptionStore};
pub use subscription::{Subscription, SubscriptionInfo};
pub use transport::{PushRequest, PushResponse, ReqwestTransport, Transport};
