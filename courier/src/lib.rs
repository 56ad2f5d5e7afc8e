//! # courier — an MTProto-inspired secure transport
//!
//! `courier` wires together three focused sub-crates:
//!
//! | Sub-crate        | Role                                                 |
//! |------------------|------------------------------------------------------|
//! | `courier-tl`     | TL binary codec: primitives, registry, typed objects |
//! | `courier-crypto` | AES-256-IGE, subkey derivation, auth keys, envelopes |
//! | `courier-proto`  | DH handshake, sessions, framing, connection engine   |
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//! use courier::{Action, Engine, Message, Object, Registry};
//!
//! let registry = Arc::new(Registry::core());
//! let now = Instant::now();
//!
//! // One end opens, the other accepts; shares cross on the wire.
//! let (mut alice, share_a) = Engine::initiate(registry.clone(), now);
//! let mut bob = Engine::respond(registry, now);
//!
//! let mut share_b = None;
//! for action in bob.handle_frame(&share_a, now).unwrap() {
//!     if let Action::Send(bytes) = action {
//!         share_b = Some(bytes);
//!     }
//! }
//! alice.handle_frame(&share_b.unwrap(), now).unwrap();
//!
//! // Encrypted traffic flows through the engines.
//! let envelope = alice
//!     .send(&Object::Message(Message {
//!         from_user_id: 1,
//!         to_user_id: 2,
//!         text: "hi".into(),
//!     }))
//!     .unwrap();
//! let actions = bob.handle_frame(&envelope, now).unwrap();
//! assert!(matches!(actions[0], Action::Deliver { .. }));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Re-export of [`courier_tl`] — TL codec, registry and typed objects.
pub use courier_tl as tl;

/// Re-export of [`courier_crypto`] — AES-IGE, subkeys, auth keys.
pub use courier_crypto as crypto;

/// Re-export of [`courier_proto`] — handshake, session, framing, engine.
pub use courier_proto as proto;

// ─── Convenience re-exports ───────────────────────────────────────────────────

pub use courier_crypto::{AuthKey, Side};
pub use courier_proto::{Action, Engine, MessageId, ProtocolError, Session};
pub use courier_tl::{
    Deserializable, Identifiable, Message, MsgsAck, Object, Registry, Serializable,
};
