//! Courier protocol core.
//!
//! This crate handles:
//! * The unauthenticated DH key exchange ([`dh`])
//! * Per-connection session state and sequence bookkeeping ([`session`])
//! * Frame building/parsing, containers and acks ([`framer`])
//! * The sans-IO connection state machine ([`engine`])
//!
//! It is intentionally transport-agnostic: bring your own TCP/WebSocket
//! and feed complete frames into an [`Engine`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod dh;
pub mod engine;
pub mod framer;
pub mod message;
pub mod session;
pub mod transport;

pub use engine::{Action, Engine, HANDSHAKE_TIMEOUT, ProtocolError};
pub use message::MessageId;
pub use session::Session;
