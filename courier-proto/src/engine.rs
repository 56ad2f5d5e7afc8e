//! The per-connection protocol engine.
//!
//! A sans-IO state machine: feed inbound transport frames into
//! [`Engine::handle_frame`] and act on the returned [`Action`]s; frame
//! outbound traffic with [`Engine::send`] / [`Engine::send_container`] /
//! [`Engine::ack`]. All I/O, timers and scheduling stay with the caller.
//!
//! ```text
//! AwaitingPeerShare { secret, share, deadline } ──peer share──▶ Established(Session)
//! ```
//!
//! The first inbound frame is always the peer's raw DH share — a one-shot
//! transition, not a persistent mode. Every later frame is an encrypted
//! envelope.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_crypto::{self as crypto, DecryptError, Side};
use courier_tl::{Object, Registry, Serializable, deserialize};

use crate::dh::{self, HandshakeError, SecretExponent};
use crate::framer::{self, FrameError};
use crate::message::MessageId;
use crate::session::Session;

/// How long an engine may sit in `AwaitingPeerShare` before the connection
/// must be torn down.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Error ───────────────────────────────────────────────────────────────────

/// Everything that can go wrong while driving a connection.
#[derive(Clone, Debug, PartialEq)]
pub enum ProtocolError {
    /// The handshake failed. Fatal: close the connection, keep no state.
    Handshake(HandshakeError),
    /// The envelope could not be opened. Drop the frame.
    Cipher(DecryptError),
    /// The plaintext frame was malformed. Drop the frame.
    Frame(FrameError),
    /// A TL body failed to decode. Drop the frame.
    Decode(deserialize::Error),
    /// Application traffic was submitted before the handshake finished
    /// (or after a fatal handshake failure).
    NotEstablished,
}

impl ProtocolError {
    /// Whether the connection must be closed.
    ///
    /// Non-fatal errors mean the offending frame is dropped; closing after
    /// repeated violations is the caller's policy call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Handshake(_))
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake(e) => write!(f, "handshake: {e}"),
            Self::Cipher(e) => write!(f, "cipher: {e}"),
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::NotEstablished => write!(f, "session not established"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<HandshakeError> for ProtocolError {
    fn from(e: HandshakeError) -> Self {
        Self::Handshake(e)
    }
}
impl From<DecryptError> for ProtocolError {
    fn from(e: DecryptError) -> Self {
        Self::Cipher(e)
    }
}
impl From<FrameError> for ProtocolError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}
impl From<deserialize::Error> for ProtocolError {
    fn from(e: deserialize::Error) -> Self {
        Self::Decode(e)
    }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// What the caller must do after feeding the engine input.
#[derive(Debug, PartialEq)]
pub enum Action {
    /// Write these bytes to the transport.
    Send(Vec<u8>),
    /// The handshake completed; application traffic may flow.
    HandshakeComplete,
    /// A decoded object addressed to the application.
    Deliver {
        /// The inner message's id (ack it if the object warrants one).
        msg_id: MessageId,
        /// The decoded object.
        object: Object,
    },
}

// ─── Engine ──────────────────────────────────────────────────────────────────

enum State {
    AwaitingPeerShare {
        secret: SecretExponent,
        share: [u8; dh::SHARE_LEN],
        deadline: Instant,
    },
    Established(Session),
    /// A fatal handshake failure landed here; only closing remains.
    Failed,
}

/// Drives one connection through handshake and encrypted traffic.
///
/// Exclusively owned by the connection's handler, like the [`Session`] it
/// contains.
pub struct Engine {
    registry: Arc<Registry>,
    side: Side,
    state: State,
}

impl Engine {
    /// Open a connection. Returns the engine plus the DH share that must
    /// be sent to the peer immediately (the opener speaks first).
    pub fn initiate(registry: Arc<Registry>, now: Instant) -> (Self, Vec<u8>) {
        let (secret, share) = dh::start();
        let engine = Self {
            registry,
            side: Side::Initiator,
            state: State::AwaitingPeerShare { secret, share, deadline: now + HANDSHAKE_TIMEOUT },
        };
        (engine, share.to_vec())
    }

    /// Accept a connection. The engine stays silent until the opener's
    /// share arrives, then replies with its own.
    pub fn respond(registry: Arc<Registry>, now: Instant) -> Self {
        let (secret, share) = dh::start();
        Self {
            registry,
            side: Side::Responder,
            state: State::AwaitingPeerShare { secret, share, deadline: now + HANDSHAKE_TIMEOUT },
        }
    }

    /// Skip the handshake entirely, rebuilding the session from stored key
    /// material (the "resume" connection parameter).
    pub fn resume(
        registry: Arc<Registry>,
        auth_key: [u8; 256],
        salt: [u8; 8],
        session_id: [u8; 8],
        side: Side,
    ) -> Self {
        Self {
            registry,
            side,
            state: State::Established(Session::resume(auth_key, salt, session_id, side)),
        }
    }

    /// Whether the handshake has completed.
    pub fn is_established(&self) -> bool {
        matches!(self.state, State::Established(_))
    }

    /// The instant by which the peer's share must arrive, while still
    /// awaiting it.
    pub fn handshake_deadline(&self) -> Option<Instant> {
        match &self.state {
            State::AwaitingPeerShare { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    /// The session, once established (read access for salt/session id).
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            State::Established(session) => Some(session),
            _ => None,
        }
    }

    /// Process one inbound transport frame.
    ///
    /// Fatal errors ([`ProtocolError::is_fatal`]) require closing the
    /// connection; all others mean this frame is dropped and the
    /// connection may continue.
    pub fn handle_frame(
        &mut self,
        frame: &[u8],
        now: Instant,
    ) -> Result<Vec<Action>, ProtocolError> {
        if let State::AwaitingPeerShare { deadline, .. } = &self.state {
            let deadline = *deadline;
            if now > deadline {
                self.state = State::Failed;
                return Err(HandshakeError::Timeout.into());
            }
            let State::AwaitingPeerShare { secret, share, .. } =
                std::mem::replace(&mut self.state, State::Failed)
            else {
                unreachable!()
            };

            let auth_key = dh::finish(&secret, frame)?;
            log::debug!(
                "[engine] auth key established (id={})",
                u64::from_le_bytes(auth_key.key_id())
            );

            let mut actions = Vec::new();
            if self.side == Side::Responder {
                actions.push(Action::Send(share.to_vec()));
            }
            actions.push(Action::HandshakeComplete);
            self.state = State::Established(Session::new(auth_key, self.side));
            return Ok(actions);
        }

        match &mut self.state {
            State::Established(session) => {
                let mut envelope = frame.to_vec();
                let plaintext =
                    crypto::open_envelope(&mut envelope, session.auth_key(), session.side().peer())?;
                let (meta, inner) = framer::unwrap_frame(plaintext)?;
                log::trace!(
                    "[engine] frame msg_id={} carries {} message(s)",
                    meta.msg_id.0,
                    inner.len()
                );

                let mut actions = Vec::with_capacity(inner.len());
                for msg in inner {
                    let object = self.registry.decode(&msg.body)?;
                    actions.push(Action::Deliver { msg_id: msg.msg_id, object });
                }
                Ok(actions)
            }
            State::Failed => Err(ProtocolError::NotEstablished),
            State::AwaitingPeerShare { .. } => unreachable!("handled above"),
        }
    }

    /// Encode, frame and seal one object for the transport.
    pub fn send(&mut self, object: &Object) -> Result<Vec<u8>, ProtocolError> {
        let State::Established(session) = &mut self.state else {
            return Err(ProtocolError::NotEstablished);
        };
        let frame = framer::wrap_single(&object.to_bytes(), session);
        Ok(crypto::seal_envelope(frame, session.auth_key(), session.side()))
    }

    /// Encode, frame and seal several objects as one container.
    pub fn send_container(&mut self, objects: &[Object]) -> Result<Vec<u8>, ProtocolError> {
        let State::Established(session) = &mut self.state else {
            return Err(ProtocolError::NotEstablished);
        };
        let bodies: Vec<Vec<u8>> = objects.iter().map(Serializable::to_bytes).collect();
        let frame = framer::wrap_container(&bodies, session);
        Ok(crypto::seal_envelope(frame, session.auth_key(), session.side()))
    }

    /// Seal an acknowledgment for the given message ids.
    pub fn ack(&mut self, msg_ids: &[MessageId]) -> Result<Vec<u8>, ProtocolError> {
        let State::Established(session) = &mut self.state else {
            return Err(ProtocolError::NotEstablished);
        };
        let frame = framer::wrap_single(&framer::build_ack(msg_ids), session);
        Ok(crypto::seal_envelope(frame, session.auth_key(), session.side()))
    }
}
