//! Per-connection session state.

use courier_crypto::{AuthKey, Side};

use crate::message::MessageId;

/// Mutable state of one established connection.
///
/// Created when the handshake completes (or from resumed key material) and
/// destroyed on disconnect. A `Session` is exclusively owned by its
/// connection's handler — sequence bookkeeping relies on that ownership
/// for serialization, and key material is never shared between
/// connections.
pub struct Session {
    auth_key: AuthKey,
    salt: [u8; 8],
    session_id: [u8; 8],
    /// Next free sequence slot; every outbound message takes the current
    /// value and advances it by 2.
    sequence: u32,
    side: Side,
}

impl Session {
    /// Create a session with fresh random salt and session id.
    pub fn new(auth_key: AuthKey, side: Side) -> Self {
        let mut rnd = [0u8; 16];
        getrandom::getrandom(&mut rnd).expect("getrandom");
        Self {
            auth_key,
            salt: rnd[..8].try_into().unwrap(),
            session_id: rnd[8..].try_into().unwrap(),
            sequence: 0,
            side,
        }
    }

    /// Rebuild a session from previously established material, skipping
    /// the handshake. The caller is responsible for having stored the key
    /// bytes safely; the sequence counter restarts at zero.
    pub fn resume(auth_key: [u8; 256], salt: [u8; 8], session_id: [u8; 8], side: Side) -> Self {
        Self {
            auth_key: AuthKey::from_bytes(auth_key),
            salt,
            session_id,
            sequence: 0,
            side,
        }
    }

    /// Allocate a new message id.
    pub fn next_msg_id(&mut self) -> MessageId {
        MessageId::generate()
    }

    /// Consume the next sequence slot: returns the current value, then
    /// advances by 2. Monotone within the session; a value is never reused
    /// for two outbound messages.
    pub fn next_seq_no(&mut self) -> u32 {
        let n = self.sequence;
        self.sequence += 2;
        n
    }

    /// The session's auth key.
    pub fn auth_key(&self) -> &AuthKey {
        &self.auth_key
    }

    /// The raw key bytes (persistence boundary).
    pub fn auth_key_bytes(&self) -> [u8; 256] {
        self.auth_key.to_bytes()
    }

    /// Which end of the connection this session belongs to.
    pub fn side(&self) -> Side {
        self.side
    }

    /// The server salt carried in outbound frame headers.
    pub fn salt(&self) -> [u8; 8] {
        self.salt
    }

    /// The session id carried in outbound frame headers.
    pub fn session_id(&self) -> [u8; 8] {
        self.session_id
    }
}
