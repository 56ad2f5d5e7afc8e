//! `AuthKey` — 256-byte shared secret derived from the DH handshake.

/// A courier authorization key (256 bytes) plus its precomputed identifier.
///
/// The key itself never leaves the process; only [`AuthKey::key_id`] — the
/// last 8 key bytes — travels on the wire to say which key sealed a frame.
#[derive(Clone)]
pub struct AuthKey {
    pub(crate) data: [u8; 256],
    pub(crate) key_id: [u8; 8],
}

impl AuthKey {
    /// Construct from the raw 256-byte DH output.
    pub fn from_bytes(data: [u8; 256]) -> Self {
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&data[248..]);
        Self { data, key_id }
    }

    /// Return the raw 256-byte representation (persistence boundary).
    pub fn to_bytes(&self) -> [u8; 256] {
        self.data
    }

    /// The 8-byte wire identifier of this key.
    pub fn key_id(&self) -> [u8; 8] {
        self.key_id
    }
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthKey(id={})", u64::from_le_bytes(self.key_id))
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}
