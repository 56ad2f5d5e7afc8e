//! Unauthenticated Diffie–Hellman key exchange.
//!
//! Both parties exchange `g^x mod p` shares rendered as 256 big-endian
//! bytes and converge on the same 256-byte [`AuthKey`] by commutativity of
//! modular exponentiation. Nothing authenticates the shares — a
//! man-in-the-middle can interpose. Peer shares outside `(1, p − 1)` are
//! rejected as a fatal handshake error.

use std::fmt;

use courier_crypto::AuthKey;
use num_bigint::BigUint;
use num_traits::One;

/// Byte width of a rendered share (and of the derived auth key).
pub const SHARE_LEN: usize = 256;

/// The fixed 768-bit safe-prime modulus, big-endian.
const PRIME_HEX: &[u8] = b"\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
E485B576625E7EC6F44C42E9A63A3620FFFFFFFFFFFFFFFF";

/// The fixed generator.
const GENERATOR: u32 = 3;

fn prime() -> BigUint {
    BigUint::parse_bytes(PRIME_HEX, 16).expect("prime constant parses")
}

// ─── Error ───────────────────────────────────────────────────────────────────

/// Errors that can occur during the key exchange.
#[derive(Clone, Debug, PartialEq)]
pub enum HandshakeError {
    /// The peer's share was not exactly [`SHARE_LEN`] bytes.
    InvalidShareLength {
        /// Length actually received.
        len: usize,
    },
    /// The peer's share falls outside `(1, p − 1)`.
    ShareOutOfRange,
    /// The peer's share did not arrive within the allowed window.
    Timeout,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidShareLength { len } => {
                write!(f, "peer share is {len} bytes (expected {SHARE_LEN})")
            }
            Self::ShareOutOfRange => write!(f, "peer share outside (1, p - 1)"),
            Self::Timeout => write!(f, "timed out awaiting peer share"),
        }
    }
}

impl std::error::Error for HandshakeError {}

// ─── Key exchange ────────────────────────────────────────────────────────────

/// The private exponent held between [`start`] and [`finish`].
///
/// Deliberately opaque; it never needs to leave the connection handler.
pub struct SecretExponent(BigUint);

/// Generate a private exponent and the public share to transmit.
pub fn start() -> (SecretExponent, [u8; SHARE_LEN]) {
    let mut rnd = [0u8; SHARE_LEN];
    getrandom::getrandom(&mut rnd).expect("getrandom");
    do_start(&rnd)
}

fn do_start(random: &[u8; SHARE_LEN]) -> (SecretExponent, [u8; SHARE_LEN]) {
    let secret = BigUint::from_bytes_be(random);
    let share = BigUint::from(GENERATOR).modpow(&secret, &prime());
    (SecretExponent(secret), to_fixed_bytes_be(&share))
}

/// Validate the peer's share and derive the shared auth key.
pub fn finish(secret: &SecretExponent, peer_share: &[u8]) -> Result<AuthKey, HandshakeError> {
    if peer_share.len() != SHARE_LEN {
        return Err(HandshakeError::InvalidShareLength { len: peer_share.len() });
    }

    let p = prime();
    let share = BigUint::from_bytes_be(peer_share);
    let one = BigUint::one();
    if share <= one || share >= &p - &one {
        return Err(HandshakeError::ShareOutOfRange);
    }

    let g_ab = share.modpow(&secret.0, &p);
    Ok(AuthKey::from_bytes(to_fixed_bytes_be(&g_ab)))
}

/// Render `n` big-endian, left-padded with zeros to exactly 256 bytes.
fn to_fixed_bytes_be(n: &BigUint) -> [u8; SHARE_LEN] {
    let bytes = n.to_bytes_be();
    let mut out = [0u8; SHARE_LEN];
    out[SHARE_LEN - bytes.len()..].copy_from_slice(&bytes);
    out
}
