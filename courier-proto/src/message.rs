//! Message identifiers.

use std::time::{SystemTime, UNIX_EPOCH};

/// A 64-bit message identifier.
///
/// Layout: `(unix_secs << 32) | (millis_within_second << 22) | (rand << 2)`
/// with two random low bits. The id doubles as a coarse ordering hint, but
/// it is *not* strictly monotonic: two ids generated within the same
/// millisecond can compare out of order when the random bits decrease.
/// Nothing in this crate assumes strict monotonicity.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Generate a new message id from the system clock.
    ///
    /// Call through [`crate::Session::next_msg_id`] so allocation stays a
    /// session operation.
    pub(crate) fn generate() -> Self {
        let mut rnd = [0u8; 1];
        getrandom::getrandom(&mut rnd).expect("getrandom");
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_parts(now.as_secs(), u64::from(now.subsec_millis()), rnd[0] & 0b11)
    }

    pub(crate) fn from_parts(unix_secs: u64, millis: u64, rand: u8) -> Self {
        Self((unix_secs << 32) | (millis << 22) | (u64::from(rand) << 2))
    }
}
