//! Plaintext frame building and parsing.
//!
//! Frame layout before encryption:
//!
//! ```text
//! salt:       [u8; 8]
//! session_id: [u8; 8]
//! msg_id:     u64
//! seq_no:     u32
//! reserved:   u32 (zero)
//! body:       one TL object, or a container
//! ```
//!
//! A container body is `0x73f1f8dc ‖ count ‖ count × {msg_id(8) ‖
//! seq_no(4) ‖ len(4) ‖ body}`. Anything else is a single TL object
//! consuming the rest of the frame (plus whatever cipher padding trails
//! it — TL decoding is self-delimiting).

use std::fmt;

use courier_tl::{MsgsAck, Object, Serializable};

use crate::message::MessageId;
use crate::session::Session;

/// Constructor id marking a multi-message container body.
pub const CONTAINER_ID: u32 = 0x73f1f8dc;

/// Byte length of the fixed outer header.
pub const HEADER_LEN: usize = 32;

// ─── Error ───────────────────────────────────────────────────────────────────

/// Errors from [`unwrap_frame`].
#[derive(Clone, Debug, PartialEq)]
pub enum FrameError {
    /// Frame shorter than the 32-byte header.
    TooShort {
        /// Length actually received.
        len: usize,
    },
    /// A container declared more records or bytes than the frame holds.
    TruncatedContainer,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { len } => write!(f, "frame of {len} bytes has no full header"),
            Self::TruncatedContainer => write!(f, "container truncated mid-record"),
        }
    }
}

impl std::error::Error for FrameError {}

// ─── Frame types ─────────────────────────────────────────────────────────────

/// Metadata from the outer frame header.
///
/// Salt and session id are surfaced for the caller; the protocol core does
/// not validate them (each end generates its own, and nothing transmits
/// them out of band).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameMeta {
    /// Server salt as sent by the peer.
    pub salt: [u8; 8],
    /// The peer's session id.
    pub session_id: [u8; 8],
    /// Message id of the outer frame.
    pub msg_id: MessageId,
    /// Sequence number of the outer frame.
    pub seq_no: u32,
}

/// One message extracted from a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct InnerMessage {
    /// The message's own id (equals the outer id for single frames).
    pub msg_id: MessageId,
    /// The message's own sequence number.
    pub seq_no: u32,
    /// TL bytes of the message body.
    pub body: Vec<u8>,
}

// ─── Building ────────────────────────────────────────────────────────────────

fn push_header(frame: &mut Vec<u8>, session: &Session, msg_id: MessageId, seq_no: u32) {
    frame.extend_from_slice(&session.salt());
    frame.extend_from_slice(&session.session_id());
    frame.extend_from_slice(&msg_id.0.to_le_bytes());
    frame.extend_from_slice(&seq_no.to_le_bytes());
    frame.extend_from_slice(&0u32.to_le_bytes());
}

/// Frame a single TL body, consuming one msg id and one sequence slot.
pub fn wrap_single(body: &[u8], session: &mut Session) -> Vec<u8> {
    let msg_id = session.next_msg_id();
    let seq_no = session.next_seq_no();

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    push_header(&mut frame, session, msg_id, seq_no);
    frame.extend_from_slice(body);
    frame
}

/// Frame several TL bodies as one container.
///
/// Each inner message consumes its own msg id and sequence slot, in order;
/// the container frame then consumes one more of each.
pub fn wrap_container(bodies: &[Vec<u8>], session: &mut Session) -> Vec<u8> {
    let mut inner = Vec::new();
    for body in bodies {
        let msg_id = session.next_msg_id();
        let seq_no = session.next_seq_no();
        inner.extend_from_slice(&msg_id.0.to_le_bytes());
        inner.extend_from_slice(&seq_no.to_le_bytes());
        inner.extend_from_slice(&(body.len() as u32).to_le_bytes());
        inner.extend_from_slice(body);
    }

    let msg_id = session.next_msg_id();
    let seq_no = session.next_seq_no();

    let mut frame = Vec::with_capacity(HEADER_LEN + 8 + inner.len());
    push_header(&mut frame, session, msg_id, seq_no);
    frame.extend_from_slice(&CONTAINER_ID.to_le_bytes());
    frame.extend_from_slice(&(bodies.len() as u32).to_le_bytes());
    frame.extend_from_slice(&inner);
    frame
}

/// TL bytes of a `msgs_ack` covering `msg_ids`, in order.
pub fn build_ack(msg_ids: &[MessageId]) -> Vec<u8> {
    let ack = MsgsAck { msg_ids: msg_ids.iter().map(|id| id.0 as i64).collect() };
    Object::MsgsAck(ack).to_bytes()
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse a decrypted frame (possibly still carrying cipher padding).
///
/// Returns the outer metadata plus the inner messages: the container's
/// records in original order, or the whole body as one message.
pub fn unwrap_frame(frame: &[u8]) -> Result<(FrameMeta, Vec<InnerMessage>), FrameError> {
    if frame.len() < HEADER_LEN {
        return Err(FrameError::TooShort { len: frame.len() });
    }

    let meta = FrameMeta {
        salt: frame[..8].try_into().unwrap(),
        session_id: frame[8..16].try_into().unwrap(),
        msg_id: MessageId(u64::from_le_bytes(frame[16..24].try_into().unwrap())),
        seq_no: u32::from_le_bytes(frame[24..28].try_into().unwrap()),
    };
    let body = &frame[HEADER_LEN..];

    let is_container =
        body.len() >= 4 && u32::from_le_bytes(body[..4].try_into().unwrap()) == CONTAINER_ID;
    if !is_container {
        let single = InnerMessage { msg_id: meta.msg_id, seq_no: meta.seq_no, body: body.to_vec() };
        return Ok((meta, vec![single]));
    }

    if body.len() < 8 {
        return Err(FrameError::TruncatedContainer);
    }
    let count = u32::from_le_bytes(body[4..8].try_into().unwrap()) as usize;

    let mut messages = Vec::new();
    let mut off = 8;
    for _ in 0..count {
        if body.len() < off + 16 {
            return Err(FrameError::TruncatedContainer);
        }
        let msg_id = MessageId(u64::from_le_bytes(body[off..off + 8].try_into().unwrap()));
        let seq_no = u32::from_le_bytes(body[off + 8..off + 12].try_into().unwrap());
        let len = u32::from_le_bytes(body[off + 12..off + 16].try_into().unwrap()) as usize;

        let start = off + 16;
        let end = match start.checked_add(len) {
            Some(end) if end <= body.len() => end,
            _ => return Err(FrameError::TruncatedContainer),
        };
        messages.push(InnerMessage { msg_id, seq_no, body: body[start..end].to_vec() });
        off = end;
    }

    Ok((meta, messages))
}
