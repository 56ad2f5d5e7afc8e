//! The application-level objects of the core schema.
//!
//! Exactly two constructors exist today; both ends of a connection must
//! register the same ids (see [`crate::Registry::core`]).

use crate::Identifiable;
use crate::deserialize::{Buffer, Deserializable, Result};
use crate::serialize::Serializable;

/// A user-to-user chat message.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Sender identifier. Stamped by the relay on delivery.
    pub from_user_id: i64,
    /// Recipient identifier.
    pub to_user_id: i64,
    /// Message body.
    pub text: String,
}

impl Identifiable for Message {
    const CONSTRUCTOR_ID: u32 = 0x5c4d7a1f;
}

impl Serializable for Message {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.from_user_id.serialize(buf);
        self.to_user_id.serialize(buf);
        self.text.serialize(buf);
    }
}

impl Deserializable for Message {
    fn deserialize(buf: Buffer<'_, '_>) -> Result<Self> {
        Ok(Self {
            from_user_id: i64::deserialize(buf)?,
            to_user_id: i64::deserialize(buf)?,
            text: String::deserialize(buf)?,
        })
    }
}

/// Acknowledges receipt of the listed message ids.
#[derive(Clone, Debug, PartialEq)]
pub struct MsgsAck {
    /// The message ids being acknowledged, in receive order.
    pub msg_ids: Vec<i64>,
}

impl Identifiable for MsgsAck {
    const CONSTRUCTOR_ID: u32 = 0xddf60e02;
}

impl Serializable for MsgsAck {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.msg_ids.serialize(buf);
    }
}

impl Deserializable for MsgsAck {
    fn deserialize(buf: Buffer<'_, '_>) -> Result<Self> {
        Ok(Self { msg_ids: Vec::<i64>::deserialize(buf)? })
    }
}

/// Every object a courier endpoint can exchange.
///
/// Serializing writes the variant's constructor id followed by its fields;
/// decoding happens through [`crate::Registry::decode`], which checks the
/// id against the registered schema.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    /// `message` — a chat message.
    Message(Message),
    /// `msgs_ack` — acknowledgment of received message ids.
    MsgsAck(MsgsAck),
}

impl Serializable for Object {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        match self {
            Self::Message(x) => {
                Message::CONSTRUCTOR_ID.serialize(buf);
                x.serialize(buf);
            }
            Self::MsgsAck(x) => {
                MsgsAck::CONSTRUCTOR_ID.serialize(buf);
                x.serialize(buf);
            }
        }
    }
}

impl From<Message> for Object {
    fn from(x: Message) -> Self {
        Self::Message(x)
    }
}

impl From<MsgsAck> for Object {
    fn from(x: MsgsAck) -> Self {
        Self::MsgsAck(x)
    }
}
