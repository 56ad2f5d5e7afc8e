//! The immutable constructor registry.

use std::fmt;

use crate::Identifiable;
use crate::deserialize::{self, Buffer, Cursor, Deserializable};
use crate::types::{Message, MsgsAck, Object};

/// Errors that can occur while building a [`Registry`].
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryError {
    /// Two constructors were registered under the same 32-bit id.
    DuplicateConstructorId {
        /// The id claimed twice.
        id: u32,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateConstructorId { id } => {
                write!(f, "constructor id {id:#010x} registered twice")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

struct Entry {
    id: u32,
    name: &'static str,
    decode: fn(Buffer<'_, '_>) -> deserialize::Result<Object>,
}

/// Maps 32-bit constructor ids to names and typed decoders.
///
/// Built once at process start and shared by reference afterwards. Both
/// ends of a connection must hold identical registries: a mismatch is
/// undetectable at encode time and misdecodes on receive. Id lookup is
/// injective by construction — [`Registry::register`] rejects duplicates.
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    /// An empty registry. Most callers want [`Registry::core`].
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// The schema understood by every courier endpoint: `message` and
    /// `msgs_ack`.
    pub fn core() -> Self {
        let mut registry = Self::empty();
        registry.register::<Message>("message").expect("core schema ids are distinct");
        registry.register::<MsgsAck>("msgs_ack").expect("core schema ids are distinct");
        registry
    }

    /// Register constructor `T` under `name`.
    ///
    /// Fails if another constructor already claimed `T::CONSTRUCTOR_ID`.
    pub fn register<T>(&mut self, name: &'static str) -> Result<(), RegistryError>
    where
        T: Identifiable + Deserializable + Into<Object>,
    {
        let id = T::CONSTRUCTOR_ID;
        if self.entries.iter().any(|e| e.id == id) {
            return Err(RegistryError::DuplicateConstructorId { id });
        }

        fn decode<U: Deserializable + Into<Object>>(
            buf: Buffer<'_, '_>,
        ) -> deserialize::Result<Object> {
            U::deserialize(buf).map(Into::into)
        }

        self.entries.push(Entry { id, name, decode: decode::<T> });
        Ok(())
    }

    /// The name registered for `id`, if any.
    pub fn name_for_id(&self, id: u32) -> Option<&'static str> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.name)
    }

    /// The constructor id registered under `name`, if any.
    pub fn id_for_name(&self, name: &str) -> Option<u32> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.id)
    }

    /// Decode one object, reading its constructor id from `buf`.
    ///
    /// An id with no registered entry is a hard error.
    pub fn decode_from(&self, buf: Buffer<'_, '_>) -> deserialize::Result<Object> {
        let id = u32::deserialize(buf)?;
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or(deserialize::Error::UnexpectedConstructor { id })?;
        (entry.decode)(buf)
    }

    /// Decode one object from the start of `bytes`.
    ///
    /// Trailing bytes are ignored; frame bodies may carry cipher padding
    /// after the object.
    pub fn decode(&self, bytes: &[u8]) -> deserialize::Result<Object> {
        let mut cursor = Cursor::from_slice(bytes);
        self.decode_from(&mut cursor)
    }
}
