//! TL binary serialization for the courier protocol.
//!
//! # Overview
//!
//! | Module          | Contents                                                |
//! |-----------------|---------------------------------------------------------|
//! | [`serialize`]   | The [`Serializable`] trait and primitive impls          |
//! | [`deserialize`] | The [`Deserializable`] trait, [`Cursor`] and errors     |
//! | [`types`]       | The application objects (`message`, `msgs_ack`)         |
//! | [`registry`]    | The immutable constructor [`Registry`]                  |
//!
//! The registry is built once at startup ([`Registry::core`]) and passed by
//! reference afterwards; decoding is a pure function of `(registry, bytes)`
//! and produces a checked [`Object`] variant, never an untyped field bag.
//!
//! ```rust
//! use courier_tl::{Message, Object, Registry, Serializable};
//!
//! let registry = Registry::core();
//! let wire = Object::Message(Message {
//!     from_user_id: 1,
//!     to_user_id: 2,
//!     text: "hi".into(),
//! })
//! .to_bytes();
//!
//! match registry.decode(&wire).unwrap() {
//!     Object::Message(m) => assert_eq!(m.text, "hi"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

#![deny(unsafe_code)]

pub mod deserialize;
pub mod registry;
pub mod serialize;
pub mod types;

pub use deserialize::{Cursor, Deserializable};
pub use registry::{Registry, RegistryError};
pub use serialize::Serializable;
pub use types::{Message, MsgsAck, Object};

/// Every registered type has a unique 32-bit constructor ID.
pub trait Identifiable {
    /// The constructor ID this type is encoded under.
    const CONSTRUCTOR_ID: u32;
}
