//! Snapwire: decoder for a self-describing binary object-graph snapshot format.
//!
//! The crate provides:
//! - The wire layer (`wire`): tags, cursor, schema registry, value trees and
//!   the transactional `ParseState` decoder
//! - Snapshot streams (`snapshot`): top-level records and a decoder that keeps
//!   schemas across buffers
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use snapwire::snapshot::decode_snapshot;
//! use snapwire::wire::{InstanceId, Slot, TypeTag, Value, WireEncoder};
//!
//! let mut enc = WireEncoder::new();
//! enc.multiple_descriptions(1)
//!     .object_description(1, Some("Pos"), 2)
//!     .scalar_description(2, Some("x"), TypeTag::Int)
//!     .scalar_description(3, Some("y"), TypeTag::Int)
//!     .object(1)
//!     .int(3)
//!     .int(4);
//!
//! let (snapshot, registry) = decode_snapshot(enc.into_bytes()).unwrap();
//! let root = snapshot.tree(InstanceId(1)).unwrap();
//! assert_eq!(root.slots[1], Slot::Value(Value::Int(4)));
//! assert_eq!(registry.len(), 3);
//! ```

pub mod io;
pub mod snapshot;
pub mod wire;

#[cfg(feature = "cli")]
pub mod cli;
