// Object-graph snapshot wire format.
//
// # Modules
//
// - `tag`       - Closed wire type-tag table and byte mapping
// - `cursor`    - Bounds-checked big-endian byte cursor
// - `error`     - DecodeError (OutOfBounds / TypeMismatch / ProtocolViolation)
// - `registry`  - Schema registry of object-model nodes
// - `tree`      - Value trees, slots and the per-call read session
// - `state`     - ParseState: cursor + registry + decoded trees, with rollback
// - `primitive` - Tagged and raw scalar readers
// - `decoder`   - Descriptions, objects, object refs and arrays
// - `encoder`   - Fixture encoder emitting the same format

pub mod cursor;
pub mod decoder;
pub mod encoder;
pub mod error;
mod primitive;
pub mod registry;
pub mod state;
pub mod tag;
pub mod tree;

// Re-export key types for convenience.
pub use cursor::{ByteCursor, WireLong};
pub use decoder::ArrayHeader;
pub use encoder::WireEncoder;
pub use error::DecodeError;
pub use registry::{ModelId, ObjectModelNode, SchemaRegistry};
pub use state::{DecodeOptions, ParseState, RefScope};
pub use tag::TypeTag;
pub use tree::{ArrayValue, BitVector, InstanceId, ReadSession, Slot, Value, ValueTree};
