// Snapshot streams.
//
// A snapshot buffer is a sequence of records, decoded until the buffer is
// exhausted:
//
//   record := Description | DescriptionRef
//           | [MultipleDescriptions] (Object | Array | Null)
//
// The batch ahead of an `Object` names the root schema; ahead of an `Array` it
// names the element schema. `SnapshotDecoder` keeps one schema registry across
// buffers so later snapshots can refer to schemas sent earlier.

use crate::wire::error::{DecodeError, Result};
use crate::wire::registry::{ModelId, SchemaRegistry};
use crate::wire::state::{DecodeOptions, ParseState};
use crate::wire::tag::TypeTag;
use crate::wire::tree::{ArrayValue, InstanceId, ReadSession, ValueTree};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One top-level entry of a snapshot buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A schema definition or reference.
    Schema(ModelId),
    /// An object graph; `root` indexes into [`Snapshot::trees`] by id.
    Object { model: ModelId, root: InstanceId },
    Array {
        element_model: Option<ModelId>,
        array: ArrayValue,
    },
    /// An explicit null payload, possibly preceded by a schema batch.
    Null { model: Option<ModelId> },
}

/// Everything decoded from one buffer.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub records: Vec<Record>,
    /// Flat accumulator of every decoded instance, children before parents.
    pub trees: Vec<ValueTree>,
}

impl Snapshot {
    /// Most recently decoded tree with instance id `id`.
    pub fn tree(&self, id: InstanceId) -> Option<&ValueTree> {
        self.trees.iter().rev().find(|t| t.id == id)
    }

    /// Trees without a parent, in decode order.
    pub fn roots(&self) -> impl Iterator<Item = &ValueTree> {
        self.trees.iter().filter(|t| t.parent_id.is_none())
    }

    pub fn children_of(&self, id: InstanceId) -> impl Iterator<Item = &ValueTree> {
        self.trees.iter().filter(move |t| t.parent_id == Some(id))
    }

    /// Index of the tree a slot of `trees[parent]` points to. Children are
    /// appended before their parent, so the match is the latest tree with
    /// that id ahead of the parent, which stays exact when ids are reused.
    pub fn child_index(&self, parent: usize, id: InstanceId) -> Option<usize> {
        self.trees
            .get(..parent)?
            .iter()
            .rposition(|t| t.id == id)
    }

    pub fn object_roots(&self) -> impl Iterator<Item = (ModelId, InstanceId)> + '_ {
        self.records.iter().filter_map(|r| match r {
            Record::Object { model, root } => Some((*model, *root)),
            _ => None,
        })
    }
}

/// Decode every record remaining in `state`.
pub fn read_records(state: &mut ParseState) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    while !state.is_at_end() {
        let record = read_record(state)?;
        log::trace!("record ending at offset {}: {record:?}", state.position());
        records.push(record);
    }
    Ok(records)
}

/// Decode the next record. On failure the state is left where it was.
pub fn read_record(state: &mut ParseState) -> Result<Record> {
    state.atomic(|s| {
        if matches!(
            s.peek_tag(),
            Some(TypeTag::Description | TypeTag::DescriptionRef)
        ) {
            return s.read_data_description().map(Record::Schema);
        }

        let batch = s.possibly_read_descriptions(false)?;
        let position = s.position();
        match s.peek_tag() {
            Some(TypeTag::Object) => {
                let model = batch.ok_or_else(|| {
                    DecodeError::violation(position, "object record without a schema")
                })?;
                let root = s.read_object(model)?;
                Ok(Record::Object { model, root })
            }
            Some(TypeTag::Array) => {
                let mut session = ReadSession::new();
                let array = s
                    .decode_array_body(batch, None, None, &mut session)?
                    .ok_or_else(|| DecodeError::violation(position, "array record is null"))?;
                Ok(Record::Array {
                    element_model: batch,
                    array,
                })
            }
            Some(TypeTag::Null) => {
                s.check_null();
                Ok(Record::Null { model: batch })
            }
            Some(other) => Err(DecodeError::violation(
                position,
                format!("{other} cannot start a snapshot record"),
            )),
            None => match s.cursor().peek_raw_byte() {
                Some(byte) => Err(DecodeError::violation(
                    position,
                    format!("unknown tag byte {byte:#04X}"),
                )),
                None => Err(DecodeError::OutOfBounds {
                    position,
                    needed: 1,
                    length: s.len(),
                }),
            },
        }
    })
}

/// One-shot decode of a single buffer with a fresh registry.
pub fn decode_snapshot(buffer: impl Into<Vec<u8>>) -> Result<(Snapshot, SchemaRegistry)> {
    let mut decoder = SnapshotDecoder::new();
    let snapshot = decoder.decode(buffer)?;
    Ok((snapshot, decoder.into_registry()))
}

/// Decode independent buffers in parallel, each with its own registry.
#[cfg(feature = "parallel")]
pub fn decode_many<B>(buffers: &[B]) -> Vec<Result<(Snapshot, SchemaRegistry)>>
where
    B: AsRef<[u8]> + Sync,
{
    use rayon::prelude::*;

    buffers
        .par_iter()
        .map(|buf| decode_snapshot(buf.as_ref().to_vec()))
        .collect()
}

// ---------------------------------------------------------------------------
// SnapshotDecoder
// ---------------------------------------------------------------------------

/// Decodes a series of snapshot buffers that share one schema registry.
#[derive(Debug, Default)]
pub struct SnapshotDecoder {
    registry: SchemaRegistry,
    options: DecodeOptions,
    bytes_decoded: u64,
    snapshots_decoded: u64,
}

impl SnapshotDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DecodeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Start from schemas registered elsewhere.
    pub fn with_registry(registry: SchemaRegistry, options: DecodeOptions) -> Self {
        Self {
            registry,
            options,
            ..Self::default()
        }
    }

    /// Decode one buffer. Schemas from records that completed before a
    /// failure stay registered.
    pub fn decode(&mut self, buffer: impl Into<Vec<u8>>) -> Result<Snapshot> {
        let registry = std::mem::take(&mut self.registry);
        let mut state = ParseState::with_registry(buffer, registry).with_options(self.options);
        let result = read_records(&mut state);
        let len = state.len() as u64;
        let (registry, trees) = state.into_parts();
        self.registry = registry;

        let records = result?;
        self.bytes_decoded += len;
        self.snapshots_decoded += 1;
        log::debug!(
            "snapshot {}: {} record(s), {} tree(s), {} schema(s) known",
            self.snapshots_decoded,
            records.len(),
            trees.len(),
            self.registry.len()
        );
        Ok(Snapshot { records, trees })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> SchemaRegistry {
        self.registry
    }

    /// Total bytes of successfully decoded buffers.
    pub fn bytes_decoded(&self) -> u64 {
        self.bytes_decoded
    }

    pub fn snapshots_decoded(&self) -> u64 {
        self.snapshots_decoded
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
