// Decoded value trees and the per-call read session.
//
// Trees live in a flat accumulator; parent, child and schema links are plain
// ids, never owning references.

use std::collections::HashMap;
use std::fmt;

use super::cursor::WireLong;
use super::registry::ModelId;
use super::tag::TypeTag;

/// Instance id transmitted with every object payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u16);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Fixed-length boolean sequence, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitVector(pub Vec<bool>);

impl BitVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<bool> {
        self.0.get(i).copied()
    }

    /// Pack into 32-bit words, LSB first.
    pub fn to_words(&self) -> Vec<u32> {
        let mut words = vec![0u32; self.0.len().div_ceil(32)];
        for (i, &bit) in self.0.iter().enumerate() {
            if bit {
                words[i / 32] |= 1 << (i % 32);
            }
        }
        words
    }
}

impl From<Vec<bool>> for BitVector {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

/// A decoded scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(WireLong),
    Float(f32),
    Boolean(bool),
    String(String),
    BitVector(BitVector),
}

impl Value {
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Byte(_) => TypeTag::Byte,
            Self::Short(_) => TypeTag::Short,
            Self::Int(_) => TypeTag::Int,
            Self::Long(_) => TypeTag::Long,
            Self::Float(_) => TypeTag::Float,
            Self::Boolean(_) => TypeTag::Boolean,
            Self::String(_) => TypeTag::String,
            Self::BitVector(_) => TypeTag::BitVector,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{}", v.as_i64()),
            Self::Float(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::BitVector(v) => {
                f.write_str("0b")?;
                for &bit in &v.0 {
                    f.write_str(if bit { "1" } else { "0" })?;
                }
                Ok(())
            }
        }
    }
}

/// A decoded array payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub element_type: TypeTag,
    /// Schema resolved for object elements, if any was transmitted.
    pub element_model: Option<ModelId>,
    pub elements: Vec<Slot>,
}

/// One positional entry of a value tree, or one array element.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Null,
    Value(Value),
    /// A nested object decoded in this call; its tree is in the accumulator.
    Object(InstanceId),
    /// A reference to an instance decoded earlier.
    Ref(InstanceId),
    Array(ArrayValue),
}

impl Slot {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Instance id of a nested object or reference.
    pub fn instance(&self) -> Option<InstanceId> {
        match self {
            Self::Object(id) | Self::Ref(id) => Some(*id),
            _ => None,
        }
    }
}

/// One decoded object instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTree {
    pub id: InstanceId,
    pub parent_id: Option<InstanceId>,
    pub model_id: Option<ModelId>,
    /// One entry per child of the model, in model order.
    pub slots: Vec<Slot>,
}

impl ValueTree {
    /// Instance ids of directly nested objects, in slot order.
    pub fn child_instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Object(id) => Some(*id),
            _ => None,
        })
    }
}

/// Latest position of each instance id in an append-only list.
///
/// Every push remembers the entry it shadowed, so truncation restores the
/// index in time proportional to the entries removed.
#[derive(Debug, Clone, Default)]
pub(crate) struct InstanceIndex {
    latest: HashMap<InstanceId, usize>,
    shadowed: Vec<(InstanceId, Option<usize>)>,
}

impl InstanceIndex {
    pub(crate) fn push(&mut self, id: InstanceId) {
        let prev = self.latest.insert(id, self.shadowed.len());
        self.shadowed.push((id, prev));
    }

    pub(crate) fn get(&self, id: InstanceId) -> Option<usize> {
        self.latest.get(&id).copied()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        while self.shadowed.len() > len {
            let Some((id, prev)) = self.shadowed.pop() else {
                break;
            };
            match prev {
                Some(pos) => self.latest.insert(id, pos),
                None => self.latest.remove(&id),
            };
        }
    }
}

/// Ledger of instances decoded during one top-level read call.
#[derive(Debug, Clone, Default)]
pub struct ReadSession {
    seen: Vec<(InstanceId, Option<ModelId>)>,
    index: InstanceIndex,
}

impl ReadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: InstanceId, model: Option<ModelId>) {
        self.index.push(id);
        self.seen.push((id, model));
    }

    /// Latest entry for `id`, if it was decoded in this session.
    pub fn lookup(&self, id: InstanceId) -> Option<(InstanceId, Option<ModelId>)> {
        self.index.get(id).map(|pos| self.seen[pos])
    }

    pub fn seen(&self) -> &[(InstanceId, Option<ModelId>)] {
        &self.seen
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget every entry recorded after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.seen.truncate(len);
        self.index.truncate(len);
    }
}
