// Schema registry: object-model nodes keyed by their wire id.
//
// Append-only arena plus an id index. Nodes are never mutated once inserted;
// later wire appearances of a schema are `DescriptionRef`s resolved here.

use std::collections::HashMap;
use std::fmt;

use super::tag::TypeTag;

/// Wire id of an object-model node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u32);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node of a decoded schema tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectModelNode {
    pub id: ModelId,
    pub name: Option<String>,
    pub is_type_primitive: bool,
    pub data_type: TypeTag,
    /// Element type, only for `Array` nodes.
    pub data_sub_type: Option<TypeTag>,
    /// Ordered child ids, only for `Object` nodes.
    pub children: Option<Vec<ModelId>>,
}

impl ObjectModelNode {
    pub fn scalar(id: ModelId, name: Option<String>, data_type: TypeTag) -> Self {
        Self {
            id,
            name,
            is_type_primitive: true,
            data_type,
            data_sub_type: None,
            children: None,
        }
    }

    pub fn object(id: ModelId, name: Option<String>, children: Vec<ModelId>) -> Self {
        Self {
            id,
            name,
            is_type_primitive: false,
            data_type: TypeTag::Object,
            data_sub_type: None,
            children: Some(children),
        }
    }

    pub fn array(id: ModelId, name: Option<String>, element: TypeTag) -> Self {
        Self {
            id,
            name,
            is_type_primitive: false,
            data_type: TypeTag::Array,
            data_sub_type: Some(element),
            children: None,
        }
    }

    /// Child ids of an object node; empty for every other node.
    pub fn child_ids(&self) -> &[ModelId] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Object ⇔ children, Array ⇔ sub type.
    pub fn is_well_formed(&self) -> bool {
        (self.data_type == TypeTag::Object) == self.children.is_some()
            && (self.data_type == TypeTag::Array) == self.data_sub_type.is_some()
    }
}

/// Outcome of [`SchemaRegistry::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    /// First sighting: the node was appended.
    New,
    /// The id was already registered with an identical node.
    Unchanged,
    /// The id was already registered with a different node; nothing changed.
    Conflict,
}

/// Id-indexed, append-only collection of schema nodes.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    nodes: Vec<ObjectModelNode>,
    index: HashMap<ModelId, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: ObjectModelNode) -> Insert {
        match self.index.get(&node.id) {
            Some(&slot) if self.nodes[slot] == node => Insert::Unchanged,
            Some(_) => Insert::Conflict,
            None => {
                self.index.insert(node.id, self.nodes.len());
                self.nodes.push(node);
                Insert::New
            }
        }
    }

    pub fn get(&self, id: ModelId) -> Option<&ObjectModelNode> {
        self.index.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectModelNode> {
        self.nodes.iter()
    }

    /// Drop every node registered after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        for node in self.nodes.drain(len.min(self.nodes.len())..) {
            self.index.remove(&node.id);
        }
    }
}
