// Parse state: the cursor plus everything accumulated while decoding.
//
// A `ParseState` is owned by exactly one decode session. Public read methods
// are transactional: on error the cursor, the registry and the decoded-tree
// accumulator are restored to what they were when the call started.

use super::cursor::ByteCursor;
use super::error::Result;
use super::registry::{ModelId, SchemaRegistry};
use super::tree::{InstanceId, InstanceIndex, ValueTree};

/// Default recursion limit for nested object payloads.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Where `ObjectRef` payloads are looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefScope {
    /// Only instances decoded by the current top-level call.
    Session,
    /// The current call first, then every tree decoded so far by this state.
    #[default]
    State,
}

/// Decoder tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum object/array nesting before the payload is rejected.
    pub max_depth: usize,
    pub ref_scope: RefScope,
    /// Reject array headers whose element flags disagree with each other or
    /// with the slot's schema.
    pub verify_array_headers: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            ref_scope: RefScope::State,
            verify_array_headers: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    position: usize,
    registry_len: usize,
    trees_len: usize,
    pending_len: usize,
    depth: usize,
}

/// Threaded decoding context for one buffer.
#[derive(Debug, Clone)]
pub struct ParseState {
    pub(crate) cursor: ByteCursor,
    pub(crate) registry: SchemaRegistry,
    pub(crate) trees: Vec<ValueTree>,
    /// Latest position of each instance id in `trees`.
    instances: InstanceIndex,
    pub(crate) options: DecodeOptions,
    /// Ids of descriptions whose bodies are being decoded right now.
    pub(crate) pending: Vec<ModelId>,
    pub(crate) depth: usize,
}

impl ParseState {
    pub fn new(buffer: impl Into<Vec<u8>>) -> Self {
        Self::with_registry(buffer, SchemaRegistry::new())
    }

    /// Continue a session: schemas registered from earlier buffers stay valid.
    pub fn with_registry(buffer: impl Into<Vec<u8>>, registry: SchemaRegistry) -> Self {
        Self {
            cursor: ByteCursor::new(buffer),
            registry,
            trees: Vec::new(),
            instances: InstanceIndex::default(),
            options: DecodeOptions::default(),
            pending: Vec::new(),
            depth: 0,
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cursor.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.cursor.is_at_end()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    pub fn cursor(&self) -> &ByteCursor {
        &self.cursor
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn decoded_trees(&self) -> &[ValueTree] {
        &self.trees
    }

    /// Most recently decoded tree with instance id `id`.
    pub fn find_tree(&self, id: InstanceId) -> Option<&ValueTree> {
        self.instances.get(id).map(|pos| &self.trees[pos])
    }

    /// Whether any tree with instance id `id` has been decoded.
    pub fn has_instance(&self, id: InstanceId) -> bool {
        self.instances.get(id).is_some()
    }

    /// Trees whose parent is `id`, in decode order.
    pub fn children_of(&self, id: InstanceId) -> impl Iterator<Item = &ValueTree> {
        self.trees.iter().filter(move |t| t.parent_id == Some(id))
    }

    /// Detach the registry so it can seed the state for the next buffer.
    pub fn into_registry(self) -> SchemaRegistry {
        self.registry
    }

    pub fn into_parts(self) -> (SchemaRegistry, Vec<ValueTree>) {
        (self.registry, self.trees)
    }

    pub(crate) fn push_tree(&mut self, tree: ValueTree) {
        self.instances.push(tree.id);
        self.trees.push(tree);
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            position: self.cursor.position(),
            registry_len: self.registry.len(),
            trees_len: self.trees.len(),
            pending_len: self.pending.len(),
            depth: self.depth,
        }
    }

    pub(crate) fn rollback(&mut self, cp: Checkpoint) {
        self.cursor.restore(cp.position);
        self.registry.truncate(cp.registry_len);
        self.trees.truncate(cp.trees_len);
        self.instances.truncate(cp.trees_len);
        self.pending.truncate(cp.pending_len);
        self.depth = cp.depth;
    }

    /// Run `f`, restoring the state if it fails.
    pub(crate) fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let cp = self.checkpoint();
        let result = f(self);
        if let Err(e) = &result {
            log::trace!("rolling back to offset {} after: {e}", cp.position);
            self.rollback(cp);
        }
        result
    }
}
