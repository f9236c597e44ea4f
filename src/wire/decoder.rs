// Recursive-descent decoder for descriptions, objects and arrays.
//
// Grammar positions are decided by peeking the next tag, so no path ever has
// to rewind over bytes another path already consumed. Every unsupported
// branch (enums, arrays of arrays) is a protocol violation, never a silent
// skip.

use super::error::{DecodeError, Result};
use super::registry::{Insert, ModelId, ObjectModelNode};
use super::state::{ParseState, RefScope};
use super::tag::TypeTag;
use super::tree::{ArrayValue, InstanceId, ReadSession, Slot, ValueTree};

/// The fixed part of an array payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayHeader {
    pub is_primitive_element: bool,
    pub element_type: TypeTag,
    pub size: u32,
}

impl ParseState {
    // -----------------------------------------------------------------------
    // Public entry points
    // -----------------------------------------------------------------------

    /// Decode one inline `Description` (registering it) or one
    /// `DescriptionRef`, returning the schema id either way.
    pub fn read_data_description(&mut self) -> Result<ModelId> {
        self.atomic(|s| s.decode_description())
    }

    /// Optional `MultipleDescriptions` batch ahead of a payload.
    ///
    /// With `force` the batch is mandatory. Returns the id of the last
    /// description in the batch (or the trailing reference when the batch is
    /// empty), and `None` when no batch is present.
    pub fn possibly_read_descriptions(&mut self, force: bool) -> Result<Option<ModelId>> {
        self.atomic(|s| s.decode_description_batch(force))
    }

    /// Decode one full object graph rooted at `model_id`, returning the root
    /// instance id. The root tree is the last one appended to
    /// [`ParseState::decoded_trees`].
    pub fn read_object(&mut self, model_id: ModelId) -> Result<InstanceId> {
        self.atomic(|s| {
            let position = s.position();
            match s.cursor.peek_raw_byte() {
                Some(found) if found == TypeTag::Object.as_byte() => {}
                Some(found) => {
                    return Err(DecodeError::TypeMismatch {
                        position,
                        expected: TypeTag::Object,
                        found,
                    });
                }
                None => return Err(s.end_of_buffer()),
            }
            let mut session = ReadSession::new();
            let root = s.decode_object(Some(model_id), None, &mut session)?;
            log::debug!(
                "decoded object {root} (schema {model_id}, {} instance(s)) ending at offset {}",
                session.len(),
                s.position()
            );
            Ok(root)
        })
    }

    /// Decode one slot payload described by `model_id`: a scalar, an array, a
    /// nested object, an object reference, or `Null` (yielding `None`).
    ///
    /// On error, entries recorded into `session` by this call are removed.
    pub fn read_raw_object(
        &mut self,
        model_id: Option<ModelId>,
        parent_id: Option<InstanceId>,
        session: &mut ReadSession,
    ) -> Result<Option<Slot>> {
        let mark = session.len();
        let result = self.atomic(|s| s.decode_slot(model_id, parent_id, session));
        if result.is_err() {
            session.truncate(mark);
        }
        result
    }

    /// Consume an array header.
    pub fn begin_array(&mut self) -> Result<ArrayHeader> {
        self.atomic(|s| s.decode_array_header())
    }

    /// Decode one array payload with a fresh read session.
    pub fn read_array(&mut self) -> Result<Option<ArrayValue>> {
        self.atomic(|s| {
            let mut session = ReadSession::new();
            let array = s.decode_array(None, None, &mut session)?;
            if let Some(array) = &array {
                log::debug!(
                    "decoded {} array of {} element(s) ending at offset {}",
                    array.element_type,
                    array.elements.len(),
                    s.position()
                );
            }
            Ok(array)
        })
    }

    /// Decode one array payload, threading an existing session. Object
    /// elements are linked to `parent_id`.
    pub fn read_array_with_session(
        &mut self,
        parent_id: Option<InstanceId>,
        session: &mut ReadSession,
    ) -> Result<Option<ArrayValue>> {
        let mark = session.len();
        let result = self.atomic(|s| s.decode_array(parent_id, None, session));
        if result.is_err() {
            session.truncate(mark);
        }
        result
    }

    // -----------------------------------------------------------------------
    // Descriptions
    // -----------------------------------------------------------------------

    fn decode_description(&mut self) -> Result<ModelId> {
        let position = self.position();
        match self.read_tag()? {
            TypeTag::Description => self.decode_description_body(position),
            TypeTag::DescriptionRef => self.decode_description_ref(),
            other => Err(DecodeError::violation(
                position,
                format!("expected Description or DescriptionRef, found {other}"),
            )),
        }
    }

    /// Id of a `DescriptionRef` (tag already consumed). The target must be
    /// registered, or be an enclosing description still being decoded.
    fn decode_description_ref(&mut self) -> Result<ModelId> {
        let position = self.position();
        let id = ModelId(self.cursor.read_raw_int()?);
        if self.registry.contains(id) || self.pending.contains(&id) {
            Ok(id)
        } else {
            Err(DecodeError::violation(
                position,
                format!("reference to unregistered description {id}"),
            ))
        }
    }

    fn decode_description_body(&mut self, start: usize) -> Result<ModelId> {
        let id = ModelId(self.cursor.read_raw_int()?);
        let name = self.read_string()?;
        let is_type_primitive = self.read_boolean()?;
        let type_position = self.position();
        let data_type = self.read_tag()?;

        let node = match data_type {
            TypeTag::Object => {
                let count = self.cursor.read_raw_int()? as usize;
                self.descend(type_position)?;
                self.pending.push(id);
                let mut children = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    children.push(self.decode_description()?);
                }
                self.pending.pop();
                self.ascend();
                ObjectModelNode {
                    id,
                    name,
                    is_type_primitive,
                    data_type,
                    data_sub_type: None,
                    children: Some(children),
                }
            }
            TypeTag::Array => {
                let element_position = self.position();
                let element = self.read_tag()?;
                Self::check_array_element_type(element, element_position, id)?;
                ObjectModelNode {
                    id,
                    name,
                    is_type_primitive,
                    data_type,
                    data_sub_type: Some(element),
                    children: None,
                }
            }
            TypeTag::Byte
            | TypeTag::Short
            | TypeTag::Int
            | TypeTag::Long
            | TypeTag::Float
            | TypeTag::Boolean
            | TypeTag::String
            | TypeTag::BitVector => ObjectModelNode {
                id,
                name,
                is_type_primitive,
                data_type,
                data_sub_type: None,
                children: None,
            },
            TypeTag::Enum | TypeTag::EnumValue | TypeTag::EnumDescription => {
                return Err(DecodeError::violation(
                    type_position,
                    format!("{data_type} descriptions are not supported (schema {id})"),
                ));
            }
            TypeTag::Null
            | TypeTag::ObjectRef
            | TypeTag::Description
            | TypeTag::DescriptionRef
            | TypeTag::MultipleDescriptions
            | TypeTag::Unknown => {
                return Err(DecodeError::violation(
                    type_position,
                    format!("{data_type} is not a valid description type (schema {id})"),
                ));
            }
        };

        debug_assert!(node.is_well_formed(), "malformed schema node {id}");
        match self.registry.insert(node) {
            Insert::New => {
                log::debug!("registered schema {id} as {data_type}");
                Ok(id)
            }
            Insert::Unchanged => {
                log::trace!("schema {id} re-sent unchanged");
                Ok(id)
            }
            Insert::Conflict => Err(DecodeError::violation(
                start,
                format!("conflicting redefinition of schema {id}"),
            )),
        }
    }

    /// Arrays hold simple values or objects; nothing else is decodable.
    fn check_array_element_type(element: TypeTag, position: usize, id: ModelId) -> Result<()> {
        match element {
            TypeTag::Object => Ok(()),
            t if t.is_simple_type() => Ok(()),
            TypeTag::Array | TypeTag::Enum | TypeTag::EnumValue | TypeTag::EnumDescription => {
                Err(DecodeError::violation(
                    position,
                    format!("arrays of {element} are not supported (schema {id})"),
                ))
            }
            _ => Err(DecodeError::violation(
                position,
                format!("{element} is not a valid array element type (schema {id})"),
            )),
        }
    }

    fn decode_description_batch(&mut self, force: bool) -> Result<Option<ModelId>> {
        if !force && self.peek_tag() != Some(TypeTag::MultipleDescriptions) {
            return Ok(None);
        }
        self.expect_tag(TypeTag::MultipleDescriptions)?;
        let count = self.cursor.read_raw_int()?;
        if count == 0 {
            self.expect_tag(TypeTag::DescriptionRef)?;
            return self.decode_description_ref().map(Some);
        }
        let mut last = None;
        for _ in 0..count {
            last = Some(self.decode_description()?);
        }
        Ok(last)
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    fn decode_slot(
        &mut self,
        model_id: Option<ModelId>,
        parent_id: Option<InstanceId>,
        session: &mut ReadSession,
    ) -> Result<Option<Slot>> {
        if self.check_null() {
            return Ok(None);
        }
        let declared = model_id
            .and_then(|id| self.registry.get(id))
            .map(|node| (node.data_type, node.data_sub_type));

        match declared {
            Some((
                tag @ (TypeTag::Byte
                | TypeTag::Short
                | TypeTag::Int
                | TypeTag::Long
                | TypeTag::Float
                | TypeTag::Boolean
                | TypeTag::String
                | TypeTag::BitVector),
                _,
            )) => {
                self.expect_tag(tag)?;
                let value = self.read_raw_value(tag)?;
                log::trace!("slot {model_id:?} = {value}");
                Ok(Some(Slot::Value(value)))
            }
            Some((TypeTag::Array, element)) => Ok(self
                .decode_array(parent_id, element, session)?
                .map(Slot::Array)),
            Some((tag @ (TypeTag::Enum | TypeTag::EnumValue | TypeTag::EnumDescription), _)) => {
                Err(DecodeError::violation(
                    self.position(),
                    format!("{tag} values are not supported"),
                ))
            }
            Some((TypeTag::Object, _)) | None => self.decode_object_or_array(model_id, parent_id, session),
            Some((
                tag @ (TypeTag::Null
                | TypeTag::ObjectRef
                | TypeTag::Description
                | TypeTag::DescriptionRef
                | TypeTag::MultipleDescriptions
                | TypeTag::Unknown),
                _,
            )) => Err(DecodeError::violation(
                self.position(),
                format!("schema declares non-value type {tag}"),
            )),
        }
    }

    /// Object-typed (or not yet resolved) slot: the payload tag decides.
    fn decode_object_or_array(
        &mut self,
        model_id: Option<ModelId>,
        parent_id: Option<InstanceId>,
        session: &mut ReadSession,
    ) -> Result<Option<Slot>> {
        let position = self.position();
        match self.peek_tag() {
            Some(TypeTag::Object) => self
                .decode_object(model_id, parent_id, session)
                .map(|id| Some(Slot::Object(id))),
            Some(TypeTag::ObjectRef) => self.decode_object_ref(session).map(|id| Some(Slot::Ref(id))),
            Some(TypeTag::Array | TypeTag::MultipleDescriptions) => Ok(self
                .decode_array(parent_id, None, session)?
                .map(Slot::Array)),
            Some(other) => Err(DecodeError::violation(
                position,
                format!("expected Object, ObjectRef or Array payload, found {other}"),
            )),
            None => Err(self.bad_tag_at_cursor()),
        }
    }

    fn decode_object(
        &mut self,
        model_id: Option<ModelId>,
        parent_id: Option<InstanceId>,
        session: &mut ReadSession,
    ) -> Result<InstanceId> {
        self.expect_tag(TypeTag::Object)?;
        let id = InstanceId(self.cursor.read_raw_short()?);
        let position = self.position();

        let Some(model_id) = model_id else {
            return Err(DecodeError::violation(
                position,
                format!("object {id} has no schema"),
            ));
        };
        let children = match self.registry.get(model_id) {
            Some(node) if node.data_type == TypeTag::Object => node.child_ids().to_vec(),
            Some(node) => {
                return Err(DecodeError::violation(
                    position,
                    format!(
                        "schema {model_id} describes {}, not an object (instance {id})",
                        node.data_type
                    ),
                ));
            }
            None => {
                return Err(DecodeError::violation(
                    position,
                    format!("unknown schema {model_id} for object {id}"),
                ));
            }
        };

        self.descend(position)?;
        let mut slots = Vec::with_capacity(children.len());
        for child in children {
            let slot = self.decode_slot(Some(child), Some(id), session)?;
            slots.push(slot.unwrap_or(Slot::Null));
        }
        self.ascend();

        self.push_tree(ValueTree {
            id,
            parent_id,
            model_id: Some(model_id),
            slots,
        });
        session.record(id, Some(model_id));
        Ok(id)
    }

    fn decode_object_ref(&mut self, session: &ReadSession) -> Result<InstanceId> {
        self.expect_tag(TypeTag::ObjectRef)?;
        let position = self.position();
        let id = InstanceId(self.cursor.read_raw_short()?);
        let resolved = session.lookup(id).is_some()
            || (self.options.ref_scope == RefScope::State && self.has_instance(id));
        if resolved {
            log::trace!("reference to {id}");
            Ok(id)
        } else {
            Err(DecodeError::violation(
                position,
                format!("unresolved object reference {id}"),
            ))
        }
    }

    // -----------------------------------------------------------------------
    // Arrays
    // -----------------------------------------------------------------------

    fn decode_array_header(&mut self) -> Result<ArrayHeader> {
        self.expect_tag(TypeTag::Array)?;
        let is_primitive_element = self.read_boolean()?;
        let element_type = self.read_tag()?;
        let size = self.cursor.read_raw_int()?;
        Ok(ArrayHeader {
            is_primitive_element,
            element_type,
            size,
        })
    }

    /// `declared` is the element type from the slot's schema, if any.
    fn decode_array(
        &mut self,
        parent_id: Option<InstanceId>,
        declared: Option<TypeTag>,
        session: &mut ReadSession,
    ) -> Result<Option<ArrayValue>> {
        let element_model = self.decode_description_batch(false)?;
        self.decode_array_body(element_model, parent_id, declared, session)
    }

    /// Array payload whose element schema was already resolved.
    pub(crate) fn decode_array_body(
        &mut self,
        element_model: Option<ModelId>,
        parent_id: Option<InstanceId>,
        declared: Option<TypeTag>,
        session: &mut ReadSession,
    ) -> Result<Option<ArrayValue>> {
        if self.check_null() {
            return Ok(None);
        }
        let position = self.position();
        let header = self.decode_array_header()?;
        if self.options.verify_array_headers {
            if header.is_primitive_element != header.element_type.is_simple_type() {
                return Err(DecodeError::violation(
                    position,
                    format!(
                        "array of {} flagged as {}primitive",
                        header.element_type,
                        if header.is_primitive_element { "" } else { "non-" }
                    ),
                ));
            }
            if let Some(declared) = declared
                && declared != header.element_type
            {
                return Err(DecodeError::violation(
                    position,
                    format!(
                        "array of {} where schema declares {declared}",
                        header.element_type
                    ),
                ));
            }
        }

        self.descend(position)?;
        let size = header.size as usize;
        let mut elements = Vec::with_capacity(size.min(self.remaining()));
        match header.element_type {
            tag @ (TypeTag::Byte
            | TypeTag::Short
            | TypeTag::Int
            | TypeTag::Long
            | TypeTag::Float
            | TypeTag::Boolean
            | TypeTag::String
            | TypeTag::BitVector) => {
                for _ in 0..size {
                    let slot = if self.check_null() {
                        Slot::Null
                    } else {
                        self.expect_tag(tag)?;
                        Slot::Value(self.read_raw_value(tag)?)
                    };
                    elements.push(slot);
                }
            }
            TypeTag::Object => {
                for _ in 0..size {
                    elements.push(self.decode_array_element(element_model, parent_id, session)?);
                }
            }
            TypeTag::Array => {
                return Err(DecodeError::violation(
                    position,
                    "arrays of arrays are not supported",
                ));
            }
            tag @ (TypeTag::Enum | TypeTag::EnumValue | TypeTag::EnumDescription) => {
                return Err(DecodeError::violation(
                    position,
                    format!("arrays of {tag} are not supported"),
                ));
            }
            tag @ (TypeTag::Null
            | TypeTag::ObjectRef
            | TypeTag::Description
            | TypeTag::DescriptionRef
            | TypeTag::MultipleDescriptions
            | TypeTag::Unknown) => {
                return Err(DecodeError::violation(
                    position,
                    format!("{tag} is not a valid array element type"),
                ));
            }
        }
        self.ascend();

        Ok(Some(ArrayValue {
            element_type: header.element_type,
            element_model,
            elements,
        }))
    }

    fn decode_array_element(
        &mut self,
        element_model: Option<ModelId>,
        parent_id: Option<InstanceId>,
        session: &mut ReadSession,
    ) -> Result<Slot> {
        if self.check_null() {
            return Ok(Slot::Null);
        }
        let position = self.position();
        match self.peek_tag() {
            Some(TypeTag::Object) => self
                .decode_object(element_model, parent_id, session)
                .map(Slot::Object),
            Some(TypeTag::ObjectRef) => self.decode_object_ref(session).map(Slot::Ref),
            Some(other) => Err(DecodeError::violation(
                position,
                format!("expected Object or ObjectRef array element, found {other}"),
            )),
            None => Err(self.bad_tag_at_cursor()),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn descend(&mut self, position: usize) -> Result<()> {
        if self.depth >= self.options.max_depth {
            return Err(DecodeError::violation(
                position,
                format!("nesting deeper than {}", self.options.max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn end_of_buffer(&self) -> DecodeError {
        DecodeError::OutOfBounds {
            position: self.position(),
            needed: 1,
            length: self.len(),
        }
    }

    /// Error for a peek that found no valid tag.
    fn bad_tag_at_cursor(&self) -> DecodeError {
        match self.cursor.peek_raw_byte() {
            Some(byte) => {
                DecodeError::violation(self.position(), format!("unknown tag byte {byte:#04X}"))
            }
            None => self.end_of_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encoder::WireEncoder;
    use crate::wire::state::DecodeOptions;
    use crate::wire::tree::Value;

    /// Schema 1 = Object { 2: Int "hp", 3: Int "mp" }.
    fn two_int_schema(enc: &mut WireEncoder) {
        enc.object_description(1, Some("Stats"), 2)
            .scalar_description(2, Some("hp"), TypeTag::Int)
            .scalar_description(3, Some("mp"), TypeTag::Int);
    }

    #[test]
    fn object_description_children_in_wire_order() {
        let mut enc = WireEncoder::new();
        two_int_schema(&mut enc);
        let mut st = ParseState::new(enc.into_bytes());
        assert_eq!(st.read_data_description().unwrap(), ModelId(1));
        assert!(st.is_at_end());
        let node = st.registry().get(ModelId(1)).unwrap();
        assert_eq!(node.data_type, TypeTag::Object);
        assert_eq!(node.name.as_deref(), Some("Stats"));
        assert_eq!(node.child_ids(), &[ModelId(2), ModelId(3)]);
        assert_eq!(st.registry().len(), 3);
    }

    #[test]
    fn read_object_consumes_children_in_order() {
        let mut enc = WireEncoder::new();
        two_int_schema(&mut enc);
        enc.object(7).int(100).int(-1);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        let root = st.read_object(ModelId(1)).unwrap();
        assert_eq!(root, InstanceId(7));
        assert!(st.is_at_end());
        let tree = st.find_tree(root).unwrap();
        assert_eq!(tree.parent_id, None);
        assert_eq!(tree.model_id, Some(ModelId(1)));
        assert_eq!(
            tree.slots,
            vec![Slot::Value(Value::Int(100)), Slot::Value(Value::Int(-1))]
        );
    }

    #[test]
    fn nested_objects_link_parents_and_append_children_first() {
        let mut enc = WireEncoder::new();
        enc.object_description(10, Some("Entity"), 2)
            .scalar_description(11, Some("name"), TypeTag::String)
            .object_description(12, Some("pos"), 2)
            .scalar_description(13, Some("x"), TypeTag::Float)
            .scalar_description(14, Some("y"), TypeTag::Float);
        enc.object(1)
            .string(Some("player"))
            .object(2)
            .float(1.0)
            .float(2.5);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        st.read_object(ModelId(10)).unwrap();

        let trees = st.decoded_trees();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].id, InstanceId(2));
        assert_eq!(trees[0].parent_id, Some(InstanceId(1)));
        assert_eq!(trees[0].model_id, Some(ModelId(12)));
        assert_eq!(trees[1].id, InstanceId(1));
        assert_eq!(trees[1].slots[1], Slot::Object(InstanceId(2)));
        let kids: Vec<_> = st.children_of(InstanceId(1)).map(|t| t.id).collect();
        assert_eq!(kids, vec![InstanceId(2)]);
    }

    #[test]
    fn null_children_become_null_slots() {
        let mut enc = WireEncoder::new();
        two_int_schema(&mut enc);
        enc.object(3).null().int(5);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        st.read_object(ModelId(1)).unwrap();
        let tree = st.find_tree(InstanceId(3)).unwrap();
        assert_eq!(tree.slots, vec![Slot::Null, Slot::Value(Value::Int(5))]);
    }

    #[test]
    fn read_raw_object_null_consumes_one_byte() {
        let mut enc = WireEncoder::new();
        two_int_schema(&mut enc);
        enc.null();
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        let before = st.position();
        let mut session = ReadSession::new();
        assert_eq!(
            st.read_raw_object(Some(ModelId(1)), None, &mut session)
                .unwrap(),
            None
        );
        assert_eq!(st.position(), before + 1);
        assert!(session.is_empty());
    }

    #[test]
    fn read_object_requires_object_tag() {
        let mut enc = WireEncoder::new();
        two_int_schema(&mut enc);
        enc.null();
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        let before = st.position();
        assert!(matches!(
            st.read_object(ModelId(1)),
            Err(DecodeError::TypeMismatch {
                expected: TypeTag::Object,
                ..
            })
        ));
        assert_eq!(st.position(), before);
    }

    #[test]
    fn wrong_child_type_is_type_mismatch_and_rolls_back() {
        let mut enc = WireEncoder::new();
        two_int_schema(&mut enc);
        enc.object(1).int(1).short(2);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        let before = st.position();
        let err = st.read_object(ModelId(1)).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TypeMismatch {
                expected: TypeTag::Int,
                found: 0x01,
                ..
            }
        ));
        assert_eq!(st.position(), before);
        assert!(st.decoded_trees().is_empty());
        assert_eq!(st.registry().len(), 3);
    }

    #[test]
    fn unknown_schema_is_violation() {
        let mut enc = WireEncoder::new();
        enc.object(1);
        let mut st = ParseState::new(enc.into_bytes());
        assert!(matches!(
            st.read_object(ModelId(99)),
            Err(DecodeError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn description_ref_must_be_registered() {
        let mut enc = WireEncoder::new();
        enc.description_ref(42);
        let mut st = ParseState::new(enc.into_bytes());
        assert!(matches!(
            st.read_data_description(),
            Err(DecodeError::ProtocolViolation { position: 1, .. })
        ));
        assert_eq!(st.position(), 0);
    }

    #[test]
    fn description_ref_resolves_after_registration() {
        let mut enc = WireEncoder::new();
        enc.scalar_description(5, None, TypeTag::Long)
            .description_ref(5);
        let mut st = ParseState::new(enc.into_bytes());
        assert_eq!(st.read_data_description().unwrap(), ModelId(5));
        assert_eq!(st.read_data_description().unwrap(), ModelId(5));
        assert_eq!(st.registry().len(), 1);
    }

    #[test]
    fn identical_redefinition_accepted_conflict_rejected() {
        let mut enc = WireEncoder::new();
        enc.scalar_description(5, Some("a"), TypeTag::Int)
            .scalar_description(5, Some("a"), TypeTag::Int)
            .scalar_description(5, Some("a"), TypeTag::Short);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        st.read_data_description().unwrap();
        assert_eq!(st.registry().len(), 1);
        let err = st.read_data_description().unwrap_err();
        assert!(matches!(err, DecodeError::ProtocolViolation { .. }));
        assert_eq!(
            st.registry().get(ModelId(5)).unwrap().data_type,
            TypeTag::Int
        );
    }

    #[test]
    fn failed_object_description_registers_nothing() {
        let mut enc = WireEncoder::new();
        enc.object_description(1, None, 2)
            .scalar_description(2, None, TypeTag::Int)
            .description_ref(77);
        let mut st = ParseState::new(enc.into_bytes());
        assert!(st.read_data_description().is_err());
        assert!(st.registry().is_empty());
        assert_eq!(st.position(), 0);
    }

    #[test]
    fn self_referential_schema() {
        // Node { value: Int, next: Node }
        let mut enc = WireEncoder::new();
        enc.object_description(1, Some("Node"), 2)
            .scalar_description(2, Some("value"), TypeTag::Int)
            .description_ref(1);
        enc.object(1).int(10).object(2).int(20).null();
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        assert_eq!(
            st.registry().get(ModelId(1)).unwrap().child_ids(),
            &[ModelId(2), ModelId(1)]
        );
        st.read_object(ModelId(1)).unwrap();
        let head = st.find_tree(InstanceId(1)).unwrap();
        assert_eq!(head.slots[1], Slot::Object(InstanceId(2)));
        let tail = st.find_tree(InstanceId(2)).unwrap();
        assert_eq!(tail.slots[1], Slot::Null);
        assert!(st.is_at_end());
    }

    #[test]
    fn object_ref_resolves_within_session() {
        // Pair { a: Node, b: Node }, Node { v: Byte }
        let mut enc = WireEncoder::new();
        enc.object_description(1, Some("Pair"), 2)
            .object_description(2, Some("Node"), 1)
            .scalar_description(3, Some("v"), TypeTag::Byte)
            .description_ref(2);
        enc.object(1).object(5).byte(9).object_ref(5);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        st.read_object(ModelId(1)).unwrap();
        let pair = st.find_tree(InstanceId(1)).unwrap();
        assert_eq!(
            pair.slots,
            vec![Slot::Object(InstanceId(5)), Slot::Ref(InstanceId(5))]
        );
        assert_eq!(st.decoded_trees().len(), 2);
        assert!(st.is_at_end());
    }

    #[test]
    fn object_ref_scope() {
        let mut enc = WireEncoder::new();
        enc.object_description(2, Some("Node"), 1)
            .scalar_description(3, Some("v"), TypeTag::Byte)
            .object_description(1, Some("Holder"), 1)
            .description_ref(2);
        enc.object(5).byte(1);
        enc.object(6).object_ref(5);
        let bytes = enc.into_bytes();

        let mut st = ParseState::new(bytes.clone());
        st.read_data_description().unwrap();
        st.read_data_description().unwrap();
        st.read_object(ModelId(2)).unwrap();
        st.read_object(ModelId(1)).unwrap();
        assert_eq!(
            st.find_tree(InstanceId(6)).unwrap().slots,
            vec![Slot::Ref(InstanceId(5))]
        );

        let mut st = ParseState::new(bytes).with_options(DecodeOptions {
            ref_scope: RefScope::Session,
            ..DecodeOptions::default()
        });
        st.read_data_description().unwrap();
        st.read_data_description().unwrap();
        st.read_object(ModelId(2)).unwrap();
        assert!(matches!(
            st.read_object(ModelId(1)),
            Err(DecodeError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn unresolved_object_ref_is_violation() {
        let mut enc = WireEncoder::new();
        enc.object_description(1, None, 1)
            .object_description(2, None, 0);
        enc.object(1).object_ref(300);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        assert!(matches!(
            st.read_object(ModelId(1)),
            Err(DecodeError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn primitive_array_slot() {
        let mut enc = WireEncoder::new();
        enc.object_description(1, Some("Path"), 1)
            .array_description(2, Some("points"), TypeTag::Short);
        enc.object(1)
            .array(true, TypeTag::Short, 3)
            .short(1)
            .null()
            .short(-3);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        st.read_object(ModelId(1)).unwrap();
        let tree = st.find_tree(InstanceId(1)).unwrap();
        let Slot::Array(array) = &tree.slots[0] else {
            panic!("expected array slot, got {:?}", tree.slots[0]);
        };
        assert_eq!(array.element_type, TypeTag::Short);
        assert_eq!(
            array.elements,
            vec![
                Slot::Value(Value::Short(1)),
                Slot::Null,
                Slot::Value(Value::Short(-3))
            ]
        );
        assert!(st.is_at_end());
    }

    #[test]
    fn object_array_slot_links_elements_to_parent() {
        let mut enc = WireEncoder::new();
        enc.object_description(1, Some("World"), 1)
            .array_description(2, Some("entities"), TypeTag::Object);
        enc.object(1)
            .multiple_descriptions(1)
            .object_description(3, Some("Entity"), 1)
            .scalar_description(4, Some("id"), TypeTag::Int)
            .array(false, TypeTag::Object, 2)
            .object(10)
            .int(100)
            .object(11)
            .int(101);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        st.read_object(ModelId(1)).unwrap();
        assert!(st.is_at_end());

        let world = st.find_tree(InstanceId(1)).unwrap();
        let Slot::Array(array) = &world.slots[0] else {
            panic!("expected array slot");
        };
        assert_eq!(array.element_model, Some(ModelId(3)));
        assert_eq!(
            array.elements,
            vec![Slot::Object(InstanceId(10)), Slot::Object(InstanceId(11))]
        );
        let kids: Vec<_> = st.children_of(InstanceId(1)).map(|t| t.id).collect();
        assert_eq!(kids, vec![InstanceId(10), InstanceId(11)]);
    }

    #[test]
    fn array_in_unmodelled_object_slot_uses_peek_dispatch() {
        let mut enc = WireEncoder::new();
        enc.object_description(1, None, 1)
            .object_description(2, None, 0);
        enc.object(1).array(true, TypeTag::Byte, 2).byte(1).byte(2);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        st.read_object(ModelId(1)).unwrap();
        let tree = st.find_tree(InstanceId(1)).unwrap();
        assert!(matches!(&tree.slots[0], Slot::Array(a) if a.elements.len() == 2));
        assert!(st.is_at_end());
    }

    #[test]
    fn array_header_checks() {
        let mut enc = WireEncoder::new();
        enc.array(false, TypeTag::Int, 0);
        let mut st = ParseState::new(enc.into_bytes());
        assert!(matches!(
            st.read_array(),
            Err(DecodeError::ProtocolViolation { .. })
        ));

        let mut enc = WireEncoder::new();
        enc.array(false, TypeTag::Int, 0);
        let mut st = ParseState::new(enc.into_bytes()).with_options(DecodeOptions {
            verify_array_headers: false,
            ..DecodeOptions::default()
        });
        assert!(st.read_array().unwrap().unwrap().elements.is_empty());
    }

    #[test]
    fn array_element_type_must_match_schema() {
        let mut enc = WireEncoder::new();
        enc.object_description(1, None, 1)
            .array_description(2, None, TypeTag::Int);
        enc.object(1).array(true, TypeTag::Byte, 0);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        assert!(matches!(
            st.read_object(ModelId(1)),
            Err(DecodeError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn unsupported_branches_are_violations() {
        let mut enc = WireEncoder::new();
        enc.description(1, Some("Color"), false, TypeTag::Enum);
        let mut st = ParseState::new(enc.into_bytes());
        assert!(matches!(
            st.read_data_description(),
            Err(DecodeError::ProtocolViolation { .. })
        ));

        let mut enc = WireEncoder::new();
        enc.array(false, TypeTag::Array, 1);
        let mut st = ParseState::new(enc.into_bytes());
        assert!(matches!(
            st.read_array(),
            Err(DecodeError::ProtocolViolation { .. })
        ));

        let mut enc = WireEncoder::new();
        enc.array(false, TypeTag::Enum, 1);
        let mut st = ParseState::new(enc.into_bytes());
        assert!(st.read_array().is_err());
    }

    #[test]
    fn array_descriptions_accept_only_simple_or_object_elements() {
        for element in [TypeTag::Byte, TypeTag::BitVector, TypeTag::Object] {
            let mut enc = WireEncoder::new();
            enc.array_description(1, None, element);
            let mut st = ParseState::new(enc.into_bytes());
            assert_eq!(st.read_data_description().unwrap(), ModelId(1));
            assert_eq!(
                st.registry().get(ModelId(1)).unwrap().data_sub_type,
                Some(element)
            );
        }

        for element in [
            TypeTag::Array,
            TypeTag::Enum,
            TypeTag::EnumValue,
            TypeTag::EnumDescription,
            TypeTag::Null,
            TypeTag::ObjectRef,
            TypeTag::Description,
            TypeTag::DescriptionRef,
            TypeTag::MultipleDescriptions,
            TypeTag::Unknown,
        ] {
            let mut enc = WireEncoder::new();
            enc.array_description(2, Some("bad"), element);
            let element_at = enc.len() - 1;
            let mut st = ParseState::new(enc.into_bytes());
            match st.read_data_description() {
                Err(DecodeError::ProtocolViolation { position, .. }) => {
                    assert_eq!(position, element_at, "{element}")
                }
                other => panic!("{element}: {other:?}"),
            }
            assert!(st.registry().is_empty(), "{element}");
            assert_eq!(st.position(), 0);
        }
    }

    #[test]
    fn failed_raw_object_forgets_session_entries() {
        // Pair { a: Node, n: Int }, Node { v: Byte }
        let session_scope = DecodeOptions {
            ref_scope: RefScope::Session,
            ..DecodeOptions::default()
        };
        let mut enc = WireEncoder::new();
        enc.object_description(1, Some("Pair"), 2)
            .object_description(2, Some("Node"), 1)
            .scalar_description(3, Some("v"), TypeTag::Byte)
            .scalar_description(4, Some("n"), TypeTag::Int);
        let payload_at = enc.len();
        enc.object(1).object(5).byte(9).short(3);
        let mut st = ParseState::new(enc.into_bytes()).with_options(session_scope);
        st.read_data_description().unwrap();

        let mut session = ReadSession::new();
        assert!(matches!(
            st.read_raw_object(Some(ModelId(1)), None, &mut session),
            Err(DecodeError::TypeMismatch { .. })
        ));
        assert!(session.is_empty());
        assert!(session.lookup(InstanceId(5)).is_none());
        assert!(st.decoded_trees().is_empty());
        assert_eq!(st.position(), payload_at);

        let mut enc = WireEncoder::new();
        enc.object_ref(5);
        let mut st =
            ParseState::with_registry(enc.into_bytes(), st.into_registry()).with_options(session_scope);
        assert!(matches!(
            st.read_raw_object(Some(ModelId(2)), None, &mut session),
            Err(DecodeError::ProtocolViolation { .. })
        ));
        assert_eq!(st.position(), 0);
    }

    #[test]
    fn failed_array_keeps_earlier_session_entries() {
        let mut enc = WireEncoder::new();
        enc.object_description(2, Some("Node"), 1)
            .scalar_description(3, Some("v"), TypeTag::Byte);
        enc.object(4).byte(1);
        enc.multiple_descriptions(0)
            .description_ref(2)
            .array(false, TypeTag::Object, 2)
            .object(10)
            .byte(2)
            .object(11)
            .int(3);
        let mut st = ParseState::new(enc.into_bytes());
        st.read_data_description().unwrap();
        let mut session = ReadSession::new();
        st.read_raw_object(Some(ModelId(2)), None, &mut session)
            .unwrap();

        let before = st.position();
        assert!(st.read_array_with_session(None, &mut session).is_err());
        assert_eq!(session.seen(), &[(InstanceId(4), Some(ModelId(2)))]);
        assert!(session.lookup(InstanceId(10)).is_none());
        assert_eq!(st.position(), before);
        assert_eq!(st.decoded_trees().len(), 1);
        assert!(st.find_tree(InstanceId(10)).is_none());
    }

    #[test]
    fn begin_array_reads_header_only() {
        let mut enc = WireEncoder::new();
        enc.array(true, TypeTag::Long, 4);
        let mut st = ParseState::new(enc.into_bytes());
        let header = st.begin_array().unwrap();
        assert_eq!(
            header,
            ArrayHeader {
                is_primitive_element: true,
                element_type: TypeTag::Long,
                size: 4
            }
        );
        // tag + (tag + bool) + tag + int
        assert_eq!(st.position(), 8);
    }

    #[test]
    fn null_array() {
        let mut enc = WireEncoder::new();
        enc.null();
        let mut st = ParseState::new(enc.into_bytes());
        assert_eq!(st.read_array().unwrap(), None);
        assert_eq!(st.position(), 1);
    }

    #[test]
    fn possibly_read_descriptions_variants() {
        let mut enc = WireEncoder::new();
        enc.int(1);
        let mut st = ParseState::new(enc.into_bytes());
        assert_eq!(st.possibly_read_descriptions(false).unwrap(), None);
        assert_eq!(st.position(), 0);
        assert!(matches!(
            st.possibly_read_descriptions(true),
            Err(DecodeError::TypeMismatch { .. })
        ));

        let mut enc = WireEncoder::new();
        enc.multiple_descriptions(2)
            .scalar_description(1, None, TypeTag::Int)
            .scalar_description(2, None, TypeTag::Byte)
            .multiple_descriptions(0)
            .description_ref(1);
        let mut st = ParseState::new(enc.into_bytes());
        assert_eq!(
            st.possibly_read_descriptions(true).unwrap(),
            Some(ModelId(2))
        );
        assert_eq!(
            st.possibly_read_descriptions(false).unwrap(),
            Some(ModelId(1))
        );
        assert!(st.is_at_end());
    }

    #[test]
    fn empty_batch_requires_description_ref() {
        let mut enc = WireEncoder::new();
        enc.multiple_descriptions(0).int(3);
        let mut st = ParseState::new(enc.into_bytes());
        assert!(matches!(
            st.possibly_read_descriptions(false),
            Err(DecodeError::TypeMismatch {
                expected: TypeTag::DescriptionRef,
                ..
            })
        ));
    }

    #[test]
    fn depth_limit() {
        let mut enc = WireEncoder::new();
        enc.object_description(1, Some("Node"), 1).description_ref(1);
        for i in 0..10 {
            enc.object(i);
        }
        enc.null();
        let bytes = enc.into_bytes();

        let mut st = ParseState::new(bytes.clone());
        st.read_data_description().unwrap();
        st.read_object(ModelId(1)).unwrap();
        assert_eq!(st.decoded_trees().len(), 10);

        let mut st = ParseState::new(bytes).with_options(DecodeOptions {
            max_depth: 4,
            ..DecodeOptions::default()
        });
        st.read_data_description().unwrap();
        assert!(matches!(
            st.read_object(ModelId(1)),
            Err(DecodeError::ProtocolViolation { .. })
        ));
        assert!(st.decoded_trees().is_empty());
    }
}
