// Fixture encoder: writes the wire format the decoder consumes.
//
// This is not a producer implementation. It emits exactly the framing each
// method names and leaves schema consistency to the caller, which makes it
// equally suited to building valid snapshots and deliberately broken ones.

use super::cursor::WireLong;
use super::tag::TypeTag;
use super::tree::{BitVector, Value};

/// Append-only wire writer. Methods return `&mut Self` so payloads can be
/// written as one chain.
#[derive(Debug, Clone, Default)]
pub struct WireEncoder {
    buf: Vec<u8>,
}

impl WireEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // --- raw -------------------------------------------------------------

    pub fn tag(&mut self, tag: TypeTag) -> &mut Self {
        self.buf.push(tag.as_byte());
        self
    }

    pub fn raw_byte(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn raw_short(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn raw_int(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn raw_long(&mut self, v: WireLong) -> &mut Self {
        self.raw_int(v.high).raw_int(v.low)
    }

    pub fn raw_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // --- tagged scalars --------------------------------------------------

    pub fn null(&mut self) -> &mut Self {
        self.tag(TypeTag::Null)
    }

    pub fn byte(&mut self, v: i8) -> &mut Self {
        self.tag(TypeTag::Byte).raw_byte(v as u8)
    }

    pub fn short(&mut self, v: i16) -> &mut Self {
        self.tag(TypeTag::Short).raw_short(v as u16)
    }

    pub fn int(&mut self, v: i32) -> &mut Self {
        self.tag(TypeTag::Int).raw_int(v as u32)
    }

    pub fn long(&mut self, v: i64) -> &mut Self {
        self.tag(TypeTag::Long).raw_long(WireLong::from_i64(v))
    }

    pub fn float(&mut self, v: f32) -> &mut Self {
        self.tag(TypeTag::Float).raw_int(v.to_bits())
    }

    pub fn boolean(&mut self, v: bool) -> &mut Self {
        self.tag(TypeTag::Boolean).raw_byte(u8::from(v))
    }

    /// `None` is written as `Null`.
    pub fn string(&mut self, v: Option<&str>) -> &mut Self {
        match v {
            Some(s) => self
                .tag(TypeTag::String)
                .raw_int(s.len() as u32)
                .raw_bytes(s.as_bytes()),
            None => self.null(),
        }
    }

    /// `None` is written as `Null`.
    ///
    /// # Panics
    ///
    /// If the vector holds more than `u16::MAX` bits.
    pub fn bit_vector(&mut self, v: Option<&BitVector>) -> &mut Self {
        let Some(bits) = v else {
            return self.null();
        };
        let count = u16::try_from(bits.len()).expect("bit vector longer than u16::MAX");
        self.tag(TypeTag::BitVector).raw_short(count);
        for word in bits.to_words() {
            self.raw_int(word);
        }
        self
    }

    pub fn value(&mut self, v: &Value) -> &mut Self {
        match v {
            Value::Byte(v) => self.byte(*v),
            Value::Short(v) => self.short(*v),
            Value::Int(v) => self.int(*v),
            Value::Long(v) => self.tag(TypeTag::Long).raw_long(*v),
            Value::Float(v) => self.float(*v),
            Value::Boolean(v) => self.boolean(*v),
            Value::String(v) => self.string(Some(v.as_str())),
            Value::BitVector(v) => self.bit_vector(Some(v)),
        }
    }

    // --- schema ----------------------------------------------------------

    /// Description header: id, name, primitive flag and node type. Object and
    /// array descriptions need their tail written after this.
    pub fn description(
        &mut self,
        id: u32,
        name: Option<&str>,
        is_primitive: bool,
        data_type: TypeTag,
    ) -> &mut Self {
        self.tag(TypeTag::Description)
            .raw_int(id)
            .string(name)
            .boolean(is_primitive)
            .tag(data_type)
    }

    pub fn scalar_description(&mut self, id: u32, name: Option<&str>, data_type: TypeTag) -> &mut Self {
        self.description(id, name, true, data_type)
    }

    /// Object description header; exactly `child_count` child descriptions
    /// (inline or refs) must follow.
    pub fn object_description(&mut self, id: u32, name: Option<&str>, child_count: u32) -> &mut Self {
        self.description(id, name, false, TypeTag::Object)
            .raw_int(child_count)
    }

    pub fn array_description(&mut self, id: u32, name: Option<&str>, element: TypeTag) -> &mut Self {
        self.description(id, name, false, TypeTag::Array).tag(element)
    }

    pub fn description_ref(&mut self, id: u32) -> &mut Self {
        self.tag(TypeTag::DescriptionRef).raw_int(id)
    }

    /// Batch header; `count` descriptions follow, or a single
    /// `description_ref` when `count` is 0.
    pub fn multiple_descriptions(&mut self, count: u32) -> &mut Self {
        self.tag(TypeTag::MultipleDescriptions).raw_int(count)
    }

    // --- instances -------------------------------------------------------

    /// Object header; the child payloads follow in schema order.
    pub fn object(&mut self, instance: u16) -> &mut Self {
        self.tag(TypeTag::Object).raw_short(instance)
    }

    pub fn object_ref(&mut self, instance: u16) -> &mut Self {
        self.tag(TypeTag::ObjectRef).raw_short(instance)
    }

    /// Array header; `size` element payloads follow.
    pub fn array(&mut self, is_primitive_element: bool, element: TypeTag, size: u32) -> &mut Self {
        self.tag(TypeTag::Array)
            .boolean(is_primitive_element)
            .tag(element)
            .raw_int(size)
    }
}
