// Typed scalar readers.
//
// `read_raw_*` assume the tag byte was already consumed and validated by the
// caller. `read_*` consume and check the tag first; a different tag is a
// `TypeMismatch`. Strings and bit vectors additionally accept a leading `Null`.

use super::cursor::WireLong;
use super::error::{DecodeError, Result};
use super::state::ParseState;
use super::tag::TypeTag;
use super::tree::{BitVector, Value};

impl ParseState {
    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// Next tag without consuming it. `None` at end of buffer or for a byte
    /// outside the tag table.
    #[inline]
    pub fn peek_tag(&self) -> Option<TypeTag> {
        self.cursor.peek_raw_byte().and_then(TypeTag::from_byte)
    }

    /// Consume one tag byte.
    pub fn read_tag(&mut self) -> Result<TypeTag> {
        let position = self.cursor.position();
        let byte = self.cursor.read_raw_byte()?;
        TypeTag::from_byte(byte).ok_or_else(|| {
            DecodeError::violation(position, format!("unknown tag byte {byte:#04X}"))
        })
    }

    /// Consume one tag byte that must equal `expected`.
    pub(crate) fn expect_tag(&mut self, expected: TypeTag) -> Result<()> {
        let position = self.cursor.position();
        let found = self.cursor.read_raw_byte()?;
        if found != expected.as_byte() {
            return Err(DecodeError::TypeMismatch {
                position,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Consume a `Null` tag if it is next. Never fails; at end of buffer the
    /// answer is simply `false`.
    pub fn check_null(&mut self) -> bool {
        self.cursor.peek_raw_byte() == Some(TypeTag::Null.as_byte())
            && self.cursor.read_raw_byte().is_ok()
    }

    // -----------------------------------------------------------------------
    // Raw readers
    // -----------------------------------------------------------------------

    pub fn read_raw_byte(&mut self) -> Result<i8> {
        Ok(self.cursor.read_raw_byte()? as i8)
    }

    pub fn read_raw_short(&mut self) -> Result<i16> {
        Ok(self.cursor.read_raw_short()? as i16)
    }

    pub fn read_raw_int(&mut self) -> Result<i32> {
        Ok(self.cursor.read_raw_int()? as i32)
    }

    pub fn read_raw_long(&mut self) -> Result<WireLong> {
        self.cursor.read_raw_long()
    }

    /// The raw int's bit pattern reinterpreted as IEEE-754.
    pub fn read_raw_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.cursor.read_raw_int()?))
    }

    pub fn read_raw_boolean(&mut self) -> Result<bool> {
        Ok(self.cursor.read_raw_byte()? != 0)
    }

    pub fn read_raw_string(&mut self) -> Result<String> {
        let len = self.cursor.read_raw_int()? as usize;
        let position = self.cursor.position();
        let bytes = self.cursor.read_raw_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| DecodeError::violation(position, format!("invalid UTF-8 in string: {e}")))
    }

    pub fn read_raw_bit_vector(&mut self) -> Result<BitVector> {
        let count = self.cursor.read_raw_short()? as usize;
        let mut bits = Vec::with_capacity(count);
        for _ in 0..count.div_ceil(32) {
            let word = self.cursor.read_raw_int()?;
            let take = (count - bits.len()).min(32);
            bits.extend((0..take).map(|bit| word & (1 << bit) != 0));
        }
        Ok(BitVector(bits))
    }

    /// Raw scalar of a simple type; any other tag is a protocol violation.
    pub fn read_raw_value(&mut self, tag: TypeTag) -> Result<Value> {
        Ok(match tag {
            TypeTag::Byte => Value::Byte(self.read_raw_byte()?),
            TypeTag::Short => Value::Short(self.read_raw_short()?),
            TypeTag::Int => Value::Int(self.read_raw_int()?),
            TypeTag::Long => Value::Long(self.read_raw_long()?),
            TypeTag::Float => Value::Float(self.read_raw_float()?),
            TypeTag::Boolean => Value::Boolean(self.read_raw_boolean()?),
            TypeTag::String => Value::String(self.read_raw_string()?),
            TypeTag::BitVector => Value::BitVector(self.read_raw_bit_vector()?),
            TypeTag::Null
            | TypeTag::Object
            | TypeTag::ObjectRef
            | TypeTag::Array
            | TypeTag::Description
            | TypeTag::DescriptionRef
            | TypeTag::MultipleDescriptions
            | TypeTag::Enum
            | TypeTag::EnumValue
            | TypeTag::EnumDescription
            | TypeTag::Unknown => {
                return Err(DecodeError::violation(
                    self.position(),
                    format!("{tag} is not a scalar type"),
                ));
            }
        })
    }

    // -----------------------------------------------------------------------
    // Tagged readers
    // -----------------------------------------------------------------------

    pub fn read_byte(&mut self) -> Result<i8> {
        self.atomic(|s| {
            s.expect_tag(TypeTag::Byte)?;
            s.read_raw_byte()
        })
    }

    pub fn read_short(&mut self) -> Result<i16> {
        self.atomic(|s| {
            s.expect_tag(TypeTag::Short)?;
            s.read_raw_short()
        })
    }

    pub fn read_int(&mut self) -> Result<i32> {
        self.atomic(|s| {
            s.expect_tag(TypeTag::Int)?;
            s.read_raw_int()
        })
    }

    pub fn read_long(&mut self) -> Result<WireLong> {
        self.atomic(|s| {
            s.expect_tag(TypeTag::Long)?;
            s.read_raw_long()
        })
    }

    pub fn read_float(&mut self) -> Result<f32> {
        self.atomic(|s| {
            s.expect_tag(TypeTag::Float)?;
            s.read_raw_float()
        })
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        self.atomic(|s| {
            s.expect_tag(TypeTag::Boolean)?;
            s.read_raw_boolean()
        })
    }

    pub fn read_string(&mut self) -> Result<Option<String>> {
        self.atomic(|s| {
            if s.check_null() {
                return Ok(None);
            }
            s.expect_tag(TypeTag::String)?;
            s.read_raw_string().map(Some)
        })
    }

    pub fn read_bit_vector(&mut self) -> Result<Option<BitVector>> {
        self.atomic(|s| {
            if s.check_null() {
                return Ok(None);
            }
            s.expect_tag(TypeTag::BitVector)?;
            s.read_raw_bit_vector().map(Some)
        })
    }

    /// Nullable tagged scalar of type `tag`.
    pub fn read_value(&mut self, tag: TypeTag) -> Result<Option<Value>> {
        self.atomic(|s| {
            if s.check_null() {
                return Ok(None);
            }
            if !tag.is_simple_type() {
                return Err(DecodeError::violation(
                    s.position(),
                    format!("{tag} is not a scalar type"),
                ));
            }
            s.expect_tag(tag)?;
            s.read_raw_value(tag).map(Some)
        })
    }
}
