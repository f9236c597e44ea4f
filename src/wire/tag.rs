// Wire type tags.
//
// Every tagged value starts with one of these bytes. The byte assignment is a
// fixed contract shared with the producer and must never be reordered.

use std::fmt;

/// Closed set of wire type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Byte = 0x00,
    Short = 0x01,
    Int = 0x02,
    Long = 0x03,
    Float = 0x04,
    Boolean = 0x05,
    String = 0x06,
    BitVector = 0x07,
    Null = 0x08,
    Object = 0x09,
    ObjectRef = 0x0A,
    Array = 0x0B,
    Description = 0x0C,
    DescriptionRef = 0x0D,
    MultipleDescriptions = 0x0E,
    Enum = 0x0F,
    EnumValue = 0x10,
    EnumDescription = 0x11,
    Unknown = 0x12,
}

/// All tags, indexed by their wire byte.
pub const ALL_TAGS: [TypeTag; 19] = [
    TypeTag::Byte,
    TypeTag::Short,
    TypeTag::Int,
    TypeTag::Long,
    TypeTag::Float,
    TypeTag::Boolean,
    TypeTag::String,
    TypeTag::BitVector,
    TypeTag::Null,
    TypeTag::Object,
    TypeTag::ObjectRef,
    TypeTag::Array,
    TypeTag::Description,
    TypeTag::DescriptionRef,
    TypeTag::MultipleDescriptions,
    TypeTag::Enum,
    TypeTag::EnumValue,
    TypeTag::EnumDescription,
    TypeTag::Unknown,
];

impl TypeTag {
    /// Map a wire byte to its tag. Bytes outside the table yield `None`.
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        ALL_TAGS.get(byte as usize).copied()
    }

    #[inline]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Scalar types: everything that is decoded without a schema.
    #[inline]
    pub const fn is_simple_type(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::Short
                | Self::Int
                | Self::Long
                | Self::Float
                | Self::Boolean
                | Self::String
                | Self::BitVector
        )
    }

    #[inline]
    pub const fn is_enum(self) -> bool {
        matches!(self, Self::Enum | Self::EnumValue | Self::EnumDescription)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "Byte",
            Self::Short => "Short",
            Self::Int => "Int",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::BitVector => "BitVector",
            Self::Null => "Null",
            Self::Object => "Object",
            Self::ObjectRef => "ObjectRef",
            Self::Array => "Array",
            Self::Description => "Description",
            Self::DescriptionRef => "DescriptionRef",
            Self::MultipleDescriptions => "MultipleDescriptions",
            Self::Enum => "Enum",
            Self::EnumValue => "EnumValue",
            Self::EnumDescription => "EnumDescription",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
