/// Leading byte of every encoded item.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Unit = 0x01,
    BoolTrue = 0x02,
    BoolFalse = 0x03,
    S32 = 0x04,
    S64 = 0x05,
    U32 = 0x06,
    U64 = 0x07,
    F64 = 0x08,
    OptionNone = 0x09,

    // Blobs: [Len: u32][Bytes]
    String = 0x10,
    Bytes = 0x11,

    // Containers: [Len: u32][Body]
    List = 0x20,
    Map = 0x21,
    OptionSome = 0x30,
    ResultOk = 0x31,
    ResultErr = 0x32,
    Variant = 0x33,
}

impl Tag {
    /// Width of the fixed payload following the tag, or `None` for
    /// length-prefixed items.
    pub(crate) fn fixed_width(self) -> Option<usize> {
        match self {
            Tag::Unit | Tag::BoolTrue | Tag::BoolFalse | Tag::OptionNone => Some(0),
            Tag::S32 | Tag::U32 => Some(4),
            Tag::S64 | Tag::U64 | Tag::F64 => Some(8),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Tag {
    type Error = crate::Error;

    fn try_from(b: u8) -> crate::Result<Self> {
        Ok(match b {
            0x01 => Tag::Unit,
            0x02 => Tag::BoolTrue,
            0x03 => Tag::BoolFalse,
            0x04 => Tag::S32,
            0x05 => Tag::S64,
            0x06 => Tag::U32,
            0x07 => Tag::U64,
            0x08 => Tag::F64,
            0x09 => Tag::OptionNone,
            0x10 => Tag::String,
            0x11 => Tag::Bytes,
            0x20 => Tag::List,
            0x21 => Tag::Map,
            0x30 => Tag::OptionSome,
            0x31 => Tag::ResultOk,
            0x32 => Tag::ResultErr,
            0x33 => Tag::Variant,
            other => return Err(crate::Error::InvalidTag(other)),
        })
    }
}

/// The kind of container currently open on the `Encoder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Accepts any number of items.
    Root,
    /// Accepts any number of items.
    List,
    /// Accepts only variants (key/value pairs).
    Map,
    /// Exactly one item.
    Option,
    /// Exactly one item.
    Result,
    /// Exactly one item after the name.
    Variant,
}

impl Scope {
    pub(crate) fn holds_one(self) -> bool {
        matches!(self, Scope::Option | Scope::Result | Scope::Variant)
    }
}
