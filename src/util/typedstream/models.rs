/*!
 Data structures used to parse `typedstream` data, focussing specifically on [NSAttributedString](https://developer.apple.com/documentation/foundation/nsattributedstring) data.
*/

use crate::error::typedstream::TypedStreamError;

/// Represents a class stored in the `typedstream`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    /// The name of the class
    pub name: String,
    /// The encoded version of the class
    pub version: u64,
}

impl Class {
    pub(crate) fn new(name: String, version: u64) -> Self {
        Self { name, version }
    }
}

/// Rust structures containing data stored in the `typedstream`
#[derive(Debug, Clone, PartialEq)]
pub enum OutputData {
    /// Text data, i.e. the contents of an `NSString`
    String(String),
    /// A shared C string, i.e. the `objCType` of an `NSNumber`
    CString(String),
    /// Signed integer types are coerced into this container
    SignedInteger(i64),
    /// Unsigned integer types are coerced into this container
    UnsignedInteger(u64),
    /// Floating point numbers
    Float(f32),
    /// Double precision floats
    Double(f64),
    /// Arbitrary collection of bytes in an array
    Array(Vec<u8>),
    /// An index into the object table
    Object(usize),
    /// A `nil` object or string
    Null,
}

/// Items stored in the object table of a `typedstream`
#[derive(Debug, Clone, PartialEq)]
pub enum Archivable {
    /// An instance of a class and the data it encoded
    Object(Class, Vec<OutputData>),
    /// A class referenced in the `typedstream`, usually part of an inheritance heirarchy that does not contain any data itself
    Class(Class),
    /// A placeholder, only used when reserving a spot in the objects table for an object whose data is still being read.
    /// Objects can contain other objects, but the outer object is numbered first, so its slot is reserved before its
    /// class and fields are read and filled in once the end of the object is reached.
    Placeholder,
}

impl Archivable {
    /// If this is an object, get the text data it stores
    pub fn text(&self) -> impl Iterator<Item = &str> {
        let data: &[OutputData] = match self {
            Archivable::Object(_, data) => data,
            _ => &[],
        };
        data.iter().filter_map(|item| match item {
            OutputData::String(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Represents types of data that can be stored in a `typedstream`
///
/// Type encodings are shared strings; the first time one is seen it is present
/// in the stream literally, but afterwards it is only referenced by index in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Encoded string data, usually embedded in an object
    Utf8String,
    /// A C string stored in the shared strings table
    CString,
    /// An instance of a class, usually with data
    Object,
    /// An [`i8`], [`i16`], [`i32`], or [`i64`]
    SignedInt,
    /// A [`u8`], [`u16`], [`u32`], or [`u64`]
    UnsignedInt,
    /// An [`f32`]
    Float,
    /// An [`f64`]
    Double,
    /// An array containing some data of a given length
    Array(usize),
}

impl Type {
    pub(crate) fn from_byte(byte: &u8) -> Result<Self, TypedStreamError> {
        match byte {
            0x40 => Ok(Self::Object),
            0x2B => Ok(Self::Utf8String),
            0x2A => Ok(Self::CString),
            0x66 => Ok(Self::Float),
            0x64 => Ok(Self::Double),
            0x63 | 0x69 | 0x6c | 0x71 | 0x73 => Ok(Self::SignedInt),
            0x43 | 0x49 | 0x4c | 0x51 | 0x53 => Ok(Self::UnsignedInt),
            other => Err(TypedStreamError::InvalidType(*other)),
        }
    }

    /// Parse a type encoding string, i.e. `iI` or `[904c]`
    pub(crate) fn from_encoding(types: &[u8]) -> Result<Vec<Self>, TypedStreamError> {
        if types.first() == Some(&0x5b) {
            return Self::get_array_length(types).ok_or(TypedStreamError::InvalidArray);
        }
        types.iter().map(Self::from_byte).collect()
    }

    /// Read the element count of an array encoding like `[904c]`. Counts that do not fit in a
    /// [`usize`] are rejected instead of wrapping.
    pub(crate) fn get_array_length(types: &[u8]) -> Option<Vec<Type>> {
        if types.first() == Some(&0x5b) {
            let len = types[1..]
                .iter()
                .take_while(|a| a.is_ascii_digit())
                .try_fold(None, |acc: Option<usize>, ch| {
                    acc.unwrap_or(0)
                        .checked_mul(10)?
                        .checked_add(usize::from(ch - b'0'))
                        .map(Some)
                })??;
            return Some(vec![Type::Array(len)]);
        }
        None
    }
}
