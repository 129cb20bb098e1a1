/*!
 Contains logic to parse detailed data from a `typedstream`, focussing specifically on [NSAttributedString](https://developer.apple.com/documentation/foundation/nsattributedstring).

 Logic referenced from `typedstream` source located at:
   - [`typedstream.h`](https://opensource.apple.com/source/gcc/gcc-1493/libobjc/objc/typedstream.h.auto.html)
   - [`archive.c`](https://opensource.apple.com/source/gcc/gcc-5484/libobjc/archive.c.auto.html)
   - [`objc/typedstream.m`](https://archive.org/details/darwin_0.1)
*/
use crate::{
    error::typedstream::TypedStreamError,
    util::typedstream::models::{Archivable, Class, OutputData, Type},
};

/// Indicates an [`i16`] in the byte stream
const I_16: u8 = 0x81;
/// Indicates an [`i32`] in the byte stream
const I_32: u8 = 0x82;
/// Indicates an [`f32`] or [`f64`] in the byte stream; the [`Type`] determines the size
const DECIMAL: u8 = 0x83;
/// Indicates the start of a new object, class, or shared string
const START: u8 = 0x84;
/// Indicates that there is no more data to parse, for example the end of a class inheritance chain
const EMPTY: u8 = 0x85;
/// Indicates the last byte of an object
const END: u8 = 0x86;
/// References are encoded as signed integers offset by this tag, so `0x92` is the first item in a table
const REFERENCE_TAG: u8 = 0x92;

/// Encoding version written by `NSArchiver`
const STREAM_VERSION: u64 = 4;
/// Encoding signature written by `NSArchiver`
const SIGNATURE: &[u8] = b"streamtyped";
/// System version written by `NSArchiver` on macOS and iOS
const SYSTEM_VERSION: i64 = 1000;
/// Objects and class chains nested deeper than this are rejected
const MAX_NESTING: usize = 64;

/// Contains logic and data used to parse data from a `typedstream`
#[derive(Debug)]
pub struct TypedStreamReader<'a> {
    /// The `typedstream` we want to parse
    stream: &'a [u8],
    /// The current index we are at in the stream
    idx: usize,
    /// As we parse the `typedstream`, build a table of shared strings to reference in the future
    ///
    /// Type encodings, class names, and C strings are shared: the first time one is seen it is present
    /// in the stream literally, but afterwards it is only referenced by index in order of appearance.
    strings_table: Vec<Vec<u8>>,
    /// As we parse the `typedstream`, build a table of seen objects and classes to reference in the future
    object_table: Vec<Archivable>,
    /// How many objects or superclasses are currently being read inside one another
    depth: usize,
}

impl<'a> From<&'a [u8]> for TypedStreamReader<'a> {
    fn from(stream: &'a [u8]) -> Self {
        Self {
            stream,
            idx: 0,
            strings_table: vec![],
            object_table: vec![],
            depth: 0,
        }
    }
}

impl<'a> TypedStreamReader<'a> {
    /// Read a signed integer from the stream. Because we don't know the size of the integer ahead of time,
    /// we store it in the largest possible value.
    fn read_signed_int(&mut self) -> Result<i64, TypedStreamError> {
        match self.get_current_byte()? {
            I_16 => {
                let size = 2;
                self.idx += 1;
                let value = i16::from_le_bytes(
                    self.read_exact_bytes(size)?
                        .try_into()
                        .map_err(TypedStreamError::SliceError)?,
                );
                Ok(value as i64)
            }
            I_32 => {
                let size = 4;
                self.idx += 1;
                let value = i32::from_le_bytes(
                    self.read_exact_bytes(size)?
                        .try_into()
                        .map_err(TypedStreamError::SliceError)?,
                );
                Ok(value as i64)
            }
            _ => {
                let value = i8::from_le_bytes([self.get_current_byte()?]);
                self.idx += 1;
                Ok(value as i64)
            }
        }
    }

    /// Read an unsigned integer from the stream. Because we don't know the size of the integer ahead of time,
    /// we store it in the largest possible value.
    fn read_unsigned_int(&mut self) -> Result<u64, TypedStreamError> {
        match self.get_current_byte()? {
            I_16 => {
                let size = 2;
                self.idx += 1;
                let value = u16::from_le_bytes(
                    self.read_exact_bytes(size)?
                        .try_into()
                        .map_err(TypedStreamError::SliceError)?,
                );
                Ok(value as u64)
            }
            I_32 => {
                let size = 4;
                self.idx += 1;
                let value = u32::from_le_bytes(
                    self.read_exact_bytes(size)?
                        .try_into()
                        .map_err(TypedStreamError::SliceError)?,
                );
                Ok(value as u64)
            }
            _ => {
                let value = u8::from_le_bytes([self.get_current_byte()?]);
                self.idx += 1;
                Ok(value as u64)
            }
        }
    }

    /// Read a single-precision float from the byte stream
    fn read_float(&mut self) -> Result<f32, TypedStreamError> {
        match self.get_current_byte()? {
            DECIMAL => {
                let size = 4;
                self.idx += 1;
                let value = f32::from_le_bytes(
                    self.read_exact_bytes(size)?
                        .try_into()
                        .map_err(TypedStreamError::SliceError)?,
                );
                Ok(value)
            }
            _ => Ok(self.read_signed_int()? as f32),
        }
    }

    /// Read a double-precision float from the byte stream
    fn read_double(&mut self) -> Result<f64, TypedStreamError> {
        match self.get_current_byte()? {
            DECIMAL => {
                let size = 8;
                self.idx += 1;
                let value = f64::from_le_bytes(
                    self.read_exact_bytes(size)?
                        .try_into()
                        .map_err(TypedStreamError::SliceError)?,
                );
                Ok(value)
            }
            _ => Ok(self.read_signed_int()? as f64),
        }
    }

    /// Read exactly `n` bytes from the stream
    fn read_exact_bytes(&mut self, n: usize) -> Result<&'a [u8], TypedStreamError> {
        let end = self
            .idx
            .checked_add(n)
            .ok_or(TypedStreamError::OutOfBounds(usize::MAX, self.stream.len()))?;
        let range = self
            .stream
            .get(self.idx..end)
            .ok_or(TypedStreamError::OutOfBounds(end, self.stream.len()))?;
        self.idx = end;
        Ok(range)
    }

    /// Get the byte at a given index, if the index is within the bounds of the `typedstream`
    fn get_byte(&self, byte_idx: usize) -> Result<u8, TypedStreamError> {
        self.stream
            .get(byte_idx)
            .copied()
            .ok_or(TypedStreamError::OutOfBounds(byte_idx, self.stream.len()))
    }

    /// Read the current byte
    fn get_current_byte(&self) -> Result<u8, TypedStreamError> {
        self.get_byte(self.idx)
    }

    /// Read a length-prefixed run of bytes that is not stored in any table
    fn read_unshared_bytes(&mut self) -> Result<&'a [u8], TypedStreamError> {
        let length = self.read_unsigned_int()?;
        let length = usize::try_from(length)
            .map_err(|_| TypedStreamError::OutOfBounds(usize::MAX, self.stream.len()))?;
        self.read_exact_bytes(length)
    }

    /// Read String data
    fn read_string(&mut self) -> Result<String, TypedStreamError> {
        let bytes = self.read_unshared_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(TypedStreamError::StringParseError)
    }

    /// Read a reference to an item in one of the tables.
    ///
    /// References are signed integers offset from [`REFERENCE_TAG`], so a single byte can address
    /// the first few hundred items and larger tables use the tagged integer forms.
    fn read_pointer(&mut self) -> Result<usize, TypedStreamError> {
        let value = match self.get_current_byte()? {
            I_16 | I_32 => self.read_signed_int()?,
            byte => {
                self.idx += 1;
                i8::from_le_bytes([byte]) as i64
            }
        };
        let first_reference = i8::from_le_bytes([REFERENCE_TAG]) as i64;
        usize::try_from(value - first_reference).map_err(|_| TypedStreamError::InvalidPointer(value))
    }

    /// Read a shared string, either literally from the stream or from [`TypedStreamReader::strings_table`]
    ///
    /// Because methods that use this string can also mutate self, returning a reference here means
    /// other methods could make that reference to the table invalid, so we return a clone of the cached data.
    fn read_shared_string(&mut self) -> Result<Option<Vec<u8>>, TypedStreamError> {
        let index = match self.get_current_byte()? {
            START => {
                self.idx += 1;
                let bytes = self.read_unshared_bytes()?;
                self.strings_table.push(bytes.to_vec());
                return Ok(Some(bytes.to_vec()));
            }
            EMPTY => {
                self.idx += 1;
                return Ok(None);
            }
            _ => self.read_pointer()?,
        };
        self.strings_table
            .get(index)
            .cloned()
            .map(Some)
            .ok_or(TypedStreamError::InvalidPointer(index as i64))
    }

    /// Read a C string, which wraps a shared string in its own header
    fn read_c_string(&mut self) -> Result<Option<String>, TypedStreamError> {
        if self.get_current_byte()? == START {
            self.idx += 1;
        }
        self.read_shared_string()?
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|why| TypedStreamError::StringParseError(why.utf8_error()))
            })
            .transpose()
    }

    /// Determine the current types
    fn read_type(&mut self) -> Result<Vec<Type>, TypedStreamError> {
        let types = self
            .read_shared_string()?
            .ok_or(TypedStreamError::InvalidType(EMPTY))?;
        Type::from_encoding(&types)
    }

    /// Read a class and its inheritance chain. New classes are added to the object table in order of
    /// inheritance, i.e. `NSMutableString` before `NSString` before `NSObject`.
    fn read_class(&mut self) -> Result<Option<Class>, TypedStreamError> {
        match self.get_current_byte()? {
            START => {
                self.idx += 1;
                let position = self.idx;
                let name = self
                    .read_shared_string()?
                    .ok_or(TypedStreamError::InvalidClass(position))?;
                let name = String::from_utf8(name)
                    .map_err(|why| TypedStreamError::StringParseError(why.utf8_error()))?;
                let version = self.read_unsigned_int()?;

                let class = Class::new(name, version);
                self.object_table.push(Archivable::Class(class.clone()));

                // The parent classes are only needed so that later references resolve
                self.nested(Self::read_class)?;
                Ok(Some(class))
            }
            EMPTY => {
                self.idx += 1;
                Ok(None)
            }
            _ => {
                let index = self.read_pointer()?;
                match self.object_table.get(index) {
                    Some(Archivable::Class(class)) => Ok(Some(class.clone())),
                    _ => Err(TypedStreamError::InvalidClass(index)),
                }
            }
        }
    }

    /// Read an object into the object table, returning its index
    fn read_object(&mut self) -> Result<Option<usize>, TypedStreamError> {
        match self.get_current_byte()? {
            START => {
                self.idx += 1;
                let slot = self.object_table.len();
                self.object_table.push(Archivable::Placeholder);

                let (class, data) = self.nested(|reader| {
                    let class = reader
                        .read_class()?
                        .ok_or(TypedStreamError::InvalidClass(slot))?;
                    Ok((class, reader.read_object_data()?))
                })?;

                self.object_table[slot] = Archivable::Object(class, data);
                Ok(Some(slot))
            }
            EMPTY => {
                self.idx += 1;
                Ok(None)
            }
            _ => {
                let index = self.read_pointer()?;
                if index >= self.object_table.len() {
                    return Err(TypedStreamError::InvalidPointer(index as i64));
                }
                Ok(Some(index))
            }
        }
    }

    /// Run `read` one level deeper, failing instead of recursing past [`MAX_NESTING`]
    fn nested<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, TypedStreamError>,
    ) -> Result<T, TypedStreamError> {
        if self.depth >= MAX_NESTING {
            return Err(TypedStreamError::NestingTooDeep(self.idx));
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    /// Read the groups of typed values an object encodes, until the end of the object
    fn read_object_data(&mut self) -> Result<Vec<OutputData>, TypedStreamError> {
        let mut out_v = vec![];
        while self.get_current_byte()? != END {
            let found_types = self.read_type()?;
            out_v.extend(self.read_types(found_types)?);
        }
        self.idx += 1;
        Ok(out_v)
    }

    /// Given some [`Type`]s, look at the stream and parse the data according to the specified [`Type`]
    fn read_types(&mut self, found_types: Vec<Type>) -> Result<Vec<OutputData>, TypedStreamError> {
        let mut out_v = Vec::with_capacity(found_types.len());

        for found_type in found_types {
            let item = match found_type {
                Type::Utf8String => OutputData::String(self.read_string()?),
                Type::CString => self
                    .read_c_string()?
                    .map_or(OutputData::Null, OutputData::CString),
                Type::Object => self
                    .read_object()?
                    .map_or(OutputData::Null, OutputData::Object),
                Type::SignedInt => OutputData::SignedInteger(self.read_signed_int()?),
                Type::UnsignedInt => OutputData::UnsignedInteger(self.read_unsigned_int()?),
                Type::Float => OutputData::Float(self.read_float()?),
                Type::Double => OutputData::Double(self.read_double()?),
                Type::Array(size) => OutputData::Array(self.read_exact_bytes(size)?.to_vec()),
            };
            out_v.push(item);
        }

        Ok(out_v)
    }

    /// `NXTypedStream` supports several variants of the header, but we only need to validate
    /// that this is the header used by macOS/iOS, as iMessage is not available on any NeXT platform
    pub(crate) fn validate_header(&mut self) -> Result<(), TypedStreamError> {
        // Encoding type
        let typedstream_version = self.read_unsigned_int()?;
        // Encoding signature
        let signature = self.read_unshared_bytes()?;
        // System version
        let system_version = self.read_signed_int()?;

        if typedstream_version != STREAM_VERSION
            || signature != SIGNATURE
            || system_version != SYSTEM_VERSION
        {
            return Err(TypedStreamError::InvalidHeader);
        }

        Ok(())
    }

    /// Get the objects and classes read so far, in the order they appear in the stream.
    ///
    /// If [`TypedStreamReader::parse()`] failed partway through, objects that were completely read
    /// before the failure are still present; objects that were still being read are
    /// [`Archivable::Placeholder`]s.
    pub fn objects(&self) -> &[Archivable] {
        &self.object_table
    }

    /// Attempt to get the data from the `typedstream`
    ///
    /// Returns the top-level values in the stream. For `attributedBody` data, this is a single
    /// [`OutputData::Object`] pointing at the `NSAttributedString`; the text and its attributes are
    /// read from [`TypedStreamReader::objects()`]:
    ///
    /// ```txt
    /// 0: Object(Class { name: "NSAttributedString", version: 0 }, [Object(3), SignedInteger(1), UnsignedInteger(7), Object(5)])
    /// 1: Class(Class { name: "NSAttributedString", version: 0 })
    /// 2: Class(Class { name: "NSObject", version: 0 })
    /// 3: Object(Class { name: "NSString", version: 1 }, [String("Example")]) // The message text
    /// 4: Class(Class { name: "NSString", version: 1 })
    /// 5: Object(Class { name: "NSDictionary", version: 0 }, [SignedInteger(1), Object(7), Object(8)]) // Attributes for chars 1 through 7
    /// 6: Class(Class { name: "NSDictionary", version: 0 })
    /// 7: Object(Class { name: "NSString", version: 1 }, [String("__kIMMessagePartAttributeName")])
    /// 8: Object(Class { name: "NSNumber", version: 0 }, [CString("i"), SignedInteger(0)])
    /// ```
    pub fn parse(&mut self) -> Result<Vec<OutputData>, TypedStreamError> {
        let mut out_v = vec![];

        self.validate_header()?;

        while self.idx < self.stream.len() {
            if self.get_current_byte()? == END {
                self.idx += 1;
                continue;
            }

            // First, get the current type
            let found_types = self.read_type()?;
            out_v.extend(self.read_types(found_types)?);
        }

        Ok(out_v)
    }
}
