/*!
 Errors that can happen when parsing `typedstream` data.
*/

use std::{
    array::TryFromSliceError,
    error::Error,
    fmt::{Display, Formatter, Result},
    str::Utf8Error,
};

/// Errors that can happen when parsing `typedstream` data
#[derive(Debug)]
pub enum TypedStreamError {
    OutOfBounds(usize, usize),
    InvalidHeader,
    SliceError(TryFromSliceError),
    StringParseError(Utf8Error),
    InvalidArray,
    InvalidPointer(i64),
    InvalidClass(usize),
    InvalidType(u8),
    NestingTooDeep(usize),
}

impl Display for TypedStreamError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            TypedStreamError::OutOfBounds(idx, len) => {
                write!(fmt, "Index {idx:x} is outside of range {len:x}!")
            }
            TypedStreamError::InvalidHeader => write!(fmt, "Invalid typedstream header!"),
            TypedStreamError::SliceError(why) => {
                write!(fmt, "Unable to slice source stream: {why}")
            }
            TypedStreamError::StringParseError(why) => write!(fmt, "Failed to parse string: {why}"),
            TypedStreamError::InvalidArray => write!(fmt, "Failed to parse array data"),
            TypedStreamError::InvalidPointer(why) => {
                write!(fmt, "Reference {why} does not point to a known item")
            }
            TypedStreamError::InvalidClass(why) => {
                write!(fmt, "Expected class data at index {why:x}")
            }
            TypedStreamError::InvalidType(why) => {
                write!(fmt, "Unsupported type encoding: {why:x}")
            }
            TypedStreamError::NestingTooDeep(idx) => {
                write!(fmt, "Objects nested too deeply at index {idx:x}")
            }
        }
    }
}

impl Error for TypedStreamError {}
