/*!
 Errors that can happen when parsing `plist` data.
*/

use std::{
    error::Error,
    fmt::{Display, Formatter, Result},
};

/// Errors that can happen when parsing the `plist` data stored in `attributedBody` blobs
#[derive(Debug)]
pub enum PlistParseError {
    PlistError(plist::Error),
    MissingKey(String),
    InvalidType(String, String),
    InvalidUid(u64),
    NoContent,
    TooDeep(usize),
}

impl Display for PlistParseError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            PlistParseError::PlistError(why) => write!(fmt, "Failed to parse plist: {why}"),
            PlistParseError::MissingKey(key) => write!(fmt, "Expected key {key}, found nothing!"),
            PlistParseError::InvalidType(key, value) => {
                write!(fmt, "Invalid data found at {key}, expected {value}")
            }
            PlistParseError::InvalidUid(uid) => {
                write!(fmt, "UID {uid} does not point to an archived object")
            }
            PlistParseError::NoContent => write!(fmt, "No message text found in archive"),
            PlistParseError::TooDeep(limit) => {
                write!(fmt, "Archive is nested more than {limit} levels deep")
            }
        }
    }
}

impl Error for PlistParseError {}
