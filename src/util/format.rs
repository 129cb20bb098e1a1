/*!
 Detects which archive format was used to serialize an `attributedBody` blob.
*/

use std::fmt::{Display, Formatter, Result};

/// Magic bytes at the start of every binary property list
pub const BPLIST_MAGIC: &[u8; 8] = b"bplist00";
/// Signature token written by `NSArchiver` after its version and length bytes
pub const TYPEDSTREAM_SIGNATURE: &[u8] = b"streamtyped";
/// Only this many leading bytes are ever inspected
const SNIFF_WINDOW: usize = 8;
/// Version and length bytes that may precede the `streamtyped` signature
const MAX_TYPEDSTREAM_PREFIX: usize = 2;
/// The shortest run of the signature we accept inside the window
const MIN_SIGNATURE_RUN: usize = 6;

/// The archive formats that can be found in an `attributedBody` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectedFormat {
    /// `NSKeyedArchiver` data stored as a binary property list
    BinaryPlist,
    /// Legacy `NSArchiver` data stored as a `typedstream`
    TypedStream,
    /// Anything else, including empty and truncated data
    Unrecognized,
}

impl Display for DetectedFormat {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            DetectedFormat::BinaryPlist => write!(fmt, "bplist"),
            DetectedFormat::TypedStream => write!(fmt, "typedstream"),
            DetectedFormat::Unrecognized => write!(fmt, "unrecognized"),
        }
    }
}

/// Classify a blob by its leading bytes.
///
/// Only the first 8 bytes are read. A `typedstream` starts with a version byte and the
/// length of the signature (`0x04 0x0B`) before the literal `streamtyped`, so up to two
/// bytes below `0x20` are skipped before matching the signature.
///
/// # Example:
///
/// ```
/// use imessage_body::util::format::{sniff, DetectedFormat};
///
/// assert_eq!(sniff(b"bplist00\xd4\x01"), DetectedFormat::BinaryPlist);
/// assert_eq!(sniff(b"\x04\x0bstreamtyped"), DetectedFormat::TypedStream);
/// assert_eq!(sniff(b""), DetectedFormat::Unrecognized);
/// ```
pub fn sniff(bytes: &[u8]) -> DetectedFormat {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];

    if window == BPLIST_MAGIC {
        return DetectedFormat::BinaryPlist;
    }

    if is_typedstream(window) {
        return DetectedFormat::TypedStream;
    }

    DetectedFormat::Unrecognized
}

fn is_typedstream(window: &[u8]) -> bool {
    let prefix = window
        .iter()
        .take(MAX_TYPEDSTREAM_PREFIX)
        .take_while(|byte| **byte < 0x20)
        .count();
    let candidate = &window[prefix..];

    candidate.len() >= MIN_SIGNATURE_RUN && TYPEDSTREAM_SIGNATURE.starts_with(candidate)
}
