/*!
 Recovers the message text from `typedstream` data.
*/

use tracing::debug;

use crate::{
    tables::messages::models::ExtractedText,
    util::{metadata::is_archiver_metadata, typedstream::parser::TypedStreamReader},
};

/// Recover the message text from a `streamtyped` blob.
///
/// The text is the first string stored by any object in the stream that is not archiver
/// bookkeeping. In `attributedBody` data the `NSString` holding the text is written before the
/// attribute dictionaries, so the text survives even if the stream is damaged after it.
///
/// # Example:
///
/// ```
/// use imessage_body::util::typedstream::extractor::extract;
///
/// assert!(extract(b"\x04\x0bstreamtyped\x81\xe8\x03").is_none());
/// ```
pub fn extract(bytes: &[u8]) -> Option<ExtractedText> {
    let mut parser = TypedStreamReader::from(bytes);
    if let Err(why) = parser.parse() {
        debug!(len = bytes.len(), %why, "typedstream ended early");
    }

    let text = parser
        .objects()
        .iter()
        .flat_map(|object| object.text())
        .find(|text| !text.is_empty() && !is_archiver_metadata(text));

    if text.is_none() {
        debug!(len = bytes.len(), "No message text found in typedstream");
    }
    text.map(|text| ExtractedText::structured(text.to_string()))
}
