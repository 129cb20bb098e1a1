/*!
 The entry point for turning a message row's `attributedBody` and `text` columns into display text.

 Decoding runs in stages:

 1. [`sniff`] tags the `attributedBody` bytes as a binary property list, a `typedstream`, or neither
 2. The matching extractor recovers the message text from the archive
 3. The [`GarbageTextClassifier`] rejects text that is really misread binary data
 4. If no acceptable text was recovered, the plain `text` column is classified and used instead
*/

use tracing::{debug, trace};

use crate::{
    tables::messages::models::ExtractedText,
    util::{
        format::{sniff, DetectedFormat},
        garbage::{ClassifierConfig, GarbageTextClassifier},
        plist,
        typedstream::extractor,
    },
};

/// Options that change how message bodies are decoded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
    /// Thresholds used when deciding if text is garbage
    pub classifier: ClassifierConfig,
    /// If `true`, a body that decodes to garbage falls back to the `text` column. If `false`, the message has no text.
    pub fallback_on_rejected_body: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            fallback_on_rejected_body: true,
        }
    }
}

/// The result of decoding the `attributedBody` column on its own
#[derive(Debug, PartialEq)]
enum BodyOutcome {
    /// Text was recovered and passed the classifier
    Accepted(ExtractedText),
    /// Text was recovered but the classifier rejected it
    Rejected,
    /// No text could be recovered
    Missing,
}

/// Decodes message bodies with a fixed [`DecoderConfig`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Decode a message body, keeping track of which column the text came from
    ///
    /// # Example:
    ///
    /// ```
    /// use imessage_body::tables::messages::{body::Decoder, models::TextSource};
    ///
    /// let decoder = Decoder::default();
    /// let text = decoder.decode_text(None, Some("Unknown")).unwrap();
    /// assert_eq!(text.value, "Unknown");
    /// assert_eq!(text.source, TextSource::PlainFallback);
    /// ```
    pub fn decode_text(
        &self,
        raw_bytes: Option<&[u8]>,
        fallback_text: Option<&str>,
    ) -> Option<ExtractedText> {
        if let Some(bytes) = raw_bytes {
            match self.decode_body(bytes) {
                BodyOutcome::Accepted(text) => return Some(text),
                BodyOutcome::Rejected if !self.config.fallback_on_rejected_body => return None,
                BodyOutcome::Rejected | BodyOutcome::Missing => {}
            }
        }
        self.decode_fallback(fallback_text)
    }

    /// Decode a message body into the text to display, or [`None`] if there is nothing to show
    ///
    /// A body that decodes to garbage falls back to the `text` column unless
    /// [`DecoderConfig::fallback_on_rejected_body`] is `false`.
    pub fn decode(&self, raw_bytes: Option<&[u8]>, fallback_text: Option<&str>) -> Option<String> {
        self.decode_text(raw_bytes, fallback_text)
            .map(|text| text.value)
    }

    fn classifier(&self) -> GarbageTextClassifier {
        GarbageTextClassifier::new(self.config.classifier)
    }

    fn decode_body(&self, bytes: &[u8]) -> BodyOutcome {
        let format = sniff(bytes);
        let extracted = match format {
            DetectedFormat::BinaryPlist => plist::extract(bytes),
            DetectedFormat::TypedStream => extractor::extract(bytes),
            DetectedFormat::Unrecognized => {
                debug!(len = bytes.len(), "Unrecognized attributedBody format");
                return BodyOutcome::Missing;
            }
        };

        let text = match extracted {
            Some(text) => text,
            None => return BodyOutcome::Missing,
        };

        let verdict = self.classifier().classify(&text.value);
        match verdict.reason {
            Some(reason) => {
                debug!(%format, %reason, "Rejected text decoded from attributedBody");
                BodyOutcome::Rejected
            }
            None => {
                trace!(%format, "Decoded attributedBody");
                BodyOutcome::Accepted(text)
            }
        }
    }

    fn decode_fallback(&self, fallback_text: Option<&str>) -> Option<ExtractedText> {
        let text = fallback_text.filter(|text| !text.is_empty())?;

        if let Some(reason) = self.classifier().classify(text).reason {
            debug!(%reason, "Rejected text column");
            return None;
        }
        trace!("Using text column");
        Some(ExtractedText::plain_fallback(text.to_string()))
    }
}

/// Decode a message body with the default [`DecoderConfig`]
///
/// A body that decodes to garbage falls back to `fallback_text`. Use a [`Decoder`] with
/// [`DecoderConfig::fallback_on_rejected_body`] set to `false` to drop the message text instead.
///
/// # Example:
///
/// ```
/// use imessage_body::tables::messages::body::decode;
///
/// assert_eq!(decode(None, Some("Unknown")), Some("Unknown".to_string()));
/// assert_eq!(decode(None, None), None);
/// ```
pub fn decode(raw_bytes: Option<&[u8]>, fallback_text: Option<&str>) -> Option<String> {
    Decoder::default().decode(raw_bytes, fallback_text)
}

#[cfg(test)]
mod tests {
    use std::env::current_dir;
    use std::fs::File;
    use std::io::Read;

    use quickcheck_macros::quickcheck;

    use crate::{
        tables::messages::{
            body::{decode, Decoder, DecoderConfig},
            models::TextSource,
        },
        util::garbage::classify,
    };

    fn read_fixture(folder: &str, name: &str) -> Vec<u8> {
        let path = current_dir()
            .unwrap()
            .as_path()
            .join("test_data")
            .join(folder)
            .join(name);
        let mut file = File::open(path).unwrap();
        let mut bytes = vec![];
        file.read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn can_use_fallback_without_body() {
        assert_eq!(decode(None, Some("Unknown")), Some("Unknown".to_string()));
    }

    #[test]
    fn can_decode_nothing() {
        assert_eq!(decode(None, None), None);
        assert_eq!(decode(None, Some("")), None);
        assert_eq!(decode(Some(&b""[..]), None), None);
    }

    #[test]
    fn can_decode_typedstream() {
        let bytes = read_fixture("typedstream", "AttributedBodyTextOnly");
        let text = Decoder::default()
            .decode_text(Some(bytes.as_slice()), Some("ignored"))
            .unwrap();

        assert_eq!(text.value, "Noter test");
        assert_eq!(text.source, TextSource::Structured);
    }

    #[test]
    fn can_decode_bplist() {
        let bytes = read_fixture("plist", "HelloWorld");
        assert_eq!(decode(Some(bytes.as_slice()), None), Some("Hello, world!".to_string()));
    }

    #[test]
    fn can_decode_multilingual() {
        let bytes = read_fixture("typedstream", "Multilingual");
        assert_eq!(
            decode(Some(bytes.as_slice()), None),
            Some("你好，世界！ Привет 👋".to_string())
        );
    }

    #[test]
    fn can_decode_corrupt_bplist_without_fallback() {
        let bytes = read_fixture("plist", "Corrupt");
        assert_eq!(decode(Some(bytes.as_slice()), None), None);
    }

    #[test]
    fn can_decode_corrupt_bplist_with_fallback() {
        let bytes = read_fixture("plist", "Corrupt");
        let text = Decoder::default()
            .decode_text(Some(bytes.as_slice()), Some("From the text column"))
            .unwrap();

        assert_eq!(text.value, "From the text column");
        assert_eq!(text.source, TextSource::PlainFallback);
    }

    #[test]
    fn can_decode_unrecognized_with_fallback() {
        assert_eq!(
            decode(Some(&b"hello there"[..]), Some("Hey")),
            Some("Hey".to_string())
        );
    }

    #[test]
    fn can_reject_garbage_body() {
        let bytes = read_fixture("plist", "Garbage");
        assert_eq!(decode(Some(bytes.as_slice()), None), None);
    }

    #[test]
    fn can_reject_garbage_body_with_fallback() {
        let bytes = read_fixture("plist", "Garbage");
        assert_eq!(
            decode(Some(bytes.as_slice()), Some("Hi")),
            Some("Hi".to_string())
        );

        let strict = Decoder::new(DecoderConfig {
            fallback_on_rejected_body: false,
            ..DecoderConfig::default()
        });
        assert_eq!(strict.decode(Some(bytes.as_slice()), Some("Hi")), None);
    }

    #[test]
    fn can_reject_garbage_fallback() {
        assert_eq!(
            decode(None, Some("\u{0B04}\u{7473}\u{6572}\u{6D61}\u{7974}\u{6570}")),
            None
        );
        assert_eq!(decode(None, Some("__kIMMessagePartAttributeName")), None);
    }

    #[test]
    fn can_keep_kimchi() {
        assert_eq!(
            decode(None, Some("I love eating kimchi")),
            Some("I love eating kimchi".to_string())
        );
    }

    #[test]
    fn can_prefer_body_over_fallback() {
        let bytes = read_fixture("typedstream", "Mention");
        assert_eq!(
            decode(Some(bytes.as_slice()), Some("Test Dad")),
            Some("Test Dad ".to_string())
        );
    }

    #[test]
    fn can_fall_back_from_hostile_typedstream() {
        let mut bytes = b"\x04\x0bstreamtyped\x81\xe8\x03".to_vec();
        bytes.extend([0x84, 0x01, b'@', 0x84, 0x84, 0x84, 0x01, b'A', 0x00, 0x85]);
        for _ in 0..1000 {
            bytes.extend([0x92, 0x84, 0x93]);
        }
        assert_eq!(decode(Some(bytes.as_slice()), Some("Hi")), Some("Hi".to_string()));

        let mut bytes = b"\x04\x0bstreamtyped\x81\xe8\x03".to_vec();
        bytes.extend(b"\x84\x0e[99999999999c]");
        assert_eq!(decode(Some(bytes.as_slice()), Some("Hi")), Some("Hi".to_string()));
    }

    #[test]
    fn can_fall_back_from_hostile_bplist() {
        let bytes = read_fixture("plist", "DeepChain");
        assert_eq!(decode(Some(bytes.as_slice()), Some("Hi")), Some("Hi".to_string()));
    }

    #[quickcheck]
    fn decode_survives_typedstream_header(body: Vec<u8>) -> bool {
        let mut bytes = b"\x04\x0bstreamtyped\x81\xe8\x03".to_vec();
        bytes.extend(body);
        decode(Some(bytes.as_slice()), None).map_or(true, |text| !classify(&text).is_garbage)
    }

    #[quickcheck]
    fn decode_survives_bplist_header(body: Vec<u8>) -> bool {
        let mut bytes = b"bplist00".to_vec();
        bytes.extend(body);
        decode(Some(bytes.as_slice()), None).map_or(true, |text| !classify(&text).is_garbage)
    }

    #[quickcheck]
    fn decode_is_idempotent(bytes: Vec<u8>, fallback: Option<String>) -> bool {
        let first = decode(Some(bytes.as_slice()), fallback.as_deref());
        let second = decode(Some(bytes.as_slice()), fallback.as_deref());
        first == second
    }

    #[quickcheck]
    fn decode_never_returns_garbage(bytes: Vec<u8>, fallback: Option<String>) -> bool {
        decode(Some(bytes.as_slice()), fallback.as_deref())
            .map_or(true, |text| !classify(&text).is_garbage)
    }
}
