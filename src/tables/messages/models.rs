/*!
 This module contains data structures that represent decoded message text.
*/

/// Where a piece of decoded message text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// Recovered from the `attributedBody` archive
    Structured,
    /// Taken from the plain `text` column
    PlainFallback,
}

/// Message text along with the stage that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// The text to display
    pub value: String,
    /// The stage the text was recovered from
    pub source: TextSource,
}

impl ExtractedText {
    pub fn structured(value: String) -> Self {
        Self {
            value,
            source: TextSource::Structured,
        }
    }

    pub fn plain_fallback(value: String) -> Self {
        Self {
            value,
            source: TextSource::PlainFallback,
        }
    }
}
