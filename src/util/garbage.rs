/*!
 Detects text that is really binary archive data that was decoded as characters.

 When `attributedBody` bytes are read as UTF-16 instead of being unarchived, the result is valid
 Unicode that renders as plausible glyphs. The most common case is the `typedstream` header itself:

 ```txt
 bytes:  04 0b 73 74 72 65 61 6d 74 79 70 65
 UTF-16: U+0B04 U+7473 U+6572 U+6D61 U+7974 U+6570
 glyphs: ଄       瑳     敲     浡     祴     数
 ```

 The first code unit lands in the Oriya block and the rest are CJK ideographs. That pairing is the
 fingerprint checked by [`GarbageReason::OriyaCjkFingerprint`].

 The checks run in the order listed in [`GARBAGE_RULES`]; the first match wins. Each rule only looks
 at the characters of the text, never at where the text came from.
*/

use std::fmt::{Display, Formatter, Result};

use crate::util::metadata::is_leaked_metadata;

/// Archive signatures that never appear in text a person typed
const ARCHIVER_MAGIC: [&str; 2] = ["bplist", "streamtyped"];
/// Default share of control and private use characters tolerated in a message
const DEFAULT_MAX_CONTROL_RATIO: f64 = 0.10;

/// Why a string was classified as garbage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GarbageReason {
    /// The text contains an archive signature like `bplist` or `streamtyped`
    ArchiverMagic,
    /// The text mixes Oriya and CJK ideographs, the signature of a `typedstream` header read as UTF-16
    OriyaCjkFingerprint,
    /// The text starts with an Oriya character followed by characters from unrelated scripts
    OriyaLeadSignature,
    /// The text contains a class name or attribute key as a whole word
    LeakedMetadata,
    /// Too much of the text is control or private use characters
    ControlDensity,
}

impl Display for GarbageReason {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            GarbageReason::ArchiverMagic => write!(fmt, "archive signature"),
            GarbageReason::OriyaCjkFingerprint => write!(fmt, "Oriya and CJK fingerprint"),
            GarbageReason::OriyaLeadSignature => write!(fmt, "Oriya lead signature"),
            GarbageReason::LeakedMetadata => write!(fmt, "leaked archiver metadata"),
            GarbageReason::ControlDensity => write!(fmt, "control character density"),
        }
    }
}

/// The result of classifying a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationVerdict {
    /// `true` if the text should not be displayed
    pub is_garbage: bool,
    /// The first rule that matched, if any
    pub reason: Option<GarbageReason>,
}

impl ClassificationVerdict {
    fn clean() -> Self {
        Self {
            is_garbage: false,
            reason: None,
        }
    }

    fn garbage(reason: GarbageReason) -> Self {
        Self {
            is_garbage: true,
            reason: Some(reason),
        }
    }
}

/// Tunable thresholds used by the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    /// The text is garbage if strictly more than this share of its characters are control or private use characters
    pub max_control_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_control_ratio: DEFAULT_MAX_CONTROL_RATIO,
        }
    }
}

/// A named check that marks text as garbage when it returns `true`
#[derive(Clone, Copy)]
pub struct GarbageRule {
    pub reason: GarbageReason,
    pub check: fn(&str, &ClassifierConfig) -> bool,
}

/// Every rule the classifier runs, in order
pub static GARBAGE_RULES: &[GarbageRule] = &[
    GarbageRule {
        reason: GarbageReason::ArchiverMagic,
        check: contains_archiver_magic,
    },
    GarbageRule {
        reason: GarbageReason::OriyaCjkFingerprint,
        check: has_oriya_cjk_fingerprint,
    },
    GarbageRule {
        reason: GarbageReason::OriyaLeadSignature,
        check: has_oriya_lead_signature,
    },
    GarbageRule {
        reason: GarbageReason::LeakedMetadata,
        check: contains_leaked_metadata,
    },
    GarbageRule {
        reason: GarbageReason::ControlDensity,
        check: exceeds_control_density,
    },
];

/// Classifies text using [`GARBAGE_RULES`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GarbageTextClassifier {
    config: ClassifierConfig,
}

impl GarbageTextClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Determine if `text` is binary data masquerading as text. Empty text is never garbage.
    pub fn classify(&self, text: &str) -> ClassificationVerdict {
        if text.is_empty() {
            return ClassificationVerdict::clean();
        }

        GARBAGE_RULES
            .iter()
            .find(|rule| (rule.check)(text, &self.config))
            .map_or_else(ClassificationVerdict::clean, |rule| {
                ClassificationVerdict::garbage(rule.reason)
            })
    }
}

/// Classify `text` with the default [`ClassifierConfig`]
///
/// # Example:
///
/// ```
/// use imessage_body::util::garbage::{classify, GarbageReason};
///
/// assert!(!classify("你好，世界！").is_garbage);
///
/// let verdict = classify("\u{0B04}\u{7473}\u{6572}\u{6D61}");
/// assert_eq!(verdict.reason, Some(GarbageReason::OriyaCjkFingerprint));
/// ```
pub fn classify(text: &str) -> ClassificationVerdict {
    GarbageTextClassifier::default().classify(text)
}

fn contains_archiver_magic(text: &str, _: &ClassifierConfig) -> bool {
    ARCHIVER_MAGIC.iter().any(|magic| text.contains(magic))
}

fn has_oriya_cjk_fingerprint(text: &str, _: &ClassifierConfig) -> bool {
    text.chars().any(is_oriya) && text.chars().any(is_cjk_ideograph)
}

/// Catches a truncated header that lost its CJK half, i.e. U+0B04 followed by replacement characters
fn has_oriya_lead_signature(text: &str, _: &ClassifierConfig) -> bool {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) => is_oriya(first) && is_misread_follower(second),
        _ => false,
    }
}

fn contains_leaked_metadata(text: &str, _: &ClassifierConfig) -> bool {
    text.split_whitespace()
        .map(|word| word.trim_matches(is_word_boundary))
        .any(is_leaked_metadata)
}

fn exceeds_control_density(text: &str, config: &ClassifierConfig) -> bool {
    let (total, suspicious) = text.chars().fold((0usize, 0usize), |(total, suspicious), c| {
        (total + 1, suspicious + usize::from(is_suspicious(c)))
    });
    total > 0 && (suspicious as f64 / total as f64) > config.max_control_ratio
}

/// Punctuation that can surround a word in a sentence
fn is_word_boundary(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | ',' | '.' | ';' | ':' | '!' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>'
    )
}

fn is_oriya(c: char) -> bool {
    ('\u{0B00}'..='\u{0B7F}').contains(&c)
}

fn is_cjk_ideograph(c: char) -> bool {
    matches!(
        c,
        '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{20000}'..='\u{2EBEF}'
            | '\u{30000}'..='\u{3134F}'
    )
}

fn is_private_use(c: char) -> bool {
    matches!(
        c,
        '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}'
    )
}

/// Control characters other than line breaks and tabs, and private use characters
fn is_suspicious(c: char) -> bool {
    (c.is_control() && !matches!(c, '\n' | '\r' | '\t')) || is_private_use(c)
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '\u{00C0}'..='\u{024F}' | '\u{1E00}'..='\u{1EFF}')
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{00A0}'..='\u{00BF}'
                | '\u{0964}'..='\u{0965}'
                | '\u{2000}'..='\u{206F}'
                | '\u{3000}'..='\u{303F}'
                | '\u{FE30}'..='\u{FE4F}'
                | '\u{FF00}'..='\u{FF65}'
        )
}

fn is_emoji(c: char) -> bool {
    matches!(
        c,
        '\u{2600}'..='\u{27BF}' | '\u{FE0F}' | '\u{1F000}'..='\u{1FAFF}'
    )
}

/// A character that could follow the Oriya code unit in a misread header, but not in real writing
fn is_misread_follower(c: char) -> bool {
    if c.is_control() || is_private_use(c) || c == char::REPLACEMENT_CHARACTER {
        return true;
    }
    !c.is_ascii()
        && !c.is_whitespace()
        && !is_oriya(c)
        && !is_latin(c)
        && !is_punctuation(c)
        && !is_emoji(c)
}
