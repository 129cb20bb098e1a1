/*!
 Recognizes the bookkeeping strings that archivers write next to the message text.

 Both `NSKeyedArchiver` and `NSArchiver` data contain class names, attribute run keys, and
 reference markers alongside the text the user typed. These strings are valid text, so they
 have to be recognized by shape and discarded before any of them are shown as message content.

 The recognizers live in [`ARCHIVER_METADATA`], an ordered table of [`MetadataPattern`]s.
 Supporting a new token shape means adding a row to that table.
*/

/// A single recognizer for archiver bookkeeping tokens.
///
/// Every rule matches the whole token; none of them match a substring inside longer text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataRule {
    /// The token is exactly this string
    Exact(&'static str),
    /// A Cocoa class name: the prefix, an uppercase letter, then an identifier
    /// that contains at least one lowercase letter, i.e. `NSMutableString`
    ClassName(&'static str),
    /// An attribute run key: the prefix, an uppercase letter, then an identifier, i.e. `__kIMLinkAttributeName`
    AttributeKey(&'static str),
    /// An identifier that ends in this suffix, i.e. `IMBaseWritingDirectionAttributeName`
    Suffix(&'static str),
    /// A keyed archive property name, i.e. `NS.string` or `NS.rangeval.location`
    DottedProperty,
    /// A keyed archive reference marker: `$` followed by digits, i.e. `$0` or `$12`
    Reference,
}

/// A [`MetadataRule`] and whether the token it matches is also a sign of corrupt message text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataPattern {
    /// How the token is recognized
    pub rule: MetadataRule,
    /// If `true`, finding this token inside displayed text means archive data leaked into it
    pub leaks_into_text: bool,
}

impl MetadataPattern {
    const fn new(rule: MetadataRule, leaks_into_text: bool) -> Self {
        Self {
            rule,
            leaks_into_text,
        }
    }

    /// Determine if this pattern matches the entire `token`
    pub fn matches(&self, token: &str) -> bool {
        self.rule.matches(token)
    }
}

/// Known archiver bookkeeping tokens, in priority order
pub static ARCHIVER_METADATA: &[MetadataPattern] = &[
    MetadataPattern::new(MetadataRule::Exact("$null"), true),
    MetadataPattern::new(MetadataRule::ClassName("NS"), true),
    MetadataPattern::new(MetadataRule::Exact("NSURL"), true),
    MetadataPattern::new(MetadataRule::Exact("NSUUID"), true),
    MetadataPattern::new(MetadataRule::AttributeKey("__kIM"), true),
    MetadataPattern::new(MetadataRule::AttributeKey("kIM"), true),
    MetadataPattern::new(MetadataRule::Suffix("AttributeName"), true),
    MetadataPattern::new(MetadataRule::Suffix("MessagePart"), true),
    MetadataPattern::new(MetadataRule::DottedProperty, false),
    MetadataPattern::new(MetadataRule::Exact("$class"), false),
    MetadataPattern::new(MetadataRule::Exact("$classes"), false),
    MetadataPattern::new(MetadataRule::Exact("$classname"), false),
    MetadataPattern::new(MetadataRule::Exact("$top"), false),
    MetadataPattern::new(MetadataRule::Exact("$objects"), false),
    MetadataPattern::new(MetadataRule::Exact("$archiver"), false),
    MetadataPattern::new(MetadataRule::Exact("$version"), false),
    MetadataPattern::new(MetadataRule::Reference, false),
];

impl MetadataRule {
    /// Determine if this rule matches the entire `token`
    pub fn matches(&self, token: &str) -> bool {
        match self {
            MetadataRule::Exact(exact) => token == *exact,
            MetadataRule::ClassName(prefix) => token
                .strip_prefix(prefix)
                .filter(|rest| starts_uppercase(rest) && is_identifier(rest))
                .is_some_and(|rest| rest.bytes().any(|byte| byte.is_ascii_lowercase())),
            MetadataRule::AttributeKey(prefix) => token
                .strip_prefix(prefix)
                .is_some_and(|rest| starts_uppercase(rest) && is_identifier(rest)),
            MetadataRule::Suffix(suffix) => {
                token.len() > suffix.len() && token.ends_with(suffix) && is_identifier(token)
            }
            MetadataRule::DottedProperty => is_dotted_property(token),
            MetadataRule::Reference => token
                .strip_prefix('$')
                .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())),
        }
    }
}

/// Determine if `token` is archiver bookkeeping rather than message content.
///
/// # Example:
///
/// ```
/// use imessage_body::util::metadata::is_archiver_metadata;
///
/// assert!(is_archiver_metadata("NSMutableAttributedString"));
/// assert!(is_archiver_metadata("__kIMMessagePartAttributeName"));
/// assert!(!is_archiver_metadata("I love eating kimchi"));
/// ```
pub fn is_archiver_metadata(token: &str) -> bool {
    matching_pattern(token).is_some()
}

/// Get the highest priority pattern that matches `token`, if any
pub fn matching_pattern(token: &str) -> Option<&'static MetadataPattern> {
    ARCHIVER_METADATA
        .iter()
        .find(|pattern| pattern.matches(token))
}

/// Determine if `token` is bookkeeping that should never appear inside displayed text
pub fn is_leaked_metadata(token: &str) -> bool {
    ARCHIVER_METADATA
        .iter()
        .any(|pattern| pattern.leaks_into_text && pattern.matches(token))
}

fn starts_uppercase(text: &str) -> bool {
    text.bytes().next().is_some_and(|byte| byte.is_ascii_uppercase())
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

/// `NS.string`, `NS.rangeval.length`: a short uppercase namespace, then dotted lowercase-led segments
fn is_dotted_property(token: &str) -> bool {
    let mut segments = token.split('.');
    let namespace = match segments.next() {
        Some(namespace) => namespace,
        None => return false,
    };
    if !(2..=4).contains(&namespace.len()) || !namespace.bytes().all(|b| b.is_ascii_uppercase()) {
        return false;
    }

    let mut found = false;
    for segment in segments {
        if !segment.bytes().next().is_some_and(|b| b.is_ascii_lowercase())
            || !segment.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return false;
        }
        found = true;
    }
    found
}

#[cfg(test)]
mod tests {
    use crate::util::metadata::{
        is_archiver_metadata, is_leaked_metadata, matching_pattern, MetadataRule,
    };

    #[test]
    fn can_match_null() {
        assert!(is_archiver_metadata("$null"));
        assert!(!is_archiver_metadata("null"));
    }

    #[test]
    fn can_match_class_names() {
        assert!(is_archiver_metadata("NSString"));
        assert!(is_archiver_metadata("NSMutableString"));
        assert!(is_archiver_metadata("NSAttributedString"));
        assert!(is_archiver_metadata("NSMutableAttributedString"));
        assert!(is_archiver_metadata("NSDictionary"));
        assert!(is_archiver_metadata("NSObject"));
        assert!(is_archiver_metadata("NSURL"));
    }

    #[test]
    fn cant_match_class_like_text() {
        assert!(!is_archiver_metadata("NSFW"));
        assert!(!is_archiver_metadata("NS"));
        assert!(!is_archiver_metadata("NSString is a class"));
        assert!(!is_archiver_metadata("Nice String"));
        assert!(!is_archiver_metadata("NSNumber!"));
    }

    #[test]
    fn can_match_attribute_keys() {
        assert!(is_archiver_metadata("__kIMMessagePartAttributeName"));
        assert!(is_archiver_metadata("__kIMBaseWritingDirectionAttributeName"));
        assert!(is_archiver_metadata("__kIMMentionConfirmedMention"));
        assert!(is_archiver_metadata("kIMFileTransferGUIDAttributeName"));
    }

    #[test]
    fn cant_match_kim_inside_words() {
        assert!(!is_archiver_metadata("I love eating kimchi"));
        assert!(!is_archiver_metadata("kimchi"));
        assert!(!is_archiver_metadata("Kim"));
        assert!(!is_archiver_metadata("kIM"));
        assert!(!is_archiver_metadata("skIMpy"));
    }

    #[test]
    fn can_match_suffixes() {
        assert!(is_archiver_metadata("IMBaseWritingDirectionAttributeName"));
        assert!(is_archiver_metadata("IMOneTimeCodeMessagePart"));
        assert!(!is_archiver_metadata("AttributeName"));
        assert!(!is_archiver_metadata("my MessagePart"));
    }

    #[test]
    fn can_match_dotted_properties() {
        assert!(is_archiver_metadata("NS.string"));
        assert!(is_archiver_metadata("NS.rangeval.location"));
        assert!(!is_archiver_metadata("Mr.Smith"));
        assert!(!is_archiver_metadata("NS."));
        assert!(!is_archiver_metadata("e.g."));
        assert!(!is_archiver_metadata("See you at 5."));
    }

    #[test]
    fn can_match_references() {
        assert!(is_archiver_metadata("$0"));
        assert!(is_archiver_metadata("$12"));
        assert!(!is_archiver_metadata("$"));
        assert!(!is_archiver_metadata("$5.00"));
    }

    #[test]
    fn can_match_reserved_keys() {
        assert!(is_archiver_metadata("$class"));
        assert!(is_archiver_metadata("$classes"));
        assert!(is_archiver_metadata("$classname"));
        assert!(is_archiver_metadata("$top"));
        assert!(is_archiver_metadata("$objects"));
        assert!(is_archiver_metadata("$archiver"));
        assert!(is_archiver_metadata("$version"));
        assert_eq!(
            matching_pattern("$classes").map(|pattern| pattern.rule),
            Some(MetadataRule::Exact("$classes"))
        );
    }

    #[test]
    fn cant_match_dollar_words() {
        assert!(!is_archiver_metadata("$TSLA"));
        assert!(!is_archiver_metadata("$AAPL"));
        assert!(!is_archiver_metadata("$null2"));
        assert!(!is_archiver_metadata("$1a"));
    }

    #[test]
    fn can_get_priority() {
        assert_eq!(
            matching_pattern("$null").map(|pattern| pattern.rule),
            Some(MetadataRule::Exact("$null"))
        );
        assert_eq!(
            matching_pattern("__kIMLinkAttributeName").map(|pattern| pattern.rule),
            Some(MetadataRule::AttributeKey("__kIM"))
        );
        assert_eq!(matching_pattern("hello"), None);
    }

    #[test]
    fn references_do_not_leak() {
        assert!(!is_leaked_metadata("$5"));
        assert!(!is_leaked_metadata("NS.string"));
        assert!(is_leaked_metadata("NSString"));
        assert!(is_leaked_metadata("__kIMMessagePartAttributeName"));
    }
}
