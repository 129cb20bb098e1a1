/*!
 Contains logic to recover message text from `NSKeyedArchiver` data stored as a binary property list.

 A keyed archive flattens its object graph into the `$objects` array. Objects point at each other
 with `UID` values that index into that array, and `$top` names the root object:

 ```txt
 $top:     { root: UID(1) }
 $objects: [
     "$null",
     { $class: UID(3), NSString: UID(2), NSAttributes: UID(4) },   // NSMutableAttributedString
     { $class: UID(5), NS.string: "Hello, world!" },                // NSMutableString
     { $classname: "NSMutableAttributedString", $classes: [...] },
     { $class: UID(6), NS.keys: [UID(7)], NS.objects: [UID(8)] },  // NSDictionary of attributes
     ...
 ]
 ```

 Text is recovered by walking the graph from the root and collecting every string leaf, skipping
 class descriptions and anything [`is_archiver_metadata`] recognizes.
*/

use std::{collections::HashSet, io::Cursor};

use plist::{Dictionary, Value};
use tracing::debug;

use crate::{
    error::plist::PlistParseError,
    tables::messages::models::ExtractedText,
    util::metadata::is_archiver_metadata,
};

/// Key in the archive root that holds the flattened object table
const OBJECTS: &str = "$objects";
/// Key in the archive root that names the root object(s)
const TOP: &str = "$top";
/// Key on an archived object that points to its class description
const CLASS: &str = "$class";
/// Keys used by an archived `NSDictionary`
const DICT_KEYS: &str = "NS.keys";
const DICT_OBJECTS: &str = "NS.objects";
/// Values nested deeper than this, counting each `UID` hop, are rejected
const MAX_DEPTH: usize = 256;

/// Recover the message text from a `bplist00` blob.
///
/// Returns [`None`] if the data is not a readable property list or if it contains no
/// string that is not archiver bookkeeping.
///
/// # Example:
///
/// ```
/// use imessage_body::util::plist::extract;
///
/// assert!(extract(b"bplist00 but not really").is_none());
/// ```
pub fn extract(bytes: &[u8]) -> Option<ExtractedText> {
    match extract_text(bytes) {
        Ok(text) => Some(ExtractedText::structured(text)),
        Err(why) => {
            debug!(len = bytes.len(), %why, "Unable to recover text from keyed archive");
            None
        }
    }
}

/// Parse the property list and concatenate every content string reachable from the root
fn extract_text(bytes: &[u8]) -> Result<String, PlistParseError> {
    let archive = Value::from_reader(Cursor::new(bytes)).map_err(PlistParseError::PlistError)?;

    let text: String = collect_string_leaves(&archive)?
        .into_iter()
        .filter(|leaf| !leaf.is_empty() && !is_archiver_metadata(leaf))
        .collect();

    if text.is_empty() {
        return Err(PlistParseError::NoContent);
    }
    Ok(text)
}

/// Collect every string reachable from the root of the archive, in the order they are found.
///
/// If the property list is not a keyed archive, the whole value tree is walked instead.
pub fn collect_string_leaves(archive: &Value) -> Result<Vec<&str>, PlistParseError> {
    let root = match archive.as_dictionary() {
        Some(root) if root.contains_key(OBJECTS) => root,
        _ => {
            let mut walker = ArchiveWalker::new(None);
            walker.visit(archive)?;
            return Ok(walker.leaves);
        }
    };

    let objects = extract_array_key(root, OBJECTS)?;
    let mut walker = ArchiveWalker::new(Some(objects));

    match extract_dictionary(root, TOP) {
        Ok(top) => {
            for (_, item) in top {
                walker.visit(item)?;
            }
        }
        // Without a named root, the object table itself is the best we have
        Err(_) => {
            for item in objects {
                walker.visit(item)?;
            }
        }
    }

    Ok(walker.leaves)
}

/// Walks a keyed archive, following `UID` references into the object table
struct ArchiveWalker<'a> {
    /// The archive's `$objects` table, if the property list is a keyed archive
    objects: Option<&'a [Value]>,
    /// Container objects that were already walked; archives can reference the same object more than once
    visited: HashSet<u64>,
    /// Every string found so far
    leaves: Vec<&'a str>,
    /// How many values are currently being walked inside one another
    depth: usize,
}

impl<'a> ArchiveWalker<'a> {
    fn new(objects: Option<&'a [Value]>) -> Self {
        Self {
            objects,
            visited: HashSet::new(),
            leaves: vec![],
            depth: 0,
        }
    }

    fn visit(&mut self, value: &'a Value) -> Result<(), PlistParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(PlistParseError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = self.visit_value(value);
        self.depth -= 1;
        result
    }

    fn visit_value(&mut self, value: &'a Value) -> Result<(), PlistParseError> {
        match value {
            Value::String(text) => self.leaves.push(text),
            Value::Uid(uid) => self.visit_uid(uid.get())?,
            Value::Array(items) => {
                for item in items {
                    self.visit(item)?;
                }
            }
            Value::Dictionary(dict) => self.visit_dictionary(dict)?,
            _ => {}
        }
        Ok(())
    }

    fn visit_uid(&mut self, uid: u64) -> Result<(), PlistParseError> {
        let objects = match self.objects {
            Some(objects) => objects,
            None => return Ok(()),
        };
        let object = usize::try_from(uid)
            .ok()
            .and_then(|idx| objects.get(idx))
            .ok_or(PlistParseError::InvalidUid(uid))?;

        // Strings are leaves, so only containers can form a cycle
        if matches!(object, Value::Array(_) | Value::Dictionary(_)) && !self.visited.insert(uid) {
            return Ok(());
        }
        self.visit(object)
    }

    fn visit_dictionary(&mut self, dict: &'a Dictionary) -> Result<(), PlistParseError> {
        if let (Some(Value::Array(keys)), Some(Value::Array(values))) =
            (dict.get(DICT_KEYS), dict.get(DICT_OBJECTS))
        {
            return self.visit_archived_dictionary(keys, values);
        }

        for (key, item) in dict {
            // Class descriptions are never message content
            if key == CLASS {
                continue;
            }
            self.visit(item)?;
        }
        Ok(())
    }

    /// An archived `NSDictionary` stores its keys and values as parallel arrays. Values stored
    /// under bookkeeping keys are attribute run data, i.e. link targets or mention handles, so
    /// they are skipped along with their keys.
    fn visit_archived_dictionary(
        &mut self,
        keys: &'a [Value],
        values: &'a [Value],
    ) -> Result<(), PlistParseError> {
        for (idx, key) in keys.iter().enumerate() {
            let key_text = self.resolve_string(key)?;
            if key_text.is_some_and(is_archiver_metadata) {
                continue;
            }
            self.visit(key)?;
            if let Some(value) = values.get(idx) {
                self.visit(value)?;
            }
        }
        Ok(())
    }

    /// Follow a `UID` to the string it points to, if it points to a string
    fn resolve_string(&self, value: &'a Value) -> Result<Option<&'a str>, PlistParseError> {
        match value {
            Value::String(text) => Ok(Some(text.as_str())),
            Value::Uid(uid) => {
                let objects = match self.objects {
                    Some(objects) => objects,
                    None => return Ok(None),
                };
                let object = usize::try_from(uid.get())
                    .ok()
                    .and_then(|idx| objects.get(idx))
                    .ok_or(PlistParseError::InvalidUid(uid.get()))?;
                Ok(object.as_string())
            }
            _ => Ok(None),
        }
    }
}

/// Extract a dictionary from a key-value pair that looks like `{key: {}}`
pub fn extract_dictionary<'a>(
    body: &'a Dictionary,
    key: &str,
) -> Result<&'a Dictionary, PlistParseError> {
    body.get(key)
        .ok_or_else(|| PlistParseError::MissingKey(key.to_string()))?
        .as_dictionary()
        .ok_or_else(|| PlistParseError::InvalidType(key.to_string(), "dictionary".to_string()))
}

/// Extract an array from a key-value pair that looks like `{key: []}`
pub fn extract_array_key<'a>(
    body: &'a Dictionary,
    key: &str,
) -> Result<&'a [Value], PlistParseError> {
    body.get(key)
        .ok_or_else(|| PlistParseError::MissingKey(key.to_string()))?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| PlistParseError::InvalidType(key.to_string(), "array".to_string()))
}

#[cfg(test)]
mod tests {
    use std::env::current_dir;
    use std::fs::File;
    use std::io::Read;

    use plist::Value;

    use crate::{
        tables::messages::models::TextSource,
        error::plist::PlistParseError,
        util::plist::{collect_string_leaves, extract},
    };

    fn read_fixture(name: &str) -> Vec<u8> {
        let plist_path = current_dir()
            .unwrap()
            .as_path()
            .join("test_data/plist")
            .join(name);
        let mut file = File::open(plist_path).unwrap();
        let mut bytes = vec![];
        file.read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extract_hello_world() {
        let bytes = read_fixture("HelloWorld");
        let result = extract(&bytes).unwrap();

        assert_eq!(result.value, "Hello, world!");
        assert_eq!(result.source, TextSource::Structured);
    }

    #[test]
    fn test_extract_skips_attribute_keys() {
        let bytes = read_fixture("WritingDirection");
        let result = extract(&bytes).unwrap();

        assert_eq!(result.value, "See you at 5");
    }

    #[test]
    fn test_extract_skips_attribute_values() {
        let bytes = read_fixture("Mention");
        let result = extract(&bytes).unwrap();

        assert_eq!(result.value, "Test Dad ");
    }

    #[test]
    fn test_extract_concatenates_runs() {
        let bytes = read_fixture("MultipleRuns");
        let result = extract(&bytes).unwrap();

        assert_eq!(result.value, "Hello, world!");
    }

    #[test]
    fn test_extract_survives_cycle() {
        let bytes = read_fixture("Cycle");
        let result = extract(&bytes).unwrap();

        assert_eq!(result.value, "Loop");
    }

    #[test]
    fn test_extract_plain_plist() {
        let bytes = read_fixture("PlainString");
        let result = extract(&bytes).unwrap();

        assert_eq!(result.value, "Just a string");
    }

    #[test]
    fn test_extract_metadata_only() {
        let bytes = read_fixture("MetadataOnly");
        assert!(extract(&bytes).is_none());
    }

    #[test]
    fn test_extract_bad_uid() {
        let bytes = read_fixture("BadUid");
        assert!(extract(&bytes).is_none());
    }

    #[test]
    fn test_extract_corrupt() {
        let bytes = read_fixture("Corrupt");
        assert!(extract(&bytes).is_none());
    }

    #[test]
    fn test_extract_truncated() {
        let bytes = read_fixture("HelloWorld");
        assert!(extract(&bytes[..20]).is_none());
    }

    #[test]
    fn test_extract_empty() {
        assert!(extract(&[]).is_none());
        assert!(extract(b"bplist00").is_none());
    }

    #[test]
    fn test_collect_leaves_in_order() {
        let bytes = read_fixture("WritingDirection");
        let archive = Value::from_reader(std::io::Cursor::new(bytes)).unwrap();
        let leaves = collect_string_leaves(&archive).unwrap();

        assert_eq!(leaves, vec!["See you at 5"]);
    }

    #[test]
    fn test_extract_long_chain() {
        let bytes = read_fixture("ShallowChain");
        let result = extract(&bytes).unwrap();

        assert_eq!(result.value, "Found it");
    }

    #[test]
    fn test_extract_too_deep() {
        let bytes = read_fixture("DeepChain");
        assert!(extract(&bytes).is_none());

        let archive = Value::from_reader(std::io::Cursor::new(bytes)).unwrap();
        assert!(matches!(
            collect_string_leaves(&archive),
            Err(PlistParseError::TooDeep(_))
        ));
    }

    #[test]
    fn test_extract_dollar_text() {
        let bytes = read_fixture("TickerSymbol");
        let result = extract(&bytes).unwrap();

        assert_eq!(result.value, "$TSLA");
    }
}
