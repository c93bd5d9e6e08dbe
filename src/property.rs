//! Typed property-list tree used for the trust settings database.
//!
//! Bytes are read and written by the `plist` crate; this module narrows its
//! value model down to the six kinds the trust database uses and refuses
//! anything else, so no data is dropped silently on the way back out.

use std::io::Cursor;

use crate::error::{Error, Result};

/// Serialization form for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// XML document, indented with two spaces.
    Xml,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyTree {
    Dictionary(Dictionary),
    Array(Vec<PropertyTree>),
    String(String),
    Data(Vec<u8>),
    Integer(i64),
    Boolean(bool),
}

impl PropertyTree {
    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            PropertyTree::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_dictionary_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            PropertyTree::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PropertyTree]> {
        match self {
            PropertyTree::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyTree::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            PropertyTree::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyTree::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyTree::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyTree::Dictionary(_) => "dictionary",
            PropertyTree::Array(_) => "array",
            PropertyTree::String(_) => "string",
            PropertyTree::Data(_) => "data",
            PropertyTree::Integer(_) => "integer",
            PropertyTree::Boolean(_) => "boolean",
        }
    }
}

/// Mapping from keys to values that keeps insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<(String, PropertyTree)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&PropertyTree> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PropertyTree> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Replaces the value in place when the key exists, appends otherwise.
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyTree) -> Option<PropertyTree> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyTree)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut PropertyTree)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, PropertyTree)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, PropertyTree)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

/// Parses an XML or binary property list.
pub fn decode(bytes: &[u8]) -> Result<PropertyTree> {
    let value = plist::Value::from_reader(Cursor::new(bytes))
        .map_err(|e| Error::Parse(e.to_string()))?;

    from_plist(value, "root")
}

pub fn encode(tree: &PropertyTree, format: Format) -> Result<Vec<u8>> {
    let value = to_plist(tree);
    let mut out = Vec::new();

    match format {
        Format::Xml => {
            let options = plist::XmlWriteOptions::default().indent(b' ', 2);
            value.to_writer_xml_with_options(&mut out, &options)
        }
        Format::Binary => value.to_writer_binary(&mut out),
    }
    .map_err(|e| Error::Encode(e.to_string()))?;

    if format == Format::Xml && !out.ends_with(b"\n") {
        out.push(b'\n');
    }

    Ok(out)
}

fn from_plist(value: plist::Value, path: &str) -> Result<PropertyTree> {
    Ok(match value {
        plist::Value::Dictionary(dict) => {
            let mut out = Dictionary::new();
            for (key, value) in dict {
                let child = from_plist(value, &format!("{}.{}", path, key))?;
                out.insert(key, child);
            }
            PropertyTree::Dictionary(out)
        }
        plist::Value::Array(items) => PropertyTree::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| from_plist(v, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()?,
        ),
        plist::Value::String(s) => PropertyTree::String(s),
        plist::Value::Data(bytes) => PropertyTree::Data(bytes),
        plist::Value::Boolean(b) => PropertyTree::Boolean(b),
        plist::Value::Integer(i) => match i.as_signed() {
            Some(i) => PropertyTree::Integer(i),
            None => {
                return Err(Error::Parse(format!(
                    "integer at {} does not fit in 64 signed bits: {:?}",
                    path, i
                )))
            }
        },
        plist::Value::Real(_) => return Err(unsupported("real", path)),
        plist::Value::Date(_) => return Err(unsupported("date", path)),
        plist::Value::Uid(_) => return Err(unsupported("uid", path)),
        _ => return Err(unsupported("unknown", path)),
    })
}

fn unsupported(kind: &str, path: &str) -> Error {
    Error::Parse(format!("unsupported property type `{}` at {}", kind, path))
}

fn to_plist(tree: &PropertyTree) -> plist::Value {
    match tree {
        PropertyTree::Dictionary(dict) => {
            let mut out = plist::Dictionary::new();
            for (key, value) in dict.iter() {
                out.insert(key.to_string(), to_plist(value));
            }
            plist::Value::Dictionary(out)
        }
        PropertyTree::Array(items) => plist::Value::Array(items.iter().map(to_plist).collect()),
        PropertyTree::String(s) => plist::Value::String(s.clone()),
        PropertyTree::Data(bytes) => plist::Value::Data(bytes.clone()),
        PropertyTree::Integer(i) => plist::Value::Integer((*i).into()),
        PropertyTree::Boolean(b) => plist::Value::Boolean(*b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>trustList</key>
	<dict>
		<key>ZZ01</key>
		<dict>
			<key>issuerName</key>
			<data>MBAxDjAMBgNVBAMMBVplbkNB</data>
			<key>serialNumber</key>
			<data>AQ==</data>
		</dict>
		<key>AA02</key>
		<dict>
			<key>trustSettings</key>
			<array/>
		</dict>
	</dict>
	<key>trustVersion</key>
	<integer>1</integer>
</dict>
</plist>
"#;

    fn nested() -> PropertyTree {
        let leaf: Dictionary = vec![
            ("name", PropertyTree::String("sslServer".to_string())),
            ("blob", PropertyTree::Data(vec![0x00, 0xff, 0x2a])),
            ("count", PropertyTree::Integer(-42)),
            ("enabled", PropertyTree::Boolean(false)),
        ]
        .into_iter()
        .collect();

        let root: Dictionary = vec![
            ("z-first", PropertyTree::Integer(i64::MAX)),
            (
                "a-second",
                PropertyTree::Array(vec![
                    PropertyTree::Dictionary(leaf.clone()),
                    PropertyTree::Array(vec![PropertyTree::Dictionary(leaf)]),
                    PropertyTree::Array(vec![]),
                ]),
            ),
            ("m-third", PropertyTree::Dictionary(Dictionary::new())),
        ]
        .into_iter()
        .collect();

        PropertyTree::Dictionary(root)
    }

    #[test]
    fn test_decode_preserves_key_order() {
        let tree = decode(EXPORTED.as_bytes()).unwrap();
        let root = tree.as_dictionary().unwrap();

        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["trustList", "trustVersion"]);

        let list = root.get("trustList").unwrap().as_dictionary().unwrap();
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["ZZ01", "AA02"]);

        let entry = list.get("ZZ01").unwrap().as_dictionary().unwrap();
        assert_eq!(
            entry.get("serialNumber").unwrap().as_data().unwrap(),
            &[0x01][..]
        );
        assert_eq!(root.get("trustVersion").unwrap().as_integer(), Some(1));
    }

    #[test]
    fn test_xml_round_trip() {
        let tree = nested();
        let xml = encode(&tree, Format::Xml).unwrap();

        assert_eq!(decode(&xml).unwrap(), tree);
    }

    #[test]
    fn test_binary_round_trip() {
        let tree = nested();
        let bin = encode(&tree, Format::Binary).unwrap();

        assert!(bin.starts_with(b"bplist00"));
        assert_eq!(decode(&bin).unwrap(), tree);
    }

    #[test]
    fn test_xml_uses_two_space_indent() {
        let xml = encode(&decode(EXPORTED.as_bytes()).unwrap(), Format::Xml).unwrap();
        let text = String::from_utf8(xml).unwrap();

        assert!(!text.contains('\t'));
        assert!(text.contains("  <key>trustList</key>"));
        assert!(text.contains("    <key>ZZ01</key>"));
        assert!(text.find("ZZ01").unwrap() < text.find("AA02").unwrap());
    }

    #[test]
    fn test_unsupported_types_fail_decode() {
        let real = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict><key>trustList</key><dict><key>x</key><real>1.5</real></dict></dict></plist>"#;
        match decode(real.as_bytes()) {
            Err(Error::Parse(msg)) => {
                assert!(msg.contains("real"));
                assert!(msg.contains("root.trustList.x"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }

        let date = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><array><date>2020-01-01T00:00:00Z</date></array></plist>"#;
        assert!(matches!(decode(date.as_bytes()), Err(Error::Parse(_))));
    }

    #[test]
    fn test_oversized_unsigned_integer_fails_decode() {
        let big = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict><key>n</key><integer>18446744073709551615</integer></dict></plist>"#;
        assert!(matches!(decode(big.as_bytes()), Err(Error::Parse(_))));
    }

    #[test]
    fn test_garbage_fails_decode() {
        assert!(matches!(decode(b"not a plist"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut dict: Dictionary = vec![
            ("a", PropertyTree::Integer(1)),
            ("b", PropertyTree::Integer(2)),
        ]
        .into_iter()
        .collect();

        let old = dict.insert("a", PropertyTree::Boolean(true));
        dict.insert("c", PropertyTree::Integer(3));

        assert_eq!(old, Some(PropertyTree::Integer(1)));
        assert_eq!(dict.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(dict.get("a").unwrap().as_boolean(), Some(true));
    }
}
