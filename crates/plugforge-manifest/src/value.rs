//! Ordered, format-neutral manifest value tree
//!
//! Keys keep insertion order so a manifest serialises in the order the
//! platform's field mapping declares, whatever the output format.

use ahash::AHashMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum ManifestValue {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    List(Vec<ManifestValue>),
    Table(ManifestTable),
}

impl ManifestValue {
    /// Empty strings, lists and tables are omitted from manifests
    pub fn is_empty(&self) -> bool {
        match self {
            ManifestValue::String(s) => s.is_empty(),
            ManifestValue::List(items) => items.is_empty(),
            ManifestValue::Table(table) => table.is_empty(),
            ManifestValue::Bool(_) | ManifestValue::Integer(_) | ManifestValue::Float(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ManifestValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&ManifestTable> {
        match self {
            ManifestValue::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ManifestValue]> {
        match self {
            ManifestValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert a literal from a platform definition
    pub fn from_toml(value: &toml::Value) -> Result<Self, String> {
        Ok(match value {
            toml::Value::String(s) => ManifestValue::String(s.clone()),
            toml::Value::Integer(i) => ManifestValue::Integer(*i),
            toml::Value::Float(f) => ManifestValue::Float(*f),
            toml::Value::Boolean(b) => ManifestValue::Bool(*b),
            toml::Value::Array(items) => ManifestValue::List(
                items
                    .iter()
                    .map(ManifestValue::from_toml)
                    .collect::<Result<_, _>>()?,
            ),
            toml::Value::Table(map) => {
                let mut table = ManifestTable::new();
                for (key, value) in map {
                    table.insert(key.clone(), ManifestValue::from_toml(value)?);
                }
                ManifestValue::Table(table)
            }
            toml::Value::Datetime(dt) => return Err(format!("datetime literal `{dt}` is not supported")),
        })
    }

    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ManifestValue::List(
            items
                .into_iter()
                .map(|s| ManifestValue::String(s.into()))
                .collect(),
        )
    }
}

impl From<&str> for ManifestValue {
    fn from(value: &str) -> Self {
        ManifestValue::String(value.to_string())
    }
}

impl From<String> for ManifestValue {
    fn from(value: String) -> Self {
        ManifestValue::String(value)
    }
}

impl From<bool> for ManifestValue {
    fn from(value: bool) -> Self {
        ManifestValue::Bool(value)
    }
}

impl From<ManifestTable> for ManifestValue {
    fn from(value: ManifestTable) -> Self {
        ManifestValue::Table(value)
    }
}

/// Insertion-ordered table with an index for key lookup
#[derive(Debug, Clone, Default)]
pub struct ManifestTable {
    entries: Vec<(String, ManifestValue)>,
    index: AHashMap<String, usize>,
}

impl PartialEq for ManifestTable {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl ManifestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ManifestValue> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut ManifestValue> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// Insert or replace; a replaced key keeps its original position
    pub fn insert(&mut self, key: impl Into<String>, value: ManifestValue) {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            self.entries[i].1 = value;
        } else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Insert at a dotted path such as `global.links.homepage`.
    ///
    /// A `name[]` segment addresses the single table inside a one-element
    /// list, creating it if needed; on the last segment it wraps the value
    /// in a one-element list instead.
    pub fn insert_path(&mut self, path: &str, value: ManifestValue) -> Result<(), String> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.trim_end_matches("[]").is_empty()) {
            return Err(format!("invalid key path `{path}`"));
        }
        let Some((last, parents)) = segments.split_last() else {
            return Err(format!("invalid key path `{path}`"));
        };

        let mut table = self;
        for segment in parents {
            table = table.child_table(segment, path)?;
        }

        match last.strip_suffix("[]") {
            Some(name) => table.insert(name, ManifestValue::List(vec![value])),
            None => table.insert(*last, value),
        }
        Ok(())
    }

    fn child_table(&mut self, segment: &str, path: &str) -> Result<&mut ManifestTable, String> {
        let (name, in_list) = match segment.strip_suffix("[]") {
            Some(name) => (name, true),
            None => (segment, false),
        };

        if self.get(name).is_none() {
            let fresh = if in_list {
                ManifestValue::List(vec![ManifestValue::Table(ManifestTable::new())])
            } else {
                ManifestValue::Table(ManifestTable::new())
            };
            self.insert(name, fresh);
        }

        let conflict = || format!("key `{name}` in `{path}` already holds a different value");
        match (self.get_mut(name), in_list) {
            (Some(ManifestValue::Table(table)), false) => Ok(table),
            (Some(ManifestValue::List(items)), true) => match (items.len(), items.first_mut()) {
                (1, Some(ManifestValue::Table(table))) => Ok(table),
                _ => Err(conflict()),
            },
            _ => Err(conflict()),
        }
    }
}

impl Serialize for ManifestValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ManifestValue::String(s) => serializer.serialize_str(s),
            ManifestValue::Bool(b) => serializer.serialize_bool(*b),
            ManifestValue::Integer(i) => serializer.serialize_i64(*i),
            ManifestValue::Float(f) => serializer.serialize_f64(*f),
            ManifestValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ManifestValue::Table(table) => table.serialize(serializer),
        }
    }
}

impl Serialize for ManifestTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
