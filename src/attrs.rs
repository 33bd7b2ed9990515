//! Attribute sets used to configure components.
//!
//! Attributes are plain string key/value pairs, so they can come from
//! configuration files as easily as from code. Factories read them through
//! the typed getters, which distinguish "missing" from "malformed".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// A set of component attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet {
    attrs: BTreeMap<String, String>,
}

impl AttributeSet {
    /// Creates an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Sets an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.attrs.insert(key.into(), value.to_string());
    }

    /// Returns the raw string value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Parses an attribute, falling back to `default` when it is absent.
    ///
    /// A present but unparsable attribute is an `Err` carrying a message
    /// suitable for a configuration diagnostic.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, String> {
        match self.attrs.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| format!("attribute `{}` has invalid value {:?}", key, raw)),
        }
    }

    /// Returns true if the attribute is present.
    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// Iterates attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// True if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = AttributeSet::new();
        for (k, v) in iter {
            set.set(k, v);
        }
        set
    }
}
