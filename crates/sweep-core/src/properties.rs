//! Ordered key/value properties reported by resources
//!
//! Filters match against these properties. Provider tags are stored with a
//! `tag:` prefix so they never collide with plain attributes.
//!
//! ## Key Schema
//!
//! | Key | Description |
//! |-----|-------------|
//! | `Name`, `Id`, ... | Plain attributes chosen by the adapter |
//! | `tag:<Key>` | Provider tag `<Key>` |

use serde::Serialize;
use std::fmt;

/// Prefix applied to tag keys
pub const TAG_PREFIX: &str = "tag:";

/// Ordered property bag for one resource
///
/// Insertion order is preserved for display. Setting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain attribute
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Set an attribute only when the value is present
    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    /// Set a provider tag (stored as `tag:<key>`)
    pub fn set_tag(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        self.set(format!("{TAG_PREFIX}{}", key.as_ref()), value)
    }

    /// Builder-style variant of [`Properties::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style variant of [`Properties::set_tag`]
    pub fn with_tag(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_tag(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a provider tag by its bare key
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.get(&format!("{TAG_PREFIX}{key}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: \"{v}\"")?;
        }
        f.write_str("]")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}
