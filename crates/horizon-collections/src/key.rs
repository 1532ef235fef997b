//! Item keys and key sets.
//!
//! Every item and section in a collection is identified by a [`Key`] that is
//! unique across the whole collection. Selection, expansion and disabled
//! state are all expressed as [`KeySet`]s so they survive rebuilds.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque, comparable identifier for an item or section.
///
/// Keys are either integers or strings. They serialize untagged, so `1` and
/// `"apple"` are both valid keys in JSON or TOML.
///
/// Integer keys cover the `i64` range. Unsigned values above `i64::MAX`,
/// whether converted with `From` or read by [`Key::from_json`], become the
/// string key of their decimal digits, so distinct values stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// Integer key.
    Int(i64),
    /// String key.
    Str(String),
}

impl Key {
    /// Returns the integer value, if this is an integer key.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) => None,
        }
    }

    /// Returns the string value, if this is a string key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// Converts a JSON scalar into a key.
    ///
    /// Integers and strings convert directly; other values have no key.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_u64().map(Self::from)),
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

macro_rules! impl_key_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(value: $t) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_key_from_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! impl_key_from_wide_uint {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(value: $t) -> Self {
                    i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
                }
            }
        )*
    };
}

impl_key_from_wide_uint!(u64, usize);

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

/// An insertion-ordered set of keys with O(1) membership tests.
///
/// Equality ignores order: two sets are equal when they hold the same keys.
#[derive(Clone, Default)]
pub struct KeySet {
    ids: HashSet<Key>,
    order: Vec<Key>,
}

impl KeySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set holding a single key.
    pub fn single(key: impl Into<Key>) -> Self {
        let mut set = Self::new();
        set.insert(key);
        set
    }

    /// Adds a key. Returns `true` if it was not present.
    pub fn insert(&mut self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.ids.insert(key.clone()) {
            self.order.push(key);
            true
        } else {
            false
        }
    }

    /// Removes a key. Returns `true` if it was present.
    pub fn remove(&mut self, key: &Key) -> bool {
        if self.ids.remove(key) {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    /// Checks whether the key is in the set.
    pub fn contains(&self, key: &Key) -> bool {
        self.ids.contains(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates keys in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Key> {
        self.order.iter()
    }

    /// The most recently inserted key.
    pub fn last(&self) -> Option<&Key> {
        self.order.last()
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.order.clear();
    }

    /// Keeps only the keys for which `keep` returns `true`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Key) -> bool,
    {
        let ids = &mut self.ids;
        self.order.retain(|key| {
            if keep(key) {
                true
            } else {
                ids.remove(key);
                false
            }
        });
    }

    /// Returns a copy without the keys for which `keep` returns `false`.
    pub fn filtered<F>(&self, keep: F) -> Self
    where
        F: FnMut(&Key) -> bool,
    {
        let mut copy = self.clone();
        copy.retain(keep);
        copy
    }

    /// Returns the keys as a vector in insertion order.
    pub fn to_vec(&self) -> Vec<Key> {
        self.order.clone()
    }
}

impl PartialEq for KeySet {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for KeySet {}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.order.iter()).finish()
    }
}

impl<K: Into<Key>> FromIterator<K> for KeySet {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl<K: Into<Key>> Extend<K> for KeySet {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a Key;
    type IntoIter = std::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

impl IntoIterator for KeySet {
    type Item = Key;
    type IntoIter = std::vec::IntoIter<Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.into_iter()
    }
}

impl Serialize for KeySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.order.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KeySet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Key>::deserialize(deserializer).map(Self::from_iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_conversions() {
        assert_eq!(Key::from(3), Key::Int(3));
        assert_eq!(Key::from("a"), Key::Str("a".into()));
        assert_eq!(Key::from(7usize).as_int(), Some(7));
        assert_eq!(Key::from("x").as_str(), Some("x"));
        assert_eq!(Key::Int(5).to_string(), "5");
    }

    #[test]
    fn test_key_from_json() {
        assert_eq!(Key::from_json(&serde_json::json!(4)), Some(Key::Int(4)));
        assert_eq!(
            Key::from_json(&serde_json::json!("k")),
            Some(Key::Str("k".into()))
        );
        assert_eq!(Key::from_json(&serde_json::json!(1.5)), None);
        assert_eq!(Key::from_json(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_wide_unsigned_keys_stay_distinct() {
        assert_eq!(Key::from(u64::MAX >> 1), Key::Int(i64::MAX));
        assert_eq!(Key::from(u64::MAX), Key::Str("18446744073709551615".into()));
        assert_ne!(Key::from(u64::MAX), Key::from(-1));
        assert_eq!(Key::from(usize::MAX).to_string(), usize::MAX.to_string());

        let json = serde_json::json!(u64::MAX);
        assert_eq!(Key::from_json(&json), Some(Key::from(u64::MAX)));
        assert_eq!(Key::from_json(&serde_json::json!(-3)), Some(Key::Int(-3)));
    }

    #[test]
    fn test_key_serde_untagged() {
        let keys: Vec<Key> = serde_json::from_str(r#"[1, "two"]"#).unwrap();
        assert_eq!(keys, vec![Key::Int(1), Key::Str("two".into())]);
        assert_eq!(serde_json::to_string(&keys).unwrap(), r#"[1,"two"]"#);
    }

    #[test]
    fn test_key_set_order_and_membership() {
        let mut set: KeySet = [3, 1, 2].into_iter().collect();
        assert!(!set.insert(1));
        assert_eq!(set.to_vec(), vec![Key::Int(3), Key::Int(1), Key::Int(2)]);
        assert_eq!(set.last(), Some(&Key::Int(2)));

        assert!(set.remove(&Key::Int(1)));
        assert!(!set.contains(&Key::Int(1)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_key_set_equality_ignores_order() {
        let a: KeySet = [1, 2].into_iter().collect();
        let b: KeySet = [2, 1].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_set_retain() {
        let mut set: KeySet = (0..6).collect();
        set.retain(|k| k.as_int().is_some_and(|n| n % 2 == 0));
        assert_eq!(set.to_vec(), vec![Key::Int(0), Key::Int(2), Key::Int(4)]);
        assert!(!set.contains(&Key::Int(1)));
    }
}
