//! DeviceId - Cheap-to-clone device identifier
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Separator used in raw device addresses (`AA:BB:CC:DD:EE:FF`).
pub const ADDRESS_SEPARATOR: char = ':';

/// Normalized device identifier.
///
/// Derived from a raw hardware address by removing every `:` separator.
/// The identifier is opaque and case-preserving. Internally an `Arc<str>`,
/// so a notification can be cloned into log fields and sink tasks without
/// reallocating the key.
///
/// # Examples
/// ```
/// use contracts::DeviceId;
///
/// let id = DeviceId::from_address("AA:BB:CC:DD:EE:FF");
/// assert_eq!(id, "AABBCCDDEEFF");
/// let id2 = id.clone();  // O(1) - just increments ref count
/// assert_eq!(id, id2);
/// ```
#[derive(Clone, Default)]
pub struct DeviceId(Arc<str>);

impl DeviceId {
    /// Create a DeviceId from an already normalized string.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Normalize a raw device address by stripping all `:` separators.
    pub fn from_address(address: &str) -> Self {
        let normalized: String = address
            .chars()
            .filter(|c| *c != ADDRESS_SEPARATOR)
            .collect();
        Self(Arc::from(normalized))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for DeviceId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for DeviceId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DeviceId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for DeviceId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({:?})", self.0)
    }
}

impl PartialEq for DeviceId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for DeviceId {}

impl PartialEq<str> for DeviceId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for DeviceId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl PartialEq<String> for DeviceId {
    #[inline]
    fn eq(&self, other: &String) -> bool {
        self.0.as_ref() == other
    }
}

impl Hash for DeviceId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for DeviceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_address_strips_separators() {
        let id = DeviceId::from_address("AA:BB:CC:DD:EE:FF");
        assert_eq!(id, "AABBCCDDEEFF");
    }

    #[test]
    fn test_from_address_preserves_case() {
        let id = DeviceId::from_address("aa:Bb:cC");
        assert_eq!(id.as_str(), "aaBbcC");
    }

    #[test]
    fn test_from_address_without_separators() {
        let id = DeviceId::from_address("sensor-7");
        assert_eq!(id, "sensor-7");
    }

    #[test]
    fn test_clone_is_cheap() {
        let id1: DeviceId = "AABBCC".into();
        let id2 = id1.clone();
        assert_eq!(id1.as_str().as_ptr(), id2.as_str().as_ptr());
    }

    #[test]
    fn test_hashmap_key() {
        let mut map: HashMap<DeviceId, i32> = HashMap::new();
        map.insert("dev1".into(), 1);
        map.insert("dev2".into(), 2);

        assert_eq!(map.get("dev1"), Some(&1));
        assert_eq!(map.get("dev2"), Some(&2));
    }

    #[test]
    fn test_serde() {
        let id: DeviceId = "AABBCC".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"AABBCC\"");

        let parsed: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
