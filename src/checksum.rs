//! Checksums for shape and lineage fingerprints

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum over canonical JSON
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from JSON value (canonicalized with sorted keys)
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self::from_bytes(canonicalize(value).to_string().as_bytes())
    }

    /// Combine an ordered sequence of labelled checksums into one digest
    pub fn combine<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = (String, &'a Checksum)>,
    {
        let mut hasher = Sha256::new();
        for (label, checksum) in parts {
            hasher.update(label.as_bytes());
            hasher.update(b"=");
            hasher.update(checksum.0.as_bytes());
            hasher.update(b"\n");
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that a JSON value matches this checksum
    pub fn verify_json(&self, value: &serde_json::Value) -> bool {
        Self::from_json(value) == *self
    }
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let sorted = keys
                .into_iter()
                .map(|k| (k.clone(), canonicalize(&map[k])))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a": 2, "b": 1}"#).unwrap();
        assert_eq!(Checksum::from_json(&a), Checksum::from_json(&b));
    }

    #[test]
    fn test_checksum_different_content() {
        let c1 = Checksum::from_json(&json!({"name": "test1"}));
        let c2 = Checksum::from_json(&json!({"name": "test2"}));
        assert_ne!(c1, c2);
        assert!(c1.verify_json(&json!({"name": "test1"})));
        assert!(!c1.verify_json(&json!({"name": "test2"})));
    }

    #[test]
    fn test_combine_is_order_sensitive() {
        let x = Checksum::from_bytes(b"x");
        let y = Checksum::from_bytes(b"y");
        let xy = Checksum::combine(vec![("1.0".to_string(), &x), ("2.0".to_string(), &y)]);
        let yx = Checksum::combine(vec![("1.0".to_string(), &y), ("2.0".to_string(), &x)]);
        assert_ne!(xy, yx);
        assert_eq!(xy.as_str().len(), 64);
    }
}
