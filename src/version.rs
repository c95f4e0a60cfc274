//! Schema version ordinals

use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A `major.minor` version identifier within a lineage.
///
/// A major bump marks a breaking change; minor bumps are backward compatible
/// additions within the same major group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ordinal {
    pub major: u64,
    pub minor: u64,
}

/// Failure to parse an ordinal string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid version ordinal '{input}': {reason}")]
pub struct OrdinalParseError {
    pub input: String,
    pub reason: String,
}

impl Ordinal {
    pub const fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }

    /// Parse `"1.2"`, `"v1.2"`, or a semver string with a zero patch (`"1.2.0"`)
    pub fn parse(input: &str) -> Result<Self, OrdinalParseError> {
        let trimmed = input.trim();
        let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let fail = |reason: &str| OrdinalParseError {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        match stripped.split('.').count() {
            2 => {
                let (major, minor) = stripped
                    .split_once('.')
                    .ok_or_else(|| fail("expected major.minor"))?;
                let major = major
                    .parse::<u64>()
                    .map_err(|_| fail("major is not a non-negative integer"))?;
                let minor = minor
                    .parse::<u64>()
                    .map_err(|_| fail("minor is not a non-negative integer"))?;
                Ok(Self::new(major, minor))
            }
            3 => {
                let version = Version::parse(stripped).map_err(|e| fail(&e.to_string()))?;
                Self::try_from(&version).map_err(|_| fail("patch component must be 0"))
            }
            _ => Err(fail("expected major.minor")),
        }
    }

    /// Check if this is a major version bump from another version
    pub fn is_breaking_from(&self, other: &Ordinal) -> bool {
        self.major > other.major
    }

    /// Check if this is a minor version bump from another version
    pub fn is_minor_bump_from(&self, other: &Ordinal) -> bool {
        self.major == other.major && self.minor > other.minor
    }

    /// Tag string, e.g. `v1.2`
    pub fn tag_string(&self) -> String {
        format!("v{}", self)
    }

    pub fn to_semver(&self) -> Version {
        Version::new(self.major, self.minor, 0)
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Ordinal {
    type Err = OrdinalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&Version> for Ordinal {
    type Error = OrdinalParseError;

    fn try_from(version: &Version) -> Result<Self, Self::Error> {
        if version.patch != 0 || !version.pre.is_empty() {
            return Err(OrdinalParseError {
                input: version.to_string(),
                reason: "ordinals carry no patch or pre-release component".to_string(),
            });
        }
        Ok(Self::new(version.major, version.minor))
    }
}

impl From<Ordinal> for Version {
    fn from(ordinal: Ordinal) -> Self {
        ordinal.to_semver()
    }
}

impl Serialize for Ordinal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ordinal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ordinal::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_parsing() {
        let v = Ordinal::parse("1.2").unwrap();
        assert_eq!(v, Ordinal::new(1, 2));
        assert_eq!(v.to_string(), "1.2");
        assert_eq!(v.tag_string(), "v1.2");
    }

    #[test]
    fn test_ordinal_with_v_prefix_and_semver() {
        assert_eq!(Ordinal::parse("v3.0").unwrap(), Ordinal::new(3, 0));
        assert_eq!(Ordinal::parse("2.1.0").unwrap(), Ordinal::new(2, 1));
        assert!(Ordinal::parse("2.1.4").is_err());
        assert!(Ordinal::parse("2").is_err());
        assert!(Ordinal::parse("a.b").is_err());
    }

    #[test]
    fn test_ordering_and_bumps() {
        let a = Ordinal::new(1, 0);
        let b = Ordinal::new(1, 3);
        let c = Ordinal::new(2, 0);
        assert!(a < b && b < c);
        assert!(b.is_minor_bump_from(&a));
        assert!(c.is_breaking_from(&b));
        assert!(!b.is_breaking_from(&a));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Ordinal::new(4, 1)).unwrap();
        assert_eq!(json, "\"4.1\"");
        let back: Ordinal = serde_json::from_str("\"v4.1\"").unwrap();
        assert_eq!(back, Ordinal::new(4, 1));
    }
}
