use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A lexicographically-ordered tuple of signed integers identifying a save
/// format generation within one edition (e.g. a Java `data_version`, or a
/// Bedrock `(major, minor, patch, revision)` tuple).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionNumber(Vec<i64>);

impl VersionNumber {
    pub fn new(parts: impl Into<Vec<i64>>) -> Self {
        Self(parts.into())
    }

    pub fn parts(&self) -> &[i64] {
        &self.0
    }
}

impl From<i64> for VersionNumber {
    fn from(value: i64) -> Self {
        Self(vec![value])
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// A closed interval `[min, max]` over [`VersionNumber`]s within one edition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    edition: String,
    min: VersionNumber,
    max: VersionNumber,
}

impl VersionRange {
    pub fn new(edition: impl Into<String>, min: VersionNumber, max: VersionNumber) -> Self {
        Self {
            edition: edition.into(),
            min,
            max,
        }
    }

    pub fn edition(&self) -> &str {
        &self.edition
    }

    /// Whether `version` lies within this range, within the same edition.
    pub fn contains(&self, edition: &str, version: &VersionNumber) -> bool {
        self.edition == edition && &self.min <= version && version <= &self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_number_orders_lexicographically() {
        assert!(VersionNumber::from(10) < VersionNumber::from(20));
        assert!(VersionNumber::new(vec![1, 9]) < VersionNumber::new(vec![1, 10]));
    }

    #[test]
    fn version_range_contains_bounds_inclusive() {
        let range = VersionRange::new("java", VersionNumber::from(1444), VersionNumber::from(1465));
        assert!(range.contains("java", &VersionNumber::from(1444)));
        assert!(range.contains("java", &VersionNumber::from(1465)));
        assert!(!range.contains("java", &VersionNumber::from(1466)));
        assert!(!range.contains("bedrock", &VersionNumber::from(1444)));
    }
}
