use serde::{Deserialize, Serialize};

/// Monotonic row version used for optimistic concurrency control.
///
/// A freshly created saga row is at version 0; every successful update
/// bumps the version by exactly 1. An update whose expected version does
/// not match the stored one is rejected as a conflict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a newly created row.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_is_zero() {
        assert_eq!(Version::initial().as_i64(), 0);
    }

    #[test]
    fn next_increments() {
        let v = Version::initial();
        assert_eq!(v.next(), Version::new(1));
        assert_eq!(v.next().next(), Version::new(2));
    }

    #[test]
    fn ordering_follows_value() {
        assert!(Version::new(1) < Version::new(2));
    }
}
