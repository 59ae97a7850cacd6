//! Shared value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scheduling priority. Higher values are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i64);

/// Priority of jobs that do not set one.
pub const DEFAULT_PRIORITY: Priority = Priority(100);

impl Priority {
    /// Whether `self` is served before `other`.
    #[must_use]
    pub const fn precedes(self, other: Self) -> bool {
        self.0 > other.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        DEFAULT_PRIORITY
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_higher_value_precedes() {
        assert!(Priority(5).precedes(Priority(1)));
        assert!(!Priority(1).precedes(Priority(5)));
        assert!(!Priority(3).precedes(Priority(3)));
    }

    #[test]
    fn test_default_priority() {
        assert_eq!(Priority::default(), Priority(100));
        assert_eq!(serde_json::to_string(&Priority(7)).unwrap(), "7");
    }
}
