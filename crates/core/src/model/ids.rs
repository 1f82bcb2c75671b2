use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when an identifier fails validation or parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdError {
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    #[error("failed to parse {kind} from string")]
    Parse { kind: &'static str },
}

/// Unique identifier for a Topic within a curriculum.
///
/// Stored trimmed; never empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicId(String);

impl TopicId {
    /// Creates a new `TopicId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the value is empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty { kind: "TopicId" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a Category within a curriculum.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryId(String);

impl CategoryId {
    /// Creates a new `CategoryId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the value is empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty { kind: "CategoryId" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a learner.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(u64);

impl UserId {
    /// Creates a new `UserId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

// ─── Conversions ───────────────────────────────────────────────────────────────

impl TryFrom<String> for TopicId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TopicId> for String {
    fn from(id: TopicId) -> Self {
        id.0
    }
}

impl TryFrom<String> for CategoryId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CategoryId> for String {
    fn from(id: CategoryId) -> Self {
        id.0
    }
}

impl Borrow<str> for TopicId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CategoryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ─── Debug / Display ───────────────────────────────────────────────────────────

impl fmt::Debug for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicId({:?})", self.0)
    }
}

impl fmt::Debug for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CategoryId({:?})", self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr ───────────────────────────────────────────────────────────────────

impl FromStr for TopicId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for CategoryId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(UserId::new)
            .map_err(|_| IdError::Parse { kind: "UserId" })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn topic_id_is_trimmed() {
        let id = TopicId::new("  rust-basics ").unwrap();
        assert_eq!(id.as_str(), "rust-basics");
        assert_eq!(id.to_string(), "rust-basics");
    }

    #[test]
    fn topic_id_rejects_blank() {
        let err = TopicId::new("   ").unwrap_err();
        assert_eq!(err, IdError::Empty { kind: "TopicId" });
    }

    #[test]
    fn category_id_from_str() {
        let id: CategoryId = "web".parse().unwrap();
        assert_eq!(id, CategoryId::new("web").unwrap());
    }

    #[test]
    fn user_id_from_str_invalid() {
        let result = "not-a-number".parse::<UserId>();
        assert_eq!(result.unwrap_err(), IdError::Parse { kind: "UserId" });
    }

    #[test]
    fn user_id_display() {
        assert_eq!(UserId::new(42).to_string(), "42");
    }

    #[test]
    fn topic_id_set_lookup_by_str() {
        let mut set = BTreeSet::new();
        set.insert(TopicId::new("a").unwrap());
        assert!(set.contains("a"));
        assert!(!set.contains("b"));
    }

    #[test]
    fn topic_id_deserialize_rejects_blank() {
        let ok: TopicId = serde_json::from_str("\"html\"").unwrap();
        assert_eq!(ok.as_str(), "html");
        assert!(serde_json::from_str::<TopicId>("\"  \"").is_err());
    }
}
