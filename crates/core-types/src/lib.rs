use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the broker crates.
#[derive(Debug, Error, Clone)]
pub enum GeoError {
    #[error("{message}")]
    Message { message: String },
}

impl GeoError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Canonical security origin (scheme + host + port) as an opaque key.
///
/// Canonicalisation happens upstream; two origins are the same exactly when
/// their strings are equal.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Origin(pub String);

impl Origin {
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Origin {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Origin {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TabId(pub String);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one document-bearing frame inside a tab.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FrameId(pub String);

impl FrameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_equality_is_string_equality() {
        let a = Origin::new(String::from("https://a.test"));
        let b: Origin = "https://a.test".into();
        assert_eq!(a, b);
        assert_ne!(a, Origin::from("https://a.test:8443"));
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(TabId::new(), TabId::new());
        assert_ne!(FrameId::new(), FrameId::new());
    }
}
