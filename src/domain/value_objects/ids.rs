//! Identifier value objects
//!
//! Opaque validated ids for sites and deploys. The engine never interprets
//! id contents; they come from the caller (or its storage layer) and only
//! need to be non-empty and free of whitespace so they can be embedded in
//! destination paths like `releases/<deploy_id>/`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error when id validation fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("id is empty")]
    Empty,
    #[error("id '{0}' contains whitespace")]
    ContainsWhitespace(String),
    #[error("id '{0}' contains a path separator")]
    ContainsSeparator(String),
}

fn validate(raw: &str) -> Result<(), IdError> {
    if raw.is_empty() {
        return Err(IdError::Empty);
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(IdError::ContainsWhitespace(raw.to_string()));
    }
    if raw.contains('/') || raw.contains('\\') {
        return Err(IdError::ContainsSeparator(raw.to_string()));
    }
    Ok(())
}

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                validate(&raw)?;
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type! {
    /// Identifier of a site
    SiteId
}

id_type! {
    /// Identifier of a deploy (also the destination release-slot key)
    DeployId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_ids() {
        let id = DeployId::new("deploy-2024-001").unwrap();
        assert_eq!(id.as_str(), "deploy-2024-001");
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(SiteId::new(""), Err(IdError::Empty)));
    }

    #[test]
    fn rejects_whitespace() {
        assert!(matches!(
            DeployId::new("a b"),
            Err(IdError::ContainsWhitespace(_))
        ));
    }

    #[test]
    fn rejects_separator() {
        // Deploy ids are embedded in destination paths, so separators
        // would let an id escape its release slot.
        assert!(matches!(
            DeployId::new("../escape"),
            Err(IdError::ContainsSeparator(_))
        ));
    }

    #[test]
    fn serde_round_trip() {
        let id = SiteId::new("site-7").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"site-7\"");
        let back: SiteId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_rejects_invalid() {
        let result: Result<DeployId, _> = serde_json::from_str("\"has space\"");
        assert!(result.is_err());
    }
}
