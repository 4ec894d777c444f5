//! Release target value object - a named serving context for a site.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Serving context a deploy can be activated for.
///
/// A deploy can be `active` in `preview` while staged (or never attempted)
/// in `production`; the two targets are independent slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseTarget {
    /// Pre-production serving context
    Preview,
    /// Live serving context
    Production,
}

impl ReleaseTarget {
    /// All targets, in activation-precedence order (preview first)
    pub fn all() -> [ReleaseTarget; 2] {
        [ReleaseTarget::Preview, ReleaseTarget::Production]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseTarget::Preview => "preview",
            ReleaseTarget::Production => "production",
        }
    }
}

impl fmt::Display for ReleaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_lowercase() {
        assert_eq!(ReleaseTarget::Preview.to_string(), "preview");
        assert_eq!(ReleaseTarget::Production.to_string(), "production");
    }

    #[test]
    fn serde_round_trip() {
        let json = serde_json::to_string(&ReleaseTarget::Production).unwrap();
        assert_eq!(json, "\"production\"");
        let back: ReleaseTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReleaseTarget::Production);
    }
}
