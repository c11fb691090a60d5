//! Fixed tag vocabulary.
//!
//! Tags are immutable reference data with a display color each; bindings to
//! nodes live in the catalog's `node_tags` table.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::domain::node::{NodeId, NodeKind};
use crate::error::VaultError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum TagName {
    Urgent,
    Work,
    Personal,
    Archive,
    Review,
}

impl TagName {
    /// Display color as a hex RGB string.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Urgent => "E5484D",
            Self::Work => "0091FF",
            Self::Personal => "30A46C",
            Self::Archive => "8E8C99",
            Self::Review => "FAC607",
        }
    }

    /// Parse a caller-supplied tag name, case-insensitively.
    pub fn parse(name: &str) -> Result<Self, VaultError> {
        use strum::IntoEnumIterator;
        Self::iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(name))
            .ok_or_else(|| VaultError::Validation(format!("unknown tag '{name}'")))
    }
}

/// A binding of one tag to exactly one directory or file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagBinding {
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    pub tag: TagName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(TagName::parse("work").unwrap(), TagName::Work);
        assert_eq!(TagName::parse("URGENT").unwrap(), TagName::Urgent);
        assert!(TagName::parse("nonsense").is_err());
    }
}
