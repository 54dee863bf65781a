//! # Hierarchy Depth
//!
//! A framework is either two levels deep (categories → controls) or three
//! levels deep (categories → controls → sub-controls). The depth is carried
//! as data so that validation and aggregation stay on one code path with a
//! depth-3 branch, instead of duplicating logic per depth.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default display name for level 1 nodes.
pub const DEFAULT_LEVEL1_NAME: &str = "Category";
/// Default display name for level 2 nodes.
pub const DEFAULT_LEVEL2_NAME: &str = "Control";

/// Depth discriminator for a framework tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyType {
    /// Categories → controls. Controls are leaves.
    TwoLevel,
    /// Categories → controls → sub-controls. Sub-controls are leaves.
    ThreeLevel,
}

impl HierarchyType {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoLevel => "two_level",
            Self::ThreeLevel => "three_level",
        }
    }

    /// Number of levels in the tree.
    pub fn depth(&self) -> u8 {
        match self {
            Self::TwoLevel => 2,
            Self::ThreeLevel => 3,
        }
    }

    /// Whether level 3 nodes exist and are the leaves.
    pub fn has_level3(&self) -> bool {
        matches!(self, Self::ThreeLevel)
    }
}

impl fmt::Display for HierarchyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HierarchyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two_level" => Ok(Self::TwoLevel),
            "three_level" => Ok(Self::ThreeLevel),
            other => Err(format!(
                "unknown hierarchy type {other:?} (expected two_level or three_level)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        assert_eq!("two_level".parse::<HierarchyType>(), Ok(HierarchyType::TwoLevel));
        assert_eq!(" THREE_LEVEL ".parse::<HierarchyType>(), Ok(HierarchyType::ThreeLevel));
        assert!("four_level".parse::<HierarchyType>().is_err());
        assert!("".parse::<HierarchyType>().is_err());
    }

    #[test]
    fn depth_and_leaf_level() {
        assert_eq!(HierarchyType::TwoLevel.depth(), 2);
        assert!(!HierarchyType::TwoLevel.has_level3());
        assert_eq!(HierarchyType::ThreeLevel.depth(), 3);
        assert!(HierarchyType::ThreeLevel.has_level3());
    }

    #[test]
    fn serde_matches_as_str() {
        for kind in [HierarchyType::TwoLevel, HierarchyType::ThreeLevel] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
