//! # Structural Validation
//!
//! Checks a [`ParsedFramework`] against the depth and completeness rules
//! before any row is written. Rules are independent; every violation is
//! collected so the caller can render the full list at once.
//!
//! `order_no` is never validated: duplicates and gaps are legal sort hints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hierarchy::HierarchyType;
use crate::parsed::ParsedFramework;

/// Longest accepted framework name (the `name` column is `VARCHAR(255)`).
pub const MAX_NAME_LEN: usize = 255;

/// One structural rule violation.
///
/// `path` points at the offending field (`structure[0].items[2].title`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Validate a parsed framework, returning every violation found.
pub fn validate(parsed: &ParsedFramework) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if is_blank(&parsed.name) {
        issues.push(ValidationIssue::new("name", "framework name is required"));
    } else if parsed.name.trim().chars().count() > MAX_NAME_LEN {
        issues.push(ValidationIssue::new(
            "name",
            format!("framework name must not exceed {MAX_NAME_LEN} characters"),
        ));
    }

    let kind = match parsed.hierarchy.kind.parse::<HierarchyType>() {
        Ok(kind) => Some(kind),
        Err(_) => {
            issues.push(ValidationIssue::new(
                "hierarchy.type",
                format!(
                    "hierarchy type must be two_level or three_level, got {:?}",
                    parsed.hierarchy.kind
                ),
            ));
            None
        }
    };

    if kind == Some(HierarchyType::ThreeLevel)
        && parsed.hierarchy.level3_name.as_deref().map_or(true, is_blank)
    {
        issues.push(ValidationIssue::new(
            "hierarchy.level3_name",
            "level 3 name is required for three_level frameworks",
        ));
    }

    if parsed.structure.is_empty() {
        issues.push(ValidationIssue::new(
            "structure",
            "framework must contain at least one category",
        ));
    }

    for (i, category) in parsed.structure.iter().enumerate() {
        let category_path = format!("structure[{i}]");
        if is_blank(&category.title) {
            issues.push(ValidationIssue::new(
                format!("{category_path}.title"),
                "category title is required",
            ));
        }

        for (j, control) in category.items.iter().enumerate() {
            let control_path = format!("{category_path}.items[{j}]");
            if is_blank(&control.title) {
                issues.push(ValidationIssue::new(
                    format!("{control_path}.title"),
                    "control title is required",
                ));
            }

            if kind == Some(HierarchyType::TwoLevel) && !control.items.is_empty() {
                issues.push(ValidationIssue::new(
                    format!("{control_path}.items"),
                    format!(
                        "control \"{}\" has {} nested item(s) but the hierarchy type is two_level",
                        control.title.trim(),
                        control.items.len()
                    ),
                ));
            }

            for (k, sub) in control.items.iter().enumerate() {
                if is_blank(&sub.title) {
                    issues.push(ValidationIssue::new(
                        format!("{control_path}.items[{k}].title"),
                        "sub-control title is required",
                    ));
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
