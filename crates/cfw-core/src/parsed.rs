//! # Canonical Framework Tree
//!
//! [`ParsedFramework`] is the single in-memory shape produced by every
//! ingestion path (JSON, workbook, template) and consumed by the validator
//! and the persistence store.
//!
//! Deserialization is deliberately lenient: missing titles become empty
//! strings and the hierarchy type is kept as raw text, so that garbage-in is
//! reported by [`crate::validate`] as a list of violations rather than as a
//! single opaque parse error.
//!
//! ## Ordering
//!
//! `order_no` is a sort hint only. Display and persistence order is a stable
//! sort on `(order_no, declaration index)`; an item without `order_no` takes
//! its 1-based declaration position.

use serde::{Deserialize, Serialize};

use crate::hierarchy::{HierarchyType, DEFAULT_LEVEL1_NAME, DEFAULT_LEVEL2_NAME};

fn default_version() -> String {
    "1.0".to_string()
}

fn default_level1_name() -> String {
    DEFAULT_LEVEL1_NAME.to_string()
}

fn default_level2_name() -> String {
    DEFAULT_LEVEL2_NAME.to_string()
}

/// A framework as submitted for import, before any identifiers exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFramework {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Organizational frameworks attach only to organizational projects.
    #[serde(default)]
    pub is_organizational: bool,
    #[serde(default)]
    pub hierarchy: HierarchySpec,
    #[serde(default)]
    pub structure: Vec<Level1Item>,
}

/// Depth and level display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchySpec {
    /// Raw hierarchy type; see [`ParsedFramework::hierarchy_type`].
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default = "default_level1_name")]
    pub level1_name: String,
    #[serde(default = "default_level2_name")]
    pub level2_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level3_name: Option<String>,
}

impl Default for HierarchySpec {
    fn default() -> Self {
        Self {
            kind: String::new(),
            level1_name: default_level1_name(),
            level2_name: default_level2_name(),
            level3_name: None,
        }
    }
}

/// Category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Level1Item {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "order", skip_serializing_if = "Option::is_none")]
    pub order_no: Option<i32>,
    #[serde(default)]
    pub items: Vec<Level2Item>,
}

/// Control. A leaf in two-level frameworks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Level2Item {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "order", skip_serializing_if = "Option::is_none")]
    pub order_no: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Level3Item>,
}

/// Sub-control. Only present (and a leaf) in three-level frameworks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Level3Item {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "order", skip_serializing_if = "Option::is_none")]
    pub order_no: Option<i32>,
}

impl ParsedFramework {
    /// The hierarchy type, if the raw value names one.
    pub fn hierarchy_type(&self) -> Option<HierarchyType> {
        self.hierarchy.kind.parse().ok()
    }

    /// Node counts per level: `(level1, level2, level3)`.
    pub fn level_counts(&self) -> (usize, usize, usize) {
        let level1 = self.structure.len();
        let level2 = self.structure.iter().map(|c| c.items.len()).sum();
        let level3 = self
            .structure
            .iter()
            .flat_map(|c| &c.items)
            .map(|ctrl| ctrl.items.len())
            .sum();
        (level1, level2, level3)
    }

    /// Number of leaf nodes: sub-controls for three-level frameworks,
    /// controls otherwise.
    pub fn leaf_count(&self) -> usize {
        let (_, level2, level3) = self.level_counts();
        match self.hierarchy_type() {
            Some(HierarchyType::ThreeLevel) => level3,
            _ => level2,
        }
    }

    /// Return the tree with every level in display order and every
    /// `order_no` filled in.
    pub fn into_canonical_order(mut self) -> Self {
        self.structure = canonical_order(self.structure, |c| c.order_no, |c, n| c.order_no = Some(n));
        for category in &mut self.structure {
            let controls = std::mem::take(&mut category.items);
            category.items = canonical_order(controls, |c| c.order_no, |c, n| c.order_no = Some(n));
            for control in &mut category.items {
                let subs = std::mem::take(&mut control.items);
                control.items = canonical_order(subs, |s| s.order_no, |s, n| s.order_no = Some(n));
            }
        }
        self
    }
}

/// Effective sort key for an item: its explicit `order_no`, or its 1-based
/// declaration position.
pub fn effective_order(explicit: Option<i32>, index: usize) -> i32 {
    explicit.unwrap_or_else(|| i32::try_from(index + 1).unwrap_or(i32::MAX))
}

/// Stable sort on `(effective order, declaration index)`, writing the
/// effective order back into each item.
fn canonical_order<T>(
    items: Vec<T>,
    get: impl Fn(&T) -> Option<i32>,
    set: impl Fn(&mut T, i32),
) -> Vec<T> {
    let mut keyed: Vec<(i32, usize, T)> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (effective_order(get(&item), index), index, item))
        .collect();
    keyed.sort_by_key(|(order, index, _)| (*order, *index));
    keyed
        .into_iter()
        .map(|(order, _, mut item)| {
            set(&mut item, order);
            item
        })
        .collect()
}
