//! # Progress Math
//!
//! Turns per-leaf implementation state into completion buckets.
//!
//! A [`Bucket`] summarizes one depth: `total` nodes, how many are
//! `completed` (status Implemented or Audited), how many are `assigned`
//! (have an owner), and `percentage = floor(completed / total * 100)`,
//! which is `0` when `total == 0`.
//!
//! For three-level frameworks a control is counted as completed when it has
//! at least one sub-control and every sub-control is completed, and as
//! assigned when every sub-control has an owner. The `overall` bucket is
//! always the true leaf level, never a blend of the two.

use serde::{Deserialize, Serialize};

use crate::hierarchy::HierarchyType;
use crate::status::ImplementationStatus;

/// Completion summary at one depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub total: u32,
    pub completed: u32,
    pub assigned: u32,
    pub percentage: u32,
}

impl Bucket {
    /// Build a bucket from raw counts.
    pub fn from_counts(total: u32, completed: u32, assigned: u32) -> Self {
        Self {
            total,
            completed,
            assigned,
            percentage: percentage(completed, total),
        }
    }
}

/// `floor(completed / total * 100)`, or `0` when `total` is zero.
///
/// Integer arithmetic avoids float rounding (e.g. 29/100 → 29, not 28).
pub fn percentage(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = u64::from(completed) * 100 / u64::from(total);
    u32::try_from(pct).unwrap_or(u32::MAX)
}

/// State of one leaf's implementation record.
///
/// A leaf without a record (e.g. mid-reconciliation) is
/// `LeafState::default()`: not started, unowned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeafState {
    pub status: ImplementationStatus,
    pub has_owner: bool,
}

impl LeafState {
    pub fn new(status: ImplementationStatus, has_owner: bool) -> Self {
        Self { status, has_owner }
    }
}

/// Bucket triple for one project + framework pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkProgress {
    pub level2: Bucket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level3: Option<Bucket>,
    pub overall: Bucket,
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Aggregate leaf states grouped by control.
///
/// `controls[i]` holds the leaf states under control `i`: exactly one entry
/// for a two-level framework (the control itself), one per sub-control for
/// a three-level framework.
pub fn aggregate(kind: HierarchyType, controls: &[Vec<LeafState>]) -> FrameworkProgress {
    match kind {
        HierarchyType::TwoLevel => {
            let leaves = controls.iter().map(|c| c.first().copied().unwrap_or_default());
            let bucket = bucket_of(controls.len(), leaves);
            FrameworkProgress {
                level2: bucket,
                level3: None,
                overall: bucket,
            }
        }
        HierarchyType::ThreeLevel => {
            let level3 = bucket_of(
                controls.iter().map(Vec::len).sum(),
                controls.iter().flatten().copied(),
            );

            let completed = controls
                .iter()
                .filter(|subs| !subs.is_empty() && subs.iter().all(|s| s.status.is_completed()))
                .count();
            let assigned = controls
                .iter()
                .filter(|subs| !subs.is_empty() && subs.iter().all(|s| s.has_owner))
                .count();
            let level2 = Bucket::from_counts(count(controls.len()), count(completed), count(assigned));

            FrameworkProgress {
                level2,
                level3: Some(level3),
                overall: level3,
            }
        }
    }
}

fn bucket_of(total: usize, leaves: impl Iterator<Item = LeafState>) -> Bucket {
    let (completed, assigned) = leaves.fold((0usize, 0usize), |(done, owned), leaf| {
        (
            done + usize::from(leaf.status.is_completed()),
            owned + usize::from(leaf.has_owner),
        )
    });
    Bucket::from_counts(count(total), count(completed), count(assigned))
}
