//! # cfw-core: Foundational Types for the Compliance Framework Engine
//!
//! This crate defines everything about a compliance framework that does not
//! need a database or an HTTP server:
//!
//! - **Canonical tree** ([`ParsedFramework`]): the one shape every input
//!   encoding is normalized into. Categories → controls → optional
//!   sub-controls, with the depth carried as data ([`HierarchyType`]).
//! - **Ingestion** ([`ingest`]): hand-written JSON, two-sheet workbooks
//!   (pre-parsed rows or raw `.xlsx` bytes), and the bundled template library.
//! - **Structural validation** ([`validate`]): every violation is collected
//!   so callers can render them together.
//! - **Progress math** ([`progress`]): completion buckets per depth.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cfw-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod hierarchy;
pub mod identity;
pub mod ingest;
pub mod parsed;
pub mod progress;
pub mod status;
pub mod validate;

// Re-export primary types for ergonomic imports.
pub use error::{IdentityError, IngestError};
pub use hierarchy::HierarchyType;
pub use identity::{AssociationId, FrameworkId, ImplementationId, NodeId, ProjectId, TenantId};
pub use ingest::{normalize, FrameworkSource, NormalizedFramework, TemplateMode, WorkbookData};
pub use parsed::{HierarchySpec, Level1Item, Level2Item, Level3Item, ParsedFramework};
pub use progress::{Bucket, FrameworkProgress, LeafState};
pub use status::ImplementationStatus;
pub use validate::{validate, ValidationIssue};
