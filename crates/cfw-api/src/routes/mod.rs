//! # API Route Modules
//!
//! - `frameworks`: Catalog listing, detail, deletion, every import path and
//!   the template library.
//! - `projects`: Project mirror, attach/detach, implementation updates and
//!   progress views.

pub mod frameworks;
pub mod projects;
