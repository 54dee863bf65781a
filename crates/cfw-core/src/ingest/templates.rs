//! Bundled template library.
//!
//! Each entry is a JSON literal compiled into the binary. Literals are
//! trusted at runtime; the tests below hold them to the validator.

use serde::Serialize;

use crate::error::IngestError;
use crate::parsed::ParsedFramework;

/// One library entry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Template {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Raw JSON, as served to the "customize" flow.
    #[serde(skip)]
    pub source: &'static str,
}

impl Template {
    /// Parse the bundled literal.
    pub fn framework(&self) -> Result<ParsedFramework, IngestError> {
        Ok(serde_json::from_str(self.source)?)
    }
}

static LIBRARY: [Template; 4] = [
    Template {
        id: "dora",
        title: "Digital Operational Resilience Act (DORA)",
        description: "EU financial-sector ICT risk, incident reporting, testing and third-party oversight.",
        source: include_str!("../../templates/dora.json"),
    },
    Template {
        id: "ccpa",
        title: "California Consumer Privacy Act (CCPA)",
        description: "Notice, consumer rights and request handling obligations under CCPA/CPRA.",
        source: include_str!("../../templates/ccpa.json"),
    },
    Template {
        id: "texas-ai-act",
        title: "Texas Responsible AI Governance Act",
        description: "Prohibited practices, transparency and governance duties for AI systems.",
        source: include_str!("../../templates/texas-ai-act.json"),
    },
    Template {
        id: "data-governance",
        title: "Data Governance Framework",
        description: "Three-level ownership, quality and lifecycle controls.",
        source: include_str!("../../templates/data-governance.json"),
    },
];

/// Every bundled template, in display order.
pub fn list() -> &'static [Template] {
    &LIBRARY
}

/// Look up a template by id.
pub fn find(id: &str) -> Option<&'static Template> {
    LIBRARY.iter().find(|t| t.id == id)
}
