//! # Ingestion Normalizer
//!
//! Converts the three supported input encodings into one
//! [`ParsedFramework`]:
//!
//! | Source | Module | Trusted |
//! |--------|--------|---------|
//! | Hand-written JSON | [`json`] | no |
//! | Two-sheet workbook (pre-parsed rows or raw `.xlsx`) | [`workbook`], [`xlsx`] | no |
//! | Template library, used as-is | [`templates`] | yes |
//! | Template library, customized | [`templates`] → [`json`] | no |
//!
//! Untrusted output must pass [`crate::validate`] before persistence.
//! Template literals are validated by this crate's tests instead.

pub mod json;
pub mod templates;
pub mod workbook;
pub mod xlsx;

use crate::error::IngestError;
use crate::parsed::ParsedFramework;

pub use workbook::WorkbookData;

/// How a template is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateMode {
    /// Import the bundled literal unchanged; validation is skipped.
    AsIs,
    /// Re-route the template through the JSON path so edits are validated.
    Customize,
}

/// One of the supported input encodings.
#[derive(Debug, Clone)]
pub enum FrameworkSource<'a> {
    /// JSON text as typed or uploaded by the user.
    Json(&'a str),
    /// Workbook already split into the "Framework Info" map and
    /// "Structure" rows.
    Workbook(WorkbookData),
    /// Raw `.xlsx` bytes.
    Xlsx(&'a [u8]),
    /// A bundled template.
    Template { id: &'a str, mode: TemplateMode },
}

impl FrameworkSource<'_> {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Workbook(_) => "workbook",
            Self::Xlsx(_) => "xlsx",
            Self::Template { .. } => "template",
        }
    }
}

/// Normalizer output.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFramework {
    pub framework: ParsedFramework,
    /// `true` only for templates used as-is.
    pub trusted: bool,
}

impl NormalizedFramework {
    fn untrusted(framework: ParsedFramework) -> Self {
        Self {
            framework,
            trusted: false,
        }
    }

    /// Whether the structural validator must run before persistence.
    pub fn needs_validation(&self) -> bool {
        !self.trusted
    }
}

/// Normalize any supported source into the canonical tree.
pub fn normalize(source: FrameworkSource<'_>) -> Result<NormalizedFramework, IngestError> {
    match source {
        FrameworkSource::Json(text) => json::parse(text).map(NormalizedFramework::untrusted),
        FrameworkSource::Workbook(data) => Ok(NormalizedFramework::untrusted(workbook::assemble(&data))),
        FrameworkSource::Xlsx(bytes) => {
            let data = xlsx::read_workbook(bytes)?;
            Ok(NormalizedFramework::untrusted(workbook::assemble(&data)))
        }
        FrameworkSource::Template { id, mode } => {
            let template = templates::find(id).ok_or_else(|| IngestError::UnknownTemplate(id.to_string()))?;
            match mode {
                TemplateMode::AsIs => Ok(NormalizedFramework {
                    framework: template.framework()?,
                    trusted: true,
                }),
                TemplateMode::Customize => json::parse(template.source).map(NormalizedFramework::untrusted),
            }
        }
    }
}
