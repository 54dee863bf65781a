//! # cfw-cli: Offline Tooling for Compliance Frameworks
//!
//! Provides the `cfw` command-line interface for working with framework
//! files before they reach the service.
//!
//! ## Subcommands
//!
//! - `cfw validate`: Run the normalizer and structural validator on a JSON
//!   or `.xlsx` file.
//! - `cfw convert`: Turn a two-sheet workbook into framework JSON.
//! - `cfw template`: Write the blank `.xlsx` import template.
//! - `cfw templates`: List or print the bundled template library.
//!
//! ```bash
//! cfw validate my-framework.json
//! cfw convert controls.xlsx --out controls.json
//! cfw templates show dora > dora.json
//! ```
//!
//! Every handler returns the process exit code: `0` on success, `1` when
//! the input is rejected.

pub mod convert;
pub mod template;
pub mod validate;

use std::path::Path;

/// Whether a path names a spreadsheet rather than JSON.
pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workbook_detection_is_by_extension() {
        assert!(is_workbook(Path::new("controls.xlsx")));
        assert!(is_workbook(Path::new("CONTROLS.XLSX")));
        assert!(!is_workbook(Path::new("controls.json")));
        assert!(!is_workbook(Path::new("controls")));
    }
}
