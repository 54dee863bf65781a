//! Spreadsheet path: assembles the "Framework Info" map and the "Structure"
//! rows into the canonical tree.
//!
//! Rows are walked in file order with a current-parent pointer. A level 1
//! row opens a category and closes the open control; level 2 attaches to the
//! open category; level 3 attaches to the open control. Rows that arrive
//! with no open parent are dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hierarchy::{HierarchyType, DEFAULT_LEVEL1_NAME, DEFAULT_LEVEL2_NAME};
use crate::parsed::{HierarchySpec, Level1Item, Level2Item, Level3Item, ParsedFramework};

/// Sheet holding `field | value` pairs.
pub const INFO_SHEET: &str = "Framework Info";
/// Sheet holding one row per node.
pub const STRUCTURE_SHEET: &str = "Structure";

/// One "Structure" row keyed by normalized header.
pub type Row = BTreeMap<String, Value>;

/// A workbook already split into its two sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbookData {
    #[serde(default)]
    pub info: BTreeMap<String, String>,
    #[serde(default)]
    pub structure: Vec<Row>,
}

/// Lower-case, spaces to underscores, punctuation stripped.
///
/// `"Questions (comma separated)"` becomes `questions_comma_separated`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

/// Text of a cell, trimmed. Whole floats render without a fraction so a
/// `1.0` read from a spreadsheet matches `"1"`.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn cell<'r>(row: &'r Row, key: &str) -> Option<&'r Value> {
    row.get(key)
}

fn text(row: &Row, key: &str) -> Option<String> {
    cell(row, key).map(cell_text).filter(|s| !s.is_empty())
}

fn order(row: &Row) -> Option<i32> {
    let raw = text(row, "order").or_else(|| text(row, "order_no"))?;
    raw.parse::<i32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|f| f as i32))
}

fn level(row: &Row) -> Option<u8> {
    let raw = text(row, "level")?;
    raw.parse::<u8>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as u8))
}

fn split_list(row: &Row, key: &str) -> Vec<String> {
    text(row, key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_row(row: &Row) -> Row {
    row.iter()
        .map(|(k, v)| (normalize_header(k), v.clone()))
        .collect()
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1" | "y")
}

struct Info(BTreeMap<String, String>);

impl Info {
    fn new(raw: &BTreeMap<String, String>) -> Self {
        Self(
            raw.iter()
                .map(|(k, v)| (normalize_header(k), v.trim().to_string()))
                .collect(),
        )
    }

    fn get(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|k| self.0.get(*k))
            .filter(|v| !v.is_empty())
            .cloned()
    }
}

/// Build the canonical tree from workbook sheets.
pub fn assemble(data: &WorkbookData) -> ParsedFramework {
    let info = Info::new(&data.info);

    let kind = info
        .get(&["hierarchy_type", "hierarchy"])
        .unwrap_or_else(|| HierarchyType::TwoLevel.as_str().to_string());

    let hierarchy = HierarchySpec {
        kind,
        level1_name: info
            .get(&["level_1_name", "level1_name"])
            .unwrap_or_else(|| DEFAULT_LEVEL1_NAME.to_string()),
        level2_name: info
            .get(&["level_2_name", "level2_name"])
            .unwrap_or_else(|| DEFAULT_LEVEL2_NAME.to_string()),
        level3_name: info.get(&["level_3_name", "level3_name"]),
    };

    let mut structure: Vec<Level1Item> = Vec::new();
    // Whether a control is open under the last category.
    let mut control_open = false;

    for (index, raw) in data.structure.iter().enumerate() {
        let row = normalize_row(raw);
        let (Some(level_text), Some(title)) = (text(&row, "level"), text(&row, "title")) else {
            continue;
        };

        match level(&row) {
            Some(1) => {
                structure.push(Level1Item {
                    title,
                    description: text(&row, "description"),
                    order_no: order(&row),
                    items: Vec::new(),
                });
                control_open = false;
            }
            Some(2) => match structure.last_mut() {
                Some(category) => {
                    category.items.push(Level2Item {
                        title,
                        description: text(&row, "description"),
                        order_no: order(&row),
                        summary: text(&row, "summary"),
                        questions: split_list(&row, "questions_comma_separated"),
                        evidence_examples: split_list(&row, "evidence_examples_comma_separated"),
                        items: Vec::new(),
                    });
                    control_open = true;
                }
                None => tracing::debug!(row = index, %title, "dropping level 2 row without an open category"),
            },
            Some(3) => match structure.last_mut().and_then(|c| c.items.last_mut()).filter(|_| control_open) {
                Some(control) => control.items.push(Level3Item {
                    title,
                    description: text(&row, "description"),
                    order_no: order(&row),
                }),
                None => tracing::debug!(row = index, %title, "dropping level 3 row without an open control"),
            },
            _ => tracing::debug!(row = index, level = %level_text, "ignoring row with unknown level"),
        }
    }

    ParsedFramework {
        name: info.get(&["name", "framework_name"]).unwrap_or_default(),
        description: info.get(&["description"]).unwrap_or_default(),
        version: info.get(&["version"]).unwrap_or_else(|| "1.0".to_string()),
        is_organizational: info
            .get(&["is_organizational", "organizational"])
            .is_some_and(|v| is_truthy(&v)),
        hierarchy,
        structure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    fn info(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header("Questions (comma separated)"), "questions_comma_separated");
        assert_eq!(normalize_header("  Level 1 Name "), "level_1_name");
        assert_eq!(normalize_header("Order"), "order");
        assert_eq!(normalize_header("is_organizational"), "is_organizational");
    }

    #[test]
    fn three_level_rows_produce_one_node_per_level() {
        let data = WorkbookData {
            info: info(&[("Name", "Excel FW"), ("Hierarchy Type", "three_level"), ("Level 3 Name", "Sub")]),
            structure: vec![
                row(json!({"level": 1, "title": "Cat A", "order": 1})),
                row(json!({"level": 2, "title": "Ctrl A1", "order": 1})),
                row(json!({"level": 3, "title": "Sub A1.1", "order": 1})),
            ],
        };
        let parsed = assemble(&data);
        assert_eq!(parsed.hierarchy_type(), Some(HierarchyType::ThreeLevel));
        assert_eq!(parsed.level_counts(), (1, 1, 1));
        assert_eq!(parsed.structure[0].items[0].items[0].title, "Sub A1.1");
        assert_eq!(parsed.structure[0].order_no, Some(1));
    }

    #[test]
    fn orphan_rows_are_dropped() {
        let data = WorkbookData {
            info: info(&[("name", "X")]),
            structure: vec![
                row(json!({"level": "2", "title": "Early control"})),
                row(json!({"level": "1", "title": "Cat"})),
                row(json!({"level": "3", "title": "No open control"})),
                row(json!({"level": "2", "title": "Ctrl"})),
                row(json!({"level": "1", "title": "Cat 2"})),
                row(json!({"level": "3", "title": "Closed by new category"})),
            ],
        };
        let parsed = assemble(&data);
        assert_eq!(parsed.level_counts(), (2, 1, 0));
    }

    #[test]
    fn rows_without_level_or_title_are_skipped() {
        let data = WorkbookData {
            info: info(&[("name", "X")]),
            structure: vec![
                row(json!({"level": 1, "title": "Cat"})),
                row(json!({"level": 2, "title": ""})),
                row(json!({"title": "No level"})),
                row(json!({"level": 2, "title": "Kept"})),
            ],
        };
        let parsed = assemble(&data);
        assert_eq!(parsed.structure[0].items.len(), 1);
        assert_eq!(parsed.structure[0].items[0].title, "Kept");
    }

    #[test]
    fn comma_separated_cells_are_split_and_trimmed() {
        let data = WorkbookData {
            info: info(&[("name", "X")]),
            structure: vec![
                row(json!({"level": 1, "title": "Cat"})),
                row(json!({
                    "Level": 2.0,
                    "Title": "Ctrl",
                    "Questions (comma separated)": "Is it done? , Who owns it?,",
                    "evidence_examples_comma_separated": "Policy doc"
                })),
            ],
        };
        let control = &assemble(&data).structure[0].items[0];
        assert_eq!(control.questions, ["Is it done?", "Who owns it?"]);
        assert_eq!(control.evidence_examples, ["Policy doc"]);
    }

    #[test]
    fn info_defaults_and_flags() {
        let parsed = assemble(&WorkbookData {
            info: info(&[("Name", "Org FW"), ("Is Organizational", "Yes")]),
            structure: Vec::new(),
        });
        assert!(parsed.is_organizational);
        assert_eq!(parsed.hierarchy.kind, "two_level");
        assert_eq!(parsed.hierarchy.level1_name, "Category");
        assert_eq!(parsed.version, "1.0");
    }
}
