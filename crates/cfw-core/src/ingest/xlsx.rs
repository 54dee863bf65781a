//! `.xlsx` reader (calamine) and blank template writer (rust_xlsxwriter).

use std::collections::BTreeMap;
use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde_json::Value;

use super::workbook::{normalize_header, Row, WorkbookData, INFO_SHEET, STRUCTURE_SHEET};
use crate::error::IngestError;

/// Column headers of the "Structure" sheet, in template order.
pub const STRUCTURE_HEADERS: [&str; 7] = [
    "Level",
    "Title",
    "Description",
    "Summary",
    "Order",
    "Questions (comma separated)",
    "Evidence Examples (comma separated)",
];

/// Read both required sheets from raw `.xlsx` bytes.
pub fn read_workbook(bytes: &[u8]) -> Result<WorkbookData, IngestError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| IngestError::MalformedInput(format!("not a readable .xlsx workbook: {e}")))?;

    let names = workbook.sheet_names().to_vec();
    for required in [INFO_SHEET, STRUCTURE_SHEET] {
        if !names.iter().any(|n| n == required) {
            return Err(IngestError::MissingSheet(required.to_string()));
        }
    }

    let info = sheet(&mut workbook, INFO_SHEET)?;
    let structure = sheet(&mut workbook, STRUCTURE_SHEET)?;

    Ok(WorkbookData {
        info: info_pairs(&info),
        structure: structure_rows(&structure),
    })
}

fn sheet(workbook: &mut Xlsx<Cursor<&[u8]>>, name: &str) -> Result<Range<Data>, IngestError> {
    workbook
        .worksheet_range(name)
        .map_err(|e| IngestError::MalformedInput(format!("sheet \"{name}\": {e}")))
}

fn to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::String(dt.to_string()),
    }
}

fn to_text(cell: &Data) -> String {
    match cell {
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

/// `field | value` pairs from columns A and B, sheet row 2 onward.
///
/// calamine trims leading blank rows and columns, so positions are taken
/// relative to `range.start()`.
fn info_pairs(range: &Range<Data>) -> BTreeMap<String, String> {
    let Some((start_row, start_col)) = range.start() else {
        return BTreeMap::new();
    };
    // Column A is blank on every row.
    if start_col > 0 {
        return BTreeMap::new();
    }
    let header_rows = usize::from(start_row == 0);

    range
        .rows()
        .skip(header_rows)
        .filter_map(|row| {
            let field = to_text(row.first()?);
            let value = row.get(1).map(to_text).unwrap_or_default();
            (!field.trim().is_empty()).then(|| (field.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Rows keyed by the normalized header row.
fn structure_rows(range: &Range<Data>) -> Vec<Row> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let keys: Vec<String> = header.iter().map(|c| normalize_header(&to_text(c))).collect();

    rows.map(|cells| {
        keys.iter()
            .zip(cells)
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, cell)| (key.clone(), to_value(cell)))
            .collect()
    })
    .collect()
}

/// Generate the blank import template with both sheets pre-labeled.
pub fn template_xlsx() -> Result<Vec<u8>, IngestError> {
    build_template().map_err(|e| IngestError::WorkbookWrite(e.to_string()))
}

fn build_template() -> Result<Vec<u8>, XlsxError> {
    let bold = Format::new().set_bold();
    let mut workbook = Workbook::new();

    let info = workbook.add_worksheet();
    info.set_name(INFO_SHEET)?;
    write_row(info, 0, &["Field", "Value"], Some(&bold))?;
    let fields = [
        ("Name", "My Framework"),
        ("Description", "Describe the framework"),
        ("Version", "1.0"),
        ("Is Organizational", "false"),
        ("Hierarchy Type", "two_level"),
        ("Level 1 Name", "Category"),
        ("Level 2 Name", "Control"),
        ("Level 3 Name", ""),
    ];
    for (i, (field, value)) in (1u32..).zip(fields) {
        write_row(info, i, &[field, value], None)?;
    }
    info.set_column_width(0, 22)?;
    info.set_column_width(1, 40)?;

    let structure = workbook.add_worksheet();
    structure.set_name(STRUCTURE_SHEET)?;
    write_row(structure, 0, &STRUCTURE_HEADERS, Some(&bold))?;
    let examples: [[&str; 7]; 3] = [
        ["1", "Governance", "Oversight and accountability", "", "1", "", ""],
        [
            "2",
            "Risk management policy",
            "A documented policy exists",
            "Maintain an approved policy",
            "1",
            "Is the policy approved?, Is it reviewed yearly?",
            "Signed policy, Review minutes",
        ],
        ["2", "Roles and responsibilities", "", "", "2", "", ""],
    ];
    for (i, example) in (1u32..).zip(examples.iter()) {
        write_row(structure, i, example, None)?;
    }
    for (col, width) in (0u16..).zip([8.0, 32.0, 40.0, 32.0, 8.0, 45.0, 45.0]) {
        structure.set_column_width(col, width)?;
    }

    workbook.save_to_buffer()
}

fn write_row(
    sheet: &mut Worksheet,
    row: u32,
    cells: &[&str],
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    for (col, value) in (0u16..).zip(cells) {
        if value.is_empty() {
            continue;
        }
        match format {
            Some(format) => sheet.write_string_with_format(row, col, *value, format)?,
            None => sheet.write_string(row, col, *value)?,
        };
    }
    Ok(())
}
