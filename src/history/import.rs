//! Import of spreadsheet exports.
//!
//! Workbooks (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read from their
//! first sheet; anything else is treated as delimited text (comma, semicolon
//! or tab). Layout is positional: `id, timestamp, temperature, turbidity,
//! salinity`, with a header row that is skipped. Cells are coerced, not
//! validated.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, Trim};
use serde_json::Value;

use crate::models::{coerce_f64, WaterQualityRecord};

const ENABLE_LOGS: bool = true;

use crate::log_info;

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn import_file(path: &Path) -> Result<Vec<WaterQualityRecord>> {
    let is_workbook = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WORKBOOK_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    let records = if is_workbook {
        read_workbook(path)?
    } else {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read import file {}", path.display()))?;
        parse_table(&text).with_context(|| format!("failed to parse {}", path.display()))?
    };

    log_info!("imported {} record(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Delimited text with a header row. Blank rows are skipped and short rows
/// read their missing cells as empty.
pub fn parse_table(text: &str) -> Result<Vec<WaterQualityRecord>> {
    let text = text.trim_start_matches('\u{feff}');
    let header = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");

    let mut reader = ReaderBuilder::new()
        .delimiter(sniff_delimiter(header))
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.context("malformed row in import")?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        let cells: Vec<Value> = row.iter().map(|cell| Value::String(cell.to_string())).collect();
        records.push(record_from_cells(&cells));
    }
    Ok(records)
}

fn read_workbook(path: &Path) -> Result<Vec<WaterQualityRecord>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    let sheet = workbook
        .worksheet_range_at(0)
        .with_context(|| format!("workbook {} has no sheets", path.display()))?
        .with_context(|| format!("failed to read first sheet of {}", path.display()))?;

    Ok(sheet
        .rows()
        .skip(1)
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| record_from_cells(&row.iter().map(cell_value).collect::<Vec<_>>()))
        .collect())
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(n) => Value::from(*n),
        // Whole-number floats are how workbooks store integer ids.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Value::from(*f as i64),
        Data::Float(f) => Value::from(*f),
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            Value::String(text.clone())
        }
        Data::Bool(flag) => Value::Bool(*flag),
        Data::DateTime(serial) => match serial.as_datetime() {
            Some(at) => Value::String(at.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::from(serial.as_f64()),
        },
        _ => Value::Null,
    }
}

fn record_from_cells(cells: &[Value]) -> WaterQualityRecord {
    let cell = |index: usize| cells.get(index).unwrap_or(&Value::Null);

    WaterQualityRecord {
        id: cell_text(cell(0)),
        timestamp: cell_text(cell(1)),
        temperature: coerce_f64(cell(2)),
        turbidity: coerce_f64(cell(3)),
        salinity: coerce_f64(cell(4)),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn sniff_delimiter(header: &str) -> u8 {
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|candidate| header.matches(*candidate as char).count())
        .filter(|candidate| header.contains(*candidate as char))
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_skipped_and_columns_are_positional() {
        let text = "id,timestamp,temperature,turbidity,salinity\n\
                    a1,2025-10-15,28.5,4.2,0.1\n\
                    a2,2025-10-16,29,5,0.3\n";
        let records = parse_table(text).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a1");
        assert_eq!(records[1].timestamp, "2025-10-16");
        assert_eq!(records[1].temperature, 29.0);
        assert_eq!(records[1].salinity, 0.3);
    }

    #[test]
    fn bad_and_missing_cells_coerce_to_zero() {
        let text = "id;timestamp;temperature;turbidity;salinity\nx;;n/a;4,5\n";
        let records = parse_table(text).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, "");
        assert_eq!(records[0].temperature, 0.0);
        assert_eq!(records[0].turbidity, 4.0);
        assert_eq!(records[0].salinity, 0.0);
    }

    #[test]
    fn quoted_cells_may_contain_delimiters() {
        let text = "id,timestamp,temperature,turbidity,salinity\n\"b,1\",\"15/10/2025 08:00\",28.1,\"4.4\",0.2\n";
        let records = parse_table(text).unwrap();

        assert_eq!(records[0].id, "b,1");
        assert_eq!(records[0].timestamp, "15/10/2025 08:00");
        assert_eq!(records[0].turbidity, 4.4);
    }

    #[test]
    fn quoted_cells_may_span_lines() {
        let text = "id,timestamp,temperature,turbidity,salinity\n\
                    \"c1\",\"15/10/2025\n08:00\",28.3,4.6,0.2\n\
                    c2,16/10/2025,28.4,4.7,0.3\n";
        let records = parse_table(text).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, "15/10/2025\n08:00");
        assert_eq!(records[0].salinity, 0.2);
        assert_eq!(records[1].id, "c2");
    }

    #[test]
    fn tab_separated_exports_are_detected() {
        let text = "\u{feff}id\ttimestamp\ttemperature\tturbidity\tsalinity\r\nt1\t2025-10-15\t28.9\t4.9\t0.17\r\n\r\n";
        let records = parse_table(text).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "t1");
        assert_eq!(records[0].salinity, 0.17);
    }

    #[test]
    fn header_only_or_empty_input_yields_nothing() {
        assert!(parse_table("").unwrap().is_empty());
        assert!(parse_table("id,timestamp,temperature,turbidity,salinity\n")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn workbook_first_sheet_is_imported() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/readings.xlsx");
        let records = import_file(&path).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "1");
        assert_eq!(records[0].timestamp, "2025-10-15 08:00");
        assert_eq!(records[0].temperature, 28.5);
        assert_eq!(records[1].id, "w2");
        assert_eq!(records[1].temperature, 29.1);
        assert_eq!(records[1].salinity, 0.25);
        assert_eq!(records[2].timestamp, "");
        assert_eq!(records[2].turbidity, 0.0);
        assert_eq!(records[2].salinity, 0.3);
    }

    #[test]
    fn unreadable_workbook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        assert!(import_file(&path).is_err());
    }
}
