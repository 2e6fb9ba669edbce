//! Tabular datasets rendered as a text report.
//!
//! The report has two labelled sections: `[HEAD]` with the first rows as a markdown table and
//! `[STATS]` with per-column descriptive statistics. Spreadsheets (xlsx/xls, recognized by their
//! ZIP or OLE2 signature) go through `calamine`; everything else is parsed as CSV.

use super::DocumentDecoder;
use crate::processing::types::{DetectedType, ExtractionError};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

const HEAD_ROWS: usize = 50;
const OLE2_SIGNATURE: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Header row plus data rows, all as display strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names.
    pub headers: Vec<String>,
    /// Data rows; short rows are padded when rendered.
    pub rows: Vec<Vec<String>>,
}

/// Decoder for CSV files and spreadsheets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TabularDecoder;

impl DocumentDecoder for TabularDecoder {
    fn decode(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(path)?;
        let table = if bytes.starts_with(ZIP_SIGNATURE) || bytes.starts_with(OLE2_SIGNATURE) {
            load_spreadsheet(bytes)?
        } else {
            load_csv(&bytes)?
        };
        tracing::debug!(
            path = %path.display(),
            columns = table.headers.len(),
            rows = table.rows.len(),
            "Loaded tabular dataset"
        );
        Ok(render_report(&table))
    }
}

fn load_csv(bytes: &[u8]) -> Result<Table, ExtractionError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers = reader
        .byte_headers()
        .map_err(|error| ExtractionError::decode(DetectedType::Tabular, error))?
        .iter()
        .map(lossy)
        .collect();
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|error| ExtractionError::decode(DetectedType::Tabular, error))?;
        rows.push(record.iter().map(lossy).collect());
    }
    Ok(Table { headers, rows })
}

fn load_spreadsheet(bytes: Vec<u8>) -> Result<Table, ExtractionError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|error| ExtractionError::decode(DetectedType::Tabular, error))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExtractionError::decode(DetectedType::Tabular, "workbook has no sheets"))?
        .map_err(|error| ExtractionError::decode(DetectedType::Tabular, error))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = rows.next().unwrap_or_default();
    Ok(Table {
        headers,
        rows: rows.collect(),
    })
}

// Date-formatted cells hold Excel serial numbers; show them as ISO dates instead.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::DateTime(value) if !value.is_duration() => match value.as_datetime() {
            Some(datetime) => {
                let rendered = datetime.format("%Y-%m-%d %H:%M:%S").to_string();
                match rendered.strip_suffix(" 00:00:00") {
                    Some(date) => date.to_string(),
                    None => rendered,
                }
            }
            None => cell.to_string(),
        },
        Data::DateTimeIso(value) | Data::DurationIso(value) => value.clone(),
        other => other.to_string(),
    }
}

fn lossy(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

/// Render the `[HEAD]` and `[STATS]` sections for a table.
pub fn render_report(table: &Table) -> String {
    let head_rows: Vec<Vec<String>> = table.rows.iter().take(HEAD_ROWS).cloned().collect();
    let head = markdown_table(&table.headers, &head_rows);

    let mut stat_headers = vec![String::new()];
    stat_headers.extend(table.headers.iter().cloned());
    let columns: Vec<ColumnStats> = (0..table.headers.len())
        .map(|index| ColumnStats::compute(table.rows.iter().map(|row| cell(row, index))))
        .collect();
    let stat_rows: Vec<Vec<String>> = STAT_LABELS
        .iter()
        .enumerate()
        .map(|(stat, label)| {
            let mut row = vec![(*label).to_string()];
            row.extend(columns.iter().map(|column| column.value(stat)));
            row
        })
        .collect();
    let stats = markdown_table(&stat_headers, &stat_rows);

    format!("[HEAD]\n{head}\n\n[STATS]\n{stats}")
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

fn markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return "(no columns)".to_string();
    }
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(markdown_row(headers.iter().map(String::as_str)));
    lines.push(markdown_row(headers.iter().map(|_| "---")));
    for row in rows {
        lines.push(markdown_row((0..headers.len()).map(|index| cell(row, index))));
    }
    lines.join("\n")
}

fn markdown_row<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let cells: Vec<String> = cells
        .map(|value| value.replace('|', "\\|").replace(['\r', '\n'], " "))
        .collect();
    format!("| {} |", cells.join(" | "))
}

const STAT_LABELS: [&str; 9] = [
    "count", "unique", "mean", "std", "min", "25%", "50%", "75%", "max",
];

/// Descriptive statistics for one column. Numeric fields are present only when every
/// non-empty value parses as a number.
struct ColumnStats {
    count: usize,
    unique: usize,
    numeric: Option<NumericStats>,
}

struct NumericStats {
    mean: f64,
    std: Option<f64>,
    min: f64,
    q1: f64,
    median: f64,
    q3: f64,
    max: f64,
}

impl ColumnStats {
    fn compute<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let present: Vec<&str> = values.map(str::trim).filter(|value| !value.is_empty()).collect();
        let unique = present.iter().collect::<HashSet<_>>().len();
        let numbers: Option<Vec<f64>> = present
            .iter()
            .map(|value| value.parse::<f64>().ok().filter(|number| number.is_finite()))
            .collect();
        let numeric = numbers
            .filter(|numbers| !numbers.is_empty())
            .map(NumericStats::compute);
        Self {
            count: present.len(),
            unique,
            numeric,
        }
    }

    fn value(&self, stat: usize) -> String {
        match stat {
            0 => self.count.to_string(),
            1 => self.unique.to_string(),
            _ => self
                .numeric
                .as_ref()
                .and_then(|numeric| numeric.get(stat))
                .map(format_number)
                .unwrap_or_default(),
        }
    }
}

impl NumericStats {
    fn compute(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.len() > 1).then(|| {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        });
        Self {
            mean,
            std,
            min: values[0],
            q1: quantile(&values, 0.25),
            median: quantile(&values, 0.5),
            q3: quantile(&values, 0.75),
            max: values[values.len() - 1],
        }
    }

    fn get(&self, stat: usize) -> Option<f64> {
        match stat {
            2 => Some(self.mean),
            3 => self.std,
            4 => Some(self.min),
            5 => Some(self.q1),
            6 => Some(self.median),
            7 => Some(self.q3),
            8 => Some(self.max),
            _ => None,
        }
    }
}

// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

fn format_number(value: f64) -> String {
    let formatted = format!("{value:.6}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

    /// Minimal single-sheet workbook. Style 1 uses the built-in `m/d/yyyy` format (id 14).
    fn xlsx_bytes(sheet_rows: &str) -> Vec<u8> {
        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="{REL_NS}/styles" Target="styles.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/styles.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><styleSheet xmlns="{MAIN_NS}"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#
                ),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{MAIN_NS}"><sheetData>{sheet_rows}</sheetData></worksheet>"#
                ),
            ),
        ];

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            writer
                .start_file(name, SimpleFileOptions::default())
                .expect("entry");
            writer.write_all(body.as_bytes()).expect("part");
        }
        writer.finish().expect("finish").into_inner()
    }

    fn inline(reference: &str, text: &str) -> String {
        format!(r#"<c r="{reference}" t="inlineStr"><is><t>{text}</t></is></c>"#)
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn report_has_labelled_sections() {
        let report = render_report(&table(&["name", "score"], &[&["a", "1"], &["b", "3"]]));
        let (head, stats) = report.split_once("\n\n[STATS]\n").expect("stats section");
        assert_eq!(
            head,
            "[HEAD]\n| name | score |\n| --- | --- |\n| a | 1 |\n| b | 3 |"
        );
        assert!(stats.starts_with("|  | name | score |"));
        assert!(stats.contains("| count | 2 | 2 |"));
        assert!(stats.contains("| mean |  | 2 |"));
        assert!(stats.contains("| std |  | 1.414214 |"));
        assert!(stats.contains("| 50% |  | 2 |"));
    }

    #[test]
    fn head_is_limited_to_fifty_rows() {
        let rows: Vec<Vec<String>> = (0..80).map(|i| vec![i.to_string()]).collect();
        let report = render_report(&Table {
            headers: vec!["n".into()],
            rows,
        });
        let head = report.split("\n\n[STATS]").next().expect("head");
        assert!(head.contains("| 49 |"));
        assert!(!head.contains("| 50 |"));
        assert!(report.contains("| count | 80 |"));
        assert!(report.contains("| max | 79 |"));
    }

    #[test]
    fn quantiles_interpolate_linearly() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.25), 1.75);
        assert_eq!(quantile(&values, 0.5), 2.5);
        assert_eq!(quantile(&values, 0.75), 3.25);
    }

    #[test]
    fn mixed_columns_have_no_numeric_stats() {
        let stats = ColumnStats::compute(["1", "two", "", "1"].into_iter());
        assert_eq!(stats.count, 3);
        assert_eq!(stats.unique, 2);
        assert!(stats.numeric.is_none());
        assert_eq!(stats.value(2), "");
    }

    #[test]
    fn pipes_in_cells_are_escaped() {
        let report = render_report(&table(&["a|b"], &[&["x|y"]]));
        assert!(report.contains("| x\\|y |"));
    }

    #[test]
    fn decodes_csv_file_with_ragged_rows() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "city,pop\nOslo,700\nBergen\n").expect("write");

        let report = TabularDecoder.decode(&path).expect("report");
        assert!(report.contains("| Oslo | 700 |"));
        assert!(report.contains("| Bergen |  |"));
        assert!(report.contains("| count | 2 | 1 |"));
    }

    #[test]
    fn decodes_spreadsheet_with_header_row() {
        let rows = format!(
            r#"<row r="1">{}{}</row><row r="2">{}<c r="B2"><v>12.5</v></c></row><row r="3">{}<c r="B3"><v>7.5</v></c></row>"#,
            inline("A1", "region"),
            inline("B1", "amount"),
            inline("A2", "north"),
            inline("A3", "south"),
        );
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("sales.xlsx");
        std::fs::write(&path, xlsx_bytes(&rows)).expect("write");

        let report = TabularDecoder.decode(&path).expect("report");
        assert!(report.starts_with(
            "[HEAD]\n| region | amount |\n| --- | --- |\n| north | 12.5 |\n| south | 7.5 |\n\n[STATS]\n"
        ));
        assert!(report.contains("| count | 2 | 2 |"));
        assert!(report.contains("| mean |  | 10 |"));
        assert!(report.contains("| max |  | 12.5 |"));
    }

    #[test]
    fn spreadsheet_dates_render_as_iso_and_skip_numeric_stats() {
        let rows = format!(
            r#"<row r="1">{}{}</row><row r="2"><c r="A2" s="1"><v>45292</v></c><c r="B2"><v>10</v></c></row><row r="3"><c r="A3" s="1"><v>45323</v></c><c r="B3"><v>30</v></c></row><row r="4"><c r="A4" s="1"><v>45337.5</v></c><c r="B4"><v>5</v></c></row>"#,
            inline("A1", "when"),
            inline("B1", "amount"),
        );
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("dated.xlsx");
        std::fs::write(&path, xlsx_bytes(&rows)).expect("write");

        let report = TabularDecoder.decode(&path).expect("report");
        assert!(report.contains("| 2024-01-01 | 10 |"));
        assert!(report.contains("| 2024-02-01 | 30 |"));
        assert!(report.contains("| 2024-02-15 12:00:00 | 5 |"));
        assert!(!report.contains("45292"));
        assert!(report.contains("| count | 3 | 3 |"));
        assert!(report.contains("| mean |  | 15 |"));
    }

    #[test]
    fn corrupt_spreadsheet_is_decode_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("book.xlsx");
        std::fs::write(&path, b"PK\x03\x04garbage").expect("write");

        let error = TabularDecoder.decode(&path).expect_err("corrupt");
        assert!(matches!(
            error,
            ExtractionError::Decode {
                kind: DetectedType::Tabular,
                ..
            }
        ));
    }
}
