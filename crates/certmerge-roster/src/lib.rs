//! # certmerge-roster
//!
//! Reads the recipient roster from an Excel workbook.
//!
//! The roster is a worksheet with a header row at a configurable offset
//! (certificate lists traditionally carry a letterhead above the table).
//! Columns are mapped to canonical attributes by their header text; the
//! full-name column is required and rows without it are dropped. An
//! optional equality filter keeps only the rows of one column value.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use certmerge_core::{CertMergeError, Journal, Recipient, Result};

/// Column header of the required full-name column.
pub const FULL_NAME_HEADER: &str = "Họ và tên";

/// Reader configuration, resolved from the `[excel]` config section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterOptions {
    /// 1-based sheet row holding the column headers.
    pub header_row: usize,
    /// Optional filter column header.
    pub filter_column: Option<String>,
    /// Value rows must equal in the filter column.
    pub filter_value: Option<String>,
}

impl Default for RosterOptions {
    fn default() -> Self {
        Self {
            header_row: 5,
            filter_column: None,
            filter_value: None,
        }
    }
}

/// Find the roster workbook: the first `.xlsx`/`.xls` in the folder by
/// name order, Excel lock files (`~$...`) excluded.
pub fn find_roster_file(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| {
                    ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xls")
                })
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("~$"))
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| CertMergeError::RosterNotFound(dir.to_path_buf()))
}

/// Load and clean the roster from a workbook's first worksheet.
pub fn load_roster(path: &Path, options: &RosterOptions, journal: &Journal) -> Result<Vec<Recipient>> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| CertMergeError::Roster(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CertMergeError::Roster("workbook has no worksheets".to_string()))?
        .map_err(|e| CertMergeError::Roster(e.to_string()))?;
    parse_rows(&range, options, journal)
}

/// Canonical column indexes resolved from the header row.
#[derive(Debug, Default)]
struct Columns {
    seq: Option<usize>,
    full_name: Option<usize>,
    dharma_name: Option<usize>,
    birth_year: Option<usize>,
    unit: Option<usize>,
    filter: Option<usize>,
}

/// Map the roster rows of a worksheet range to recipients.
///
/// Split from [`load_roster`] so the mapping rules are testable on ranges
/// built in memory.
pub fn parse_rows(
    range: &Range<Data>,
    options: &RosterOptions,
    journal: &Journal,
) -> Result<Vec<Recipient>> {
    if options.header_row == 0 {
        return Err(CertMergeError::Roster(
            "header_row is 1-based and cannot be 0".to_string(),
        ));
    }
    let start_row = range.start().map_or(0, |(row, _)| row as usize);
    let header_offset = (options.header_row - 1)
        .checked_sub(start_row)
        .ok_or_else(|| {
            CertMergeError::Roster(format!(
                "header row {} lies above the sheet data",
                options.header_row
            ))
        })?;

    let mut rows = range.rows().skip(header_offset);
    let header = rows
        .next()
        .ok_or_else(|| CertMergeError::Roster("sheet ends before the header row".to_string()))?;
    let columns = resolve_columns(header, options)?;

    let mut recipients = Vec::new();
    for row in rows {
        let full_name = cell_at(row, columns.full_name);
        if full_name.is_empty() {
            continue;
        }
        recipients.push(RawRow {
            seq: columns.seq.and_then(|idx| parse_seq(row.get(idx))),
            full_name,
            dharma_name: cell_at(row, columns.dharma_name),
            birth_year: cell_at(row, columns.birth_year),
            unit: cell_at(row, columns.unit),
            filter: cell_at(row, columns.filter),
        });
    }

    if let (Some(column), Some(value)) = (&options.filter_column, &options.filter_value) {
        if columns.filter.is_some() && !value.is_empty() {
            let filtered: Vec<&RawRow> = recipients
                .iter()
                .filter(|row| row.filter == *value)
                .collect();
            if filtered.is_empty() {
                journal.warn(format!(
                    "filter {column} = {value:?} matched no rows, keeping all {}",
                    recipients.len()
                ));
            } else {
                journal.info(format!(
                    "filter {column} = {value:?} kept {} of {} rows",
                    filtered.len(),
                    recipients.len()
                ));
                let keep: Vec<RawRow> = filtered.into_iter().cloned().collect();
                recipients = keep;
            }
        }
    }

    Ok(recipients
        .into_iter()
        .enumerate()
        .map(|(index, row)| Recipient {
            seq: row.seq.unwrap_or(index as u32 + 1),
            full_name: row.full_name,
            dharma_name: row.dharma_name,
            birth_year: row.birth_year,
            unit: row.unit,
        })
        .collect())
}

#[derive(Debug, Clone)]
struct RawRow {
    seq: Option<u32>,
    full_name: String,
    dharma_name: String,
    birth_year: String,
    unit: String,
    filter: String,
}

fn resolve_columns(header: &[Data], options: &RosterOptions) -> Result<Columns> {
    let mut columns = Columns::default();
    for (index, cell) in header.iter().enumerate() {
        let lowered = cell_text(cell).to_lowercase();
        if lowered.is_empty() {
            continue;
        }
        let slot = match lowered.as_str() {
            "tt" | "stt" => Some(&mut columns.seq),
            _ if lowered == FULL_NAME_HEADER.to_lowercase() => Some(&mut columns.full_name),
            "pháp danh" => Some(&mut columns.dharma_name),
            "năm sinh" => Some(&mut columns.birth_year),
            "đơn vị" => Some(&mut columns.unit),
            _ => None,
        };
        if let Some(slot) = slot {
            if slot.is_none() {
                *slot = Some(index);
            }
        }
        // The filter column may be any column, including unmapped ones.
        if let Some(filter_column) = &options.filter_column {
            if columns.filter.is_none()
                && !filter_column.is_empty()
                && lowered == filter_column.to_lowercase()
            {
                columns.filter = Some(index);
            }
        }
    }

    if columns.full_name.is_none() {
        return Err(CertMergeError::MissingColumn(FULL_NAME_HEADER.to_string()));
    }
    Ok(columns)
}

fn cell_at(row: &[Data], index: Option<usize>) -> String {
    index
        .and_then(|idx| row.get(idx))
        .map(cell_text)
        .unwrap_or_default()
}

/// Render a cell the way the certificate should display it: integral
/// floats lose the decimal point, blanks become empty strings.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn parse_seq(cell: Option<&Data>) -> Option<u32> {
    match cell? {
        Data::Float(f) if *f >= 0.0 => Some(*f as u32),
        Data::Int(i) if *i >= 0 => Some(*i as u32),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
