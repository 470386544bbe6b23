//! CSV tables of each sheet's formulas

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use cellforge_core::Workbook;
use cellforge_csv::{CsvWriteOptions, CsvWriter};

use crate::error::Result;
use crate::inventory::{FormulaInventory, SheetInventory};

/// Directory, below the conversion output, that holds the tables
pub const TABLE_DIR: &str = "dataframes";

/// Options for [`export_tables`]
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Also write `<sheet>_values.csv` with the computed value grid
    pub values: bool,
    pub delimiter: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            values: true,
            delimiter: b',',
        }
    }
}

/// Write the formula table of every sheet in `inventory` under
/// `<out_dir>/dataframes/`
///
/// Returns the written files in the order they were written.
pub fn export_tables(
    workbook: &Workbook,
    inventory: &FormulaInventory,
    out_dir: &Path,
    options: &ExportOptions,
) -> Result<Vec<PathBuf>> {
    let dir = out_dir.join(TABLE_DIR);
    fs::create_dir_all(&dir)?;

    let csv_options = CsvWriteOptions {
        delimiter: options.delimiter,
        ..Default::default()
    };

    let mut used = HashSet::new();
    let mut written = Vec::new();

    for sheet_inventory in &inventory.sheets {
        let stem = unique_stem(&sanitize_file_name(&sheet_inventory.sheet), &mut used);

        let path = dir.join(format!("{}.csv", stem));
        write_formula_table(sheet_inventory, &path, &csv_options)?;
        log::info!(
            "wrote {} ({} formulas)",
            path.display(),
            sheet_inventory.records.len()
        );
        written.push(path);

        if options.values {
            if let Some(sheet) = workbook.worksheet_by_name(&sheet_inventory.sheet) {
                let path = dir.join(format!("{}_values.csv", stem));
                CsvWriter::write_values_file(sheet, &path, &csv_options)?;
                log::info!("wrote {}", path.display());
                written.push(path);
            }
        }
    }

    Ok(written)
}

fn write_formula_table(
    sheet: &SheetInventory,
    path: &Path,
    options: &CsvWriteOptions,
) -> Result<()> {
    let rows = sheet.records.iter().map(|record| record.to_row());
    CsvWriter::write_table_file(path, &SheetInventory::HEADER, rows, options)?;
    Ok(())
}

/// File-system safe form of a sheet name: anything outside `[A-Za-z0-9_-]`
/// becomes `_`
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "sheet".to_string()
    } else {
        sanitized
    }
}

/// `stem`, or `stem_2`, `stem_3`, ... when an earlier sheet took it
///
/// Compared case-insensitively so tables do not overwrite each other on
/// case-insensitive file systems.
fn unique_stem(stem: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = stem.to_string();
    let mut n = 2;
    while !used.insert(candidate.to_lowercase()) {
        candidate = format!("{}_{}", stem, n);
        n += 1;
    }
    candidate
}
