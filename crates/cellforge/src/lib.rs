//! # cellforge
//!
//! Turns a spreadsheet with formulas into plain files a program can use:
//!
//! - one CSV table per sheet listing each formula, the cells it reads and
//!   its computed value
//! - a standalone Rust program that recomputes the workbook when its inputs
//!   change
//!
//! XLSX/XLSM files (feature `xlsx`, on by default) and CSV files with
//! `=`-prefixed cells are read.
//!
//! ## Example
//!
//! ```rust
//! use cellforge::{CellValue, Workbook, WorkbookCalculationExt};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_value("A2", 32.0).unwrap();
//! sheet.set_cell_formula("A3", "=SUM(A1:A2)").unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.formula_count, 1);
//!
//! let sheet = workbook.worksheet(0).unwrap();
//! assert_eq!(sheet.get_calculated_value_at(2, 0), CellValue::Number(42.0));
//! ```

pub mod calculation;
pub mod codegen;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod graph;
pub mod inventory;
pub mod prelude;

pub use calculation::{
    calculate_graph, CalculationOptions, CalculationStats, CircularMode, WorkbookCalculationExt,
};
pub use codegen::{generate_program, FreezeReason, FrozenCell, GeneratedProgram};
pub use config::{CalculationConfig, CodegenConfig, ConvertConfig, ExportConfig};
pub use convert::{convert, ConversionReport};
pub use error::{ConvertError, Result};
pub use export::{export_tables, ExportOptions};
pub use graph::{cell_label, FormulaGraph};
pub use inventory::{FormulaInventory, FormulaRecord, SheetInventory};

// Re-export core types
pub use cellforge_core::{
    CellAddress, CellError, CellRange, CellValue, NameScope, NamedRange, Workbook, Worksheet,
};

// Re-export formula types
pub use cellforge_formula::{
    evaluate, parse_formula, CellKey, DependencyGraph, EvalStep, EvaluationContext, FormulaError,
    FormulaExpr, FormulaValue,
};

// Re-export I/O types
pub use cellforge_csv::{CsvError, CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter};
#[cfg(feature = "xlsx")]
pub use cellforge_xlsx::{XlsxError, XlsxReader};

use std::path::Path;

/// Extension trait for Workbook to add file input
pub trait WorkbookExt {
    /// Open a workbook, choosing the reader by file extension
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook>;
}

impl WorkbookExt for Workbook {
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension.as_deref() {
            #[cfg(feature = "xlsx")]
            Some("xlsx") | Some("xlsm") => Ok(XlsxReader::read_file(path)?),
            Some("csv") => {
                let worksheet = CsvReader::read_file(path, &CsvReadOptions::default())?;

                let mut workbook = Workbook::empty();
                workbook.add_existing_worksheet(worksheet)?;
                Ok(workbook)
            }
            _ => Err(ConvertError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_open_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(&path, "item,price\nbolt,2\nnut,3\ntotal,=SUM(B2:B3)\n").unwrap();

        let workbook = Workbook::open(&path).unwrap();

        assert_eq!(workbook.sheet_names(), vec!["prices"]);
        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.get_formula_at(3, 1), Some("=SUM(B2:B3)"));
    }

    #[test]
    fn test_open_unsupported() {
        let err = Workbook::open("notes.txt").unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat(_)));

        let err = Workbook::open("no_extension").unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
    }
}
