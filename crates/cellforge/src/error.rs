//! Error type for conversions

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`ConvertError`]
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors that stop a conversion
///
/// Problems confined to a single cell (a formula that does not parse, an
/// unknown function) are not errors: they become error values in that cell
/// and are logged.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Core(#[from] cellforge_core::Error),

    #[error(transparent)]
    Formula(#[from] cellforge_formula::FormulaError),

    #[cfg(feature = "xlsx")]
    #[error(transparent)]
    Xlsx(#[from] cellforge_xlsx::XlsxError),

    #[error(transparent)]
    Csv(#[from] cellforge_csv::CsvError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File extension without a reader
    #[error("Unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The workbook has nothing to convert
    #[error("No formulas found in {}", .0.display())]
    NoFormulas(PathBuf),

    /// Cells that reference each other while circular references are rejected
    #[error("Circular reference between {cells}")]
    CircularReference { cells: String },

    /// Configuration file could not be read or is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),
}
