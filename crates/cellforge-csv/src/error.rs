//! Errors from reading and writing CSV files

use thiserror::Error;

pub type CsvResult<T> = std::result::Result<T, CsvError>;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A record that does not fit on a sheet
    #[error("record {row}, field {column}: {message}")]
    Parse {
        row: usize,
        column: usize,
        message: String,
    },

    /// A field the workbook model refused, e.g. a formula on an out-of-range cell
    #[error(transparent)]
    Core(#[from] cellforge_core::Error),
}
