//! Errors raised while building or editing a workbook

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Text that is not an A1 reference such as `B7` or `$C$2`
    #[error("'{0}' is not a cell reference")]
    InvalidAddress(String),

    /// Text that is not a `start:end` range
    #[error("'{0}' is not a cell range")]
    InvalidRange(String),

    #[error("row {0} is past the last row ({1})")]
    RowOutOfBounds(u32, u32),

    #[error("column {0} is past the last column ({1})")]
    ColumnOutOfBounds(u32, u16),

    #[error("no sheet at index {0}, the workbook has {1}")]
    SheetOutOfBounds(usize, usize),

    #[error("'{0}' cannot be used as a sheet name")]
    InvalidSheetName(String),

    #[error("a sheet named '{0}' already exists")]
    DuplicateSheetName(String),

    /// Defined name that is malformed or already taken in its scope
    #[error("cannot define name '{0}'")]
    InvalidName(String),

    #[error("{0} holds a value, not a formula")]
    NotAFormula(String),
}
