//! Formula error types

use cellforge_core::CellError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors raised while parsing or evaluating a formula
///
/// Most spreadsheet-level failures (division by zero, bad argument types)
/// are values, not errors: they come back as `FormulaValue::Error`. This
/// type covers failures where no sensible value exists.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula text could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Evaluation could not proceed
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Reference that cannot be resolved
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

impl FormulaError {
    /// The cell error a spreadsheet would display for this failure
    pub fn to_cell_error(&self) -> CellError {
        match self {
            FormulaError::Parse(_) => CellError::Name,
            FormulaError::Evaluation(_) => CellError::Value,
            FormulaError::InvalidReference(_) => CellError::Ref,
        }
    }
}
