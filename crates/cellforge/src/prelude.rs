//! Common imports for cellforge users
//!
//! ```rust
//! use cellforge::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationStats,
    CellAddress,
    CellError,
    CellRange,
    // Cell types
    CellValue,
    CircularMode,

    // Conversion
    convert,
    ConversionReport,
    ConvertConfig,
    ConvertError,

    CsvReader,
    FormulaGraph,
    FormulaInventory,
    Result,

    // Main types
    Workbook,
    // Extension traits
    WorkbookCalculationExt,
    WorkbookExt,
    Worksheet,
};

#[cfg(feature = "xlsx")]
pub use crate::XlsxReader;
