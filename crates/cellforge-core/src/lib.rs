//! # cellforge-core
//!
//! Workbook data model shared by the cellforge crates.
//!
//! - [`CellValue`] and [`CellError`] - what a cell holds
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing
//! - [`Worksheet`] - a sparse, row-major grid of cells
//! - [`Workbook`] - ordered sheets plus defined names and settings
//!
//! ## Example
//!
//! ```rust
//! use cellforge_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_formula("A2", "=A1*2").unwrap();
//!
//! assert_eq!(sheet.get_value("A1").unwrap(), CellValue::Number(10.0));
//! assert_eq!(sheet.formula_cells().count(), 1);
//! ```

pub mod cell;
pub mod error;
pub mod named_range;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellError, CellRange, CellValue};
pub use error::{Error, Result};
pub use named_range::{NameScope, NamedRange, NamedRangeCollection};
pub use workbook::{Workbook, WorkbookSettings};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
