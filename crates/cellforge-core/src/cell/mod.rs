//! Cell-level types
//!
//! - [`CellValue`] - the value stored in a cell
//! - [`CellAddress`] - a cell's location (e.g., "A1")
//! - [`CellRange`] - a rectangular block of cells (e.g., "A1:B10")

mod address;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use value::{CellError, CellValue};
