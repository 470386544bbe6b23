//! # cellforge-csv
//!
//! CSV support for cellforge: reading a CSV file as a one-sheet workbook
//! (fields starting with `=` are formulas) and writing tables and computed
//! value grids.

mod error;
mod options;
mod reader;
mod writer;

pub use error::{CsvError, CsvResult};
pub use options::{CsvReadOptions, CsvWriteOptions, LineTerminator};
pub use reader::CsvReader;
pub use writer::CsvWriter;
