//! # cellforge-xlsx
//!
//! XLSX (Office Open XML) reader for cellforge. Reads cell values, formulas
//! (shared formulas expanded per cell), cached formula results, defined
//! names and the workbook date system.

pub mod error;
pub mod reader;

pub use error::{XlsxError, XlsxResult};
pub use reader::XlsxReader;
