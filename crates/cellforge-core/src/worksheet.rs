//! Worksheet type

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A single sheet: a sparse grid of cells
///
/// Cells are keyed by `(row, col)` so iteration is always row-major and
/// independent of insertion order.
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<(u32, u16), CellValue>,
}

impl Worksheet {
    /// Create an empty worksheet
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    // === Cell Access ===

    /// Get a cell value by address string (e.g., "A1")
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get a cell value by 0-based indices
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells.get(&(row, col)).cloned().unwrap_or_default()
    }

    /// Borrow a cell value by 0-based indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Computed value of a formula cell, or the value itself for other cells
    pub fn get_calculated_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(&(row, col))
            .map(|v| v.effective_value().clone())
            .unwrap_or_default()
    }

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by 0-based indices; storing `Empty` clears the cell
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        validate_cell_position(row, col)?;
        match value.into() {
            CellValue::Empty => {
                self.cells.remove(&(row, col));
            }
            value => {
                self.cells.insert((row, col), value);
            }
        }
        Ok(())
    }

    /// Set a formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a formula by 0-based indices; a missing leading `=` is added
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        validate_cell_position(row, col)?;
        let formula = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={}", formula)
        };
        self.cells.insert((row, col), CellValue::formula(formula));
        Ok(())
    }

    /// Set a formula together with the value cached for it in the source file
    pub fn set_cell_formula_with_cached(
        &mut self,
        row: u32,
        col: u16,
        formula: &str,
        cached: CellValue,
    ) -> Result<()> {
        self.set_cell_formula_at(row, col, formula)?;
        if !cached.is_empty() {
            self.set_formula_result(row, col, cached)?;
        }
        Ok(())
    }

    // === Range Operations ===

    /// Bounds of all stored cells
    pub fn used_range(&self) -> Option<CellRange> {
        let mut keys = self.cells.keys();
        let &(first_row, first_col) = keys.next()?;
        let (mut min_col, mut max_col) = (first_col, first_col);
        let mut max_row = first_row;
        for &(row, col) in keys {
            min_col = min_col.min(col);
            max_col = max_col.max(col);
            max_row = max_row.max(row);
        }
        Some(CellRange::from_indices(first_row, min_col, max_row, max_col))
    }

    /// Iterate over stored cells inside `range`, row-major
    pub fn cells_in(&self, range: CellRange) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.cells
            .range((range.start.row, 0)..=(range.end.row, u16::MAX))
            .filter(move |((_, col), _)| *col >= range.start.col && *col <= range.end.col)
            .map(|(&(row, col), value)| (row, col, value))
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Whether the sheet has no stored cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over all stored cells, row-major
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.cells.iter().map(|(&(row, col), value)| (row, col, value))
    }

    // === Formula support ===

    /// Iterate over formula cells as `(row, col, formula_text)`, row-major
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.iter_cells()
            .filter_map(|(row, col, value)| value.formula_text().map(|text| (row, col, text)))
    }

    /// Number of formula cells
    pub fn formula_count(&self) -> usize {
        self.formula_cells().count()
    }

    /// Formula text at a cell, if it holds one
    pub fn get_formula_at(&self, row: u32, col: u16) -> Option<&str> {
        self.cells.get(&(row, col)).and_then(CellValue::formula_text)
    }

    /// Store the computed result of a formula cell
    pub fn set_formula_result(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        match self.cells.get_mut(&(row, col)) {
            Some(CellValue::Formula { cached, .. }) => {
                *cached = Some(Box::new(value));
                Ok(())
            }
            _ => Err(Error::NotAFormula(format!(
                "{}!{}",
                self.name,
                CellAddress::new(row, col)
            ))),
        }
    }
}

fn validate_cell_position(row: u32, col: u16) -> Result<()> {
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
    }
    if col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(col as u32, MAX_COLS - 1));
    }
    Ok(())
}
