//! Cell address and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "$B$2")
///
/// Rows and columns are 0-based internally and rendered 1-based / lettered.
/// The `$` markers are kept so that formulas can be re-rendered and shifted.
/// Equality and ordering ignore nothing: two addresses with different
/// anchoring are different addresses. Use [`CellAddress::position`] when only
/// the location matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Row index (0-based)
    pub row: u32,
    /// Column index (0-based, A=0, XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a relative cell address
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create a cell address with explicit anchoring
    pub fn with_absolute(row: u32, col: u16, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// The `(row, col)` location without anchoring
    pub fn position(&self) -> (u32, u16) {
        (self.row, self.col)
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use cellforge_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert_eq!((addr.row, addr.col), (1, 1));
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        let bad = || Error::InvalidAddress(text.to_string());

        let (col_absolute, rest) = match text.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let split = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let (letters, rest) = rest.split_at(split);
        let (row_absolute, digits) = match rest.strip_prefix('$') {
            Some(digits) => (true, digits),
            None => (false, rest),
        };

        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let col = Self::letters_to_column(letters)?;
        let row: u32 = digits.parse().map_err(|_| bad())?;
        match row {
            0 => Err(bad()),
            r if r > MAX_ROWS => Err(Error::RowOutOfBounds(r - 1, MAX_ROWS - 1)),
            r => Ok(Self::with_absolute(r - 1, col, row_absolute, col_absolute)),
        }
    }

    /// Column letters for a 0-based index: 0 is `A`, 26 is `AA`
    pub fn column_to_letters(col: u16) -> String {
        let mut letters = Vec::with_capacity(3);
        let mut rest = u32::from(col) + 1;
        while rest > 0 {
            let digit = (rest - 1) % 26;
            letters.push(b'A' + digit as u8);
            rest = (rest - 1) / 26;
        }
        letters.iter().rev().map(|&b| b as char).collect()
    }

    /// 0-based index for column letters, ignoring case
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::InvalidAddress(letters.to_string()));
        }
        let number = letters.bytes().try_fold(0u32, |acc, b| {
            let next = acc * 26 + u32::from(b.to_ascii_uppercase() - b'A') + 1;
            if next > u32::from(MAX_COLS) {
                Err(Error::ColumnOutOfBounds(next - 1, MAX_COLS - 1))
            } else {
                Ok(next)
            }
        })?;
        Ok((number - 1) as u16)
    }

    /// Move the relative parts of this address by `(drow, dcol)`.
    ///
    /// Absolute parts stay put. Returns `None` when the result falls off the
    /// grid (Excel renders such a reference as `#REF!`).
    pub fn offset(&self, drow: i64, dcol: i64) -> Option<Self> {
        let row = if self.row_absolute {
            self.row as i64
        } else {
            self.row as i64 + drow
        };
        let col = if self.col_absolute {
            self.col as i64
        } else {
            self.col as i64 + dcol
        };

        if row < 0 || row >= MAX_ROWS as i64 || col < 0 || col >= MAX_COLS as i64 {
            return None;
        }

        Some(Self::with_absolute(
            row as u32,
            col as u16,
            self.row_absolute,
            self.col_absolute,
        ))
    }

    /// Format as A1-style string, keeping `$` markers
    pub fn to_a1_string(&self) -> String {
        let anchor = |absolute: bool| if absolute { "$" } else { "" };
        format!(
            "{}{}{}{}",
            anchor(self.col_absolute),
            Self::column_to_letters(self.col),
            anchor(self.row_absolute),
            self.row + 1
        )
    }

    /// Format as A1-style string without `$` markers
    pub fn to_relative_string(&self) -> String {
        format!("{}{}", Self::column_to_letters(self.col), self.row + 1)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Top-left corner
    pub start: CellAddress,
    /// Bottom-right corner
    pub end: CellAddress,
}

impl CellRange {
    /// Create a range, normalising the corners so `start` is top-left
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (start_row, start_row_abs, end_row, end_row_abs) = if start.row <= end.row {
            (start.row, start.row_absolute, end.row, end.row_absolute)
        } else {
            (end.row, end.row_absolute, start.row, start.row_absolute)
        };
        let (start_col, start_col_abs, end_col, end_col_abs) = if start.col <= end.col {
            (start.col, start.col_absolute, end.col, end.col_absolute)
        } else {
            (end.col, end.col_absolute, start.col, start.col_absolute)
        };

        Self {
            start: CellAddress::with_absolute(start_row, start_col, start_row_abs, start_col_abs),
            end: CellAddress::with_absolute(end_row, end_col, end_row_abs, end_col_abs),
        }
    }

    /// Create a range from 0-based row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from `A1:B10` notation (a lone `A1` is a single-cell range)
    ///
    /// Whole columns (`A:C`) and whole rows (`2:5`) are accepted too.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(':') {
            Some((a, b)) => {
                if let Some(range) = Self::parse_lines(a, b) {
                    return Ok(range);
                }
                let start = CellAddress::parse(a)
                    .map_err(|_| Error::InvalidRange(s.to_string()))?;
                let end = CellAddress::parse(b)
                    .map_err(|_| Error::InvalidRange(s.to_string()))?;
                Ok(Self::new(start, end))
            }
            None => Ok(Self::single(CellAddress::parse(s)?)),
        }
    }

    /// Whole columns (`A`, `$C`) or whole rows (`1`, `$5`) from the two
    /// halves of a `start:end` reference
    ///
    /// The spanned dimension is anchored, so shifting the range never moves
    /// it off the first row or column.
    pub fn parse_lines(start: &str, end: &str) -> Option<Self> {
        if let (Some((c0, a0)), Some((c1, a1))) = (column_label(start), column_label(end)) {
            return Some(Self::new(
                CellAddress::with_absolute(0, c0, true, a0),
                CellAddress::with_absolute(MAX_ROWS - 1, c1, true, a1),
            ));
        }
        let (r0, a0) = row_label(start)?;
        let (r1, a1) = row_label(end)?;
        Some(Self::new(
            CellAddress::with_absolute(r0, 0, a0, true),
            CellAddress::with_absolute(r1, MAX_COLS - 1, a1, true),
        ))
    }

    /// Whether the range spans every row
    pub fn is_whole_columns(&self) -> bool {
        self.start.row == 0 && self.end.row == MAX_ROWS - 1
    }

    /// Whether the range spans every column
    pub fn is_whole_rows(&self) -> bool {
        self.start.col == 0 && self.end.col == MAX_COLS - 1
    }

    /// `A:C` or `2:5` form of a whole-column or whole-row range, keeping `$`
    /// markers
    pub fn line_label(&self) -> Option<String> {
        let anchor = |absolute: bool| if absolute { "$" } else { "" };
        if self.is_whole_columns() {
            Some(format!(
                "{}{}:{}{}",
                anchor(self.start.col_absolute),
                CellAddress::column_to_letters(self.start.col),
                anchor(self.end.col_absolute),
                CellAddress::column_to_letters(self.end.col)
            ))
        } else if self.is_whole_rows() {
            Some(format!(
                "{}{}:{}{}",
                anchor(self.start.row_absolute),
                self.start.row + 1,
                anchor(self.end.row_absolute),
                self.end.row + 1
            ))
        } else {
            None
        }
    }

    /// Check if a location is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.row >= self.start.row
            && addr.row <= self.end.row
            && addr.col >= self.start.col
            && addr.col <= self.end.col
    }

    /// Number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Move both corners by `(drow, dcol)`, honouring their anchoring
    pub fn offset(&self, drow: i64, dcol: i64) -> Option<Self> {
        Some(Self::new(
            self.start.offset(drow, dcol)?,
            self.end.offset(drow, dcol)?,
        ))
    }

    /// Iterate over member cells, row by row
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
            remaining: self.cell_count(),
        }
    }

    /// Format as `A1:B10` (`A1` for a single cell, `A:C` for whole columns)
    pub fn to_a1_string(&self) -> String {
        if let Some(label) = self.line_label() {
            label
        } else if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn strip_anchor(s: &str) -> (bool, &str) {
    match s.trim().strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s.trim()),
    }
}

/// 0-based column and anchor of a `$C` style label
fn column_label(s: &str) -> Option<(u16, bool)> {
    let (absolute, letters) = strip_anchor(s);
    CellAddress::letters_to_column(letters)
        .ok()
        .map(|col| (col, absolute))
}

/// 0-based row and anchor of a `$5` style label
fn row_label(s: &str) -> Option<(u32, bool)> {
    let (absolute, digits) = strip_anchor(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<u32>().ok()? {
        r if r == 0 || r > MAX_ROWS => None,
        r => Some((r - 1, absolute)),
    }
}

/// Row-major iterator over the cells of a [`CellRange`]
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u16,
    remaining: u64,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let addr = CellAddress::new(self.current_row, self.current_col);
        self.remaining -= 1;

        if self.current_col >= self.range.end.col {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        } else {
            self.current_col += 1;
        }

        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CellRangeIterator {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(CellAddress::column_to_letters(0), "A");
        assert_eq!(CellAddress::column_to_letters(25), "Z");
        assert_eq!(CellAddress::column_to_letters(26), "AA");
        assert_eq!(CellAddress::column_to_letters(701), "ZZ");
        assert_eq!(CellAddress::column_to_letters(16383), "XFD");

        assert_eq!(CellAddress::letters_to_column("A").unwrap(), 0);
        assert_eq!(CellAddress::letters_to_column("aa").unwrap(), 26);
        assert_eq!(CellAddress::letters_to_column("XFD").unwrap(), 16383);
        assert!(CellAddress::letters_to_column("XFE").is_err());
    }

    #[test]
    fn test_cell_address_parse() {
        let addr = CellAddress::parse("B2").unwrap();
        assert_eq!((addr.row, addr.col), (1, 1));
        assert!(!addr.row_absolute && !addr.col_absolute);

        let addr = CellAddress::parse("$A1").unwrap();
        assert!(addr.col_absolute);
        assert!(!addr.row_absolute);

        let addr = CellAddress::parse("A$1").unwrap();
        assert!(!addr.col_absolute);
        assert!(addr.row_absolute);

        let addr = CellAddress::parse("XFD1048576").unwrap();
        assert_eq!((addr.row, addr.col), (1_048_575, 16383));
    }

    #[test]
    fn test_cell_address_parse_errors() {
        assert!(CellAddress::parse("").is_err());
        assert!(CellAddress::parse("A").is_err());
        assert!(CellAddress::parse("1").is_err());
        assert!(CellAddress::parse("A0").is_err());
        assert!(CellAddress::parse("A1048577").is_err());
        assert!(CellAddress::parse("XFE1").is_err());
        assert!(CellAddress::parse("A1B").is_err());
    }

    #[test]
    fn test_offset_respects_anchors() {
        let addr = CellAddress::parse("A$1").unwrap();
        let moved = addr.offset(3, 2).unwrap();
        assert_eq!(moved.to_a1_string(), "C$1");

        let addr = CellAddress::parse("$A1").unwrap();
        assert_eq!(addr.offset(1, 5).unwrap().to_a1_string(), "$A2");

        assert!(CellAddress::new(0, 0).offset(-1, 0).is_none());
    }

    #[test]
    fn test_cell_range_normalizes() {
        let range = CellRange::parse("B3:A1").unwrap();
        assert_eq!(range.start.position(), (0, 0));
        assert_eq!(range.end.position(), (2, 1));
        assert_eq!(range.to_string(), "A1:B3");
    }

    #[test]
    fn test_cell_range_iterator_is_row_major() {
        let range = CellRange::parse("A1:B2").unwrap();
        let cells: Vec<String> = range.cells().map(|c| c.to_string()).collect();
        assert_eq!(cells, vec!["A1", "B1", "A2", "B2"]);
        assert_eq!(range.cells().len(), 4);
    }

    #[test]
    fn test_whole_column_and_row_ranges() {
        let columns = CellRange::parse("$C:A").unwrap();
        assert_eq!(columns.start.position(), (0, 0));
        assert_eq!(columns.end.position(), (1_048_575, 2));
        assert_eq!(columns.cell_count(), 3 * 1_048_576);
        assert_eq!(columns.to_string(), "A:$C");

        let rows = CellRange::parse("2:$5").unwrap();
        assert_eq!(rows.start.position(), (1, 0));
        assert_eq!(rows.end.position(), (4, 16_383));
        assert_eq!(rows.to_string(), "2:$5");

        // anchored rows keep a whole column whole when shifted
        assert_eq!(columns.offset(3, 1).unwrap().to_string(), "B:$C");
        assert!(CellRange::parse("A:1").is_err());
        assert!(CellRange::parse("0:3").is_err());
        assert!(CellRange::parse("A:XFE").is_err());
        assert_eq!(CellRange::parse("A1:B2").unwrap().line_label(), None);
    }

    #[test]
    fn test_cell_range_contains() {
        let range = CellRange::parse("B2:D4").unwrap();
        assert!(range.contains(&CellAddress::new(2, 2)));
        assert!(!range.contains(&CellAddress::new(0, 0)));
        assert!(!range.contains(&CellAddress::new(4, 1)));
    }
}
