//! Workbook type - the top-level document

use crate::error::{Error, Result};
use crate::named_range::{NameScope, NamedRange, NamedRangeCollection};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook: ordered worksheets, defined names and settings
#[derive(Debug, Clone)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
    settings: WorkbookSettings,
    named_ranges: NamedRangeCollection,
}

impl Workbook {
    /// Create a workbook with a single sheet named `Sheet1`
    pub fn new() -> Self {
        let mut wb = Self::empty();
        wb.worksheets.push(Worksheet::new("Sheet1"));
        wb
    }

    /// Create a workbook with no sheets (used by readers)
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            settings: WorkbookSettings::default(),
            named_ranges: NamedRangeCollection::new(),
        }
    }

    /// Number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Worksheet by name (case-insensitive)
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).and_then(|i| self.worksheets.get(i))
    }

    /// Index of a worksheet by name (case-insensitive, like Excel)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        let name_lower = name.to_lowercase();
        self.worksheets
            .iter()
            .position(|ws| ws.name().to_lowercase() == name_lower)
    }

    /// Names of all sheets, in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.worksheets.iter().map(Worksheet::name).collect()
    }

    /// Iterate over worksheets in workbook order
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a worksheet with the given name and return its index
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name)?;
        self.worksheets.push(Worksheet::new(name));
        Ok(self.worksheets.len() - 1)
    }

    /// Add a worksheet built elsewhere (e.g. by a reader)
    pub fn add_existing_worksheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name())?;
        self.worksheets.push(worksheet);
        Ok(self.worksheets.len() - 1)
    }

    /// Workbook settings
    pub fn settings(&self) -> &WorkbookSettings {
        &self.settings
    }

    /// Mutable workbook settings
    pub fn settings_mut(&mut self) -> &mut WorkbookSettings {
        &mut self.settings
    }

    /// Total number of formula cells across all sheets
    pub fn formula_count(&self) -> usize {
        self.worksheets.iter().map(Worksheet::formula_count).sum()
    }

    // ==================== Defined names ====================

    /// Define a workbook-scoped name
    ///
    /// # Example
    /// ```
    /// use cellforge_core::Workbook;
    ///
    /// let mut wb = Workbook::new();
    /// wb.define_name("TaxRate", "Sheet1!$B$1").unwrap();
    /// assert_eq!(wb.get_named_range("taxrate", 0).unwrap().refers_to, "Sheet1!$B$1");
    /// ```
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.define_name_with_scope(name, refers_to, NameScope::Workbook)
    }

    /// Define a name with an explicit scope
    pub fn define_name_with_scope(
        &mut self,
        name: &str,
        refers_to: &str,
        scope: NameScope,
    ) -> Result<()> {
        if !NamedRange::is_valid_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        if let NameScope::Sheet(index) = scope {
            if index >= self.worksheets.len() {
                return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
            }
        }
        self.named_ranges
            .define(NamedRange::new(name, refers_to, scope))
            .map_err(Error::InvalidName)
    }

    /// Resolve a name as seen from `current_sheet`
    pub fn get_named_range(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.named_ranges.get(name, current_sheet)
    }

    /// All defined names
    pub fn named_ranges(&self) -> &NamedRangeCollection {
        &self.named_ranges
    }

    /// Sheet names follow Excel's rules: 1 to 31 characters, none of
    /// `: \ / ? * [ ]`, unique ignoring case
    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        const FORBIDDEN: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];

        let len = name.chars().count();
        if len == 0 || len > MAX_SHEET_NAME_LEN || name.contains(FORBIDDEN) {
            return Err(Error::InvalidSheetName(name.into()));
        }
        if self.sheet_index(name).is_some() {
            return Err(Error::DuplicateSheetName(name.into()));
        }
        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Workbook-level settings that affect evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookSettings {
    /// Date system: false = 1900 (Windows), true = 1904 (Mac)
    pub date_1904: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_names(), vec!["Sheet1"]);
        assert!(!wb.settings().date_1904);
    }

    #[test]
    fn test_sheet_lookup_is_case_insensitive() {
        let mut wb = Workbook::new();
        let idx = wb.add_worksheet_with_name("Data").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(wb.sheet_index("DATA"), Some(1));
        assert!(wb.worksheet_by_name("missing").is_none());
    }

    #[test]
    fn test_invalid_sheet_names() {
        let mut wb = Workbook::new();
        assert!(wb.add_worksheet_with_name("").is_err());
        assert!(wb.add_worksheet_with_name("Sheet/1").is_err());
        assert!(wb.add_worksheet_with_name("Sheet[1]").is_err());
        assert!(wb.add_worksheet_with_name("sheet1").is_err());
        assert!(wb
            .add_worksheet_with_name(&"A".repeat(MAX_SHEET_NAME_LEN + 1))
            .is_err());
    }

    #[test]
    fn test_define_name_validation() {
        let mut wb = Workbook::new();
        assert!(wb.define_name("B2", "Sheet1!$A$1").is_err());
        assert!(wb
            .define_name_with_scope("Local", "1", NameScope::Sheet(4))
            .is_err());
        wb.define_name("Rate", "0.2").unwrap();
        assert_eq!(wb.named_ranges().len(), 1);
    }
}
