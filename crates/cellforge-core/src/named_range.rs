//! Defined names
//!
//! A defined name maps an identifier (e.g. `TaxRate`) to reference text
//! (e.g. `Sheet1!$B$1`) or a constant. Names are case-insensitive and may be
//! scoped to a single sheet, in which case they shadow a workbook-wide name.

use std::collections::BTreeMap;

/// Scope of a defined name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NameScope {
    /// Visible from every sheet
    Workbook,
    /// Visible only from the sheet with this index
    Sheet(usize),
}

/// A defined name
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    /// Name as written in the file
    pub name: String,
    /// Where the name is visible
    pub scope: NameScope,
    /// What the name stands for, without a leading `=`
    pub refers_to: String,
}

impl NamedRange {
    /// Create a defined name; a leading `=` on `refers_to` is dropped
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        let refers_to = refers_to.into();
        let refers_to = refers_to
            .strip_prefix('=')
            .map(str::to_string)
            .unwrap_or(refers_to);
        Self {
            name: name.into(),
            scope,
            refers_to,
        }
    }

    /// Check whether `name` is usable as a defined name
    ///
    /// Must start with a letter, `_` or `\`, contain only letters, digits,
    /// `_` and `.`, and must not look like a cell reference.
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        if !(first.is_alphabetic() || first == '_' || first == '\\') {
            return false;
        }
        if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return false;
        }
        let upper = name.to_ascii_uppercase();
        if upper == "TRUE" || upper == "FALSE" {
            return false;
        }
        crate::CellAddress::parse(name).is_err()
    }
}

/// Collection of defined names with case-insensitive, scope-aware lookup
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    names: BTreeMap<(String, NameScope), NamedRange>,
}

impl NamedRangeCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, scope: NameScope) -> (String, NameScope) {
        (name.to_lowercase(), scope)
    }

    /// Define a new name; fails if it already exists in the same scope
    pub fn define(&mut self, range: NamedRange) -> Result<(), String> {
        let key = Self::key(&range.name, range.scope);
        if self.names.contains_key(&key) {
            return Err(format!("'{}' is already defined in this scope", range.name));
        }
        self.names.insert(key, range);
        Ok(())
    }

    /// Look up a name as seen from `current_sheet`
    ///
    /// A name scoped to `current_sheet` wins over a workbook-scoped one.
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.names
            .get(&Self::key(name, NameScope::Sheet(current_sheet)))
            .or_else(|| self.names.get(&Self::key(name, NameScope::Workbook)))
    }

    /// Iterate over all names, ordered by lowercase name then scope
    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.names.values()
    }

    /// Number of defined names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no defined names
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
