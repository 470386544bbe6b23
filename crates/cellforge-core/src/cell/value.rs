//! Cell value types

use std::fmt;

/// The content of a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No value
    #[default]
    Empty,

    /// TRUE / FALSE
    Boolean(bool),

    /// Numeric value (dates are serial numbers)
    Number(f64),

    /// Text value
    Text(String),

    /// Error value (#VALUE!, #REF!, ...)
    Error(CellError),

    /// Formula with its last computed value
    Formula {
        /// Formula text, always with a leading `=`
        text: String,
        /// Result of the last evaluation pass (or the value cached in the file)
        cached: Option<Box<CellValue>>,
    },
}

impl CellValue {
    /// Create a text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Create a formula value without a computed result
    pub fn formula<S: Into<String>>(text: S) -> Self {
        CellValue::Formula {
            text: text.into(),
            cached: None,
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the cell contains a formula
    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula { .. })
    }

    /// Check if the effective value is an error
    pub fn is_error(&self) -> bool {
        matches!(self.effective_value(), CellValue::Error(_))
    }

    /// Numeric view of the effective value (booleans count as 1/0)
    pub fn as_number(&self) -> Option<f64> {
        match self.effective_value() {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Text view of the effective value
    pub fn as_text(&self) -> Option<&str> {
        match self.effective_value() {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Formula text if this is a formula cell
    pub fn formula_text(&self) -> Option<&str> {
        match self {
            CellValue::Formula { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Computed value for formulas (Empty if never computed), the value itself otherwise
    pub fn effective_value(&self) -> &CellValue {
        match self {
            CellValue::Formula {
                cached: Some(v), ..
            } => v.effective_value(),
            CellValue::Formula { cached: None, .. } => &CellValue::Empty,
            _ => self,
        }
    }
}

/// Render a number the way a spreadsheet displays it in a general cell:
/// integers without a fractional part, everything else with up to 15
/// significant digits.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return CellError::Num.to_string();
    }
    if n == n.trunc() && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let s = format!("{}", n);
    if s.len() <= 17 {
        return s;
    }
    let rounded = format!("{:.*e}", 14, n);
    rounded
        .parse::<f64>()
        .map(|r| r.to_string())
        .unwrap_or(s)
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Error(e) => write!(f, "{}", e),
            CellValue::Formula {
                cached: Some(v), ..
            } => write!(f, "{}", v),
            CellValue::Formula { text, .. } => write!(f, "{}", text),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

/// Spreadsheet error values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellError {
    /// #NULL! - empty intersection
    Null,
    /// #DIV/0! - division by zero
    Div0,
    /// #VALUE! - wrong type of argument or operand
    Value,
    /// #REF! - invalid reference (also used for unresolved cycles)
    Ref,
    /// #NAME? - unknown function or name
    Name,
    /// #NUM! - invalid numeric result
    Num,
    /// #N/A - value not available
    Na,
}

impl CellError {
    /// All error values, in display order
    pub const ALL: [CellError; 7] = [
        CellError::Null,
        CellError::Div0,
        CellError::Value,
        CellError::Ref,
        CellError::Name,
        CellError::Num,
        CellError::Na,
    ];

    /// Display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Na => "#N/A",
        }
    }

    /// Parse an error string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|e| e.as_str() == upper)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_conversions() {
        assert_eq!(CellValue::from(42), CellValue::Number(42.0));
        assert_eq!(CellValue::from(true), CellValue::Boolean(true));
        assert_eq!(CellValue::from("hello").as_text(), Some("hello"));
    }

    #[test]
    fn test_effective_value_of_formula() {
        let pending = CellValue::formula("=1+1");
        assert_eq!(pending.effective_value(), &CellValue::Empty);

        let computed = CellValue::Formula {
            text: "=1+1".into(),
            cached: Some(Box::new(CellValue::Number(2.0))),
        };
        assert_eq!(computed.as_number(), Some(2.0));
        assert_eq!(computed.formula_text(), Some("=1+1"));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(-0.5).to_string(), "-0.5");
        assert_eq!(CellValue::Number(0.1 + 0.2).to_string(), "0.3");
        assert_eq!(CellValue::Boolean(false).to_string(), "FALSE");
    }

    #[test]
    fn test_cell_error_parse() {
        assert_eq!(CellError::parse("#DIV/0!"), Some(CellError::Div0));
        assert_eq!(CellError::parse("#n/a"), Some(CellError::Na));
        assert_eq!(CellError::parse("#name?"), Some(CellError::Name));
        assert_eq!(CellError::parse("oops"), None);
        assert_eq!(CellError::Ref.to_string(), "#REF!");
    }
}
