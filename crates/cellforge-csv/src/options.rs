//! Reader and writer settings

/// How a CSV file is turned into a sheet
#[derive(Debug, Clone)]
pub struct CsvReadOptions {
    pub delimiter: u8,
    pub quote: u8,
    /// First record holds column titles; they stay in row 1 as plain text
    /// even when they look like numbers or formulas
    pub has_header: bool,
    /// Recognise numbers, TRUE/FALSE and `#DIV/0!`-style errors. When off
    /// every non-formula field is text.
    pub auto_detect_types: bool,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: false,
            auto_detect_types: true,
        }
    }
}

/// How tables and value grids are written
#[derive(Debug, Clone)]
pub struct CsvWriteOptions {
    pub delimiter: u8,
    pub quote: u8,
    pub line_terminator: LineTerminator,
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            line_terminator: LineTerminator::LF,
        }
    }
}

/// Record separator for written files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineTerminator {
    #[default]
    LF,
    CRLF,
}
