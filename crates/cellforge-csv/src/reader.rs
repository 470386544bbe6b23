//! CSV reader

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::options::CsvReadOptions;
use cellforge_core::{CellError, CellValue, Worksheet, MAX_COLS, MAX_SHEET_NAME_LEN};

/// CSV file reader
pub struct CsvReader;

impl CsvReader {
    /// Read a CSV file into a worksheet named after the file stem
    pub fn read_file<P: AsRef<Path>>(path: P, options: &CsvReadOptions) -> CsvResult<Worksheet> {
        let path = path.as_ref();
        let name = sheet_name_for(path);
        let file = File::open(path)?;
        let worksheet = Self::read_named(file, &name, options)?;
        log::info!(
            "read {} as sheet '{}' ({} cells)",
            path.display(),
            name,
            worksheet.cell_count()
        );
        Ok(worksheet)
    }

    /// Read CSV from a reader into a worksheet named `Sheet1`
    pub fn read<R: Read>(reader: R, options: &CsvReadOptions) -> CsvResult<Worksheet> {
        Self::read_named(reader, "Sheet1", options)
    }

    fn read_named<R: Read>(reader: R, name: &str, options: &CsvReadOptions) -> CsvResult<Worksheet> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut worksheet = Worksheet::new(name);

        for (row_idx, result) in csv_reader.records().enumerate() {
            let record = result?;
            let row = u32::try_from(row_idx).map_err(|_| CsvError::Parse {
                row: row_idx + 1,
                column: 1,
                message: "too many rows".into(),
            })?;

            for (col_idx, field) in record.iter().enumerate() {
                let col = u16::try_from(col_idx)
                    .ok()
                    .filter(|c| *c < MAX_COLS)
                    .ok_or_else(|| CsvError::Parse {
                        row: row_idx + 1,
                        column: col_idx + 1,
                        message: format!("more than {} columns", MAX_COLS),
                    })?;

                let header = options.has_header && row_idx == 0;
                if !header && field.len() > 1 && field.starts_with('=') {
                    worksheet.set_cell_formula_at(row, col, field)?;
                    continue;
                }

                let value = if header || !options.auto_detect_types {
                    text_value(field)
                } else {
                    Self::detect_type(field)
                };
                worksheet.set_cell_value_at(row, col, value)?;
            }
        }

        Ok(worksheet)
    }

    /// Detect the type of a field value
    fn detect_type(field: &str) -> CellValue {
        let trimmed = field.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if trimmed.eq_ignore_ascii_case("TRUE") {
            return CellValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("FALSE") {
            return CellValue::Boolean(false);
        }

        if trimmed.starts_with('#') {
            if let Some(error) = CellError::parse(trimmed) {
                return CellValue::Error(error);
            }
        }

        // `inf` and `NaN` parse as f64 but are words in a sheet
        if trimmed.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.')) {
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() {
                    return CellValue::Number(n);
                }
            }
        }

        CellValue::Text(field.to_string())
    }
}

fn text_value(field: &str) -> CellValue {
    if field.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(field.to_string())
    }
}

/// Sheet name for a CSV file: its stem with characters sheet names cannot
/// hold replaced by `_`, cut to the sheet name limit
fn sheet_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name: String = stem
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(MAX_SHEET_NAME_LEN)
        .collect();
    let name = name.trim_matches('\'').to_string();
    if name.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read_str(data: &str, options: &CsvReadOptions) -> Worksheet {
        CsvReader::read(data.as_bytes(), options).unwrap()
    }

    #[test]
    fn test_detect_type() {
        assert_eq!(CsvReader::detect_type("42"), CellValue::Number(42.0));
        assert_eq!(CsvReader::detect_type(" -1.5e2 "), CellValue::Number(-150.0));
        assert_eq!(CsvReader::detect_type("true"), CellValue::Boolean(true));
        assert_eq!(CsvReader::detect_type("FALSE"), CellValue::Boolean(false));
        assert_eq!(CsvReader::detect_type("#DIV/0!"), CellValue::Error(CellError::Div0));
        assert_eq!(CsvReader::detect_type("#hashtag"), CellValue::Text("#hashtag".into()));
        assert_eq!(CsvReader::detect_type("inf"), CellValue::Text("inf".into()));
        assert_eq!(CsvReader::detect_type("1"), CellValue::Number(1.0));
        assert_eq!(CsvReader::detect_type("  "), CellValue::Empty);
    }

    #[test]
    fn test_formulas_and_values() {
        let sheet = read_str("10,20,=A1+B1\nabc,,=\n", &CsvReadOptions::default());

        assert_eq!(sheet.name(), "Sheet1");
        assert_eq!(sheet.get_value("A1").unwrap(), CellValue::Number(10.0));
        assert_eq!(sheet.get_formula_at(0, 2), Some("=A1+B1"));
        assert_eq!(sheet.get_value("A2").unwrap(), CellValue::Text("abc".into()));
        assert_eq!(sheet.get_value("B2").unwrap(), CellValue::Empty);
        // a lone `=` is text
        assert_eq!(sheet.get_value("C2").unwrap(), CellValue::Text("=".into()));
    }

    #[test]
    fn test_header_row_stays_text() {
        let options = CsvReadOptions {
            has_header: true,
            ..Default::default()
        };
        let sheet = read_str("2024,TRUE\n1,2\n", &options);
        assert_eq!(sheet.get_value("A1").unwrap(), CellValue::Text("2024".into()));
        assert_eq!(sheet.get_value("B1").unwrap(), CellValue::Text("TRUE".into()));
        assert_eq!(sheet.get_value("A2").unwrap(), CellValue::Number(1.0));
    }

    #[test]
    fn test_without_type_detection() {
        let options = CsvReadOptions {
            auto_detect_types: false,
            delimiter: b';',
            ..Default::default()
        };
        let sheet = read_str("1;x;=A1*2\n", &options);
        assert_eq!(sheet.get_value("A1").unwrap(), CellValue::Text("1".into()));
        assert_eq!(sheet.get_formula_at(0, 2), Some("=A1*2"));
    }

    #[test]
    fn test_ragged_rows() {
        let sheet = read_str("1\n1,2,3\n", &CsvReadOptions::default());
        assert_eq!(sheet.get_value("C2").unwrap(), CellValue::Number(3.0));
    }

    #[test]
    fn test_sheet_name_for() {
        assert_eq!(sheet_name_for(Path::new("/data/budget.csv")), "budget");
        assert_eq!(sheet_name_for(Path::new("q1[draft]?.csv")), "q1_draft__");
        assert_eq!(
            sheet_name_for(Path::new("a-very-long-file-name-for-a-sheet-title.csv")),
            "a-very-long-file-name-for-a-she"
        );
        assert_eq!(sheet_name_for(Path::new(".csv")), ".csv");
    }
}
