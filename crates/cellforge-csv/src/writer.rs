//! CSV writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::CsvResult;
use crate::options::{CsvWriteOptions, LineTerminator};
use cellforge_core::Worksheet;

/// CSV file writer
pub struct CsvWriter;

impl CsvWriter {
    fn builder<W: Write>(writer: W, options: &CsvWriteOptions) -> csv::Writer<W> {
        let terminator = match options.line_terminator {
            LineTerminator::LF => csv::Terminator::Any(b'\n'),
            LineTerminator::CRLF => csv::Terminator::CRLF,
        };

        csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(terminator)
            .flexible(false)
            .from_writer(writer)
    }

    /// Write a header and rows to a CSV file
    pub fn write_table_file<P, R, S>(
        path: P,
        header: &[&str],
        rows: R,
        options: &CsvWriteOptions,
    ) -> CsvResult<()>
    where
        P: AsRef<Path>,
        R: IntoIterator<Item = Vec<S>>,
        S: AsRef<[u8]>,
    {
        let file = File::create(path)?;
        Self::write_table(file, header, rows, options)
    }

    /// Write a header and rows; every row must have as many fields as the header
    pub fn write_table<W, R, S>(
        writer: W,
        header: &[&str],
        rows: R,
        options: &CsvWriteOptions,
    ) -> CsvResult<()>
    where
        W: Write,
        R: IntoIterator<Item = Vec<S>>,
        S: AsRef<[u8]>,
    {
        let mut csv_writer = Self::builder(writer, options);
        csv_writer.write_record(header)?;
        for row in rows {
            csv_writer.write_record(&row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the computed values of a worksheet's used range to a CSV file
    pub fn write_values_file<P: AsRef<Path>>(
        worksheet: &Worksheet,
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let file = File::create(path)?;
        Self::write_values(worksheet, file, options)
    }

    /// Write the computed values of a worksheet's used range
    ///
    /// Formula cells contribute their last computed value. The grid starts
    /// at the used range's top-left cell.
    pub fn write_values<W: Write>(
        worksheet: &Worksheet,
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let mut csv_writer = Self::builder(writer, options);

        if let Some(range) = worksheet.used_range() {
            for row in range.start.row..=range.end.row {
                let record: Vec<String> = (range.start.col..=range.end.col)
                    .map(|col| worksheet.get_calculated_value_at(row, col).to_string())
                    .collect();
                csv_writer.write_record(&record)?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::CellValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_table_quotes_fields() {
        let mut out = Vec::new();
        let rows = vec![
            vec!["A1".to_string(), "=SUM(B1,C1)".to_string()],
            vec!["A2".to_string(), "say \"hi\"".to_string()],
        ];
        CsvWriter::write_table(&mut out, &["Cell", "Formula"], rows, &CsvWriteOptions::default())
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Cell,Formula\nA1,\"=SUM(B1,C1)\"\nA2,\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn test_write_values_uses_computed_results() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_cell_value("B2", 1.5).unwrap();
        sheet.set_cell_formula("C2", "=B2*2").unwrap();
        sheet.set_formula_result(1, 2, CellValue::Number(3.0)).unwrap();
        sheet.set_cell_value("B3", "x").unwrap();

        let mut out = Vec::new();
        let options = CsvWriteOptions {
            delimiter: b';',
            line_terminator: LineTerminator::CRLF,
            ..Default::default()
        };
        CsvWriter::write_values(&sheet, &mut out, &options).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "1.5;3\r\nx;\r\n");
    }

    #[test]
    fn test_write_values_of_empty_sheet() {
        let mut out = Vec::new();
        CsvWriter::write_values(&Worksheet::new("Empty"), &mut out, &CsvWriteOptions::default())
            .unwrap();
        assert!(out.is_empty());
    }
}
