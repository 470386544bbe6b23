//! XLSX reader

mod shared;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use cellforge_core::{CellAddress, CellError, CellValue, NameScope, Workbook, Worksheet};
use shared::SharedFormulas;

/// Decode the `_xHHHH_` escapes Excel writes for control characters
///
/// `_x000d_` is CR, `_x000a_` LF, `_x0009_` tab and `_x005f_` a literal
/// underscore. Anything that is not a complete escape is kept as written.
fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("_x") {
        result.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(c) => {
                result.push(c);
                rest = &candidate[7..];
            }
            None => {
                result.push('_');
                rest = &candidate[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// Value of attribute `name`, unescaped
fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn is_true(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Sheet entry of `xl/workbook.xml`
struct SheetEntry {
    name: String,
    r_id: String,
}

/// `<definedName>` of `xl/workbook.xml`
struct DefinedName {
    name: String,
    local_sheet: Option<usize>,
    refers_to: String,
}

/// What `xl/workbook.xml` says about the workbook
#[derive(Default)]
struct WorkbookPart {
    sheets: Vec<SheetEntry>,
    defined_names: Vec<DefinedName>,
    date_1904: bool,
}

/// `<f>` element of the cell being read
#[derive(Default)]
struct FormulaElement {
    text: String,
    shared_index: Option<u32>,
    is_shared: bool,
}

/// Cell being read
struct PendingCell {
    address: CellAddress,
    cell_type: Option<String>,
    value: Option<String>,
    formula: Option<FormulaElement>,
}

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Workbook> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a workbook from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Workbook> {
        let mut archive = zip::ZipArchive::new(reader)?;

        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let shared_strings = Self::read_shared_strings(&mut archive)?;
        let workbook_part = Self::read_workbook_xml(&mut archive)?;
        let sheet_paths = Self::read_workbook_rels(&mut archive)?;

        let mut workbook = Workbook::empty();
        workbook.settings_mut().date_1904 = workbook_part.date_1904;

        for entry in &workbook_part.sheets {
            let Some(path) = sheet_paths.get(&entry.r_id) else {
                log::warn!(
                    "sheet '{}' has no worksheet part ({}); skipped",
                    entry.name,
                    entry.r_id
                );
                continue;
            };
            let mut worksheet = Worksheet::new(entry.name.as_str());
            Self::read_worksheet(&mut archive, path, &mut worksheet, &shared_strings)?;
            log::debug!(
                "read sheet '{}': {} cells, {} formulas",
                entry.name,
                worksheet.cell_count(),
                worksheet.formula_count()
            );
            workbook.add_existing_worksheet(worksheet)?;
        }

        if workbook.sheet_count() == 0 {
            return Err(XlsxError::InvalidFormat("workbook has no sheets".into()));
        }

        for defined in workbook_part.defined_names {
            let scope = match defined.local_sheet {
                Some(index) if index < workbook.sheet_count() => NameScope::Sheet(index),
                Some(index) => {
                    log::warn!(
                        "defined name '{}' is scoped to missing sheet {}; skipped",
                        defined.name,
                        index
                    );
                    continue;
                }
                None => NameScope::Workbook,
            };
            if let Err(e) =
                workbook.define_name_with_scope(&defined.name, &defined.refers_to, scope)
            {
                log::warn!("defined name '{}' skipped: {}", defined.name, e);
            }
        }

        Ok(workbook)
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        // `<t xml:space="preserve">` keeps its spaces
        xml_reader.trim_text(false);

        let mut buf = Vec::new();
        let mut current = String::new();
        let mut in_si = false;
        let mut in_t = false;
        // phonetic runs repeat the text as a reading guide
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => strings.push(String::new()),
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current));
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    if let Ok(text) = e.unescape() {
                        current.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read `xl/workbook.xml`: sheets, defined names and the date system
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<WorkbookPart> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut part = WorkbookPart::default();
        let mut pending_name: Option<DefinedName> = None;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"sheet" => {
                        if let (Some(name), Some(r_id)) =
                            (attribute(&e, b"name"), attribute(&e, b"r:id"))
                        {
                            part.sheets.push(SheetEntry { name, r_id });
                        }
                    }
                    b"workbookPr" => {
                        part.date_1904 = attribute(&e, b"date1904").is_some_and(|v| is_true(&v));
                    }
                    b"definedName" => {
                        pending_name = attribute(&e, b"name").map(|name| DefinedName {
                            name,
                            local_sheet: attribute(&e, b"localSheetId")
                                .and_then(|v| v.parse().ok()),
                            refers_to: String::new(),
                        });
                    }
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(defined) = pending_name.as_mut() {
                        if let Ok(text) = e.unescape() {
                            defined.refers_to.push_str(&text);
                        }
                    }
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"definedName" => {
                    if let Some(defined) = pending_name.take() {
                        if defined.name.starts_with("_xlnm.") {
                            log::debug!("skipping built-in name {}", defined.name);
                        } else if defined.refers_to.is_empty() {
                            log::warn!("defined name '{}' has no definition", defined.name);
                        } else {
                            part.defined_names.push(defined);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(part)
    }

    /// Read workbook.xml.rels to get sheet file paths
    fn read_workbook_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<HashMap<String, String>> {
        let file = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let id = attribute(&e, b"Id");
                    let target = attribute(&e, b"Target");
                    let rel_type = attribute(&e, b"Type");

                    // Only worksheet relationships
                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/worksheet") {
                            // Target is relative to xl/ unless absolute
                            let full_path = match target.strip_prefix('/') {
                                Some(absolute) => absolute.to_string(),
                                None => format!("xl/{}", target),
                            };
                            rels.insert(id, full_path);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Read a worksheet part into `worksheet`
    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        worksheet: &mut Worksheet,
        shared_strings: &[String],
    ) -> XlsxResult<()> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(false);

        let mut buf = Vec::new();
        let mut shared_formulas = SharedFormulas::default();

        // Position of the last cell, for cells written without `r`
        let mut row: u32 = 0;
        let mut next_col: u16 = 0;

        let mut cell: Option<PendingCell> = None;
        let mut in_value = false;
        let mut in_formula = false;
        let mut in_inline_text = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"row" => {
                        if let Some(r) = attribute(&e, b"r").and_then(|v| v.parse::<u32>().ok()) {
                            row = r.saturating_sub(1);
                        }
                        next_col = 0;
                    }
                    b"c" => {
                        let address = Self::cell_address(&e, row, next_col)?;
                        row = address.row;
                        next_col = address.col.saturating_add(1);
                        cell = Some(PendingCell {
                            address,
                            cell_type: attribute(&e, b"t"),
                            value: None,
                            formula: None,
                        });
                    }
                    b"v" if cell.is_some() => in_value = true,
                    b"f" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.formula = Some(Self::formula_element(&e));
                            in_formula = true;
                        }
                    }
                    b"t" if cell.is_some() => in_inline_text = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"c" => {
                        // style-only cell; it still advances the column
                        let address = Self::cell_address(&e, row, next_col)?;
                        row = address.row;
                        next_col = address.col.saturating_add(1);
                    }
                    b"f" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.formula = Some(Self::formula_element(&e));
                        }
                    }
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(pending) = cell.as_mut() {
                        let text = e.unescape().map_err(XlsxError::Xml)?;
                        if in_formula {
                            if let Some(formula) = pending.formula.as_mut() {
                                formula.text.push_str(&text);
                            }
                        } else if in_value || in_inline_text {
                            pending
                                .value
                                .get_or_insert_with(String::new)
                                .push_str(&text);
                        }
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"c" => {
                        if let Some(pending) = cell.take() {
                            Self::process_cell(
                                worksheet,
                                pending,
                                shared_strings,
                                &mut shared_formulas,
                            )?;
                        }
                    }
                    b"v" => in_value = false,
                    b"f" => in_formula = false,
                    b"t" => in_inline_text = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }

    /// Address of a `<c>` element; without `r` it follows the previous cell
    fn cell_address(e: &BytesStart, row: u32, next_col: u16) -> XlsxResult<CellAddress> {
        match attribute(e, b"r") {
            Some(r) => CellAddress::parse(&r)
                .map_err(|err| XlsxError::Parse(format!("Invalid cell reference '{}': {}", r, err))),
            None => Ok(CellAddress::new(row, next_col)),
        }
    }

    fn formula_element(e: &BytesStart) -> FormulaElement {
        FormulaElement {
            text: String::new(),
            shared_index: attribute(e, b"si").and_then(|v| v.parse().ok()),
            is_shared: attribute(e, b"t").as_deref() == Some("shared"),
        }
    }

    /// Store a finished cell in the worksheet
    fn process_cell(
        worksheet: &mut Worksheet,
        cell: PendingCell,
        shared_strings: &[String],
        shared_formulas: &mut SharedFormulas,
    ) -> XlsxResult<()> {
        let address = cell.address;
        let cell_type = cell.cell_type.as_deref();
        let value = match cell.value.as_deref() {
            Some(raw) => Self::typed_value(raw, cell_type, shared_strings)?,
            None => CellValue::Empty,
        };

        let Some(formula) = cell.formula else {
            return Ok(worksheet.set_cell_value_at(address.row, address.col, value)?);
        };

        let text = match (formula.is_shared, formula.shared_index) {
            (true, Some(si)) if formula.text.trim().is_empty() => {
                match shared_formulas.follower_text(si, address) {
                    Some(text) => text,
                    None => {
                        log::warn!(
                            "{}!{} refers to unknown shared formula {}; keeping its value",
                            worksheet.name(),
                            address,
                            si
                        );
                        return Ok(worksheet.set_cell_value_at(address.row, address.col, value)?);
                    }
                }
            }
            (true, Some(si)) => {
                shared_formulas.insert_anchor(si, address, &formula.text);
                formula.text
            }
            _ => formula.text,
        };

        let text = text.trim();
        if text.is_empty() {
            return Ok(worksheet.set_cell_value_at(address.row, address.col, value)?);
        }
        worksheet.set_cell_formula_with_cached(address.row, address.col, text, value)?;
        Ok(())
    }

    /// Interpret the text of `<v>` (or an inline string) by the cell type
    fn typed_value(
        raw: &str,
        cell_type: Option<&str>,
        shared_strings: &[String],
    ) -> XlsxResult<CellValue> {
        Ok(match cell_type {
            Some("s") => {
                let idx: usize = raw.trim().parse().map_err(|_| {
                    XlsxError::Parse(format!("Invalid shared string index: {}", raw))
                })?;
                let s = shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
                })?;
                CellValue::Text(s.clone())
            }
            Some("b") => CellValue::Boolean(is_true(raw.trim())),
            Some("e") => CellError::parse(raw)
                .map(CellValue::Error)
                .unwrap_or_else(|| CellValue::Text(raw.to_string())),
            Some("str") | Some("inlineStr") => CellValue::Text(decode_excel_escapes(raw)),
            None | Some("n") => match raw.trim().parse::<f64>() {
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::Text(raw.to_string()),
            },
            // ISO dates (`t="d"`) and anything unknown stay text
            Some(_) => CellValue::Text(raw.to_string()),
        })
    }
}
