//! In-memory XLSX packages for reader tests.

use std::io::{Cursor, Write};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

/// Builder for a minimal XLSX package
#[derive(Default)]
pub struct XlsxFixture {
    sheets: Vec<(String, String)>,
    shared_strings: Vec<String>,
    defined_names: Vec<String>,
    date_1904: bool,
}

impl XlsxFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet whose `<sheetData>` holds `rows_xml`
    pub fn sheet(mut self, name: &str, rows_xml: &str) -> Self {
        self.sheets.push((name.to_string(), rows_xml.to_string()));
        self
    }

    /// Add a raw `<si>` body to the shared string table
    pub fn shared_string(mut self, si_xml: &str) -> Self {
        self.shared_strings.push(si_xml.to_string());
        self
    }

    /// Add a raw `<definedName>` element
    pub fn defined_name(mut self, xml: &str) -> Self {
        self.defined_names.push(xml.to_string());
        self
    }

    pub fn date_1904(mut self) -> Self {
        self.date_1904 = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = zip::write::SimpleFileOptions::default();

            let mut add = |name: &str, body: &str| {
                zip.start_file(name, options).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            };

            add("[Content_Types].xml", CONTENT_TYPES);
            add("_rels/.rels", ROOT_RELS);
            add("xl/workbook.xml", &self.workbook_xml());
            add("xl/_rels/workbook.xml.rels", &self.workbook_rels());
            if !self.shared_strings.is_empty() {
                add("xl/sharedStrings.xml", &self.shared_strings_xml());
            }
            for (i, (_, rows)) in self.sheets.iter().enumerate() {
                add(
                    &format!("xl/worksheets/sheet{}.xml", i + 1),
                    &format!(
                        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
                        rows
                    ),
                );
            }

            zip.finish().unwrap();
        }
        buf
    }

    fn workbook_xml(&self) -> String {
        let sheets: String = self
            .sheets
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                format!(
                    r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                    name,
                    i + 1,
                    i + 1
                )
            })
            .collect();
        let names = if self.defined_names.is_empty() {
            String::new()
        } else {
            format!("<definedNames>{}</definedNames>", self.defined_names.concat())
        };
        let workbook_pr = if self.date_1904 {
            r#"<workbookPr date1904="1"/>"#
        } else {
            "<workbookPr/>"
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{}<sheets>{}</sheets>{}</workbook>"#,
            workbook_pr, sheets, names
        )
    }

    fn workbook_rels(&self) -> String {
        let rels: String = (1..=self.sheets.len())
            .map(|i| {
                format!(
                    r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                    i, i
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            rels
        )
    }

    fn shared_strings_xml(&self) -> String {
        let items: String = self
            .shared_strings
            .iter()
            .map(|si| format!("<si>{}</si>", si))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{1}</sst>"#,
            self.shared_strings.len(),
            items
        )
    }
}
