//! Reading XLSX packages built in memory.

mod common;

use std::io::Cursor;

use cellforge_core::{CellError, CellValue, NameScope, Workbook};
use cellforge_xlsx::{XlsxError, XlsxReader};
use common::XlsxFixture;
use pretty_assertions::assert_eq;

fn read(fixture: &XlsxFixture) -> Workbook {
    XlsxReader::read(Cursor::new(fixture.build())).unwrap()
}

fn calculated(workbook: &Workbook, sheet: usize, address: &str) -> CellValue {
    let addr = cellforge_core::CellAddress::parse(address).unwrap();
    workbook
        .worksheet(sheet)
        .unwrap()
        .get_calculated_value_at(addr.row, addr.col)
}

fn formula(workbook: &Workbook, sheet: usize, address: &str) -> Option<String> {
    let addr = cellforge_core::CellAddress::parse(address).unwrap();
    workbook
        .worksheet(sheet)
        .unwrap()
        .get_formula_at(addr.row, addr.col)
        .map(str::to_string)
}

#[test]
fn reads_typed_cell_values() {
    let fixture = XlsxFixture::new()
        .shared_string("<t>apple</t>")
        .shared_string(r#"<t xml:space="preserve"> padded </t>"#)
        .sheet(
            "Data",
            r#"<row r="1">
                 <c r="A1"><v>42</v></c>
                 <c r="B1" t="s"><v>0</v></c>
                 <c r="C1" t="b"><v>1</v></c>
                 <c r="D1" t="e"><v>#N/A</v></c>
                 <c r="E1" t="inlineStr"><is><t>inline_x000a_text</t></is></c>
                 <c r="F1" t="s"><v>1</v></c>
               </row>"#,
        );
    let wb = read(&fixture);

    assert_eq!(wb.sheet_names(), vec!["Data"]);
    assert_eq!(calculated(&wb, 0, "A1"), CellValue::Number(42.0));
    assert_eq!(calculated(&wb, 0, "B1"), CellValue::Text("apple".into()));
    assert_eq!(calculated(&wb, 0, "C1"), CellValue::Boolean(true));
    assert_eq!(calculated(&wb, 0, "D1"), CellValue::Error(CellError::Na));
    assert_eq!(calculated(&wb, 0, "E1"), CellValue::Text("inline\ntext".into()));
    assert_eq!(calculated(&wb, 0, "F1"), CellValue::Text(" padded ".into()));
}

#[test]
fn rich_text_runs_are_joined() {
    let fixture = XlsxFixture::new()
        .shared_string("<r><t>Hello </t></r><r><rPr><b/></rPr><t>World</t></r>")
        .sheet("Sheet1", r#"<row r="1"><c r="A1" t="s"><v>0</v></c></row>"#);
    let wb = read(&fixture);

    assert_eq!(calculated(&wb, 0, "A1"), CellValue::Text("Hello World".into()));
}

#[test]
fn formulas_keep_their_cached_values() {
    let fixture = XlsxFixture::new().sheet(
        "Sheet1",
        r#"<row r="1">
             <c r="A1"><v>2</v></c>
             <c r="B1"><f>A1*3</f><v>6</v></c>
             <c r="C1" t="str"><f>"x"&amp;A1</f><v>x2</v></c>
             <c r="D1"><f>SUM(A1:B1)</f></c>
           </row>"#,
    );
    let wb = read(&fixture);

    assert_eq!(formula(&wb, 0, "B1").as_deref(), Some("=A1*3"));
    assert_eq!(calculated(&wb, 0, "B1"), CellValue::Number(6.0));
    assert_eq!(formula(&wb, 0, "C1").as_deref(), Some("=\"x\"&A1"));
    assert_eq!(calculated(&wb, 0, "C1"), CellValue::Text("x2".into()));
    assert_eq!(formula(&wb, 0, "D1").as_deref(), Some("=SUM(A1:B1)"));
    assert_eq!(calculated(&wb, 0, "D1"), CellValue::Empty);
    assert_eq!(wb.formula_count(), 3);
}

#[test]
fn shared_formulas_are_expanded() {
    let fixture = XlsxFixture::new().sheet(
        "Sheet1",
        r#"<row r="1"><c r="A1"><v>1</v></c><c r="B1"><f t="shared" ref="B1:B3" si="0">A1*2</f><v>2</v></c></row>
           <row r="2"><c r="A2"><v>2</v></c><c r="B2"><f t="shared" si="0"/><v>4</v></c></row>
           <row r="3"><c r="A3"><v>3</v></c><c r="B3"><f t="shared" si="0"/><v>6</v></c></row>
           <row r="4"><c r="C4"><f t="shared" ref="C4:D4" si="1">SUM($A$1:A3)</f></c><c r="D4"><f t="shared" si="1"/></c></row>"#,
    );
    let wb = read(&fixture);

    assert_eq!(formula(&wb, 0, "B1").as_deref(), Some("=A1*2"));
    assert_eq!(formula(&wb, 0, "B2").as_deref(), Some("=A2*2"));
    assert_eq!(formula(&wb, 0, "B3").as_deref(), Some("=A3*2"));
    assert_eq!(calculated(&wb, 0, "B3"), CellValue::Number(6.0));
    assert_eq!(formula(&wb, 0, "D4").as_deref(), Some("=SUM($A$1:B3)"));
}

#[test]
fn cells_without_references_follow_their_neighbours() {
    let fixture = XlsxFixture::new().sheet(
        "Sheet1",
        r#"<row r="3"><c><v>1</v></c><c s="1"/><c><v>3</v></c></row>"#,
    );
    let wb = read(&fixture);

    assert_eq!(calculated(&wb, 0, "A3"), CellValue::Number(1.0));
    assert_eq!(calculated(&wb, 0, "B3"), CellValue::Empty);
    assert_eq!(calculated(&wb, 0, "C3"), CellValue::Number(3.0));
}

#[test]
fn defined_names_and_scopes() {
    let fixture = XlsxFixture::new()
        .sheet("Inputs", r#"<row r="1"><c r="A1"><v>0.2</v></c></row>"#)
        .sheet("Calc", "")
        .defined_name(r#"<definedName name="Rate">Inputs!$A$1</definedName>"#)
        .defined_name(r#"<definedName name="Local" localSheetId="1">Calc!$B$2</definedName>"#)
        .defined_name(
            r#"<definedName name="_xlnm.Print_Area" localSheetId="0">Inputs!$A$1:$C$9</definedName>"#,
        );
    let wb = read(&fixture);

    assert_eq!(wb.named_ranges().len(), 2);
    let rate = wb.get_named_range("RATE", 1).unwrap();
    assert_eq!(rate.refers_to, "Inputs!$A$1");
    assert_eq!(rate.scope, NameScope::Workbook);
    assert_eq!(wb.get_named_range("Local", 1).unwrap().scope, NameScope::Sheet(1));
    assert!(wb.get_named_range("Local", 0).is_none());
}

#[test]
fn date_system_is_read() {
    let wb = read(&XlsxFixture::new().sheet("Sheet1", ""));
    assert!(!wb.settings().date_1904);

    let wb = read(&XlsxFixture::new().date_1904().sheet("Sheet1", ""));
    assert!(wb.settings().date_1904);
}

#[test]
fn read_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");
    let fixture = XlsxFixture::new().sheet("Sheet1", r#"<row r="1"><c r="A1"><v>7</v></c></row>"#);
    std::fs::write(&path, fixture.build()).unwrap();

    let wb = XlsxReader::read_file(&path).unwrap();
    assert_eq!(calculated(&wb, 0, "A1"), CellValue::Number(7.0));

    let missing = XlsxReader::read_file(dir.path().join("nope.xlsx")).unwrap_err();
    assert!(matches!(missing, XlsxError::Io(_)));
}

#[test]
fn workbook_without_sheets_is_invalid() {
    let err = XlsxReader::read(Cursor::new(XlsxFixture::new().build())).unwrap_err();
    assert!(matches!(err, XlsxError::InvalidFormat(_)));
}
