//! Standalone Rust program generation
//!
//! The generated `main.rs` holds every cell of the workbook in a table,
//! recomputes the formulas in dependency order whenever an input changes,
//! and offers a small command prompt. It has no dependencies and builds with
//! `rustc -O main.rs`.
//!
//! Formulas that cannot be translated (volatile or unsupported functions,
//! array constants, ...) are *frozen*: the program keeps the value computed
//! at conversion time.

mod emit;
mod runtime;

use std::collections::{BTreeMap, BTreeSet};

use cellforge_core::{CellValue, Workbook};
use cellforge_formula::{CellKey, EvalStep};

use crate::calculation::{CalculationOptions, CircularMode};
use crate::graph::{cell_label, FormulaGraph};

pub use emit::{FreezeReason, TRANSLATABLE};
use emit::{const_literal, float_literal, value_literal, Translator};

/// Ranges with more cells than this list only their stored cells as inputs
const MAX_RANGE_INPUTS: u64 = 10_000;

/// A formula whose value the generated program does not recompute
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenCell {
    /// `Sheet1!B3` style label
    pub cell: String,
    pub reason: FreezeReason,
}

/// Result of [`generate_program`]
#[derive(Debug, Clone)]
pub struct GeneratedProgram {
    /// Rust source of the program
    pub source: String,
    /// Formulas recomputed by the program
    pub translated: usize,
    pub frozen: Vec<FrozenCell>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Input,
    Constant,
    Formula,
    Frozen,
}

impl Kind {
    fn as_rust(self) -> &'static str {
        match self {
            Kind::Input => "Kind::Input",
            Kind::Constant => "Kind::Constant",
            Kind::Formula => "Kind::Formula",
            Kind::Frozen => "Kind::Frozen",
        }
    }
}

/// Line-based source buffer
#[derive(Default)]
struct Source {
    text: String,
}

impl Source {
    fn line(&mut self, indent: usize, line: impl AsRef<str>) {
        for _ in 0..indent {
            self.text.push_str("    ");
        }
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }
}

/// Generate the program for a calculated workbook
///
/// `title` names the program in its banner, `source_file` is mentioned in
/// the header comment. Values of frozen formulas and the start values of all
/// cells come from the workbook as calculated, so calculate it with the same
/// `options` first.
pub fn generate_program(
    workbook: &Workbook,
    graph: &FormulaGraph,
    options: &CalculationOptions,
    title: &str,
    source_file: &str,
) -> GeneratedProgram {
    let mut translations = BTreeMap::new();
    let mut frozen = Vec::new();

    for key in graph.formula_keys() {
        let translation = match graph.parsed(key) {
            Some(ast) => Translator::new(workbook, key.sheet).translate(ast),
            None => Err(FreezeReason::Unparseable),
        };
        if let Err(reason) = &translation {
            log::info!("{} frozen: {}", cell_label(workbook, key), reason);
            frozen.push(FrozenCell {
                cell: cell_label(workbook, key),
                reason: reason.clone(),
            });
        }
        translations.insert(key, translation);
    }

    let mut src = Source::default();
    write_header(&mut src, title, source_file, &frozen);
    src.text.push_str(runtime::RUNTIME);
    src.blank();
    write_tables(&mut src, workbook, graph, &translations, options, title);
    src.blank();
    write_recalc(&mut src, workbook, graph, &translations, options);

    let translated = translations.values().filter(|t| t.is_ok()).count();
    log::debug!(
        "generated program: {} formulas translated, {} frozen",
        translated,
        frozen.len()
    );

    GeneratedProgram {
        source: src.text,
        translated,
        frozen,
    }
}

fn write_header(src: &mut Source, title: &str, source_file: &str, frozen: &[FrozenCell]) {
    src.line(0, format!("//! {}: generated by cellforge from `{}`", title, source_file));
    src.line(0, "//!");
    src.line(0, "//! Build with `rustc -O main.rs`. Without arguments the program opens a");
    src.line(0, "//! prompt; with arguments it runs them as one command, e.g. `./main outputs`.");
    if !frozen.is_empty() {
        src.line(0, "//!");
        src.line(0, "//! Formulas kept at their value from conversion time:");
        for cell in frozen {
            src.line(0, format!("//! - {}: {}", cell.cell, cell.reason));
        }
    }
    src.blank();
    src.line(0, "#![allow(unused)]");
}

fn write_tables(
    src: &mut Source,
    workbook: &Workbook,
    graph: &FormulaGraph,
    translations: &BTreeMap<CellKey, Result<String, FreezeReason>>,
    options: &CalculationOptions,
    title: &str,
) {
    src.line(0, format!("const TITLE: &str = {:?};", title));
    src.blank();

    src.line(0, "const SHEETS: &[&str] = &[");
    for name in workbook.sheet_names() {
        src.line(1, format!("{:?},", name));
    }
    src.line(0, "];");
    src.blank();

    src.line(0, format!("const ITERATION_LIMIT: u32 = {};", options.max_iterations));
    src.line(
        0,
        format!("const ITERATION_TOLERANCE: f64 = {};", float_literal(options.max_change)),
    );
    src.blank();

    let inputs: BTreeSet<CellKey> = graph.input_cells().into_iter().collect();
    let mut cells: BTreeMap<CellKey, (Kind, &str, CellValue)> = BTreeMap::new();

    for (sheet_idx, sheet) in workbook.worksheets().enumerate() {
        for (row, col, value) in sheet.iter_cells() {
            let key = CellKey::new(sheet_idx, row, col);
            let entry = match value.formula_text() {
                Some(text) => {
                    let kind = match translations.get(&key) {
                        Some(Ok(_)) => Kind::Formula,
                        _ => Kind::Frozen,
                    };
                    (kind, text, value.effective_value().clone())
                }
                None if inputs.contains(&key) => (Kind::Input, "", value.clone()),
                None if matches!(value, CellValue::Empty) => continue,
                None => (Kind::Constant, "", value.clone()),
            };
            cells.insert(key, entry);
        }
    }
    // Blank cells that formulas read are inputs too
    for key in inputs {
        cells
            .entry(key)
            .or_insert((Kind::Input, "", CellValue::Empty));
    }
    for key in translations.iter().filter(|(_, t)| t.is_ok()).map(|(key, _)| *key) {
        for (sheet, range) in graph.ranges_read(workbook, key) {
            if range.cell_count() > MAX_RANGE_INPUTS {
                log::debug!(
                    "{}: blank cells of {} not listed as inputs",
                    cell_label(workbook, key),
                    range
                );
                continue;
            }
            for addr in range.cells() {
                cells
                    .entry(CellKey::from_address(sheet, &addr))
                    .or_insert((Kind::Input, "", CellValue::Empty));
            }
        }
    }

    src.line(0, "const CELLS: &[CellDef] = &[");
    for (key, (kind, formula, value)) in &cells {
        src.line(
            1,
            format!(
                "CellDef {{ sheet: {}, row: {}, col: {}, kind: {}, formula: {:?}, init: {} }},",
                key.sheet,
                key.row,
                key.col,
                kind.as_rust(),
                formula,
                const_literal(value)
            ),
        );
    }
    src.line(0, "];");
}

fn write_recalc(
    src: &mut Source,
    workbook: &Workbook,
    graph: &FormulaGraph,
    translations: &BTreeMap<CellKey, Result<String, FreezeReason>>,
    options: &CalculationOptions,
) {
    let assign = |src: &mut Source, indent: usize, key: CellKey| {
        src.line(indent, comment(workbook, key));
        src.line(indent, format!("let v = {};", expression(workbook, key, translations)));
        src.line(indent, format!("m.set({}, {}, {}, v);", key.sheet, key.row, key.col));
    };

    src.line(0, "/// Recompute every formula, precedents first");
    src.line(0, "fn recalc(m: &mut Model) {");
    for step in graph.evaluation_order() {
        match step {
            EvalStep::Cell(key) => assign(src, 1, key),
            EvalStep::Cycle(members) if options.circular == CircularMode::Iterate => {
                let labels: Vec<String> = members.iter().map(|k| cell_label(workbook, *k)).collect();
                src.line(1, format!("// cycle: {}", labels.join(", ")));
                for key in &members {
                    src.line(1, format!("m.seed({}, {}, {});", key.sheet, key.row, key.col));
                }
                src.line(1, "for _ in 0..ITERATION_LIMIT {");
                src.line(2, "let mut moved: f64 = 0.0;");
                for key in &members {
                    src.line(2, comment(workbook, *key));
                    src.line(2, format!("let v = {};", expression(workbook, *key, translations)));
                    src.line(
                        2,
                        format!(
                            "moved = moved.max(change(&m.get({0}, {1}, {2}), &v));",
                            key.sheet, key.row, key.col
                        ),
                    );
                    src.line(2, format!("m.set({}, {}, {}, v);", key.sheet, key.row, key.col));
                }
                src.line(2, "if moved <= ITERATION_TOLERANCE {");
                src.line(3, "break;");
                src.line(2, "}");
                src.line(1, "}");
            }
            EvalStep::Cycle(members) => {
                let labels: Vec<String> = members.iter().map(|k| cell_label(workbook, *k)).collect();
                src.line(1, format!("// circular: {}", labels.join(", ")));
                for key in &members {
                    src.line(
                        1,
                        format!("m.set({}, {}, {}, Value::Err(\"#REF!\"));", key.sheet, key.row, key.col),
                    );
                }
            }
        }
    }
    src.line(0, "}");
}

/// `// Sheet1!B3: =B1+B2`, on one line whatever the formula holds
fn comment(workbook: &Workbook, key: CellKey) -> String {
    let formula = formula_text(workbook, key).unwrap_or_default();
    let formula: String = formula
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    format!("// {}: {}", cell_label(workbook, key), formula)
}

fn expression(
    workbook: &Workbook,
    key: CellKey,
    translations: &BTreeMap<CellKey, Result<String, FreezeReason>>,
) -> String {
    match translations.get(&key) {
        Some(Ok(expr)) => expr.clone(),
        // Frozen: the value from conversion time
        _ => workbook
            .worksheet(key.sheet)
            .map(|sheet| value_literal(&sheet.get_calculated_value_at(key.row, key.col)))
            .unwrap_or_else(|| "Value::Empty".to_string()),
    }
}

fn formula_text(workbook: &Workbook, key: CellKey) -> Option<String> {
    workbook
        .worksheet(key.sheet)?
        .get_formula_at(key.row, key.col)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::calculate_graph;
    use pretty_assertions::assert_eq;

    fn generate(wb: &mut Workbook, options: &CalculationOptions) -> GeneratedProgram {
        let graph = FormulaGraph::build(wb);
        calculate_graph(wb, &graph, options).unwrap();
        generate_program(wb, &graph, options, "model", "model.xlsx")
    }

    #[test]
    fn test_program_layout() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 10.0).unwrap();
        sheet.set_cell_value("A2", 20.0).unwrap();
        sheet.set_cell_value("D1", "note").unwrap();
        sheet.set_cell_formula("A3", "=A1+A2").unwrap();
        sheet.set_cell_formula("B1", "=A3*2").unwrap();

        let program = generate(&mut wb, &CalculationOptions::default());

        assert_eq!(program.translated, 2);
        assert!(program.frozen.is_empty());
        let src = &program.source;
        assert!(src.contains("#![allow(unused)]"));
        assert!(src.contains("fn recalc(m: &mut Model) {"));
        assert!(src.contains("fn main() {"));
        assert!(src.contains("const SHEETS: &[&str] = &[\n    \"Sheet1\",\n];"));
        assert!(src.contains(
            "CellDef { sheet: 0, row: 0, col: 0, kind: Kind::Input, formula: \"\", init: Lit::Num(10.0) },"
        ));
        assert!(src.contains(
            "CellDef { sheet: 0, row: 0, col: 3, kind: Kind::Constant, formula: \"\", init: Lit::Text(\"note\") },"
        ));
        assert!(src.contains(
            "CellDef { sheet: 0, row: 2, col: 0, kind: Kind::Formula, formula: \"=A1+A2\", init: Lit::Num(30.0) },"
        ));

        // A3 is assigned before B1 reads it
        let a3 = src.find("// Sheet1!A3: =A1+A2").unwrap();
        let b1 = src.find("// Sheet1!B1: =A3*2").unwrap();
        assert!(a3 < b1);
        assert!(src.contains("    let v = add(m.get(0, 0, 0), m.get(0, 1, 0));\n    m.set(0, 2, 0, v);\n"));
    }

    #[test]
    fn test_frozen_formulas_keep_their_value() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 4.0).unwrap();
        sheet.set_cell_formula("B1", "=VLOOKUP(A1,A1:A1,1)").unwrap();
        sheet.set_cell_formula("B2", "=(1+").unwrap();

        let program = generate(&mut wb, &CalculationOptions::default());

        assert_eq!(program.translated, 0);
        assert_eq!(
            program.frozen,
            vec![
                FrozenCell {
                    cell: "Sheet1!B1".into(),
                    reason: FreezeReason::Unsupported("VLOOKUP".into()),
                },
                FrozenCell {
                    cell: "Sheet1!B2".into(),
                    reason: FreezeReason::Unparseable,
                },
            ]
        );
        let src = &program.source;
        assert!(src.contains("//! - Sheet1!B1: function VLOOKUP is not translated"));
        assert!(src.contains("kind: Kind::Frozen, formula: \"=VLOOKUP(A1,A1:A1,1)\", init: Lit::Num(4.0)"));
        assert!(src.contains("    let v = Value::Num(4.0);\n    m.set(0, 0, 1, v);\n"));
        assert!(src.contains("    let v = Value::Err(\"#NAME?\");\n    m.set(0, 1, 1, v);\n"));
    }

    #[test]
    fn test_cycles() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "=B1/2+1").unwrap();
        sheet.set_cell_formula("B1", "=A1").unwrap();

        let flagged = generate(&mut wb, &CalculationOptions::default());
        assert!(flagged.source.contains("    // circular: Sheet1!A1, Sheet1!B1\n"));
        assert!(flagged.source.contains("    m.set(0, 0, 0, Value::Err(\"#REF!\"));\n"));

        let options = CalculationOptions {
            circular: CircularMode::Iterate,
            max_iterations: 50,
            max_change: 1e-9,
        };
        let iterated = generate(&mut wb, &options);
        let src = &iterated.source;
        assert!(src.contains("const ITERATION_LIMIT: u32 = 50;"));
        assert!(src.contains("const ITERATION_TOLERANCE: f64 = 1e-9;"));
        assert!(src.contains("    m.seed(0, 0, 0);\n    m.seed(0, 0, 1);\n    for _ in 0..ITERATION_LIMIT {\n"));
        assert!(src.contains("        moved = moved.max(change(&m.get(0, 0, 1), &v));\n"));
    }

    #[test]
    fn test_blank_inputs_are_listed() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_formula("A1", "=B1*2")
            .unwrap();

        let program = generate(&mut wb, &CalculationOptions::default());

        assert!(program.source.contains(
            "CellDef { sheet: 0, row: 0, col: 1, kind: Kind::Input, formula: \"\", init: Lit::Empty },"
        ));
    }

    #[test]
    fn test_blank_cells_of_read_ranges_are_inputs() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 1.0).unwrap();
        sheet.set_cell_formula("C1", "=SUM(A1:A3)").unwrap();
        sheet.set_cell_formula("C2", "=SUM(B:B)").unwrap();
        sheet.set_cell_formula("C3", "=SUM(D1:D2)+RAND()").unwrap();

        let program = generate(&mut wb, &CalculationOptions::default());
        let src = &program.source;

        let input = |row: u32, col: u16| {
            format!(
                "CellDef {{ sheet: 0, row: {}, col: {}, kind: Kind::Input, formula: \"\", init: Lit::Empty }},",
                row, col
            )
        };
        assert!(src.contains("CellDef { sheet: 0, row: 0, col: 0, kind: Kind::Input, formula: \"\", init: Lit::Num(1.0) },"));
        assert!(src.contains(&input(1, 0)));
        assert!(src.contains(&input(2, 0)));
        // a whole column stays sparse
        assert!(!src.contains(&input(0, 1)));
        // frozen formulas do not recompute, so their ranges add nothing
        assert!(!src.contains(&input(0, 3)));
    }
}
