//! Workbook-wide dependency graph
//!
//! Parses every formula once and links each formula cell to the cells it
//! reads. Calculation, code generation and the `deps` command all work from
//! the same [`FormulaGraph`].

use std::collections::{BTreeMap, BTreeSet};

use cellforge_core::{CellRange, Workbook};
use cellforge_formula::{
    check_calls, parse_expression_text, parse_formula, CellKey, DependencyGraph, EvalStep,
    FormulaExpr, Reference,
};

/// Defined names referring to names deeper than this are not followed
const MAX_NAME_DEPTH: u8 = 16;

/// Parsed formulas plus the graph of who reads whom
#[derive(Debug, Default)]
pub struct FormulaGraph {
    graph: DependencyGraph,
    /// Every formula cell; `None` when its text does not parse
    formulas: BTreeMap<CellKey, Option<FormulaExpr>>,
}

impl FormulaGraph {
    /// Parse all formulas of `workbook` and link them to their precedents
    ///
    /// Range references link every stored cell of the range. References to
    /// sheets the workbook does not have link nothing; they evaluate to
    /// `#REF!`.
    pub fn build(workbook: &Workbook) -> Self {
        let mut graph = DependencyGraph::new();
        let mut formulas = BTreeMap::new();

        for (sheet_idx, sheet) in workbook.worksheets().enumerate() {
            for (row, col, text) in sheet.formula_cells() {
                let key = CellKey::new(sheet_idx, row, col);
                graph.add_node(key);

                let ast = match parse_formula(text) {
                    Ok(ast) => ast,
                    Err(e) => {
                        log::warn!("{}: cannot parse {}: {}", cell_label(workbook, key), text, e);
                        formulas.insert(key, None);
                        continue;
                    }
                };

                for problem in check_calls(&ast) {
                    log::warn!("{}: {}", cell_label(workbook, key), problem);
                }

                let mut reads = Reads::default();
                collect_reads(workbook, &ast, sheet_idx, 0, &mut reads);
                for precedent in reads.stored_cells(workbook) {
                    graph.add_dependency(precedent, key);
                }

                formulas.insert(key, Some(ast));
            }
        }

        log::debug!(
            "dependency graph: {} formulas, {} cells",
            formulas.len(),
            graph.len()
        );
        Self { graph, formulas }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }

    /// Formula cells whose text did not parse
    pub fn parse_failures(&self) -> usize {
        self.formulas.values().filter(|ast| ast.is_none()).count()
    }

    pub fn is_formula(&self, key: CellKey) -> bool {
        self.formulas.contains_key(&key)
    }

    /// Parsed formula of a cell; `None` for non-formula cells and parse failures
    pub fn parsed(&self, key: CellKey) -> Option<&FormulaExpr> {
        self.formulas.get(&key).and_then(Option::as_ref)
    }

    /// Formula cells in key order
    pub fn formula_keys(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.formulas.keys().copied()
    }

    /// Formula cells in an order where each comes after what it reads
    ///
    /// Input cells are left out; they never need evaluating.
    pub fn evaluation_order(&self) -> Vec<EvalStep> {
        self.graph
            .evaluation_order()
            .into_iter()
            .filter(|step| match step {
                EvalStep::Cell(key) => self.is_formula(*key),
                EvalStep::Cycle(_) => true,
            })
            .collect()
    }

    /// Sets of formula cells that reference each other
    pub fn cycles(&self) -> Vec<Vec<CellKey>> {
        self.graph.cycles()
    }

    /// Non-formula cells read by at least one formula
    pub fn input_cells(&self) -> Vec<CellKey> {
        self.graph
            .nodes()
            .filter(|key| !self.is_formula(*key))
            .collect()
    }

    /// Ranges the formula of `key` reads, as `(sheet, range)`
    pub fn ranges_read(&self, workbook: &Workbook, key: CellKey) -> Vec<(usize, CellRange)> {
        let mut reads = Reads::default();
        if let Some(ast) = self.parsed(key) {
            collect_reads(workbook, ast, key.sheet, 0, &mut reads);
        }
        reads.ranges
    }
}

/// What one formula reads
#[derive(Debug, Default)]
struct Reads {
    cells: BTreeSet<CellKey>,
    ranges: Vec<(usize, CellRange)>,
}

impl Reads {
    /// Single cells plus the stored cells of every range
    fn stored_cells(self, workbook: &Workbook) -> BTreeSet<CellKey> {
        let mut cells = self.cells;
        for (idx, range) in self.ranges {
            if let Some(sheet) = workbook.worksheet(idx) {
                cells.extend(
                    sheet
                        .cells_in(range)
                        .map(|(row, col, _)| CellKey::new(idx, row, col)),
                );
            }
        }
        cells
    }
}

/// Collect the cells and ranges `expr` reads, following defined names
fn collect_reads(
    workbook: &Workbook,
    expr: &FormulaExpr,
    sheet_idx: usize,
    depth: u8,
    out: &mut Reads,
) {
    let resolve = |sheet: Option<&str>| match sheet {
        Some(name) => workbook.sheet_index(name),
        None => Some(sheet_idx),
    };

    let mut names = Vec::new();
    expr.walk(&mut |node| match node {
        FormulaExpr::CellRef(r) => {
            if let Some(idx) = resolve(r.sheet.as_deref()) {
                out.cells.insert(CellKey::from_address(idx, &r.address));
            }
        }
        FormulaExpr::RangeRef(r) => {
            if let Some(idx) = resolve(r.sheet.as_deref())
                .filter(|&idx| workbook.worksheet(idx).is_some())
            {
                out.ranges.push((idx, r.range));
            }
        }
        FormulaExpr::NameRef(name) => names.push(name.as_str()),
        _ => {}
    });

    if depth >= MAX_NAME_DEPTH {
        return;
    }
    for name in names {
        let Some(named) = workbook.get_named_range(name, sheet_idx) else {
            continue;
        };
        if let Ok(target) = parse_expression_text(&named.refers_to) {
            collect_reads(workbook, &target, sheet_idx, depth + 1, out);
        }
    }
}

/// `Sheet1!B3` style label for a cell, quoting the sheet name when needed
pub fn cell_label(workbook: &Workbook, key: CellKey) -> String {
    let sheet = workbook
        .worksheet(key.sheet)
        .map_or_else(|| format!("Sheet{}", key.sheet + 1), |s| s.name().to_string());
    Reference::Cell {
        sheet: Some(sheet),
        address: key.address(),
    }
    .to_string()
}
