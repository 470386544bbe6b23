//! Workbook calculation engine
//!
//! Evaluates every formula of a workbook in dependency order and stores each
//! result as the formula cell's computed value. Cells that reference each
//! other are handled per [`CircularMode`].
//!
//! # Example
//!
//! ```rust
//! use cellforge::{CellValue, Workbook, WorkbookCalculationExt};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_formula("A3", "=A1+A2").unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_value("A2", 20.0).unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//! assert_eq!(
//!     workbook.worksheet(0).unwrap().get_calculated_value_at(2, 0),
//!     CellValue::Number(30.0)
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};
use crate::graph::{cell_label, FormulaGraph};
use cellforge_core::{CellError, CellValue, Workbook};
use cellforge_formula::{evaluate, CellKey, EvalStep, EvaluationContext};

/// What to do with cells that reference each other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircularMode {
    /// Fail the calculation, naming the cells involved
    Reject,
    /// Give every cell of a cycle `#REF!` and carry on
    #[default]
    Flag,
    /// Iterate the cycle until it settles
    Iterate,
}

impl fmt::Display for CircularMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircularMode::Reject => "reject",
            CircularMode::Flag => "flag",
            CircularMode::Iterate => "iterate",
        })
    }
}

impl FromStr for CircularMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(CircularMode::Reject),
            "flag" => Ok(CircularMode::Flag),
            "iterate" => Ok(CircularMode::Iterate),
            other => Err(format!(
                "unknown circular mode '{}' (expected reject, flag or iterate)",
                other
            )),
        }
    }
}

/// Options for workbook calculation
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationOptions {
    pub circular: CircularMode,
    /// Iteration cap per cycle (default: 100)
    pub max_iterations: u32,
    /// A cycle has settled once no numeric value moves by more than this
    /// (default: 0.001)
    pub max_change: f64,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            circular: CircularMode::Flag,
            max_iterations: 100,
            max_change: 0.001,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of formula cells given a value
    pub cells_calculated: usize,
    /// Formulas whose text did not parse
    pub parse_failures: usize,
    /// Formula cells whose value is an error
    pub errors: usize,
    /// Number of cycles found
    pub cycles: usize,
    /// Most iterations any cycle needed
    pub iterations: u32,
    /// Whether every iterated cycle settled
    pub converged: bool,
}

/// Extension trait for Workbook to add calculation methods
pub trait WorkbookCalculationExt {
    /// Calculate all formulas in the workbook with default options
    fn calculate(&mut self) -> Result<CalculationStats>;

    /// Calculate all formulas with custom options
    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats>;
}

impl WorkbookCalculationExt for Workbook {
    fn calculate(&mut self) -> Result<CalculationStats> {
        self.calculate_with_options(&CalculationOptions::default())
    }

    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats> {
        let graph = FormulaGraph::build(self);
        calculate_graph(self, &graph, options)
    }
}

/// Calculate `workbook` using an already built graph
pub fn calculate_graph(
    workbook: &mut Workbook,
    graph: &FormulaGraph,
    options: &CalculationOptions,
) -> Result<CalculationStats> {
    CalculationEngine::new(graph, options).calculate_all(workbook)
}

/// The calculation engine
struct CalculationEngine<'g> {
    graph: &'g FormulaGraph,
    options: &'g CalculationOptions,
}

impl<'g> CalculationEngine<'g> {
    fn new(graph: &'g FormulaGraph, options: &'g CalculationOptions) -> Self {
        Self { graph, options }
    }

    fn calculate_all(&self, workbook: &mut Workbook) -> Result<CalculationStats> {
        let mut stats = CalculationStats {
            formula_count: self.graph.formula_count(),
            parse_failures: self.graph.parse_failures(),
            converged: true,
            ..Default::default()
        };

        if stats.formula_count == 0 {
            return Ok(stats);
        }

        let order = self.graph.evaluation_order();
        stats.cycles = order
            .iter()
            .filter(|step| matches!(step, EvalStep::Cycle(_)))
            .count();

        if self.options.circular == CircularMode::Reject {
            if let Some(EvalStep::Cycle(cells)) = order
                .iter()
                .find(|step| matches!(step, EvalStep::Cycle(_)))
            {
                return Err(ConvertError::CircularReference {
                    cells: labels(workbook, cells),
                });
            }
        }

        for step in &order {
            match step {
                EvalStep::Cell(key) => {
                    self.calculate_cell(workbook, *key)?;
                    stats.cells_calculated += 1;
                }
                EvalStep::Cycle(cells) => {
                    match self.options.circular {
                        CircularMode::Iterate => {
                            let (iterations, converged) = self.iterate_cycle(workbook, cells)?;
                            stats.iterations = stats.iterations.max(iterations);
                            stats.converged &= converged;
                        }
                        CircularMode::Flag | CircularMode::Reject => {
                            log::warn!("circular reference between {}", labels(workbook, cells));
                            for key in cells {
                                set_result(workbook, *key, CellValue::Error(CellError::Ref))?;
                            }
                        }
                    }
                    stats.cells_calculated += cells.len();
                }
            }
        }

        stats.errors = self
            .graph
            .formula_keys()
            .filter(|key| computed(workbook, *key).is_error())
            .count();

        log::info!(
            "calculated {} of {} formulas ({} errors, {} cycles)",
            stats.cells_calculated,
            stats.formula_count,
            stats.errors,
            stats.cycles
        );
        Ok(stats)
    }

    /// Evaluate one formula cell against the workbook as it stands
    fn evaluate_cell(&self, workbook: &Workbook, key: CellKey) -> CellValue {
        let Some(ast) = self.graph.parsed(key) else {
            return CellValue::Error(CellError::Name);
        };

        let ctx = EvaluationContext::new(Some(workbook), key.sheet, key.row, key.col);
        match evaluate(ast, &ctx) {
            Ok(value) => CellValue::from(value.into_scalar()),
            Err(e) => {
                log::warn!("{}: {}", cell_label(workbook, key), e);
                CellValue::Error(e.to_cell_error())
            }
        }
    }

    fn calculate_cell(&self, workbook: &mut Workbook, key: CellKey) -> Result<()> {
        let value = self.evaluate_cell(workbook, key);
        log::debug!("{} = {}", cell_label(workbook, key), value);
        set_result(workbook, key, value)
    }

    /// Gauss-Seidel iteration over one cycle
    ///
    /// Members start from their cached values (0 when they have none or hold
    /// an error) and are re-evaluated in key order, each seeing the values
    /// already updated in the same sweep. Returns the sweeps done and whether
    /// they settled.
    fn iterate_cycle(&self, workbook: &mut Workbook, cells: &[CellKey]) -> Result<(u32, bool)> {
        for key in cells {
            let start = computed(workbook, *key);
            if start.is_empty() || start.is_error() {
                set_result(workbook, *key, CellValue::Number(0.0))?;
            }
        }

        for iteration in 1..=self.options.max_iterations {
            let mut max_change: f64 = 0.0;

            for key in cells {
                let old = computed(workbook, *key);
                let new = self.evaluate_cell(workbook, *key);
                max_change = max_change.max(change(&old, &new));
                set_result(workbook, *key, new)?;
            }

            if max_change <= self.options.max_change {
                log::debug!(
                    "cycle at {} settled after {} iterations",
                    cell_label(workbook, cells[0]),
                    iteration
                );
                return Ok((iteration, true));
            }
        }

        log::warn!(
            "circular reference between {} did not settle within {} iterations",
            labels(workbook, cells),
            self.options.max_iterations
        );
        Ok((self.options.max_iterations, false))
    }
}

/// How far a value moved between two sweeps
fn change(old: &CellValue, new: &CellValue) -> f64 {
    match (old, new) {
        (CellValue::Number(a), CellValue::Number(b)) => (a - b).abs(),
        (a, b) if a == b => 0.0,
        _ => f64::INFINITY,
    }
}

fn computed(workbook: &Workbook, key: CellKey) -> CellValue {
    workbook
        .worksheet(key.sheet)
        .map(|sheet| sheet.get_calculated_value_at(key.row, key.col))
        .unwrap_or_default()
}

fn set_result(workbook: &mut Workbook, key: CellKey, value: CellValue) -> Result<()> {
    let count = workbook.sheet_count();
    let sheet = workbook
        .worksheet_mut(key.sheet)
        .ok_or(cellforge_core::Error::SheetOutOfBounds(key.sheet, count))?;
    sheet.set_formula_result(key.row, key.col, value)?;
    Ok(())
}

fn labels(workbook: &Workbook, cells: &[CellKey]) -> String {
    cells
        .iter()
        .map(|key| cell_label(workbook, *key))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn value(workbook: &Workbook, address: &str) -> CellValue {
        workbook.worksheet(0).unwrap().get_value(address).map_or(
            CellValue::Empty,
            |v| v.effective_value().clone(),
        )
    }

    #[test]
    fn test_simple_calculation() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();

        sheet.set_cell_value("A1", 10.0).unwrap();
        sheet.set_cell_value("A2", 20.0).unwrap();
        sheet.set_cell_formula("A3", "=A1+A2").unwrap();

        let stats = workbook.calculate().unwrap();

        assert_eq!(stats.formula_count, 1);
        assert_eq!(stats.cells_calculated, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(value(&workbook, "A3"), CellValue::Number(30.0));
    }

    #[test]
    fn test_chain_out_of_insertion_order() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();

        sheet.set_cell_formula("A1", "=A4*A2").unwrap();
        sheet.set_cell_formula("A2", "=A3+10").unwrap();
        sheet.set_cell_formula("A3", "=A4*2").unwrap();
        sheet.set_cell_value("A4", 5.0).unwrap();

        let stats = workbook.calculate().unwrap();

        assert_eq!(stats.formula_count, 3);
        assert_eq!(value(&workbook, "A3"), CellValue::Number(10.0));
        assert_eq!(value(&workbook, "A2"), CellValue::Number(20.0));
        assert_eq!(value(&workbook, "A1"), CellValue::Number(100.0));
    }

    #[test]
    fn test_cross_sheet_and_names() {
        let mut workbook = Workbook::new();
        let idx = workbook.add_worksheet_with_name("Inputs").unwrap();
        workbook
            .worksheet_mut(idx)
            .unwrap()
            .set_cell_formula("A1", "=Sheet1!B1*2")
            .unwrap();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_value("B1", 4.0).unwrap();
        sheet.set_cell_formula("C1", "=Doubled+1").unwrap();
        workbook.define_name("Doubled", "Inputs!$A$1").unwrap();

        workbook.calculate().unwrap();

        assert_eq!(value(&workbook, "C1"), CellValue::Number(9.0));
    }

    #[test]
    fn test_cell_level_failures_are_values() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "=1/0").unwrap();
        sheet.set_cell_formula("A2", "=FOO(1)").unwrap();
        sheet.set_cell_formula("A3", "=(1+").unwrap();
        sheet.set_cell_formula("A4", "=Nowhere!A1").unwrap();

        let stats = workbook.calculate().unwrap();

        assert_eq!(stats.parse_failures, 1);
        assert_eq!(stats.errors, 4);
        assert_eq!(value(&workbook, "A1"), CellValue::Error(CellError::Div0));
        assert_eq!(value(&workbook, "A2"), CellValue::Error(CellError::Name));
        assert_eq!(value(&workbook, "A3"), CellValue::Error(CellError::Name));
        assert_eq!(value(&workbook, "A4"), CellValue::Error(CellError::Ref));
    }

    fn two_cell_cycle(a1: &str, b1: &str) -> Workbook {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", a1).unwrap();
        sheet.set_cell_formula("B1", b1).unwrap();
        sheet.set_cell_formula("C1", "=A1+1").unwrap();
        workbook
    }

    #[test]
    fn test_flagged_cycle() {
        let mut workbook = two_cell_cycle("=B1", "=A1");

        let stats = workbook.calculate().unwrap();

        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.cells_calculated, 3);
        assert_eq!(value(&workbook, "A1"), CellValue::Error(CellError::Ref));
        assert_eq!(value(&workbook, "B1"), CellValue::Error(CellError::Ref));
        assert_eq!(value(&workbook, "C1"), CellValue::Error(CellError::Ref));
    }

    #[test]
    fn test_rejected_cycle() {
        let mut workbook = two_cell_cycle("=B1", "=A1");
        let options = CalculationOptions {
            circular: CircularMode::Reject,
            ..Default::default()
        };

        let err = workbook.calculate_with_options(&options).unwrap_err();

        match err {
            ConvertError::CircularReference { cells } => {
                assert_eq!(cells, "Sheet1!A1, Sheet1!B1")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_iterated_cycle_converges() {
        let mut workbook = two_cell_cycle("=B1/2+1", "=A1");
        let options = CalculationOptions {
            circular: CircularMode::Iterate,
            max_change: 1e-9,
            ..Default::default()
        };

        let stats = workbook.calculate_with_options(&options).unwrap();

        assert!(stats.converged);
        assert!(stats.iterations > 1 && stats.iterations < 100);
        let a1 = value(&workbook, "A1").as_number().unwrap();
        assert!((a1 - 2.0).abs() < 1e-6, "A1 = {}", a1);
        let c1 = value(&workbook, "C1").as_number().unwrap();
        assert!((c1 - 3.0).abs() < 1e-6, "C1 = {}", c1);
    }

    #[test]
    fn test_iteration_restarts_from_flagged_errors() {
        let mut workbook = two_cell_cycle("=B1/2+1", "=A1");
        workbook.calculate().unwrap();
        assert_eq!(value(&workbook, "A1"), CellValue::Error(CellError::Ref));

        let options = CalculationOptions {
            circular: CircularMode::Iterate,
            max_change: 1e-9,
            ..Default::default()
        };
        let stats = workbook.calculate_with_options(&options).unwrap();

        assert!(stats.converged);
        let b1 = value(&workbook, "B1").as_number().unwrap();
        assert!((b1 - 2.0).abs() < 1e-6, "B1 = {}", b1);
    }

    #[test]
    fn test_iteration_cap() {
        let mut workbook = two_cell_cycle("=B1+1", "=A1");
        let options = CalculationOptions {
            circular: CircularMode::Iterate,
            max_iterations: 5,
            ..Default::default()
        };

        let stats = workbook.calculate_with_options(&options).unwrap();

        assert!(!stats.converged);
        assert_eq!(stats.iterations, 5);
        assert_eq!(value(&workbook, "A1"), CellValue::Number(5.0));
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "=A1+1").unwrap();

        let stats = workbook.calculate().unwrap();

        assert_eq!(stats.cycles, 1);
        assert_eq!(value(&workbook, "A1"), CellValue::Error(CellError::Ref));
    }

    #[test]
    fn test_circular_mode_from_str() {
        assert_eq!("Iterate".parse::<CircularMode>(), Ok(CircularMode::Iterate));
        assert_eq!(CircularMode::default().to_string(), "flag");
        assert!("loop".parse::<CircularMode>().is_err());
    }
}
