//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. Cell-level problems (bad
//! operands, unknown functions, missing sheets) are spreadsheet errors in the
//! result, never `Err`.

use std::cmp::Ordering;

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::FormulaResult;
use crate::functions::FunctionRegistry;
use cellforge_core::{CellError, CellRange, CellValue, Workbook};

/// Defined names may refer to other names; deeper chains are treated as broken
const MAX_NAME_DEPTH: u8 = 16;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// Block of values; produced by ranges, array constants and reference arguments
    Array(Grid),
    Empty,
}

static BLANK: FormulaValue = FormulaValue::Empty;

/// Rectangular block of values
///
/// Only positions holding something are kept, in row-major order; every
/// other position inside `rows x cols` is empty. A whole-column range over a
/// short column costs no more than the cells in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<(usize, usize, FormulaValue)>,
}

impl Grid {
    /// `rows x cols` empty cells
    pub fn blank(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: Vec::new(),
        }
    }

    /// Grid from rows of values; short rows are padded with empty cells
    pub fn from_rows(rows: Vec<Vec<FormulaValue>>) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut grid = Self::blank(rows.len(), cols);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                grid.push(r, c, value);
            }
        }
        grid
    }

    /// 1x1 grid
    pub fn single(value: FormulaValue) -> Self {
        Self::from_rows(vec![vec![value]])
    }

    /// Store a value; positions must arrive in row-major order
    pub(crate) fn push(&mut self, row: usize, col: usize, value: FormulaValue) {
        debug_assert!(row < self.rows && col < self.cols);
        debug_assert!(self
            .cells
            .last()
            .map_or(true, |&(r, c, _)| (r, c) < (row, col)));
        if !matches!(value, FormulaValue::Empty) {
            self.cells.push((row, col, value));
        }
    }

    /// `(rows, cols)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Value at a 0-based position
    pub fn get(&self, row: usize, col: usize) -> &FormulaValue {
        self.cells
            .binary_search_by(|(r, c, _)| (*r, *c).cmp(&(row, col)))
            .map_or(&BLANK, |i| &self.cells[i].2)
    }

    /// Non-empty cells as `(row, col, value)`, row-major
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, &FormulaValue)> {
        self.cells.iter().map(|(r, c, v)| (*r, *c, v))
    }

    /// Non-empty values, row-major
    pub fn values(&self) -> impl Iterator<Item = &FormulaValue> {
        self.cells.iter().map(|(_, _, v)| v)
    }

    /// Number of empty positions
    pub fn blank_count(&self) -> u64 {
        (self.rows as u64 * self.cols as u64).saturating_sub(self.cells.len() as u64)
    }

    /// One row as a `1 x cols` grid
    pub fn row(&self, row: usize) -> Grid {
        Grid {
            rows: 1,
            cols: self.cols,
            cells: self
                .entries()
                .filter(|&(r, _, _)| r == row)
                .map(|(_, c, v)| (0, c, v.clone()))
                .collect(),
        }
    }

    /// One column as a `rows x 1` grid
    pub fn column(&self, col: usize) -> Grid {
        Grid {
            rows: self.rows,
            cols: 1,
            cells: self
                .entries()
                .filter(|&(_, c, _)| c == col)
                .map(|(r, _, v)| (r, 0, v.clone()))
                .collect(),
        }
    }

    /// Rows and columns swapped
    pub fn transpose(&self) -> Grid {
        let mut cells: Vec<_> = self.entries().map(|(r, c, v)| (c, r, v.clone())).collect();
        cells.sort_by_key(|&(r, c, _)| (r, c));
        Grid {
            rows: self.cols,
            cols: self.rows,
            cells,
        }
    }

    fn into_single(self) -> Option<FormulaValue> {
        if (self.rows, self.cols) != (1, 1) {
            return None;
        }
        Some(
            self.cells
                .into_iter()
                .next()
                .map_or(FormulaValue::Empty, |(_, _, v)| v),
        )
    }
}

impl FormulaValue {
    /// Number from an arithmetic result; NaN and infinities become `#NUM!`
    pub fn from_number(n: f64) -> Self {
        if n.is_finite() {
            FormulaValue::Number(n)
        } else {
            FormulaValue::Error(CellError::Num)
        }
    }

    /// Lenient numeric view: empty is 0, booleans are 1/0, numeric text parses
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => parse_numeric_text(s),
            FormulaValue::Empty => Some(0.0),
            FormulaValue::Array(_) => self.scalar().as_number(),
            FormulaValue::Error(_) => None,
        }
    }

    /// Number for arithmetic; errors pass through, anything else is `#VALUE!`
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self.scalar() {
            FormulaValue::Error(e) => Err(e),
            scalar => scalar.as_number().ok_or(CellError::Value),
        }
    }

    /// Truth value for logical tests
    pub fn to_bool(&self) -> Result<bool, CellError> {
        match self.scalar() {
            FormulaValue::Boolean(b) => Ok(b),
            FormulaValue::Number(n) => Ok(n != 0.0),
            FormulaValue::Empty => Ok(false),
            FormulaValue::String(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(CellError::Value)
                }
            }
            FormulaValue::Error(e) => Err(e),
            FormulaValue::Array(_) => Err(CellError::Value),
        }
    }

    /// Text for string functions; errors pass through
    pub fn to_text(&self) -> Result<String, CellError> {
        match self.scalar() {
            FormulaValue::Error(e) => Err(e),
            scalar => Ok(scalar.as_string()),
        }
    }

    /// Display text of the value
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => CellValue::Number(*n).to_string(),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => self.scalar().as_string(),
        }
    }

    /// The value in scalar context: a 1x1 array is its element, any other
    /// array is `#VALUE!`
    pub fn scalar(&self) -> FormulaValue {
        match self {
            FormulaValue::Array(grid) if grid.dimensions() == (1, 1) => grid.get(0, 0).scalar(),
            FormulaValue::Array(_) => FormulaValue::Error(CellError::Value),
            other => other.clone(),
        }
    }

    /// Consuming form of [`FormulaValue::scalar`]
    pub fn into_scalar(self) -> FormulaValue {
        match self {
            FormulaValue::Array(grid) => grid
                .into_single()
                .map_or(FormulaValue::Error(CellError::Value), FormulaValue::into_scalar),
            other => other,
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Non-empty values of an array in row-major order, or the value itself
    ///
    /// Blank positions of an array are skipped; see [`Grid::blank_count`].
    pub fn iter_values(&self) -> Box<dyn Iterator<Item = &FormulaValue> + '_> {
        match self {
            FormulaValue::Array(grid) => Box::new(grid.values()),
            other => Box::new(std::iter::once(other)),
        }
    }

    /// `(rows, cols)` of the value; scalars are 1x1
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            FormulaValue::Array(grid) => grid.dimensions(),
            _ => (1, 1),
        }
    }
}

/// Text that reads as a number in arithmetic (`" 12 "`, `"1e3"`, `"50%"`)
pub fn parse_numeric_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(percent) = trimmed.strip_suffix('%') {
        return percent.trim().parse::<f64>().ok().map(|n| n / 100.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl From<&CellValue> for FormulaValue {
    fn from(value: &CellValue) -> Self {
        match value.effective_value() {
            CellValue::Empty | CellValue::Formula { .. } => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(*n),
            CellValue::Text(s) => FormulaValue::String(s.clone()),
            CellValue::Boolean(b) => FormulaValue::Boolean(*b),
            CellValue::Error(e) => FormulaValue::Error(*e),
        }
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        FormulaValue::from(&value)
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value.into_scalar() {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::Text(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            FormulaValue::Array(_) => CellValue::Error(CellError::Value),
        }
    }
}

/// Context for formula evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Reference to the workbook for cell lookups
    pub workbook: Option<&'a Workbook>,
    /// Current worksheet index
    pub current_sheet: usize,
    /// Current cell row
    pub current_row: u32,
    /// Current cell column
    pub current_col: u16,
    name_depth: u8,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(workbook: Option<&'a Workbook>, sheet: usize, row: u32, col: u16) -> Self {
        Self {
            workbook,
            current_sheet: sheet,
            current_row: row,
            current_col: col,
            name_depth: 0,
        }
    }

    /// Create a simple context without workbook (for testing)
    pub fn simple() -> Self {
        Self::new(None, 0, 0, 0)
    }

    /// Whether dates use the 1904 system
    pub fn date_1904(&self) -> bool {
        self.workbook
            .map_or(false, |wb| wb.settings().date_1904)
    }

    fn sheet_index(&self, sheet: Option<&str>) -> Option<usize> {
        match (sheet, self.workbook) {
            (Some(name), Some(wb)) => wb.sheet_index(name),
            (Some(_), None) => None,
            (None, _) => Some(self.current_sheet),
        }
    }

    /// Value of a cell; formula cells yield their last computed value
    pub fn get_cell_value(&self, sheet: Option<&str>, row: u32, col: u16) -> FormulaValue {
        let Some(workbook) = self.workbook else {
            return FormulaValue::Empty;
        };
        let Some(worksheet) = self
            .sheet_index(sheet)
            .and_then(|idx| workbook.worksheet(idx))
        else {
            return FormulaValue::Error(CellError::Ref);
        };

        worksheet
            .cell_at(row, col)
            .map_or(FormulaValue::Empty, FormulaValue::from)
    }

    /// Values of a range; only the sheet's stored cells are visited
    pub fn get_range_values(&self, sheet: Option<&str>, range: CellRange) -> FormulaValue {
        let mut grid = Grid::blank(range.row_count() as usize, range.col_count() as usize);

        let Some(workbook) = self.workbook else {
            return FormulaValue::Array(grid);
        };
        let Some(worksheet) = self
            .sheet_index(sheet)
            .and_then(|idx| workbook.worksheet(idx))
        else {
            return FormulaValue::Error(CellError::Ref);
        };

        for (row, col, value) in worksheet.cells_in(range) {
            grid.push(
                (row - range.start.row) as usize,
                (col - range.start.col) as usize,
                FormulaValue::from(value),
            );
        }

        FormulaValue::Array(grid)
    }

    /// Resolve a defined name to its value
    ///
    /// The name's target text is parsed as an expression and evaluated, so
    /// references (`Sheet1!$B$1`), constants (`0.2`) and formulas
    /// (`SUM(Data!A:A)`) all work.
    pub fn resolve_name(&self, name: &str) -> FormulaResult<FormulaValue> {
        let Some(named) = self
            .workbook
            .and_then(|wb| wb.get_named_range(name, self.current_sheet))
        else {
            log::debug!("Undefined name '{}'", name);
            return Ok(FormulaValue::Error(CellError::Name));
        };

        if self.name_depth >= MAX_NAME_DEPTH {
            return Ok(FormulaValue::Error(CellError::Ref));
        }

        let ast = match crate::parser::parse_expression_text(&named.refers_to) {
            Ok(ast) => ast,
            Err(e) => {
                log::debug!("Name '{}' does not parse: {}", name, e);
                return Ok(FormulaValue::Error(CellError::Name));
            }
        };

        let inner = Self {
            name_depth: self.name_depth + 1,
            ..*self
        };
        evaluate(&ast, &inner)
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        // only function arguments can be omitted; they read as 0 / FALSE
        FormulaExpr::Missing => Ok(FormulaValue::Number(0.0)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        // === References ===
        FormulaExpr::CellRef(cell_ref) => Ok(ctx.get_cell_value(
            cell_ref.sheet.as_deref(),
            cell_ref.address.row,
            cell_ref.address.col,
        )),

        FormulaExpr::RangeRef(range_ref) => {
            Ok(ctx.get_range_values(range_ref.sheet.as_deref(), range_ref.range))
        }

        FormulaExpr::NameRef(name) => ctx.resolve_name(name),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut result_row = Vec::with_capacity(row.len());
                for expr in row {
                    result_row.push(evaluate(expr, ctx)?);
                }
                result_rows.push(result_row);
            }
            Ok(FormulaValue::Array(Grid::from_rows(result_rows)))
        }
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    if op == BinaryOperator::Range {
        // Only plain `A1:B2` ranges are supported; those never reach here
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let left_val = evaluate(left, ctx)?.into_scalar();
    let right_val = evaluate(right, ctx)?.into_scalar();

    // Errors propagate left to right
    if let Some(e) = left_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    if let Some(e) = right_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let arithmetic = |f: fn(f64, f64) -> FormulaValue| -> FormulaValue {
        match (left_val.to_number(), right_val.to_number()) {
            (Ok(l), Ok(r)) => f(l, r),
            (Err(e), _) | (_, Err(e)) => FormulaValue::Error(e),
        }
    };

    let result = match op {
        // Arithmetic operators
        BinaryOperator::Add => arithmetic(|l, r| FormulaValue::from_number(l + r)),
        BinaryOperator::Subtract => arithmetic(|l, r| FormulaValue::from_number(l - r)),
        BinaryOperator::Multiply => arithmetic(|l, r| FormulaValue::from_number(l * r)),
        BinaryOperator::Divide => arithmetic(|l, r| {
            if r == 0.0 {
                FormulaValue::Error(CellError::Div0)
            } else {
                FormulaValue::from_number(l / r)
            }
        }),
        BinaryOperator::Power => arithmetic(|l, r| {
            if l == 0.0 && r < 0.0 {
                FormulaValue::Error(CellError::Div0)
            } else {
                FormulaValue::from_number(l.powf(r))
            }
        }),

        // Comparison operators
        BinaryOperator::Equal => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) == Ordering::Equal)
        }
        BinaryOperator::NotEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) != Ordering::Equal)
        }
        BinaryOperator::LessThan => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) == Ordering::Less)
        }
        BinaryOperator::LessEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) != Ordering::Greater)
        }
        BinaryOperator::GreaterThan => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) == Ordering::Greater)
        }
        BinaryOperator::GreaterEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) != Ordering::Less)
        }

        // Concatenation
        BinaryOperator::Concat => {
            FormulaValue::String(left_val.as_string() + &right_val.as_string())
        }

        BinaryOperator::Range => FormulaValue::Error(CellError::Value),
    };

    Ok(result)
}

/// Compare two scalar values the way spreadsheet comparison operators do
///
/// Empty takes the type of the other side (0, "" or FALSE). Mixed types
/// order number < text < boolean; text compares case-insensitively.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    fn rank(v: &FormulaValue) -> u8 {
        match v {
            FormulaValue::Number(_) | FormulaValue::Empty => 0,
            FormulaValue::String(_) => 1,
            FormulaValue::Boolean(_) => 2,
            FormulaValue::Error(_) | FormulaValue::Array(_) => 3,
        }
    }

    fn blank_like(other: &FormulaValue) -> FormulaValue {
        match other {
            FormulaValue::String(_) => FormulaValue::String(String::new()),
            FormulaValue::Boolean(_) => FormulaValue::Boolean(false),
            _ => FormulaValue::Number(0.0),
        }
    }

    let (left, right) = match (left, right) {
        (FormulaValue::Empty, other) => (blank_like(other), other.clone()),
        (other, FormulaValue::Empty) => (other.clone(), blank_like(other)),
        (l, r) => (l.clone(), r.clone()),
    };

    match (&left, &right) {
        (FormulaValue::Number(l), FormulaValue::Number(r)) => {
            l.partial_cmp(r).unwrap_or(Ordering::Equal)
        }
        (FormulaValue::String(l), FormulaValue::String(r)) => {
            l.to_lowercase().cmp(&r.to_lowercase())
        }
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => l.cmp(r),
        (FormulaValue::Error(l), FormulaValue::Error(r)) => l.cmp(r),
        (l, r) => rank(l).cmp(&rank(r)),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?;

    let n = match val.to_number() {
        Ok(n) => n,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    Ok(match op {
        UnaryOperator::Negate => FormulaValue::Number(-n),
        UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
    })
}

/// Evaluate a function call
///
/// Arguments are evaluated eagerly. A direct cell reference argument is
/// passed as a 1x1 array so aggregate functions can tell it apart from a
/// typed-in literal (`SUM(A1)` skips text in A1, `SUM("x")` does not).
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let Some(func) = FunctionRegistry::global().get(name) else {
        log::debug!("Unknown function {}", name);
        return Ok(FormulaValue::Error(CellError::Name));
    };

    if !func.accepts(args.len()) {
        log::debug!("{} called with {} arguments", name, args.len());
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        let value = evaluate(arg, ctx)?;
        evaluated_args.push(match arg {
            FormulaExpr::CellRef(_) => FormulaValue::Array(Grid::single(value)),
            _ => value,
        });
    }

    Ok((func.implementation)(&evaluated_args, ctx).unwrap_or_else(FormulaValue::Error))
}
