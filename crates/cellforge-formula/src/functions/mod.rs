//! Built-in spreadsheet functions
//!
//! Every function receives its arguments already evaluated. Ranges arrive
//! as [`FormulaValue::Array`]; so do direct cell references (as 1x1 arrays),
//! which lets aggregates skip text in referenced cells. Implementations
//! return `Err(CellError)` for spreadsheet errors; the evaluator turns that
//! into an error value.

pub mod criteria;
pub mod date;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::ast::FormulaExpr;
use crate::evaluator::{EvaluationContext, FormulaValue};
use cellforge_core::CellError;

/// Result of a built-in function
pub type FunctionResult = Result<FormulaValue, CellError>;

/// Function implementation signature
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FunctionResult;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Is volatile (result changes between calculations)
    pub volatile: bool,
}

impl FunctionDef {
    pub fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation,
            volatile: false,
        }
    }

    /// Mark as volatile
    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    /// Whether `count` arguments are allowed
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDef>,
}

static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        math::register(&mut registry);
        statistical::register(&mut registry);
        criteria::register(&mut registry);
        logical::register(&mut registry);
        text::register(&mut registry);
        info::register(&mut registry);
        lookup::register(&mut registry);
        date::register(&mut registry);

        registry
    }

    /// Shared registry of built-in functions
    pub fn global() -> &'static FunctionRegistry {
        FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_uppercase().as_str())
    }

    /// Whether `name` is a known volatile function
    pub fn is_volatile(&self, name: &str) -> bool {
        self.get(name).map_or(false, |def| def.volatile)
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Names of all registered functions, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the expression calls a volatile function anywhere
pub fn contains_volatile_function(expr: &FormulaExpr) -> bool {
    let registry = FunctionRegistry::global();
    let mut volatile = false;
    expr.walk(&mut |node| {
        if let FormulaExpr::Function { name, .. } = node {
            volatile |= registry.is_volatile(name);
        }
    });
    volatile
}

/// Calls the evaluator cannot honour: unknown functions and wrong arity
///
/// Returns one human-readable message per problem, in formula order.
pub fn check_calls(expr: &FormulaExpr) -> Vec<String> {
    let registry = FunctionRegistry::global();
    let mut problems = Vec::new();
    expr.walk(&mut |node| {
        if let FormulaExpr::Function { name, args } = node {
            match registry.get(name) {
                None => problems.push(format!("unknown function {}", name)),
                Some(def) if !def.accepts(args.len()) => problems.push(format!(
                    "{} does not take {} argument{}",
                    name,
                    args.len(),
                    if args.len() == 1 { "" } else { "s" }
                )),
                Some(_) => {}
            }
        }
    });
    problems
}

// === Argument helpers shared by the function modules ===

/// Scalar view of argument `i`; a missing argument is empty
pub(crate) fn scalar_arg(args: &[FormulaValue], i: usize) -> FormulaValue {
    args.get(i).map_or(FormulaValue::Empty, FormulaValue::scalar)
}

pub(crate) fn number_arg(args: &[FormulaValue], i: usize) -> Result<f64, CellError> {
    scalar_arg(args, i).to_number()
}

/// Optional numeric argument; missing or omitted (`""`) gives `default`
pub(crate) fn number_arg_or(
    args: &[FormulaValue],
    i: usize,
    default: f64,
) -> Result<f64, CellError> {
    match args.get(i).map(FormulaValue::scalar) {
        None | Some(FormulaValue::Empty) => Ok(default),
        Some(FormulaValue::String(s)) if s.is_empty() => Ok(default),
        Some(v) => v.to_number(),
    }
}

pub(crate) fn text_arg(args: &[FormulaValue], i: usize) -> Result<String, CellError> {
    scalar_arg(args, i).to_text()
}

pub(crate) fn bool_arg(args: &[FormulaValue], i: usize) -> Result<bool, CellError> {
    scalar_arg(args, i).to_bool()
}

/// Numbers for aggregate functions
///
/// Typed-in arguments are coerced (`"3"` is 3, TRUE is 1, `"x"` is
/// `#VALUE!`); inside ranges and references only numbers count. The first
/// error encountered is returned.
pub(crate) fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(_) => {
                for value in arg.iter_values() {
                    match value {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => numbers.push(other.to_number()?),
        }
    }
    Ok(numbers)
}

/// Non-negative integer argument used as a 1-based position
pub(crate) fn position_arg(args: &[FormulaValue], i: usize) -> Result<usize, CellError> {
    let n = number_arg(args, i)?.trunc();
    if n < 0.0 {
        return Err(CellError::Value);
    }
    Ok(n as usize)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::error::FormulaResult;
    use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
    use crate::parser::parse_formula;
    use cellforge_core::Workbook;

    pub fn eval(formula: &str) -> FormulaResult<FormulaValue> {
        let ast = parse_formula(formula)?;
        evaluate(&ast, &EvaluationContext::simple()).map(FormulaValue::into_scalar)
    }

    pub fn eval_in(workbook: &Workbook, formula: &str) -> FormulaValue {
        let ast = parse_formula(formula).unwrap();
        let ctx = EvaluationContext::new(Some(workbook), 0, 0, 0);
        evaluate(&ast, &ctx).unwrap().into_scalar()
    }

    pub fn num(formula: &str) -> f64 {
        match eval(formula).unwrap() {
            FormulaValue::Number(n) => n,
            other => panic!("{} gave {:?}", formula, other),
        }
    }

    /// Sheet1 with A1:A5 = 1..5, B1:B5 = fruit names, C1 = text, D1 = TRUE
    pub fn sample_workbook() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        let fruit = ["apple", "banana", "cherry", "apple", "date"];
        for (i, name) in fruit.iter().enumerate() {
            sheet.set_cell_value_at(i as u32, 0, (i + 1) as f64).unwrap();
            sheet.set_cell_value_at(i as u32, 1, *name).unwrap();
        }
        sheet.set_cell_value("C1", "hello").unwrap();
        sheet.set_cell_value("D1", true).unwrap();
        wb
    }
}
