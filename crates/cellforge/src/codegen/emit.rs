//! Formula AST to Rust expression text

use std::fmt;

use cellforge_core::{CellError, CellRange, CellValue, Workbook};
use cellforge_formula::{
    parse_expression_text, BinaryOperator, FormulaExpr, FunctionRegistry, UnaryOperator,
};

/// Same limit as the evaluator: deeper name chains read as `#REF!`
const MAX_NAME_DEPTH: u8 = 16;

/// Functions the generated runtime implements
pub const TRANSLATABLE: &[&str] = &[
    "SUM",
    "AVERAGE",
    "MIN",
    "MAX",
    "COUNT",
    "COUNTA",
    "PRODUCT",
    "ABS",
    "ROUND",
    "INT",
    "MOD",
    "POWER",
    "SQRT",
    "IF",
    "AND",
    "OR",
    "NOT",
    "IFERROR",
    "CONCATENATE",
    "CONCAT",
    "LEN",
    "UPPER",
    "LOWER",
    "LEFT",
    "RIGHT",
    "TRIM",
];

/// Functions that hand one of their arguments back unchanged, references
/// included
const PASS_THROUGH: &[&str] = &["IF", "IFERROR"];

/// Why a formula keeps its conversion-time value in the generated program
#[derive(Debug, Clone, PartialEq)]
pub enum FreezeReason {
    Unparseable,
    UnknownFunction(String),
    Volatile(String),
    Unsupported(String),
    Arity(String),
    /// Defined name whose definition is not a cell or range reference
    Name(String),
    ArrayConstant,
}

impl fmt::Display for FreezeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreezeReason::Unparseable => write!(f, "formula does not parse"),
            FreezeReason::UnknownFunction(name) => write!(f, "unknown function {}", name),
            FreezeReason::Volatile(name) => write!(f, "volatile function {}", name),
            FreezeReason::Unsupported(name) => write!(f, "function {} is not translated", name),
            FreezeReason::Arity(name) => write!(f, "wrong number of arguments to {}", name),
            FreezeReason::Name(name) => write!(f, "name {} is not a reference", name),
            FreezeReason::ArrayConstant => write!(f, "array constant"),
        }
    }
}

enum NameTarget {
    Error(CellError),
    Reference(FormulaExpr),
}

/// Translates the formulas of one sheet
pub struct Translator<'a> {
    workbook: &'a Workbook,
    sheet: usize,
}

impl<'a> Translator<'a> {
    pub fn new(workbook: &'a Workbook, sheet: usize) -> Self {
        Self { workbook, sheet }
    }

    /// Rust expression of type `Value` computing `expr` from the model `m`
    pub fn translate(&self, expr: &FormulaExpr) -> Result<String, FreezeReason> {
        self.value(expr, 0)
    }

    fn sheet_of(&self, sheet: Option<&str>) -> Option<usize> {
        match sheet {
            Some(name) => self.workbook.sheet_index(name),
            None => Some(self.sheet),
        }
    }

    fn value(&self, expr: &FormulaExpr, depth: u8) -> Result<String, FreezeReason> {
        Ok(match expr {
            FormulaExpr::Number(n) => format!("Value::Num({})", float_literal(*n)),
            FormulaExpr::String(s) => format!("Value::Text({:?}.to_string())", s),
            FormulaExpr::Boolean(b) => format!("Value::Bool({})", b),
            FormulaExpr::Missing => "Value::Num(0.0)".to_string(),
            FormulaExpr::Error(e) => error_value(*e),
            FormulaExpr::CellRef(r) => match self.sheet_of(r.sheet.as_deref()) {
                Some(sheet) => format!("m.get({}, {}, {})", sheet, r.address.row, r.address.col),
                None => error_value(CellError::Ref),
            },
            FormulaExpr::RangeRef(r) => match self.sheet_of(r.sheet.as_deref()) {
                Some(sheet) => format!("m.area({}, {})", sheet, bounds(&r.range)),
                None => error_value(CellError::Ref),
            },
            FormulaExpr::NameRef(name) => match self.name_target(name, depth)? {
                NameTarget::Error(e) => error_value(e),
                NameTarget::Reference(target) => return self.value(&target, depth + 1),
            },
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Range,
                ..
            } => error_value(CellError::Value),
            FormulaExpr::BinaryOp { op, left, right } => format!(
                "{}({}, {})",
                operator_fn(*op),
                self.value(left, depth)?,
                self.value(right, depth)?
            ),
            FormulaExpr::UnaryOp { op, operand } => {
                let f = match op {
                    UnaryOperator::Negate => "neg",
                    UnaryOperator::Percent => "percent",
                };
                format!("{}({})", f, self.value(operand, depth)?)
            }
            FormulaExpr::Function { name, args } => {
                let call = self.call(name, args, depth)?;
                if PASS_THROUGH.contains(&name.as_str()) {
                    format!("{}.scalar()", call)
                } else {
                    call
                }
            }
            FormulaExpr::Array(_) => return Err(FreezeReason::ArrayConstant),
        })
    }

    /// Expression of type `Arg`: references keep their cells so aggregates
    /// can skip text and blanks in them
    fn arg(&self, expr: &FormulaExpr, depth: u8) -> Result<String, FreezeReason> {
        Ok(match expr {
            FormulaExpr::CellRef(_) => format!("Arg::Range(vec![{}])", self.value(expr, depth)?),
            FormulaExpr::RangeRef(r) => match self.sheet_of(r.sheet.as_deref()) {
                Some(sheet) => format!("m.range({}, {})", sheet, bounds(&r.range)),
                None => format!("Arg::Val({})", error_value(CellError::Ref)),
            },
            FormulaExpr::NameRef(name) => match self.name_target(name, depth)? {
                NameTarget::Error(e) => format!("Arg::Val({})", error_value(e)),
                // A name for a single cell hands over its value, not the cell
                NameTarget::Reference(target @ FormulaExpr::CellRef(_)) => {
                    format!("Arg::Val({})", self.value(&target, depth + 1)?)
                }
                NameTarget::Reference(target) => self.arg(&target, depth + 1)?,
            },
            FormulaExpr::Function { name, args } if PASS_THROUGH.contains(&name.as_str()) => {
                self.call(name, args, depth)?
            }
            other => format!("Arg::Val({})", self.value(other, depth)?),
        })
    }

    fn call(&self, name: &str, args: &[FormulaExpr], depth: u8) -> Result<String, FreezeReason> {
        let Some(def) = FunctionRegistry::global().get(name) else {
            return Err(FreezeReason::UnknownFunction(name.to_string()));
        };
        if def.volatile {
            return Err(FreezeReason::Volatile(name.to_string()));
        }
        if !TRANSLATABLE.contains(&name) {
            return Err(FreezeReason::Unsupported(name.to_string()));
        }
        if !def.accepts(args.len()) {
            return Err(FreezeReason::Arity(name.to_string()));
        }

        let args = args
            .iter()
            .map(|arg| self.arg(arg, depth))
            .collect::<Result<Vec<_>, _>>()?;
        let function = format!("f_{}", name.to_ascii_lowercase());
        Ok(if PASS_THROUGH.contains(&name) {
            format!("{}(vec![{}])", function, args.join(", "))
        } else {
            format!("{}(&[{}])", function, args.join(", "))
        })
    }

    fn name_target(&self, name: &str, depth: u8) -> Result<NameTarget, FreezeReason> {
        let Some(named) = self.workbook.get_named_range(name, self.sheet) else {
            return Ok(NameTarget::Error(CellError::Name));
        };
        if depth >= MAX_NAME_DEPTH {
            return Ok(NameTarget::Error(CellError::Ref));
        }
        match parse_expression_text(&named.refers_to) {
            Ok(
                target @ (FormulaExpr::CellRef(_)
                | FormulaExpr::RangeRef(_)
                | FormulaExpr::NameRef(_)),
            ) => Ok(NameTarget::Reference(target)),
            Ok(_) => Err(FreezeReason::Name(name.to_string())),
            Err(_) => Ok(NameTarget::Error(CellError::Name)),
        }
    }
}

fn operator_fn(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "add",
        BinaryOperator::Subtract => "sub",
        BinaryOperator::Multiply => "mul",
        BinaryOperator::Divide => "div",
        BinaryOperator::Power => "pow",
        BinaryOperator::Equal => "eq",
        BinaryOperator::NotEqual => "ne",
        BinaryOperator::LessThan => "lt",
        BinaryOperator::LessEqual => "le",
        BinaryOperator::GreaterThan => "gt",
        BinaryOperator::GreaterEqual => "ge",
        BinaryOperator::Concat => "concat",
        // handled before dispatch
        BinaryOperator::Range => "range_op",
    }
}

fn bounds(range: &CellRange) -> String {
    format!(
        "{}, {}, {}, {}",
        range.start.row, range.start.col, range.end.row, range.end.col
    )
}

/// An `f64` literal that always reads back as the same value
pub fn float_literal(n: f64) -> String {
    if n.is_nan() {
        "std::f64::NAN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "std::f64::INFINITY".to_string()
        } else {
            "std::f64::NEG_INFINITY".to_string()
        }
    } else {
        // `{:?}` keeps a decimal point or exponent, so the literal is a float
        format!("{:?}", n)
    }
}

fn error_value(e: CellError) -> String {
    format!("Value::Err({:?})", e.as_str())
}

/// `Value` expression for a stored cell value
pub fn value_literal(value: &CellValue) -> String {
    match value.effective_value() {
        CellValue::Empty | CellValue::Formula { .. } => "Value::Empty".to_string(),
        CellValue::Number(n) if !n.is_finite() => error_value(CellError::Num),
        CellValue::Number(n) => format!("Value::Num({})", float_literal(*n)),
        CellValue::Text(s) => format!("Value::Text({:?}.to_string())", s),
        CellValue::Boolean(b) => format!("Value::Bool({})", b),
        CellValue::Error(e) => error_value(*e),
    }
}

/// `Lit` expression for a stored cell value, usable in a `const` table
pub fn const_literal(value: &CellValue) -> String {
    match value.effective_value() {
        CellValue::Empty | CellValue::Formula { .. } => "Lit::Empty".to_string(),
        CellValue::Number(n) if !n.is_finite() => format!("Lit::Err({:?})", CellError::Num.as_str()),
        CellValue::Number(n) => format!("Lit::Num({})", float_literal(*n)),
        CellValue::Text(s) => format!("Lit::Text({:?})", s),
        CellValue::Boolean(b) => format!("Lit::Bool({})", b),
        CellValue::Error(e) => format!("Lit::Err({:?})", e.as_str()),
    }
}
