//! Formula Abstract Syntax Tree types

use cellforge_core::{CellAddress, CellError, CellRange};
use std::fmt;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(CellError),
    /// Omitted function argument, as in `IF(A1,,2)`
    Missing,

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Defined name
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    /// Function call; `name` is upper case without `_xlfn.` style prefixes
    Function { name: String, args: Vec<FormulaExpr> },

    // === Array constant ===
    /// `{1,2;3,4}` - outer vec is rows
    Array(Vec<Vec<FormulaExpr>>),
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,

    /// `:` between operands that are not both plain cell references
    Range,
}

impl BinaryOperator {
    /// Operator as written in formula text
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
            BinaryOperator::Range => ":",
        }
    }

    /// Binding strength; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual => 1,
            BinaryOperator::Concat => 2,
            BinaryOperator::Add | BinaryOperator::Subtract => 3,
            BinaryOperator::Multiply | BinaryOperator::Divide => 4,
            BinaryOperator::Power => 5,
            BinaryOperator::Range => 8,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Prefix `-`
    Negate,
    /// Postfix `%`
    Percent,
}

const PREC_NEGATE: u8 = 6;
const PREC_PERCENT: u8 = 7;
const PREC_PRIMARY: u8 = 9;

impl FormulaExpr {
    fn precedence(&self) -> u8 {
        match self {
            FormulaExpr::BinaryOp { op, .. } => op.precedence(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                ..
            } => PREC_NEGATE,
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                ..
            } => PREC_PERCENT,
            FormulaExpr::Number(n) if *n < 0.0 => PREC_NEGATE,
            _ => PREC_PRIMARY,
        }
    }

    /// Copy of this expression with every relative reference moved by
    /// `(drow, dcol)`.
    ///
    /// Used to expand shared formulas: the anchor formula is written once and
    /// followers are the anchor shifted by their distance from it. References
    /// pushed off the grid become `#REF!`.
    pub fn shifted(&self, drow: i64, dcol: i64) -> FormulaExpr {
        match self {
            FormulaExpr::CellRef(r) => match r.address.offset(drow, dcol) {
                Some(address) => FormulaExpr::CellRef(CellReference {
                    sheet: r.sheet.clone(),
                    address,
                }),
                None => FormulaExpr::Error(CellError::Ref),
            },
            FormulaExpr::RangeRef(r) => match r.range.offset(drow, dcol) {
                Some(range) => FormulaExpr::RangeRef(RangeReference {
                    sheet: r.sheet.clone(),
                    range,
                }),
                None => FormulaExpr::Error(CellError::Ref),
            },
            FormulaExpr::BinaryOp { op, left, right } => FormulaExpr::BinaryOp {
                op: *op,
                left: Box::new(left.shifted(drow, dcol)),
                right: Box::new(right.shifted(drow, dcol)),
            },
            FormulaExpr::UnaryOp { op, operand } => FormulaExpr::UnaryOp {
                op: *op,
                operand: Box::new(operand.shifted(drow, dcol)),
            },
            FormulaExpr::Function { name, args } => FormulaExpr::Function {
                name: name.clone(),
                args: args.iter().map(|a| a.shifted(drow, dcol)).collect(),
            },
            FormulaExpr::Array(rows) => FormulaExpr::Array(
                rows.iter()
                    .map(|row| row.iter().map(|e| e.shifted(drow, dcol)).collect())
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Render as formula text with the leading `=`
    pub fn to_formula_string(&self) -> String {
        format!("={}", self)
    }

    /// Visit this expression and every sub-expression, parents first
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a FormulaExpr)) {
        visit(self);
        match self {
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.walk(visit),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            FormulaExpr::Array(rows) => {
                for expr in rows.iter().flatten() {
                    expr.walk(visit);
                }
            }
            _ => {}
        }
    }
}

/// Write `sheet!` with quotes when the name needs them
pub(crate) fn write_sheet_prefix(f: &mut fmt::Formatter<'_>, sheet: &str) -> fmt::Result {
    if sheet_needs_quotes(sheet) {
        write!(f, "'{}'!", sheet.replace('\'', "''"))
    } else {
        write!(f, "{}!", sheet)
    }
}

fn sheet_needs_quotes(sheet: &str) -> bool {
    let mut chars = sheet.chars();
    let starts_ok = chars
        .next()
        .map_or(false, |c| c.is_alphabetic() || c == '_');
    let rest_ok = sheet
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    !starts_ok || !rest_ok || CellAddress::parse(sheet).is_ok()
}

pub(crate) fn format_number_literal(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write_sheet_prefix(f, sheet)?;
        }
        write!(f, "{}", self.address)
    }
}

impl fmt::Display for RangeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write_sheet_prefix(f, sheet)?;
        }
        match self.range.line_label() {
            Some(label) => f.write_str(&label),
            // Keep the `A1:A1` form so the text still parses as a range
            None => write!(f, "{}:{}", self.range.start, self.range.end),
        }
    }
}

impl fmt::Display for FormulaExpr {
    /// Canonical formula text without the leading `=`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Number(n) => write!(f, "{}", format_number_literal(*n)),
            FormulaExpr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            FormulaExpr::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            FormulaExpr::Error(e) => write!(f, "{}", e),
            FormulaExpr::Missing => Ok(()),
            FormulaExpr::CellRef(r) => write!(f, "{}", r),
            FormulaExpr::RangeRef(r) => write!(f, "{}", r),
            FormulaExpr::NameRef(name) => write!(f, "{}", name),
            FormulaExpr::BinaryOp { op, left, right } => {
                let prec = op.precedence();
                // `^` is right-associative, everything else left-associative
                let (left_min, right_min) = if *op == BinaryOperator::Power {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                write_operand(f, left, left_min)?;
                write!(f, "{}", op.symbol())?;
                write_operand(f, right, right_min)
            }
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => {
                write!(f, "-")?;
                write_operand(f, operand, PREC_NEGATE)
            }
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand,
            } => {
                write_operand(f, operand, PREC_PERCENT)?;
                write!(f, "%")
            }
            FormulaExpr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            FormulaExpr::Array(rows) => {
                write!(f, "{{")?;
                for (r, row) in rows.iter().enumerate() {
                    if r > 0 {
                        write!(f, ";")?;
                    }
                    for (c, expr) in row.iter().enumerate() {
                        if c > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", expr)?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &FormulaExpr, min_prec: u8) -> fmt::Result {
    if expr.precedence() < min_prec {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_formula;

    fn render(formula: &str) -> String {
        parse_formula(formula).unwrap().to_formula_string()
    }

    #[test]
    fn test_display_keeps_needed_parentheses() {
        assert_eq!(render("=(1+2)*3"), "=(1+2)*3");
        assert_eq!(render("=1+2*3"), "=1+2*3");
        assert_eq!(render("=1-(2-3)"), "=1-(2-3)");
        assert_eq!(render("=(2^3)^2"), "=(2^3)^2");
        assert_eq!(render("=2^3^2"), "=2^3^2");
        assert_eq!(render("=-(A1+1)"), "=-(A1+1)");
        assert_eq!(render("=(A1+B1)%"), "=(A1+B1)%");
    }

    #[test]
    fn test_display_references_and_literals() {
        assert_eq!(
            render("=SUM('My Sheet'!$A$1:B2, Data!C3)"),
            "=SUM('My Sheet'!$A$1:B2,Data!C3)"
        );
        assert_eq!(render("=\"say \"\"hi\"\"\"&TRUE"), "=\"say \"\"hi\"\"\"&TRUE");
        assert_eq!(render("={1,2;3,4}"), "={1,2;3,4}");
        assert_eq!(render("=0.5+#N/A"), "=0.5+#N/A");
    }

    #[test]
    fn test_shift_moves_relative_parts_only() {
        let ast = parse_formula("=A1*$B$1+SUM(A$1:A1)").unwrap();
        assert_eq!(
            ast.shifted(2, 1).to_formula_string(),
            "=B3*$B$1+SUM(B$1:B3)"
        );
    }

    #[test]
    fn test_shift_off_grid_becomes_ref_error() {
        let ast = parse_formula("=A1+1").unwrap();
        assert_eq!(ast.shifted(-1, 0).to_formula_string(), "=#REF!+1");
    }
}
