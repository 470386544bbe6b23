//! Conditional aggregates: SUMIF, COUNTIF, AVERAGEIF, SUMIFS, COUNTIFS
//!
//! Criteria can be:
//! - a number or boolean: equality (`5`, `TRUE`)
//! - text: case-insensitive match with `*` / `?` wildcards (`"app*"`)
//! - a comparison: `">5"`, `">=10"`, `"<>0"`, `"=apple"`, `"<b"`
//! - empty text: matches blank cells (`""`, `"="`); `"<>"` matches non-blank ones

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::{FunctionDef, FunctionRegistry, FunctionResult};
use crate::evaluator::{parse_numeric_text, EvaluationContext, FormulaValue, Grid};
use cellforge_core::CellError;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("SUMIF", 2, Some(3), fn_sumif));
    registry.register(FunctionDef::new("COUNTIF", 2, Some(2), fn_countif));
    registry.register(FunctionDef::new("AVERAGEIF", 2, Some(3), fn_averageif));
    registry.register(FunctionDef::new("SUMIFS", 3, None, fn_sumifs));
    registry.register(FunctionDef::new("COUNTIFS", 2, None, fn_countifs));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl ComparisonOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Equal => ordering == Ordering::Equal,
            ComparisonOp::NotEqual => ordering != Ordering::Equal,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::LessEqual => ordering != Ordering::Greater,
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::GreaterEqual => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Number(f64),
    Boolean(bool),
    /// Lower-cased pattern
    Text(String),
    Blank,
}

/// Criteria matcher for the *IF / *IFS functions
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaMatcher {
    op: ComparisonOp,
    operand: Operand,
}

impl CriteriaMatcher {
    /// Build a matcher from an evaluated criteria argument
    pub fn new(criteria: &FormulaValue) -> Result<Self, CellError> {
        let (op, operand) = match criteria.scalar() {
            FormulaValue::Number(n) => (ComparisonOp::Equal, Operand::Number(n)),
            FormulaValue::Boolean(b) => (ComparisonOp::Equal, Operand::Boolean(b)),
            FormulaValue::Empty => (ComparisonOp::Equal, Operand::Blank),
            FormulaValue::String(s) => Self::parse_text(&s),
            FormulaValue::Error(e) => return Err(e),
            FormulaValue::Array(_) => return Err(CellError::Value),
        };
        Ok(Self { op, operand })
    }

    fn parse_text(s: &str) -> (ComparisonOp, Operand) {
        const OPERATORS: [(&str, ComparisonOp); 6] = [
            (">=", ComparisonOp::GreaterEqual),
            ("<=", ComparisonOp::LessEqual),
            ("<>", ComparisonOp::NotEqual),
            (">", ComparisonOp::GreaterThan),
            ("<", ComparisonOp::LessThan),
            ("=", ComparisonOp::Equal),
        ];

        let (op, rest) = OPERATORS
            .iter()
            .find_map(|(prefix, op)| s.strip_prefix(*prefix).map(|rest| (*op, rest)))
            .unwrap_or((ComparisonOp::Equal, s));

        let operand = if rest.is_empty() {
            Operand::Blank
        } else if let Some(n) = parse_numeric_text(rest) {
            Operand::Number(n)
        } else if rest.eq_ignore_ascii_case("TRUE") {
            Operand::Boolean(true)
        } else if rest.eq_ignore_ascii_case("FALSE") {
            Operand::Boolean(false)
        } else {
            Operand::Text(rest.to_lowercase())
        };

        (op, operand)
    }

    /// Whether a cell value satisfies the criteria
    pub fn matches(&self, value: &FormulaValue) -> bool {
        let ordering = match (&self.operand, value) {
            (Operand::Blank, v) => {
                let blank = match v {
                    FormulaValue::Empty => true,
                    FormulaValue::String(s) => s.is_empty(),
                    _ => false,
                };
                return match self.op {
                    ComparisonOp::Equal => blank,
                    ComparisonOp::NotEqual => !blank,
                    _ => false,
                };
            }
            (Operand::Number(n), FormulaValue::Number(m)) => m.partial_cmp(n),
            (Operand::Number(n), FormulaValue::String(s)) if self.op == ComparisonOp::Equal => {
                return parse_numeric_text(s) == Some(*n);
            }
            (Operand::Boolean(b), FormulaValue::Boolean(v)) => Some(v.cmp(b)),
            (Operand::Text(pattern), FormulaValue::String(s)) => {
                let s = s.to_lowercase();
                match self.op {
                    ComparisonOp::Equal => return wildcard_match(pattern, &s),
                    ComparisonOp::NotEqual => return !wildcard_match(pattern, &s),
                    _ => Some(s.as_str().cmp(pattern.as_str())),
                }
            }
            // Different types never compare equal
            _ => None,
        };

        match ordering {
            Some(ordering) => self.op.holds(ordering),
            None => self.op == ComparisonOp::NotEqual,
        }
    }
}

/// Case-sensitive glob match with `*`, `?` and `~` escapes
pub(super) fn wildcard_match(pattern: &str, text: &str) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Token {
        Literal(char),
        AnyOne,
        AnyMany,
    }

    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '~' => Token::Literal(chars.next().unwrap_or('~')),
            '?' => Token::AnyOne,
            '*' => Token::AnyMany,
            c => Token::Literal(c),
        });
    }

    let text: Vec<char> = text.chars().collect();
    // matched[j]: tokens so far match text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for token in tokens {
        let mut next = vec![false; text.len() + 1];
        match token {
            Token::AnyMany => {
                let mut reachable = false;
                for j in 0..=text.len() {
                    reachable |= matched[j];
                    next[j] = reachable;
                }
            }
            Token::AnyOne => {
                for j in 0..text.len() {
                    next[j + 1] = matched[j];
                }
            }
            Token::Literal(c) => {
                for j in 0..text.len() {
                    next[j + 1] = matched[j] && text[j] == c;
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

/// A range argument; a scalar is a 1x1 range
fn grid(value: &FormulaValue) -> Cow<'_, Grid> {
    match value {
        FormulaValue::Array(grid) => Cow::Borrowed(grid),
        other => Cow::Owned(Grid::single(other.clone())),
    }
}

/// Criteria ranges of one shape, each with its matcher
struct Conditions<'a> {
    pairs: Vec<(Cow<'a, Grid>, CriteriaMatcher)>,
    shape: (usize, usize),
}

impl<'a> Conditions<'a> {
    /// Conditions from `(range, criteria)` argument pairs
    fn new(args: &'a [FormulaValue]) -> Result<Self, CellError> {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(CellError::Value);
        }
        let shape = grid(&args[0]).dimensions();
        let mut pairs = Vec::with_capacity(args.len() / 2);
        for pair in args.chunks(2) {
            let range = grid(&pair[0]);
            if range.dimensions() != shape {
                return Err(CellError::Value);
            }
            pairs.push((range, CriteriaMatcher::new(&pair[1])?));
        }
        Ok(Self { pairs, shape })
    }

    fn hold_at(&self, row: usize, col: usize) -> bool {
        row < self.shape.0
            && col < self.shape.1
            && self
                .pairs
                .iter()
                .all(|(range, criteria)| criteria.matches(range.get(row, col)))
    }

    /// Numbers of `values` at the positions where every condition holds
    ///
    /// Blank positions of `values` contribute nothing, so only its stored
    /// cells are visited.
    fn numbers_in(&self, values: &Grid) -> Result<Vec<f64>, CellError> {
        let mut numbers = Vec::new();
        for (r, c, value) in values.entries() {
            if !self.hold_at(r, c) {
                continue;
            }
            match value {
                FormulaValue::Number(n) => numbers.push(*n),
                FormulaValue::Error(e) => return Err(*e),
                _ => {}
            }
        }
        Ok(numbers)
    }

    /// Number of positions where every condition holds
    fn count(&self) -> u64 {
        let stored: BTreeSet<(usize, usize)> = self
            .pairs
            .iter()
            .flat_map(|(range, _)| range.entries().map(|(r, c, _)| (r, c)))
            .collect();
        let mut count = stored.iter().filter(|&&(r, c)| self.hold_at(r, c)).count() as u64;

        // positions blank in every range all behave alike
        if self
            .pairs
            .iter()
            .all(|(_, criteria)| criteria.matches(&FormulaValue::Empty))
        {
            let area = self.shape.0 as u64 * self.shape.1 as u64;
            count += area.saturating_sub(stored.len() as u64);
        }
        count
    }
}

/// Numbers shared by SUMIF and AVERAGEIF
fn conditional_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let conditions = Conditions::new(&args[..2])?;
    match args.get(2) {
        Some(sum_range) => conditions.numbers_in(&grid(sum_range)),
        None => conditions.numbers_in(&grid(&args[0])),
    }
}

/// SUMIF(range, criteria, [sum_range])
pub fn fn_sumif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = conditional_numbers(args)?;
    Ok(FormulaValue::from_number(numbers.iter().sum()))
}

/// COUNTIF(range, criteria)
pub fn fn_countif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let conditions = Conditions::new(args)?;
    Ok(FormulaValue::Number(conditions.count() as f64))
}

/// AVERAGEIF(range, criteria, [average_range])
pub fn fn_averageif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = conditional_numbers(args)?;
    if numbers.is_empty() {
        return Err(CellError::Div0);
    }
    let sum: f64 = numbers.iter().sum();
    Ok(FormulaValue::from_number(sum / numbers.len() as f64))
}

/// SUMIFS(sum_range, criteria_range1, criteria1, ...)
pub fn fn_sumifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let sum_range = grid(&args[0]);
    let conditions = Conditions::new(&args[1..])?;
    if sum_range.dimensions() != conditions.shape {
        return Err(CellError::Value);
    }
    let numbers = conditions.numbers_in(&sum_range)?;
    Ok(FormulaValue::from_number(numbers.iter().sum()))
}

/// COUNTIFS(criteria_range1, criteria1, ...)
pub fn fn_countifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let conditions = Conditions::new(args)?;
    Ok(FormulaValue::Number(conditions.count() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{eval_in, num, sample_workbook};
    use pretty_assertions::assert_eq;

    fn matcher(criteria: &str) -> CriteriaMatcher {
        CriteriaMatcher::new(&FormulaValue::String(criteria.into())).unwrap()
    }

    #[test]
    fn test_numeric_criteria() {
        let gt5 = matcher(">5");
        assert!(gt5.matches(&FormulaValue::Number(6.0)));
        assert!(!gt5.matches(&FormulaValue::Number(5.0)));
        assert!(!gt5.matches(&FormulaValue::String("9".into())));

        let ne0 = matcher("<>0");
        assert!(ne0.matches(&FormulaValue::String("x".into())));
        assert!(!ne0.matches(&FormulaValue::Number(0.0)));

        let five = CriteriaMatcher::new(&FormulaValue::Number(5.0)).unwrap();
        assert!(five.matches(&FormulaValue::String("5".into())));
    }

    #[test]
    fn test_text_and_wildcards() {
        let apple = matcher("APPLE");
        assert!(apple.matches(&FormulaValue::String("apple".into())));
        assert!(!apple.matches(&FormulaValue::String("apples".into())));

        assert!(matcher("a*").matches(&FormulaValue::String("Avocado".into())));
        assert!(matcher("?at").matches(&FormulaValue::String("cat".into())));
        assert!(!matcher("?at").matches(&FormulaValue::String("at".into())));
        assert!(matcher("*~?").matches(&FormulaValue::String("why?".into())));
        assert!(!matcher("*~?").matches(&FormulaValue::String("why".into())));
        assert!(matcher("<c").matches(&FormulaValue::String("banana".into())));
    }

    #[test]
    fn test_blank_criteria() {
        assert!(matcher("").matches(&FormulaValue::Empty));
        assert!(matcher("=").matches(&FormulaValue::String(String::new())));
        assert!(matcher("<>").matches(&FormulaValue::Number(0.0)));
        assert!(!matcher("<>").matches(&FormulaValue::Empty));
    }

    #[test]
    fn test_conditional_aggregates() {
        let wb = sample_workbook();
        assert_eq!(eval_in(&wb, "=SUMIF(A1:A5,\">2\")"), FormulaValue::Number(12.0));
        assert_eq!(
            eval_in(&wb, "=SUMIF(B1:B5,\"apple\",A1:A5)"),
            FormulaValue::Number(5.0)
        );
        assert_eq!(eval_in(&wb, "=COUNTIF(B1:B5,\"*an*\")"), FormulaValue::Number(1.0));
        assert_eq!(
            eval_in(&wb, "=AVERAGEIF(B1:B5,\"apple\",A1:A5)"),
            FormulaValue::Number(2.5)
        );
        assert_eq!(
            eval_in(&wb, "=AVERAGEIF(A1:A5,\">10\")"),
            FormulaValue::Error(CellError::Div0)
        );
    }

    #[test]
    fn test_multi_criteria() {
        let wb = sample_workbook();
        assert_eq!(
            eval_in(&wb, "=SUMIFS(A1:A5,B1:B5,\"apple\",A1:A5,\">1\")"),
            FormulaValue::Number(4.0)
        );
        assert_eq!(
            eval_in(&wb, "=COUNTIFS(B1:B5,\"<>apple\",A1:A5,\"<5\")"),
            FormulaValue::Number(2.0)
        );
        assert_eq!(
            eval_in(&wb, "=SUMIFS(A1:A5,B1:B4,\"apple\")"),
            FormulaValue::Error(CellError::Value)
        );
        assert_eq!(num("=COUNTIFS({1,2,3},\">1\")"), 2.0);
    }
}
