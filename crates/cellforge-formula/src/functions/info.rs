//! Information functions

use super::{scalar_arg, FunctionDef, FunctionRegistry, FunctionResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use cellforge_core::CellError;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("ISBLANK", 1, Some(1), fn_isblank));
    registry.register(FunctionDef::new("ISNUMBER", 1, Some(1), fn_isnumber));
    registry.register(FunctionDef::new("ISTEXT", 1, Some(1), fn_istext));
    registry.register(FunctionDef::new("ISNONTEXT", 1, Some(1), fn_isnontext));
    registry.register(FunctionDef::new("ISLOGICAL", 1, Some(1), fn_islogical));
    registry.register(FunctionDef::new("ISERROR", 1, Some(1), fn_iserror));
    registry.register(FunctionDef::new("ISERR", 1, Some(1), fn_iserr));
    registry.register(FunctionDef::new("ISNA", 1, Some(1), fn_isna));
    registry.register(FunctionDef::new("ISEVEN", 1, Some(1), fn_iseven));
    registry.register(FunctionDef::new("ISODD", 1, Some(1), fn_isodd));
    registry.register(FunctionDef::new("NA", 0, Some(0), fn_na));
}

fn test_value(args: &[FormulaValue], test: fn(&FormulaValue) -> bool) -> FunctionResult {
    Ok(FormulaValue::Boolean(test(&scalar_arg(args, 0))))
}

/// ISBLANK(value); only a truly empty cell, not empty text
pub fn fn_isblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    test_value(args, |v| matches!(v, FormulaValue::Empty))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    test_value(args, |v| matches!(v, FormulaValue::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    test_value(args, |v| matches!(v, FormulaValue::String(_)))
}

/// ISNONTEXT(value)
pub fn fn_isnontext(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    test_value(args, |v| !matches!(v, FormulaValue::String(_)))
}

/// ISLOGICAL(value)
pub fn fn_islogical(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    test_value(args, |v| matches!(v, FormulaValue::Boolean(_)))
}

/// ISERROR(value)
pub fn fn_iserror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    test_value(args, FormulaValue::is_error)
}

/// ISERR(value); any error except `#N/A`
pub fn fn_iserr(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    test_value(args, |v| v.is_error() && v.get_error() != Some(CellError::Na))
}

/// ISNA(value)
pub fn fn_isna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    test_value(args, |v| v.get_error() == Some(CellError::Na))
}

fn parity(args: &[FormulaValue]) -> Result<bool, CellError> {
    let n = match scalar_arg(args, 0) {
        FormulaValue::Boolean(_) => return Err(CellError::Value),
        other => other.to_number()?,
    };
    Ok(n.trunc().rem_euclid(2.0) == 0.0)
}

/// ISEVEN(number)
pub fn fn_iseven(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Boolean(parity(args)?))
}

/// ISODD(number)
pub fn fn_isodd(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Boolean(!parity(args)?))
}

/// NA()
pub fn fn_na(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Err(CellError::Na)
}

#[cfg(test)]
mod tests {
    use crate::functions::test_support::{eval, eval_in, sample_workbook};
    use crate::FormulaValue;
    use cellforge_core::CellError;

    fn truth(formula: &str) -> bool {
        match eval(formula).unwrap() {
            FormulaValue::Boolean(b) => b,
            other => panic!("{} gave {:?}", formula, other),
        }
    }

    #[test]
    fn test_type_checks() {
        assert!(truth("=ISNUMBER(1)"));
        assert!(!truth("=ISNUMBER(\"1\")"));
        assert!(truth("=ISTEXT(\"x\")"));
        assert!(truth("=ISNONTEXT(1)"));
        assert!(truth("=ISLOGICAL(FALSE)"));
        assert!(!truth("=ISBLANK(\"\")"));

        let wb = sample_workbook();
        assert_eq!(eval_in(&wb, "=ISBLANK(Z99)"), FormulaValue::Boolean(true));
        assert_eq!(eval_in(&wb, "=ISBLANK(A1)"), FormulaValue::Boolean(false));
        assert_eq!(eval_in(&wb, "=ISTEXT(B1)"), FormulaValue::Boolean(true));
    }

    #[test]
    fn test_error_checks() {
        assert!(truth("=ISERROR(1/0)"));
        assert!(truth("=ISERR(1/0)"));
        assert!(!truth("=ISERR(NA())"));
        assert!(truth("=ISNA(NA())"));
        assert!(!truth("=ISERROR(1)"));
        assert_eq!(eval("=NA()").unwrap(), FormulaValue::Error(CellError::Na));
    }

    #[test]
    fn test_parity() {
        assert!(truth("=ISEVEN(4)"));
        assert!(truth("=ISEVEN(-2.5)"));
        assert!(truth("=ISODD(3)"));
        assert_eq!(
            eval("=ISEVEN(TRUE)").unwrap(),
            FormulaValue::Error(CellError::Value)
        );
    }
}
