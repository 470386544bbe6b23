//! Logical functions

use super::{bool_arg, number_arg, FunctionDef, FunctionRegistry, FunctionResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use cellforge_core::CellError;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("IF", 1, Some(3), fn_if));
    registry.register(FunctionDef::new("AND", 1, None, fn_and));
    registry.register(FunctionDef::new("OR", 1, None, fn_or));
    registry.register(FunctionDef::new("XOR", 1, None, fn_xor));
    registry.register(FunctionDef::new("NOT", 1, Some(1), fn_not));
    registry.register(FunctionDef::new("IFERROR", 2, Some(2), fn_iferror));
    registry.register(FunctionDef::new("IFNA", 2, Some(2), fn_ifna));
    registry.register(FunctionDef::new("IFS", 2, None, fn_ifs));
    registry.register(FunctionDef::new("CHOOSE", 2, None, fn_choose));
    registry.register(FunctionDef::new("TRUE", 0, Some(0), fn_true));
    registry.register(FunctionDef::new("FALSE", 0, Some(0), fn_false));
}

/// IF(logical_test, [value_if_true], [value_if_false])
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let branch = if bool_arg(args, 0)? { 1 } else { 2 };
    Ok(args
        .get(branch)
        .cloned()
        .unwrap_or(FormulaValue::Boolean(branch == 1)))
}

/// Truth values for AND / OR / XOR
///
/// Inside ranges only booleans and numbers count; typed-in text must read
/// as TRUE or FALSE. No logical values at all is `#VALUE!`.
fn logical_values(args: &[FormulaValue]) -> Result<Vec<bool>, CellError> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(_) => {
                for value in arg.iter_values() {
                    match value {
                        FormulaValue::Boolean(b) => values.push(*b),
                        FormulaValue::Number(n) => values.push(*n != 0.0),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => values.push(other.to_bool()?),
        }
    }
    if values.is_empty() {
        return Err(CellError::Value);
    }
    Ok(values)
}

/// AND(logical1, [logical2], ...)
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Boolean(logical_values(args)?.into_iter().all(|b| b)))
}

/// OR(logical1, [logical2], ...)
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Boolean(logical_values(args)?.into_iter().any(|b| b)))
}

/// XOR(logical1, [logical2], ...); TRUE when an odd number are TRUE
pub fn fn_xor(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let trues = logical_values(args)?.into_iter().filter(|b| *b).count();
    Ok(FormulaValue::Boolean(trues % 2 == 1))
}

/// NOT(logical)
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Boolean(!bool_arg(args, 0)?))
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    if args[0].scalar().is_error() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

/// IFNA(value, value_if_na)
pub fn fn_ifna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    if args[0].scalar() == FormulaValue::Error(CellError::Na) {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

/// IFS(test1, value1, [test2, value2], ...); no true test is `#N/A`
pub fn fn_ifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    if args.len() % 2 != 0 {
        return Err(CellError::Value);
    }
    for pair in args.chunks(2) {
        if pair[0].to_bool()? {
            return Ok(pair[1].clone());
        }
    }
    Err(CellError::Na)
}

/// CHOOSE(index_num, value1, [value2], ...)
pub fn fn_choose(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let index = number_arg(args, 0)?.trunc();
    if index < 1.0 || index >= args.len() as f64 {
        return Err(CellError::Value);
    }
    Ok(args[index as usize].clone())
}

/// TRUE()
pub fn fn_true(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Boolean(true))
}

/// FALSE()
pub fn fn_false(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Boolean(false))
}
