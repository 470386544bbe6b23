//! Statistical functions

use super::{collect_numbers, number_arg, FunctionDef, FunctionRegistry, FunctionResult};
use crate::evaluator::{parse_numeric_text, EvaluationContext, FormulaValue};
use cellforge_core::CellError;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("AVERAGE", 1, None, fn_average));
    registry.register(FunctionDef::new("MIN", 1, None, fn_min));
    registry.register(FunctionDef::new("MAX", 1, None, fn_max));
    registry.register(FunctionDef::new("COUNT", 1, None, fn_count));
    registry.register(FunctionDef::new("COUNTA", 1, None, fn_counta));
    registry.register(FunctionDef::new("COUNTBLANK", 1, Some(1), fn_countblank));
    registry.register(FunctionDef::new("MEDIAN", 1, None, fn_median));
    registry.register(FunctionDef::new("LARGE", 2, Some(2), fn_large));
    registry.register(FunctionDef::new("SMALL", 2, Some(2), fn_small));
}

/// AVERAGE(number1, [number2], ...)
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(args)?;
    if numbers.is_empty() {
        return Err(CellError::Div0);
    }
    let sum: f64 = numbers.iter().sum();
    Ok(FormulaValue::from_number(sum / numbers.len() as f64))
}

/// MIN(number1, [number2], ...); 0 when there are no numbers
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(args)?;
    Ok(FormulaValue::Number(
        numbers.into_iter().reduce(f64::min).unwrap_or(0.0),
    ))
}

/// MAX(number1, [number2], ...); 0 when there are no numbers
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(args)?;
    Ok(FormulaValue::Number(
        numbers.into_iter().reduce(f64::max).unwrap_or(0.0),
    ))
}

/// COUNT(value1, [value2], ...); counts numbers, never fails
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let count = args
        .iter()
        .map(|arg| match arg {
            FormulaValue::Array(_) => arg
                .iter_values()
                .filter(|v| matches!(v, FormulaValue::Number(_)))
                .count(),
            FormulaValue::Number(_) | FormulaValue::Boolean(_) => 1,
            FormulaValue::String(s) => usize::from(parse_numeric_text(s).is_some()),
            _ => 0,
        })
        .sum::<usize>();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA(value1, [value2], ...); counts non-empty values
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let count = args
        .iter()
        .flat_map(FormulaValue::iter_values)
        .filter(|v| !matches!(v, FormulaValue::Empty))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTBLANK(range); empty cells and empty text
pub fn fn_countblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let unstored = match &args[0] {
        FormulaValue::Array(grid) => grid.blank_count(),
        _ => 0,
    };
    let count = args[0]
        .iter_values()
        .filter(|v| match v {
            FormulaValue::Empty => true,
            FormulaValue::String(s) => s.is_empty(),
            _ => false,
        })
        .count() as u64;
    Ok(FormulaValue::Number((unstored + count) as f64))
}

fn sorted_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = collect_numbers(args)?;
    numbers.sort_by(f64::total_cmp);
    Ok(numbers)
}

/// MEDIAN(number1, [number2], ...)
pub fn fn_median(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = sorted_numbers(args)?;
    let n = numbers.len();
    if n == 0 {
        return Err(CellError::Num);
    }
    let median = if n % 2 == 1 {
        numbers[n / 2]
    } else {
        (numbers[n / 2 - 1] + numbers[n / 2]) / 2.0
    };
    Ok(FormulaValue::Number(median))
}

/// k-th value from the top (`largest`) or bottom of the first argument
fn kth(args: &[FormulaValue], largest: bool) -> FunctionResult {
    let numbers = sorted_numbers(&args[..1])?;
    let k = number_arg(args, 1)?.ceil();
    if k < 1.0 || k > numbers.len() as f64 {
        return Err(CellError::Num);
    }
    let k = k as usize;
    let index = if largest { numbers.len() - k } else { k - 1 };
    Ok(FormulaValue::Number(numbers[index]))
}

/// LARGE(array, k)
pub fn fn_large(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    kth(args, true)
}

/// SMALL(array, k)
pub fn fn_small(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    kth(args, false)
}

#[cfg(test)]
mod tests {
    use crate::functions::test_support::{eval, eval_in, num, sample_workbook};
    use crate::FormulaValue;
    use cellforge_core::CellError;

    #[test]
    fn test_average_min_max() {
        assert_eq!(num("=AVERAGE(2,4,6)"), 4.0);
        assert_eq!(num("=MIN(5,2,8,1)"), 1.0);
        assert_eq!(num("=MAX(5,2,8,1)"), 8.0);
        assert_eq!(
            eval("=AVERAGE({\"a\",\"b\"})").unwrap(),
            FormulaValue::Error(CellError::Div0)
        );

        let wb = sample_workbook();
        assert_eq!(eval_in(&wb, "=AVERAGE(A1:A5)"), FormulaValue::Number(3.0));
        assert_eq!(eval_in(&wb, "=MAX(B1:B5)"), FormulaValue::Number(0.0));
    }

    #[test]
    fn test_counting() {
        assert_eq!(num("=COUNT(1,2,\"a\",3)"), 3.0);
        assert_eq!(num("=COUNT(\"7\",#N/A)"), 1.0);

        let wb = sample_workbook();
        assert_eq!(eval_in(&wb, "=COUNT(A1:D5)"), FormulaValue::Number(5.0));
        assert_eq!(eval_in(&wb, "=COUNTA(A1:D5)"), FormulaValue::Number(12.0));
        assert_eq!(eval_in(&wb, "=COUNTBLANK(C1:D5)"), FormulaValue::Number(8.0));
    }

    #[test]
    fn test_median_large_small() {
        assert_eq!(num("=MEDIAN(3,1,2)"), 2.0);
        assert_eq!(num("=MEDIAN(4,1,3,2)"), 2.5);
        assert_eq!(num("=LARGE({3,9,1,7},2)"), 7.0);
        assert_eq!(num("=SMALL({3,9,1,7},1)"), 1.0);
        assert_eq!(
            eval("=SMALL({3,9},3)").unwrap(),
            FormulaValue::Error(CellError::Num)
        );
    }
}
