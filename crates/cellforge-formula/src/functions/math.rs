//! Math functions

use super::{collect_numbers, number_arg, number_arg_or, FunctionDef, FunctionRegistry, FunctionResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use cellforge_core::CellError;
use rand::Rng;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("SUM", 1, None, fn_sum));
    registry.register(FunctionDef::new("PRODUCT", 1, None, fn_product));
    registry.register(FunctionDef::new("ABS", 1, Some(1), fn_abs));
    registry.register(FunctionDef::new("ROUND", 1, Some(2), fn_round));
    registry.register(FunctionDef::new("ROUNDUP", 1, Some(2), fn_roundup));
    registry.register(FunctionDef::new("ROUNDDOWN", 1, Some(2), fn_rounddown));
    registry.register(FunctionDef::new("INT", 1, Some(1), fn_int));
    registry.register(FunctionDef::new("TRUNC", 1, Some(2), fn_trunc));
    registry.register(FunctionDef::new("MOD", 2, Some(2), fn_mod));
    registry.register(FunctionDef::new("POWER", 2, Some(2), fn_power));
    registry.register(FunctionDef::new("SQRT", 1, Some(1), fn_sqrt));
    registry.register(FunctionDef::new("SIGN", 1, Some(1), fn_sign));
    registry.register(FunctionDef::new("EXP", 1, Some(1), fn_exp));
    registry.register(FunctionDef::new("LN", 1, Some(1), fn_ln));
    registry.register(FunctionDef::new("LOG", 1, Some(2), fn_log));
    registry.register(FunctionDef::new("LOG10", 1, Some(1), fn_log10));
    registry.register(FunctionDef::new("PI", 0, Some(0), fn_pi));
    registry.register(FunctionDef::new("CEILING", 1, Some(2), fn_ceiling));
    registry.register(FunctionDef::new("FLOOR", 1, Some(2), fn_floor));
    registry.register(FunctionDef::new("RAND", 0, Some(0), fn_rand).volatile());
    registry.register(FunctionDef::new("RANDBETWEEN", 2, Some(2), fn_randbetween).volatile());
}

/// SUM(number1, [number2], ...)
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(args)?;
    Ok(FormulaValue::from_number(numbers.iter().sum()))
}

/// PRODUCT(number1, [number2], ...); no numbers at all gives 0
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let numbers = collect_numbers(args)?;
    if numbers.is_empty() {
        return Ok(FormulaValue::Number(0.0));
    }
    Ok(FormulaValue::from_number(numbers.iter().product()))
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Number(number_arg(args, 0)?.abs()))
}

fn digits_arg(args: &[FormulaValue]) -> Result<i32, CellError> {
    let digits = number_arg_or(args, 1, 0.0)?.trunc();
    // Beyond ±308 the scale factor is not representable
    Ok(digits.clamp(-308.0, 308.0) as i32)
}

/// Apply `f` to `x` scaled so that `digits` decimals become the integer part
fn round_with(x: f64, digits: i32, f: fn(f64) -> f64) -> f64 {
    if digits >= 0 {
        let factor = 10f64.powi(digits);
        let scaled = x * factor;
        // 2.675 * 100 is 267.49999999999997; drop that representation noise
        let cleaned = format!("{:.12e}", scaled).parse().unwrap_or(scaled);
        f(cleaned) / factor
    } else {
        let factor = 10f64.powi(-digits);
        f(x / factor) * factor
    }
}

/// ROUND(number, [num_digits]); halves round away from zero
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let x = number_arg(args, 0)?;
    let digits = digits_arg(args)?;
    Ok(FormulaValue::from_number(round_with(x, digits, f64::round)))
}

/// ROUNDUP(number, [num_digits]); away from zero
pub fn fn_roundup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let x = number_arg(args, 0)?;
    let digits = digits_arg(args)?;
    let away = |v: f64| v.abs().ceil().copysign(v);
    Ok(FormulaValue::from_number(round_with(x, digits, away)))
}

/// ROUNDDOWN(number, [num_digits]); toward zero
pub fn fn_rounddown(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let x = number_arg(args, 0)?;
    let digits = digits_arg(args)?;
    Ok(FormulaValue::from_number(round_with(x, digits, f64::trunc)))
}

/// INT(number); rounds down to the nearest integer
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Number(number_arg(args, 0)?.floor()))
}

/// TRUNC(number, [num_digits])
pub fn fn_trunc(args: &[FormulaValue], ctx: &EvaluationContext) -> FunctionResult {
    fn_rounddown(args, ctx)
}

/// MOD(number, divisor); result has the sign of the divisor
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number_arg(args, 0)?;
    let d = number_arg(args, 1)?;
    if d == 0.0 {
        return Err(CellError::Div0);
    }
    Ok(FormulaValue::from_number(n - d * (n / d).floor()))
}

/// POWER(number, power)
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let base = number_arg(args, 0)?;
    let exp = number_arg(args, 1)?;
    if base == 0.0 && exp < 0.0 {
        return Err(CellError::Div0);
    }
    Ok(FormulaValue::from_number(base.powf(exp)))
}

/// SQRT(number)
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number_arg(args, 0)?;
    if n < 0.0 {
        return Err(CellError::Num);
    }
    Ok(FormulaValue::Number(n.sqrt()))
}

/// SIGN(number)
pub fn fn_sign(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number_arg(args, 0)?;
    let sign = if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(FormulaValue::Number(sign))
}

/// EXP(number)
pub fn fn_exp(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::from_number(number_arg(args, 0)?.exp()))
}

/// LN(number)
pub fn fn_ln(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number_arg(args, 0)?;
    if n <= 0.0 {
        return Err(CellError::Num);
    }
    Ok(FormulaValue::Number(n.ln()))
}

/// LOG(number, [base]); base defaults to 10
pub fn fn_log(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number_arg(args, 0)?;
    let base = number_arg_or(args, 1, 10.0)?;
    if n <= 0.0 || base <= 0.0 {
        return Err(CellError::Num);
    }
    if base == 1.0 {
        return Err(CellError::Div0);
    }
    let log = if base == 10.0 {
        n.log10()
    } else if base == 2.0 {
        n.log2()
    } else {
        n.ln() / base.ln()
    };
    Ok(FormulaValue::from_number(log))
}

/// LOG10(number)
pub fn fn_log10(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number_arg(args, 0)?;
    if n <= 0.0 {
        return Err(CellError::Num);
    }
    Ok(FormulaValue::Number(n.log10()))
}

/// PI()
pub fn fn_pi(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

/// CEILING(number, [significance])
pub fn fn_ceiling(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number_arg(args, 0)?;
    let sig = number_arg_or(args, 1, 1.0)?;
    if sig == 0.0 {
        return Ok(FormulaValue::Number(0.0));
    }
    if n > 0.0 && sig < 0.0 {
        return Err(CellError::Num);
    }
    Ok(FormulaValue::from_number((n / sig).ceil() * sig))
}

/// FLOOR(number, [significance])
pub fn fn_floor(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let n = number_arg(args, 0)?;
    let sig = number_arg_or(args, 1, 1.0)?;
    if sig == 0.0 {
        return Err(CellError::Div0);
    }
    if n > 0.0 && sig < 0.0 {
        return Err(CellError::Num);
    }
    Ok(FormulaValue::from_number((n / sig).floor() * sig))
}

/// RAND(); uniform in [0, 1)
pub fn fn_rand(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let mut rng = rand::thread_rng();
    Ok(FormulaValue::Number(rng.gen::<f64>()))
}

/// RANDBETWEEN(bottom, top); inclusive
pub fn fn_randbetween(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let bottom = number_arg(args, 0)?.ceil() as i64;
    let top = number_arg(args, 1)?.floor() as i64;
    if bottom > top {
        return Err(CellError::Num);
    }
    let mut rng = rand::thread_rng();
    Ok(FormulaValue::Number(rng.gen_range(bottom..=top) as f64))
}

#[cfg(test)]
mod tests {
    use crate::functions::test_support::{eval, eval_in, num, sample_workbook};
    use crate::FormulaValue;
    use cellforge_core::CellError;

    #[test]
    fn test_sum_and_product() {
        assert_eq!(num("=SUM(1,2,3)"), 6.0);
        assert_eq!(num("=SUM({1,2;3,4})"), 10.0);
        assert_eq!(num("=PRODUCT(2,3,4)"), 24.0);
        assert_eq!(num("=SUM(\"2\",TRUE)"), 3.0);

        let wb = sample_workbook();
        assert_eq!(eval_in(&wb, "=SUM(A1:B5)"), FormulaValue::Number(15.0));
        assert_eq!(eval_in(&wb, "=PRODUCT(A1:A4)"), FormulaValue::Number(24.0));
        assert_eq!(eval_in(&wb, "=PRODUCT(B1:B2)"), FormulaValue::Number(0.0));
    }

    #[test]
    fn test_sum_propagates_errors() {
        assert_eq!(
            eval("=SUM(1,#N/A,#DIV/0!)").unwrap(),
            FormulaValue::Error(CellError::Na)
        );
        assert_eq!(
            eval("=SUM({1,#REF!})").unwrap(),
            FormulaValue::Error(CellError::Ref)
        );
    }

    #[test]
    fn test_rounding() {
        assert_eq!(num("=ROUND(2.5)"), 3.0);
        assert_eq!(num("=ROUND(-2.5)"), -3.0);
        assert_eq!(num("=ROUND(2.675,2)"), 2.68);
        assert_eq!(num("=ROUND(1234.5,-2)"), 1200.0);
        assert_eq!(num("=ROUNDUP(3.14159,2)"), 3.15);
        assert_eq!(num("=ROUNDUP(-3.14159,1)"), -3.2);
        assert_eq!(num("=ROUNDDOWN(3.999,0)"), 3.0);
        assert_eq!(num("=TRUNC(-8.9)"), -8.0);
        assert_eq!(num("=INT(-8.9)"), -9.0);
    }

    #[test]
    fn test_mod_follows_divisor_sign() {
        assert_eq!(num("=MOD(10,3)"), 1.0);
        assert_eq!(num("=MOD(-3,2)"), 1.0);
        assert_eq!(num("=MOD(3,-2)"), -1.0);
        assert_eq!(eval("=MOD(1,0)").unwrap(), FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_powers_and_logs() {
        assert_eq!(num("=POWER(2,10)"), 1024.0);
        assert_eq!(num("=SQRT(16)"), 4.0);
        assert_eq!(eval("=SQRT(-1)").unwrap(), FormulaValue::Error(CellError::Num));
        assert_eq!(num("=LOG(1000)"), 3.0);
        assert_eq!(num("=LOG(8,2)"), 3.0);
        assert_eq!(num("=LOG10(0.01)"), -2.0);
        assert!((num("=LN(EXP(2))") - 2.0).abs() < 1e-12);
        assert_eq!(eval("=LN(0)").unwrap(), FormulaValue::Error(CellError::Num));
        assert_eq!(num("=SIGN(-4)"), -1.0);
        assert!((num("=PI()") - std::f64::consts::PI).abs() < 1e-15);
    }

    #[test]
    fn test_ceiling_and_floor() {
        assert_eq!(num("=CEILING(2.5,1)"), 3.0);
        assert_eq!(num("=CEILING(-2.5,-2)"), -4.0);
        assert_eq!(num("=CEILING(4.2,0.5)"), 4.5);
        assert_eq!(num("=FLOOR(2.5,1)"), 2.0);
        assert_eq!(num("=FLOOR(-2.5,-2)"), -2.0);
        assert_eq!(eval("=FLOOR(2.5,-1)").unwrap(), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=FLOOR(1,0)").unwrap(), FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_random() {
        let r = num("=RAND()");
        assert!((0.0..1.0).contains(&r));
        let n = num("=RANDBETWEEN(1,6)");
        assert!((1.0..=6.0).contains(&n) && n.fract() == 0.0);
        assert_eq!(
            eval("=RANDBETWEEN(5,1)").unwrap(),
            FormulaValue::Error(CellError::Num)
        );
    }
}
