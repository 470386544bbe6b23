//! Date functions
//!
//! Dates are serial day numbers. In the 1900 system serial 1 is 1900-01-01
//! and serial 60 is the nonexistent 1900-02-29 that spreadsheets keep for
//! compatibility; in the 1904 system serial 0 is 1904-01-01.

use chrono::{Datelike, Local, NaiveDate, Timelike};

use super::{number_arg, FunctionDef, FunctionRegistry, FunctionResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use cellforge_core::CellError;

/// Serial number of 9999-12-31 in the 1900 system
const MAX_SERIAL_1900: i64 = 2_958_465;

/// Serial of the phantom 1900-02-29
const LEAP_BUG_SERIAL: i64 = 60;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("DATE", 3, Some(3), fn_date));
    registry.register(FunctionDef::new("YEAR", 1, Some(1), fn_year));
    registry.register(FunctionDef::new("MONTH", 1, Some(1), fn_month));
    registry.register(FunctionDef::new("DAY", 1, Some(1), fn_day));
    registry.register(FunctionDef::new("TODAY", 0, Some(0), fn_today).volatile());
    registry.register(FunctionDef::new("NOW", 0, Some(0), fn_now).volatile());
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, CellError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(CellError::Num)
}

/// Serial number of a calendar date
pub fn date_to_serial(date: NaiveDate, date_1904: bool) -> Result<i64, CellError> {
    if date_1904 {
        return Ok((date - ymd(1904, 1, 1)?).num_days());
    }
    let serial = (date - ymd(1899, 12, 30)?).num_days();
    // before March 1900 there is no phantom leap day to skip
    if date < ymd(1900, 3, 1)? {
        Ok(serial - 1)
    } else {
        Ok(serial)
    }
}

/// `(year, month, day)` of a serial number
///
/// Serial 0 of the 1900 system reads as 1900-01-00 and serial 60 as
/// 1900-02-29, neither of which is a real date.
pub fn serial_to_ymd(serial: f64, date_1904: bool) -> Result<(i32, u32, u32), CellError> {
    let serial = serial.floor();
    if serial < 0.0 || serial > MAX_SERIAL_1900 as f64 {
        return Err(CellError::Num);
    }
    let serial = serial as i64;

    let date = if date_1904 {
        ymd(1904, 1, 1)? + chrono::Duration::days(serial)
    } else {
        match serial {
            0 => return Ok((1900, 1, 0)),
            LEAP_BUG_SERIAL => return Ok((1900, 2, 29)),
            s if s < LEAP_BUG_SERIAL => ymd(1899, 12, 31)? + chrono::Duration::days(s),
            s => ymd(1899, 12, 30)? + chrono::Duration::days(s),
        }
    };
    Ok((date.year(), date.month(), date.day()))
}

/// Truncated integer argument, kept well inside `i64` so the month and day
/// arithmetic below cannot overflow
fn integer_arg(args: &[FormulaValue], i: usize) -> Result<i64, CellError> {
    const LIMIT: f64 = 1e15;
    let n = number_arg(args, i)?.trunc();
    if n.abs() > LIMIT {
        return Err(CellError::Num);
    }
    Ok(n as i64)
}

/// DATE(year, month, day)
///
/// Years below 1900 are offsets from 1900; months and days outside their
/// usual range roll over into neighbouring months and years.
pub fn fn_date(args: &[FormulaValue], ctx: &EvaluationContext) -> FunctionResult {
    let mut year = integer_arg(args, 0)?;
    let month = integer_arg(args, 1)?;
    let day = integer_arg(args, 2)?;
    if !(0..10_000).contains(&year) {
        return Err(CellError::Num);
    }
    if year < 1900 {
        year += 1900;
    }

    // month and day come in unbounded; anything that overflows is off the calendar
    let months = (month - 1)
        .checked_add(year * 12)
        .ok_or(CellError::Num)?;
    let year = i32::try_from(months.div_euclid(12)).map_err(|_| CellError::Num)?;
    let month = months.rem_euclid(12) as u32 + 1;
    let first = ymd(year, month, 1)?;

    // counting from the first of the month keeps 1900-02-29 reachable
    let serial = date_to_serial(first, ctx.date_1904())?
        .checked_add(day - 1)
        .ok_or(CellError::Num)?;
    if serial < 0 || serial > MAX_SERIAL_1900 {
        return Err(CellError::Num);
    }
    Ok(FormulaValue::Number(serial as f64))
}

/// YEAR(serial_number)
pub fn fn_year(args: &[FormulaValue], ctx: &EvaluationContext) -> FunctionResult {
    let (year, _, _) = serial_to_ymd(number_arg(args, 0)?, ctx.date_1904())?;
    Ok(FormulaValue::Number(f64::from(year)))
}

/// MONTH(serial_number)
pub fn fn_month(args: &[FormulaValue], ctx: &EvaluationContext) -> FunctionResult {
    let (_, month, _) = serial_to_ymd(number_arg(args, 0)?, ctx.date_1904())?;
    Ok(FormulaValue::Number(f64::from(month)))
}

/// DAY(serial_number)
pub fn fn_day(args: &[FormulaValue], ctx: &EvaluationContext) -> FunctionResult {
    let (_, _, day) = serial_to_ymd(number_arg(args, 0)?, ctx.date_1904())?;
    Ok(FormulaValue::Number(f64::from(day)))
}

/// TODAY(); current local date
pub fn fn_today(_args: &[FormulaValue], ctx: &EvaluationContext) -> FunctionResult {
    let today = Local::now().date_naive();
    Ok(FormulaValue::Number(
        date_to_serial(today, ctx.date_1904())? as f64,
    ))
}

/// NOW(); current local date and time as a fractional serial
pub fn fn_now(_args: &[FormulaValue], ctx: &EvaluationContext) -> FunctionResult {
    let now = Local::now();
    let days = date_to_serial(now.date_naive(), ctx.date_1904())? as f64;
    let seconds = f64::from(now.num_seconds_from_midnight());
    Ok(FormulaValue::Number(days + seconds / 86_400.0))
}
