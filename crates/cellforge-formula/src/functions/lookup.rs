//! Lookup functions

use std::borrow::Cow;
use std::cmp::Ordering;

use super::criteria::wildcard_match;
use super::{
    bool_arg, number_arg_or, position_arg, scalar_arg, FunctionDef, FunctionRegistry,
    FunctionResult,
};
use crate::evaluator::{compare_values, EvaluationContext, FormulaValue, Grid};
use cellforge_core::CellError;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("INDEX", 2, Some(3), fn_index));
    registry.register(FunctionDef::new("MATCH", 2, Some(3), fn_match));
    registry.register(FunctionDef::new("VLOOKUP", 3, Some(4), fn_vlookup));
    registry.register(FunctionDef::new("HLOOKUP", 3, Some(4), fn_hlookup));
    registry.register(FunctionDef::new("ROWS", 1, Some(1), fn_rows));
    registry.register(FunctionDef::new("COLUMNS", 1, Some(1), fn_columns));
}

/// How a lookup treats the keys it scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    /// First equal key; text keys allow wildcards
    Exact,
    /// Last key not greater than the value; keys sorted ascending
    LessOrEqual,
    /// Last key not less than the value; keys sorted descending
    GreaterOrEqual,
}

fn grid_of(value: &FormulaValue) -> Result<Cow<'_, Grid>, CellError> {
    match value {
        FormulaValue::Array(grid) => Ok(Cow::Borrowed(grid)),
        FormulaValue::Error(e) => Err(*e),
        other => Ok(Cow::Owned(Grid::single(other.clone()))),
    }
}

fn same_kind(a: &FormulaValue, b: &FormulaValue) -> bool {
    matches!(
        (a, b),
        (FormulaValue::Number(_), FormulaValue::Number(_))
            | (FormulaValue::String(_), FormulaValue::String(_))
            | (FormulaValue::Boolean(_), FormulaValue::Boolean(_))
    )
}

fn keys_equal(wanted: &FormulaValue, key: &FormulaValue) -> bool {
    match (wanted, key) {
        (FormulaValue::String(pattern), FormulaValue::String(text))
            if pattern.contains(['*', '?', '~']) =>
        {
            wildcard_match(&pattern.to_lowercase(), &text.to_lowercase())
        }
        _ => same_kind(wanted, key) && compare_values(wanted, key) == Ordering::Equal,
    }
}

/// 0-based position of `wanted` among `(position, key)` pairs
///
/// Empty keys never match, so only the stored cells of a line are scanned.
fn find_key<'a>(
    wanted: &FormulaValue,
    keys: impl Iterator<Item = (usize, &'a FormulaValue)>,
    mode: MatchMode,
) -> Option<usize> {
    let mut found = None;
    for (i, key) in keys {
        match mode {
            MatchMode::Exact => {
                if keys_equal(wanted, key) {
                    return Some(i);
                }
            }
            MatchMode::LessOrEqual | MatchMode::GreaterOrEqual => {
                if !same_kind(wanted, key) {
                    continue;
                }
                let ordering = compare_values(key, wanted);
                let past = if mode == MatchMode::LessOrEqual {
                    ordering == Ordering::Greater
                } else {
                    ordering == Ordering::Less
                };
                if past {
                    break;
                }
                // later equal keys win, as in a sorted table
                found = Some(i);
            }
        }
    }
    found
}

fn lookup_value(args: &[FormulaValue]) -> Result<FormulaValue, CellError> {
    match scalar_arg(args, 0) {
        FormulaValue::Error(e) => Err(e),
        // an empty lookup cell looks for 0
        FormulaValue::Empty => Ok(FormulaValue::Number(0.0)),
        value => Ok(value),
    }
}

/// INDEX(array, row_num, [column_num])
///
/// A zero row or column selects the whole column or row. With a single
/// index on a one-row array, the index picks the column.
pub fn fn_index(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let grid = grid_of(&args[0])?;
    let (height, width) = grid.dimensions();

    let mut row = position_arg(args, 1)?;
    let mut col = if args.len() > 2 { position_arg(args, 2)? } else { 0 };
    if args.len() == 2 {
        if height == 1 {
            col = row;
            row = 1;
        } else if width == 1 {
            col = 1;
        }
    }
    if row > height || col > width {
        return Err(CellError::Ref);
    }

    Ok(match (row, col) {
        (0, 0) => FormulaValue::Array(grid.into_owned()),
        (0, c) => FormulaValue::Array(grid.column(c - 1)),
        (r, 0) => FormulaValue::Array(grid.row(r - 1)),
        (r, c) => grid.get(r - 1, c - 1).clone(),
    })
}

/// MATCH(lookup_value, lookup_array, [match_type])
pub fn fn_match(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let wanted = lookup_value(args)?;
    let grid = grid_of(&args[1])?;
    let mode = match number_arg_or(args, 2, 1.0)? {
        t if t > 0.0 => MatchMode::LessOrEqual,
        t if t < 0.0 => MatchMode::GreaterOrEqual,
        _ => MatchMode::Exact,
    };

    let position = match grid.dimensions() {
        (1, _) => find_key(&wanted, grid.entries().map(|(_, c, v)| (c, v)), mode),
        (_, 1) => find_key(&wanted, grid.entries().map(|(r, _, v)| (r, v)), mode),
        _ => return Err(CellError::Na),
    };
    position
        .map(|i| FormulaValue::Number((i + 1) as f64))
        .ok_or(CellError::Na)
}

/// Shared body of VLOOKUP and HLOOKUP over a table laid out as rows of records
fn table_lookup(args: &[FormulaValue], table: &Grid) -> FunctionResult {
    let wanted = lookup_value(args)?;
    let index = position_arg(args, 2)?;
    let (_, width) = table.dimensions();
    if index < 1 {
        return Err(CellError::Value);
    }
    if index > width {
        return Err(CellError::Ref);
    }
    let approximate = match scalar_arg(args, 3) {
        FormulaValue::Empty => true,
        _ => bool_arg(args, 3)?,
    };
    let mode = if approximate {
        MatchMode::LessOrEqual
    } else {
        MatchMode::Exact
    };

    let keys = table
        .entries()
        .filter(|&(_, c, _)| c == 0)
        .map(|(r, _, v)| (r, v));
    find_key(&wanted, keys, mode)
        .map(|i| table.get(i, index - 1).clone())
        .ok_or(CellError::Na)
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
pub fn fn_vlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let table = grid_of(&args[1])?;
    table_lookup(args, &table)
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
pub fn fn_hlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let table = grid_of(&args[1])?.transpose();
    table_lookup(args, &table)
}

/// ROWS(array)
pub fn fn_rows(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    match &args[0] {
        FormulaValue::Error(e) => Err(*e),
        value => Ok(FormulaValue::Number(value.dimensions().0 as f64)),
    }
}

/// COLUMNS(array)
pub fn fn_columns(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    match &args[0] {
        FormulaValue::Error(e) => Err(*e),
        value => Ok(FormulaValue::Number(value.dimensions().1 as f64)),
    }
}
