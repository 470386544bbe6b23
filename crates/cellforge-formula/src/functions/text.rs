//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::{
    number_arg, number_arg_or, position_arg, scalar_arg, text_arg, FunctionDef, FunctionRegistry,
    FunctionResult,
};
use crate::evaluator::{parse_numeric_text, EvaluationContext, FormulaValue};
use cellforge_core::CellError;

/// Longest string REPT will build
const MAX_TEXT_LEN: usize = 32_767;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::new("CONCATENATE", 1, None, fn_concatenate));
    registry.register(FunctionDef::new("CONCAT", 1, None, fn_concat));
    registry.register(FunctionDef::new("LEN", 1, Some(1), fn_len));
    registry.register(FunctionDef::new("LEFT", 1, Some(2), fn_left));
    registry.register(FunctionDef::new("RIGHT", 1, Some(2), fn_right));
    registry.register(FunctionDef::new("MID", 3, Some(3), fn_mid));
    registry.register(FunctionDef::new("UPPER", 1, Some(1), fn_upper));
    registry.register(FunctionDef::new("LOWER", 1, Some(1), fn_lower));
    registry.register(FunctionDef::new("PROPER", 1, Some(1), fn_proper));
    registry.register(FunctionDef::new("TRIM", 1, Some(1), fn_trim));
    registry.register(FunctionDef::new("REPT", 2, Some(2), fn_rept));
    registry.register(FunctionDef::new("SUBSTITUTE", 3, Some(4), fn_substitute));
    registry.register(FunctionDef::new("FIND", 2, Some(3), fn_find));
    registry.register(FunctionDef::new("SEARCH", 2, Some(3), fn_search));
    registry.register(FunctionDef::new("EXACT", 2, Some(2), fn_exact));
    registry.register(FunctionDef::new("VALUE", 1, Some(1), fn_value));
    registry.register(FunctionDef::new("T", 1, Some(1), fn_t));
    registry.register(FunctionDef::new("N", 1, Some(1), fn_n));
}

/// CONCATENATE(text1, [text2], ...)
pub fn fn_concatenate(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let mut result = String::new();
    for i in 0..args.len() {
        result.push_str(&text_arg(args, i)?);
    }
    Ok(FormulaValue::String(result))
}

/// CONCAT(text1, [text2], ...); ranges are joined cell by cell
pub fn fn_concat(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let mut result = String::new();
    for value in args.iter().flat_map(FormulaValue::iter_values) {
        result.push_str(&value.to_text()?);
    }
    Ok(FormulaValue::String(result))
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Number(text_arg(args, 0)?.chars().count() as f64))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let text = text_arg(args, 0)?;
    let n = char_count_arg(args, 1)?;
    Ok(FormulaValue::String(text.chars().take(n).collect()))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let text = text_arg(args, 0)?;
    let n = char_count_arg(args, 1)?;
    let len = text.chars().count();
    Ok(FormulaValue::String(
        text.chars().skip(len.saturating_sub(n)).collect(),
    ))
}

fn char_count_arg(args: &[FormulaValue], i: usize) -> Result<usize, CellError> {
    let n = number_arg_or(args, i, 1.0)?.trunc();
    if n < 0.0 {
        return Err(CellError::Value);
    }
    Ok(n as usize)
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let text = text_arg(args, 0)?;
    let start = position_arg(args, 1)?;
    let count = position_arg(args, 2)?;
    if start < 1 {
        return Err(CellError::Value);
    }
    Ok(FormulaValue::String(
        text.chars().skip(start - 1).take(count).collect(),
    ))
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::String(text_arg(args, 0)?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::String(text_arg(args, 0)?.to_lowercase()))
}

/// PROPER(text); capitalizes each letter that follows a non-letter
pub fn fn_proper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let text = text_arg(args, 0)?;
    let mut result = String::with_capacity(text.len());
    let mut after_letter = false;
    for c in text.chars() {
        if after_letter {
            result.extend(c.to_lowercase());
        } else {
            result.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }
    Ok(FormulaValue::String(result))
}

/// TRIM(text); strips the ends and collapses inner runs of spaces
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let text = text_arg(args, 0)?;
    let trimmed: Vec<&str> = text.split(' ').filter(|part| !part.is_empty()).collect();
    Ok(FormulaValue::String(trimmed.join(" ")))
}

/// REPT(text, number_times)
pub fn fn_rept(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let text = text_arg(args, 0)?;
    let times = number_arg(args, 1)?.trunc();
    if times < 0.0 {
        return Err(CellError::Value);
    }
    let times = times as usize;
    if text.chars().count().saturating_mul(times) > MAX_TEXT_LEN {
        return Err(CellError::Value);
    }
    Ok(FormulaValue::String(text.repeat(times)))
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
pub fn fn_substitute(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    let text = text_arg(args, 0)?;
    let old = text_arg(args, 1)?;
    let new = text_arg(args, 2)?;
    if old.is_empty() {
        return Ok(FormulaValue::String(text));
    }

    if args.len() < 4 {
        return Ok(FormulaValue::String(text.replace(&old, &new)));
    }

    let instance = number_arg(args, 3)?.trunc();
    if instance < 1.0 {
        return Err(CellError::Value);
    }
    let result = match text.match_indices(&old).nth(instance as usize - 1) {
        Some((at, _)) => format!("{}{}{}", &text[..at], new, &text[at + old.len()..]),
        None => text,
    };
    Ok(FormulaValue::String(result))
}

/// Shared body of FIND and SEARCH; returns the 1-based character position
fn find_position(args: &[FormulaValue], case_sensitive: bool) -> FunctionResult {
    let needle = text_arg(args, 0)?;
    let haystack = text_arg(args, 1)?;
    let start = number_arg_or(args, 2, 1.0)?.trunc();
    let len = haystack.chars().count();
    if start < 1.0 || start as usize > len + 1 {
        return Err(CellError::Value);
    }
    let skip = start as usize - 1;

    let chars: Vec<char> = haystack.chars().collect();
    let needle: Vec<char> = needle.chars().collect();
    for pos in skip..=len {
        let rest = &chars[pos..];
        let found = if case_sensitive {
            rest.starts_with(&needle)
        } else {
            wildcard_prefix(&needle, rest)
        };
        if found {
            return Ok(FormulaValue::Number((pos + 1) as f64));
        }
    }
    Err(CellError::Value)
}

/// Whether `pattern` matches a prefix of `text`, case-insensitively, with
/// `?` and `*` wildcards and `~` escaping
fn wildcard_prefix(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => true,
        Some(('*', rest)) => (0..=text.len()).any(|skip| wildcard_prefix(rest, &text[skip..])),
        Some(('?', rest)) => !text.is_empty() && wildcard_prefix(rest, &text[1..]),
        Some(('~', rest)) if !rest.is_empty() => {
            !text.is_empty() && text[0] == rest[0] && wildcard_prefix(&rest[1..], &text[1..])
        }
        Some((c, rest)) => match text.split_first() {
            Some((t, text_rest)) => {
                c.to_lowercase().eq(t.to_lowercase()) && wildcard_prefix(rest, text_rest)
            }
            None => false,
        },
    }
}

/// FIND(find_text, within_text, [start_num]); case-sensitive
pub fn fn_find(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    find_position(args, true)
}

/// SEARCH(find_text, within_text, [start_num]); case-insensitive with wildcards
pub fn fn_search(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    find_position(args, false)
}

/// EXACT(text1, text2)
pub fn fn_exact(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    Ok(FormulaValue::Boolean(text_arg(args, 0)? == text_arg(args, 1)?))
}

/// VALUE(text)
pub fn fn_value(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    match scalar_arg(args, 0) {
        FormulaValue::Number(n) => Ok(FormulaValue::Number(n)),
        FormulaValue::Empty => Ok(FormulaValue::Number(0.0)),
        FormulaValue::String(s) => parse_numeric_text(&s)
            .map(FormulaValue::Number)
            .ok_or(CellError::Value),
        FormulaValue::Error(e) => Err(e),
        _ => Err(CellError::Value),
    }
}

/// T(value); text stays, anything else is empty text
pub fn fn_t(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    match scalar_arg(args, 0) {
        FormulaValue::String(s) => Ok(FormulaValue::String(s)),
        FormulaValue::Error(e) => Err(e),
        _ => Ok(FormulaValue::String(String::new())),
    }
}

/// N(value); numbers stay, TRUE is 1, anything else is 0
pub fn fn_n(args: &[FormulaValue], _ctx: &EvaluationContext) -> FunctionResult {
    match scalar_arg(args, 0) {
        FormulaValue::Number(n) => Ok(FormulaValue::Number(n)),
        FormulaValue::Boolean(b) => Ok(FormulaValue::Number(if b { 1.0 } else { 0.0 })),
        FormulaValue::Error(e) => Err(e),
        _ => Ok(FormulaValue::Number(0.0)),
    }
}
