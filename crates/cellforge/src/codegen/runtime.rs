//! Value runtime embedded in every generated program
//!
//! The text below is copied verbatim into the generated `main.rs`, ahead of
//! the workbook-specific tables and the `recalc` function. It relies on the
//! generated items `TITLE`, `SHEETS`, `CELLS`, `ITERATION_LIMIT`,
//! `ITERATION_TOLERANCE` and `recalc`.
//!
//! The semantics mirror `cellforge_formula::evaluate`: errors propagate left
//! to right, empty cells read as 0 / "" / FALSE, numeric text is coerced in
//! arithmetic, and aggregates skip text inside ranges. The program must build
//! with a bare `rustc` (edition 2015), so no edition-specific syntax.

pub(super) const RUNTIME: &str = r##"
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

const DIV0: &str = "#DIV/0!";
const VALUE: &str = "#VALUE!";
const NUM: &str = "#NUM!";
const ERRORS: [&str; 7] = ["#NULL!", "#DIV/0!", "#VALUE!", "#REF!", "#NAME?", "#NUM!", "#N/A"];

type Key = (usize, u32, u16);

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Empty,
    Num(f64),
    Text(String),
    Bool(bool),
    Err(&'static str),
}

impl Value {
    fn num(n: f64) -> Value {
        if n.is_finite() {
            Value::Num(n)
        } else {
            Value::Err(NUM)
        }
    }

    fn is_err(&self) -> bool {
        match *self {
            Value::Err(_) => true,
            _ => false,
        }
    }

    fn to_num(&self) -> Result<f64, &'static str> {
        match *self {
            Value::Num(n) => Ok(n),
            Value::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
            Value::Empty => Ok(0.0),
            Value::Text(ref s) => numeric_text(s).ok_or(VALUE),
            Value::Err(e) => Err(e),
        }
    }

    fn to_bool(&self) -> Result<bool, &'static str> {
        match *self {
            Value::Bool(b) => Ok(b),
            Value::Num(n) => Ok(n != 0.0),
            Value::Empty => Ok(false),
            Value::Text(ref s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
            Value::Text(ref s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
            Value::Text(_) => Err(VALUE),
            Value::Err(e) => Err(e),
        }
    }

    fn to_text(&self) -> Result<String, &'static str> {
        match *self {
            Value::Err(e) => Err(e),
            _ => Ok(self.display()),
        }
    }

    fn display(&self) -> String {
        match *self {
            Value::Empty => String::new(),
            Value::Num(n) => format_number(n),
            Value::Text(ref s) => s.clone(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Err(e) => e.to_string(),
        }
    }
}

/// Const-friendly form of a value, used in the cell table
#[derive(Debug, Clone, Copy)]
enum Lit {
    Empty,
    Num(f64),
    Text(&'static str),
    Bool(bool),
    Err(&'static str),
}

impl Lit {
    fn value(self) -> Value {
        match self {
            Lit::Empty => Value::Empty,
            Lit::Num(n) => Value::Num(n),
            Lit::Text(s) => Value::Text(s.to_string()),
            Lit::Bool(b) => Value::Bool(b),
            Lit::Err(e) => Value::Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    /// Plain value read by some formula; settable
    Input,
    /// Plain value nothing reads
    Constant,
    /// Formula recomputed by `recalc`
    Formula,
    /// Formula whose conversion-time value is kept
    Frozen,
}

struct CellDef {
    sheet: usize,
    row: u32,
    col: u16,
    kind: Kind,
    formula: &'static str,
    init: Lit,
}

impl CellDef {
    fn key(&self) -> Key {
        (self.sheet, self.row, self.col)
    }
}

/// Function argument: a plain value, the cells of a reference, or the
/// stored cells of a multi-cell range (blank cells left out)
#[derive(Debug, Clone)]
enum Arg {
    Val(Value),
    Range(Vec<Value>),
    Area(Vec<Value>),
}

impl Arg {
    fn scalar(&self) -> Value {
        match *self {
            Arg::Val(ref v) => v.clone(),
            Arg::Range(ref values) if values.len() == 1 => values[0].clone(),
            Arg::Range(_) | Arg::Area(_) => Value::Err(VALUE),
        }
    }

    fn values(&self) -> &[Value] {
        match *self {
            Arg::Val(ref v) => std::slice::from_ref(v),
            Arg::Range(ref values) | Arg::Area(ref values) => values,
        }
    }
}

struct Model {
    cells: BTreeMap<Key, Value>,
}

impl Model {
    fn new() -> Model {
        let mut model = Model {
            cells: BTreeMap::new(),
        };
        model.reset();
        model
    }

    fn reset(&mut self) {
        self.cells.clear();
        for cell in CELLS.iter() {
            self.cells.insert(cell.key(), cell.init.value());
        }
    }

    fn get(&self, sheet: usize, row: u32, col: u16) -> Value {
        self.cells
            .get(&(sheet, row, col))
            .cloned()
            .unwrap_or(Value::Empty)
    }

    fn set(&mut self, sheet: usize, row: u32, col: u16, value: Value) {
        self.cells.insert((sheet, row, col), value);
    }

    /// A range as a function argument; only stored cells are visited
    fn range(&self, sheet: usize, r0: u32, c0: u16, r1: u32, c1: u16) -> Arg {
        if r0 == r1 && c0 == c1 {
            return Arg::Range(vec![self.get(sheet, r0, c0)]);
        }
        let values = self
            .cells
            .range((sheet, r0, 0)..(sheet, r1 + 1, 0))
            .filter(|&(&(_, _, col), _)| col >= c0 && col <= c1)
            .map(|(_, value)| value.clone())
            .collect();
        Arg::Area(values)
    }

    /// A range in a single-value position
    fn area(&self, sheet: usize, r0: u32, c0: u16, r1: u32, c1: u16) -> Value {
        if r0 == r1 && c0 == c1 {
            self.get(sheet, r0, c0)
        } else {
            Value::Err(VALUE)
        }
    }

    /// Start value for a cell iterated in a cycle
    fn seed(&mut self, sheet: usize, row: u32, col: u16) {
        let start = self.get(sheet, row, col);
        if start == Value::Empty || start.is_err() {
            self.set(sheet, row, col, Value::Num(0.0));
        }
    }
}

// === Operators ===

fn arith(a: Value, b: Value, f: fn(f64, f64) -> Value) -> Value {
    if let Value::Err(e) = a {
        return Value::Err(e);
    }
    if let Value::Err(e) = b {
        return Value::Err(e);
    }
    match (a.to_num(), b.to_num()) {
        (Ok(x), Ok(y)) => f(x, y),
        (Err(e), _) | (_, Err(e)) => Value::Err(e),
    }
}

fn add(a: Value, b: Value) -> Value {
    arith(a, b, |x, y| Value::num(x + y))
}

fn sub(a: Value, b: Value) -> Value {
    arith(a, b, |x, y| Value::num(x - y))
}

fn mul(a: Value, b: Value) -> Value {
    arith(a, b, |x, y| Value::num(x * y))
}

fn div(a: Value, b: Value) -> Value {
    arith(a, b, |x, y| {
        if y == 0.0 {
            Value::Err(DIV0)
        } else {
            Value::num(x / y)
        }
    })
}

fn pow(a: Value, b: Value) -> Value {
    arith(a, b, |x, y| {
        if x == 0.0 && y < 0.0 {
            Value::Err(DIV0)
        } else {
            Value::num(x.powf(y))
        }
    })
}

fn concat(a: Value, b: Value) -> Value {
    if let Value::Err(e) = a {
        return Value::Err(e);
    }
    if let Value::Err(e) = b {
        return Value::Err(e);
    }
    Value::Text(a.display() + &b.display())
}

fn neg(a: Value) -> Value {
    match a.to_num() {
        Ok(n) => Value::Num(-n),
        Err(e) => Value::Err(e),
    }
}

fn percent(a: Value) -> Value {
    match a.to_num() {
        Ok(n) => Value::Num(n / 100.0),
        Err(e) => Value::Err(e),
    }
}

/// Ordering used by comparison operators: number < text < boolean, text
/// case-insensitive, empty takes the type of the other side
fn compare(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match *v {
            Value::Num(_) | Value::Empty => 0,
            Value::Text(_) => 1,
            Value::Bool(_) => 2,
            Value::Err(_) => 3,
        }
    }
    fn blank_like(other: &Value) -> Value {
        match *other {
            Value::Text(_) => Value::Text(String::new()),
            Value::Bool(_) => Value::Bool(false),
            _ => Value::Num(0.0),
        }
    }

    let (a, b) = match (a, b) {
        (&Value::Empty, other) => (blank_like(other), other.clone()),
        (other, &Value::Empty) => (other.clone(), blank_like(other)),
        (x, y) => (x.clone(), y.clone()),
    };
    match (&a, &b) {
        (&Value::Num(x), &Value::Num(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (&Value::Text(ref x), &Value::Text(ref y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (&Value::Bool(x), &Value::Bool(y)) => x.cmp(&y),
        (x, y) => rank(x).cmp(&rank(y)),
    }
}

fn compare_with(a: Value, b: Value, test: fn(Ordering) -> bool) -> Value {
    if let Value::Err(e) = a {
        return Value::Err(e);
    }
    if let Value::Err(e) = b {
        return Value::Err(e);
    }
    Value::Bool(test(compare(&a, &b)))
}

fn eq(a: Value, b: Value) -> Value {
    compare_with(a, b, |o| o == Ordering::Equal)
}

fn ne(a: Value, b: Value) -> Value {
    compare_with(a, b, |o| o != Ordering::Equal)
}

fn lt(a: Value, b: Value) -> Value {
    compare_with(a, b, |o| o == Ordering::Less)
}

fn le(a: Value, b: Value) -> Value {
    compare_with(a, b, |o| o != Ordering::Greater)
}

fn gt(a: Value, b: Value) -> Value {
    compare_with(a, b, |o| o == Ordering::Greater)
}

fn ge(a: Value, b: Value) -> Value {
    compare_with(a, b, |o| o != Ordering::Less)
}

/// How far a value moved between two sweeps of a cycle
fn change(old: &Value, new: &Value) -> f64 {
    match (old, new) {
        (&Value::Num(a), &Value::Num(b)) => (a - b).abs(),
        (a, b) if a == b => 0.0,
        _ => std::f64::INFINITY,
    }
}

// === Argument helpers ===

fn scalar_arg(args: &[Arg], i: usize) -> Value {
    args.get(i).map(Arg::scalar).unwrap_or(Value::Empty)
}

fn num_arg(args: &[Arg], i: usize) -> Result<f64, &'static str> {
    scalar_arg(args, i).to_num()
}

fn num_arg_or(args: &[Arg], i: usize, default: f64) -> Result<f64, &'static str> {
    match args.get(i).map(Arg::scalar) {
        None | Some(Value::Empty) => Ok(default),
        Some(Value::Text(ref s)) if s.is_empty() => Ok(default),
        Some(v) => v.to_num(),
    }
}

fn text_arg(args: &[Arg], i: usize) -> Result<String, &'static str> {
    scalar_arg(args, i).to_text()
}

/// Numbers for aggregates: typed values are coerced, references
/// contribute only their numbers
fn numbers(args: &[Arg]) -> Result<Vec<f64>, &'static str> {
    let mut out = Vec::new();
    for arg in args {
        match *arg {
            Arg::Range(ref values) | Arg::Area(ref values) => {
                for value in values {
                    match *value {
                        Value::Num(n) => out.push(n),
                        Value::Err(e) => return Err(e),
                        _ => {}
                    }
                }
            }
            Arg::Val(Value::Empty) => {}
            Arg::Val(ref v) => out.push(v.to_num()?),
        }
    }
    Ok(out)
}

fn logicals(args: &[Arg]) -> Result<Vec<bool>, &'static str> {
    let mut out = Vec::new();
    for arg in args {
        match *arg {
            Arg::Range(ref values) | Arg::Area(ref values) => {
                for value in values {
                    match *value {
                        Value::Bool(b) => out.push(b),
                        Value::Num(n) => out.push(n != 0.0),
                        Value::Err(e) => return Err(e),
                        _ => {}
                    }
                }
            }
            Arg::Val(Value::Empty) => {}
            Arg::Val(ref v) => out.push(v.to_bool()?),
        }
    }
    if out.is_empty() {
        return Err(VALUE);
    }
    Ok(out)
}

fn char_count_arg(args: &[Arg], i: usize) -> Result<usize, &'static str> {
    let n = num_arg_or(args, i, 1.0)?.trunc();
    if n < 0.0 {
        return Err(VALUE);
    }
    Ok(n as usize)
}

fn done(result: Result<Value, &'static str>) -> Value {
    match result {
        Ok(v) => v,
        Err(e) => Value::Err(e),
    }
}

// === Functions ===

fn f_sum(args: &[Arg]) -> Value {
    done(numbers(args).map(|ns| Value::num(ns.iter().sum())))
}

fn f_product(args: &[Arg]) -> Value {
    done(numbers(args).map(|ns| {
        if ns.is_empty() {
            Value::Num(0.0)
        } else {
            Value::num(ns.iter().product())
        }
    }))
}

fn f_average(args: &[Arg]) -> Value {
    done(numbers(args).and_then(|ns| {
        if ns.is_empty() {
            Err(DIV0)
        } else {
            let total: f64 = ns.iter().sum();
            Ok(Value::num(total / ns.len() as f64))
        }
    }))
}

fn f_min(args: &[Arg]) -> Value {
    done(numbers(args).map(|ns| Value::Num(ns.into_iter().fold(None, |m: Option<f64>, n| Some(m.map_or(n, |m| m.min(n)))).unwrap_or(0.0))))
}

fn f_max(args: &[Arg]) -> Value {
    done(numbers(args).map(|ns| Value::Num(ns.into_iter().fold(None, |m: Option<f64>, n| Some(m.map_or(n, |m| m.max(n)))).unwrap_or(0.0))))
}

fn f_count(args: &[Arg]) -> Value {
    let mut count = 0;
    for arg in args {
        count += match *arg {
            Arg::Range(ref values) | Arg::Area(ref values) => values
                .iter()
                .filter(|v| match **v {
                    Value::Num(_) => true,
                    _ => false,
                })
                .count(),
            Arg::Val(Value::Num(_)) | Arg::Val(Value::Bool(_)) => 1,
            Arg::Val(Value::Text(ref s)) => {
                if numeric_text(s).is_some() {
                    1
                } else {
                    0
                }
            }
            Arg::Val(_) => 0,
        };
    }
    Value::Num(count as f64)
}

fn f_counta(args: &[Arg]) -> Value {
    let count = args
        .iter()
        .flat_map(|arg| arg.values().iter())
        .filter(|v| **v != Value::Empty)
        .count();
    Value::Num(count as f64)
}

fn f_abs(args: &[Arg]) -> Value {
    done(num_arg(args, 0).map(|n| Value::Num(n.abs())))
}

fn round_half_away(x: f64, digits: i32) -> f64 {
    if digits >= 0 {
        let factor = 10f64.powi(digits);
        let scaled = x * factor;
        let cleaned: f64 = format!("{:.12e}", scaled).parse().unwrap_or(scaled);
        cleaned.round() / factor
    } else {
        let factor = 10f64.powi(-digits);
        (x / factor).round() * factor
    }
}

fn f_round(args: &[Arg]) -> Value {
    done(num_arg(args, 0).and_then(|x| {
        let digits = num_arg_or(args, 1, 0.0)?.trunc();
        let digits = digits.max(-308.0).min(308.0) as i32;
        Ok(Value::num(round_half_away(x, digits)))
    }))
}

fn f_int(args: &[Arg]) -> Value {
    done(num_arg(args, 0).map(|n| Value::Num(n.floor())))
}

fn f_mod(args: &[Arg]) -> Value {
    done(num_arg(args, 0).and_then(|n| {
        let d = num_arg(args, 1)?;
        if d == 0.0 {
            return Err(DIV0);
        }
        Ok(Value::num(n - d * (n / d).floor()))
    }))
}

fn f_power(args: &[Arg]) -> Value {
    done(num_arg(args, 0).and_then(|base| {
        let exp = num_arg(args, 1)?;
        if base == 0.0 && exp < 0.0 {
            return Err(DIV0);
        }
        Ok(Value::num(base.powf(exp)))
    }))
}

fn f_sqrt(args: &[Arg]) -> Value {
    done(num_arg(args, 0).and_then(|n| {
        if n < 0.0 {
            Err(NUM)
        } else {
            Ok(Value::Num(n.sqrt()))
        }
    }))
}

fn f_if(args: Vec<Arg>) -> Arg {
    let branch = match scalar_arg(&args, 0).to_bool() {
        Ok(true) => 1,
        Ok(false) => 2,
        Err(e) => return Arg::Val(Value::Err(e)),
    };
    args.into_iter()
        .nth(branch)
        .unwrap_or(Arg::Val(Value::Bool(branch == 1)))
}

fn f_iferror(args: Vec<Arg>) -> Arg {
    let mut args = args.into_iter();
    let value = args.next().unwrap_or(Arg::Val(Value::Empty));
    if value.scalar().is_err() {
        args.next().unwrap_or(Arg::Val(Value::Empty))
    } else {
        value
    }
}

fn f_and(args: &[Arg]) -> Value {
    done(logicals(args).map(|bs| Value::Bool(bs.iter().all(|b| *b))))
}

fn f_or(args: &[Arg]) -> Value {
    done(logicals(args).map(|bs| Value::Bool(bs.iter().any(|b| *b))))
}

fn f_not(args: &[Arg]) -> Value {
    done(scalar_arg(args, 0).to_bool().map(|b| Value::Bool(!b)))
}

fn f_concatenate(args: &[Arg]) -> Value {
    let mut out = String::new();
    for i in 0..args.len() {
        match text_arg(args, i) {
            Ok(s) => out.push_str(&s),
            Err(e) => return Value::Err(e),
        }
    }
    Value::Text(out)
}

fn f_concat(args: &[Arg]) -> Value {
    let mut out = String::new();
    for arg in args {
        for value in arg.values() {
            match value.to_text() {
                Ok(s) => out.push_str(&s),
                Err(e) => return Value::Err(e),
            }
        }
    }
    Value::Text(out)
}

fn f_len(args: &[Arg]) -> Value {
    done(text_arg(args, 0).map(|s| Value::Num(s.chars().count() as f64)))
}

fn f_upper(args: &[Arg]) -> Value {
    done(text_arg(args, 0).map(|s| Value::Text(s.to_uppercase())))
}

fn f_lower(args: &[Arg]) -> Value {
    done(text_arg(args, 0).map(|s| Value::Text(s.to_lowercase())))
}

fn f_left(args: &[Arg]) -> Value {
    done(text_arg(args, 0).and_then(|s| {
        let n = char_count_arg(args, 1)?;
        Ok(Value::Text(s.chars().take(n).collect()))
    }))
}

fn f_right(args: &[Arg]) -> Value {
    done(text_arg(args, 0).and_then(|s| {
        let n = char_count_arg(args, 1)?;
        let len = s.chars().count();
        Ok(Value::Text(s.chars().skip(len.saturating_sub(n)).collect()))
    }))
}

fn f_trim(args: &[Arg]) -> Value {
    done(text_arg(args, 0).map(|s| {
        let words: Vec<&str> = s.split(' ').filter(|w| !w.is_empty()).collect();
        Value::Text(words.join(" "))
    }))
}

// === Text forms ===

fn numeric_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.ends_with('%') {
        let number = trimmed[..trimmed.len() - 1].trim();
        return number.parse::<f64>().ok().map(|n| n / 100.0);
    }
    trimmed.parse::<f64>().ok().and_then(|n| if n.is_finite() { Some(n) } else { None })
}

/// Numbers as a spreadsheet shows them in a general cell
fn format_number(n: f64) -> String {
    if n.is_nan() {
        return NUM.to_string();
    }
    if n == n.trunc() && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let s = format!("{}", n);
    if s.len() <= 17 {
        return s;
    }
    let rounded = format!("{:.*e}", 14, n);
    rounded.parse::<f64>().map(|r| r.to_string()).unwrap_or(s)
}

fn column_letters(col: u16) -> String {
    let mut n = col as u32 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        letters.push((b'A' + ((n - 1) % 26) as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn parse_address(text: &str) -> Option<(u32, u16)> {
    let text = text.trim().replace('$', "");
    let split = match text.find(|c: char| c.is_ascii_digit()) {
        Some(i) => i,
        None => return None,
    };
    let (letters, digits) = text.split_at(split);
    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut col: u32 = 0;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row: u32 = match digits.parse() {
        Ok(row) => row,
        Err(_) => return None,
    };
    if row == 0 || row > 1048576 || col > 16384 {
        return None;
    }
    Some((row - 1, (col - 1) as u16))
}

fn sheet_label(sheet: usize) -> String {
    let name = SHEETS.get(sheet).cloned().unwrap_or("?");
    let plain = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

fn label(key: Key) -> String {
    format!("{}!{}{}", sheet_label(key.0), column_letters(key.2), key.1 + 1)
}

fn sheet_index(name: &str) -> Result<usize, String> {
    let name = name.trim();
    let unquoted = if name.len() >= 2 && name.starts_with('\'') && name.ends_with('\'') {
        name[1..name.len() - 1].replace("''", "'")
    } else {
        name.to_string()
    };
    SHEETS
        .iter()
        .position(|s| s.to_lowercase() == unquoted.to_lowercase())
        .ok_or_else(|| format!("no sheet named '{}'", unquoted))
}

/// Split `Sheet!A1 rest` into the reference and the rest, allowing quoted
/// sheet names with spaces
fn split_ref(text: &str) -> (&str, &str) {
    let start = if text.starts_with('\'') {
        text[1..].find("'!").map(|i| i + 3).unwrap_or(0)
    } else {
        0
    };
    match text[start..].find(char::is_whitespace) {
        Some(i) => (&text[..start + i], text[start + i..].trim()),
        None => (text, ""),
    }
}

fn parse_value(text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() {
        return Value::Empty;
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Value::Text(text[1..text.len() - 1].to_string());
    }
    if text.eq_ignore_ascii_case("TRUE") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("FALSE") {
        return Value::Bool(false);
    }
    if let Some(e) = ERRORS.iter().find(|e| e.eq_ignore_ascii_case(text)) {
        return Value::Err(*e);
    }
    match numeric_text(text) {
        Some(n) => Value::Num(n),
        None => Value::Text(text.to_string()),
    }
}

fn cell_def(key: Key) -> Option<&'static CellDef> {
    CELLS.iter().find(|def| def.key() == key)
}

fn is_output(def: &CellDef) -> bool {
    def.kind == Kind::Formula || def.kind == Kind::Frozen
}

fn kind_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Input => "input",
        Kind::Constant => "constant",
        Kind::Formula => "formula",
        Kind::Frozen => "frozen",
    }
}

// === Command loop ===

const HELP: &str = "commands:
  help                 show this text
  sheets               list the sheets
  show [sheet]         list the cells of a sheet (typing a sheet name works too)
  get <ref>            print one value, e.g. get Sheet1!B3
  set <ref> <value>    change an input cell and recalculate
  inputs               list the input cells
  outputs              list the formula cells
  reset                restore the original inputs
  quit                 leave";

struct Session {
    model: Model,
    current: usize,
}

impl Session {
    /// Run one command; `Ok(false)` ends the session
    fn run(&mut self, line: &str) -> Result<bool, String> {
        let line = line.trim();
        let (command, rest) = match line.find(char::is_whitespace) {
            Some(i) => (&line[..i], line[i..].trim()),
            None => (line, ""),
        };

        match command.to_lowercase().as_str() {
            "" => {}
            "help" | "?" => println!("{}", HELP),
            "quit" | "exit" => return Ok(false),
            "sheets" => self.sheets(),
            "show" => {
                let sheet = if rest.is_empty() {
                    self.current
                } else {
                    sheet_index(rest)?
                };
                self.show(sheet);
            }
            "get" => {
                let key = self.parse_ref(rest)?;
                println!("{} = {}", label(key), self.model.get(key.0, key.1, key.2).display());
            }
            "set" => self.set(rest)?,
            "inputs" => self.list(|def| def.kind == Kind::Input),
            "outputs" => self.list(is_output),
            "reset" => {
                self.model.reset();
                recalc(&mut self.model);
                println!("inputs restored");
            }
            _ => match sheet_index(line) {
                Ok(sheet) => self.show(sheet),
                Err(_) => return Err(format!("unknown command '{}' (try 'help')", command)),
            },
        }
        Ok(true)
    }

    fn parse_ref(&self, text: &str) -> Result<Key, String> {
        let (sheet, address) = match text.rfind('!') {
            Some(i) => (sheet_index(&text[..i])?, &text[i + 1..]),
            None => (self.current, text),
        };
        match parse_address(address) {
            Some((row, col)) => Ok((sheet, row, col)),
            None => Err(format!("'{}' is not a cell reference", text)),
        }
    }

    fn sheets(&self) {
        for (i, name) in SHEETS.iter().enumerate() {
            let cells = CELLS.iter().filter(|d| d.sheet == i);
            let formulas = cells.clone().filter(|d| is_output(d)).count();
            println!("{} ({} cells, {} formulas)", name, cells.count(), formulas);
        }
    }

    fn show(&mut self, sheet: usize) {
        self.current = sheet;
        println!("{}", SHEETS.get(sheet).cloned().unwrap_or(""));
        for def in CELLS.iter().filter(|d| d.sheet == sheet) {
            let address = format!("{}{}", column_letters(def.col), def.row + 1);
            let value = self.model.get(def.sheet, def.row, def.col).display();
            if is_output(def) {
                println!("  {:<8} {:<9} {:<16} {}", address, kind_name(def.kind), value, def.formula);
            } else {
                println!("  {:<8} {:<9} {}", address, kind_name(def.kind), value);
            }
        }
    }

    fn list<F: Fn(&CellDef) -> bool>(&self, wanted: F) {
        for def in CELLS.iter().filter(|d| wanted(d)) {
            let value = self.model.get(def.sheet, def.row, def.col).display();
            if def.kind == Kind::Frozen {
                println!("{} = {}  (frozen)", label(def.key()), value);
            } else {
                println!("{} = {}", label(def.key()), value);
            }
        }
    }

    fn set(&mut self, rest: &str) -> Result<(), String> {
        let (target, text) = split_ref(rest);
        let key = self.parse_ref(target)?;
        match cell_def(key) {
            Some(def) if def.kind == Kind::Input => {}
            _ => return Err(format!("{} is not an input cell (see 'inputs')", label(key))),
        }

        let before: Vec<Value> = CELLS
            .iter()
            .filter(|d| is_output(d))
            .map(|d| self.model.get(d.sheet, d.row, d.col))
            .collect();

        self.model.set(key.0, key.1, key.2, parse_value(text));
        recalc(&mut self.model);
        println!("{} = {}", label(key), self.model.get(key.0, key.1, key.2).display());

        for (def, old) in CELLS.iter().filter(|d| is_output(d)).zip(before) {
            let new = self.model.get(def.sheet, def.row, def.col);
            if new != old {
                println!("  {}: {} -> {}", label(def.key()), old.display(), new.display());
            }
        }
        Ok(())
    }
}

fn main() {
    let mut session = Session {
        model: Model::new(),
        current: 0,
    };
    recalc(&mut session.model);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        if let Err(message) = session.run(&args.join(" ")) {
            eprintln!("error: {}", message);
            std::process::exit(1);
        }
        return;
    }

    println!("{} - type 'help' for commands", TITLE);
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match session.run(&line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(message) => println!("error: {}", message),
        }
    }
}
"##;
