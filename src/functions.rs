//! The built-in filter registry: arity validation and the implementations
//! behind every `$name` pipeline stage.

use crate::error::PathError;
use crate::value::{
    coerce_datetime, compare_total, compare_values, values_equal, Value,
};
use chrono::Utc;
use indexmap::IndexMap;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Checks a filter call against the registry: the name must be a known
/// built-in and the argument count legal. Runs once at parse time.
pub(crate) fn validate_call(name: &str, argc: usize) -> Result<(), PathError> {
    let arity_ok = match name {
        // no arguments
        "inc" | "dec" | "double" | "square" | "neg" | "sqrt" | "floor" | "ceil" | "abs"
        | "sign" | "exp" | "string" | "int" | "float" | "decimal" | "bool" | "quote" | "even"
        | "odd" | "len" | "max" | "min" | "sum" | "avg" | "unique" | "first" | "last"
        | "is_empty" | "non_empty" | "timestamp" | "age_seconds" | "median" | "q1" | "q3"
        | "iqr" | "mode" | "stdev" => argc == 0,
        // optional single argument
        "round" | "log" | "strip" | "split" | "sorted" | "to_datetime" => argc <= 1,
        // exactly one argument
        "add" | "sub" | "mul" | "div" | "mod" | "pow" | "rpow" | "root" | "pct" | "pctile"
        | "gt" | "lt" | "gte" | "lte" | "contains" | "in" | "join" | "startswith" | "endswith"
        | "matches" | "default" | "type_is" | "before" | "after" => argc == 1,
        // exactly two arguments
        "clamp" | "between" | "replace" => argc == 2,
        // one or more
        "coalesce" => argc >= 1,
        // any number of keys
        "pick" | "unpick" => true,
        _ => {
            return Err(PathError::operator(name, "unknown filter function"));
        }
    };
    if arity_ok {
        Ok(())
    } else {
        Err(PathError::operator(
            name,
            format!("invalid argument count {}", argc),
        ))
    }
}

/// Dispatches a filter call to the correct implementation.
pub(crate) fn apply_function(
    name: &str,
    value: &Value,
    args: &[Value],
) -> Result<Value, PathError> {
    let one = Value::Null;
    let first = args.first().unwrap_or(&one);
    let second = args.get(1).unwrap_or(&one);

    let result = match name {
        // Numeric
        "inc" => func_add(value, &Value::Int(1)),
        "dec" => func_sub(value, &Value::Int(1)),
        "double" => func_mul(value, &Value::Int(2)),
        "square" => func_mul(value, value),
        "add" => func_add(value, first),
        "sub" => func_sub(value, first),
        "mul" => func_mul(value, first),
        "div" => func_div(value, first),
        "mod" => func_mod(value, first),
        "neg" => func_neg(value),
        "pow" => func_pow(value, first),
        "rpow" => func_pow(first, value),
        "sqrt" => func_sqrt(value),
        "root" => func_root(value, first),
        "round" => func_round(value, args),
        "floor" => func_floor(value),
        "ceil" => func_ceil(value),
        "abs" => func_abs(value),
        "clamp" => func_clamp(value, first, second),
        "sign" => func_sign(value),
        "log" => func_log(value, args),
        "exp" => func_exp(value),
        "pct" => func_pct(value, first),

        // Predicates
        "even" => Value::Bool(matches!(value, Value::Int(n) if n.rem_euclid(2) == 0)),
        "odd" => Value::Bool(matches!(value, Value::Int(n) if n.rem_euclid(2) == 1)),
        "gt" => ordered(value, first, Ordering::Greater, false),
        "lt" => ordered(value, first, Ordering::Less, false),
        "gte" => ordered(value, first, Ordering::Greater, true),
        "lte" => ordered(value, first, Ordering::Less, true),
        "between" => Value::Bool(
            ordered(value, first, Ordering::Greater, true).is_truthy()
                && ordered(value, second, Ordering::Less, true).is_truthy(),
        ),
        "contains" => Value::Bool(contains(value, first)),
        "in" => Value::Bool(contains(first, value)),
        "type_is" => Value::Bool(value.type_name().eq_ignore_ascii_case(&first.render())),
        "is_empty" => Value::Bool(is_empty(value)),
        "non_empty" => Value::Bool(!is_empty(value)),

        // Conversion
        "string" => Value::String(value.render()),
        "int" => func_int(value),
        "float" => func_float(value),
        "decimal" => func_decimal(value),
        "bool" => func_bool(value),
        "quote" => Value::String(format!("\"{}\"", value.render())),

        // String
        "lower" => Value::String(value.render().to_lowercase()),
        "upper" => Value::String(value.render().to_uppercase()),
        "title" => Value::String(title_case(&value.render())),
        "strip" => func_strip(value, args),
        "replace" => Value::String(value.render().replace(&first.render(), &second.render())),
        "split" => func_split(value, args),
        "join" => func_join(value, first),
        "startswith" => Value::Bool(value.render().starts_with(&first.render())),
        "endswith" => Value::Bool(value.render().ends_with(&first.render())),
        "matches" => func_matches(value, first)?,

        // Collection
        "len" => func_len(value),
        "max" => func_extreme(value, Ordering::Greater),
        "min" => func_extreme(value, Ordering::Less),
        "sum" => func_sum(value),
        "avg" => func_avg(value),
        "unique" => func_unique(value),
        "sorted" => func_sorted(value, args),
        "first" => func_first(value),
        "last" => func_last(value),
        "pick" => func_pick(value, args, true),
        "unpick" => func_pick(value, args, false),

        // Null / fallback
        "default" => {
            if value.is_null() {
                first.clone()
            } else {
                value.clone()
            }
        }
        "coalesce" => {
            if !value.is_null() {
                value.clone()
            } else {
                args.iter()
                    .find(|candidate| !candidate.is_null())
                    .cloned()
                    .unwrap_or(Value::Null)
            }
        }

        // Datetime
        "to_datetime" => {
            let fmt = args.first().map(Value::render);
            coerce_datetime(value, fmt.as_deref())
                .map(Value::DateTime)
                .unwrap_or(Value::Null)
        }
        "timestamp" => coerce_datetime(value, None)
            .map(|dt| Value::Float(dt.timestamp_micros() as f64 / 1e6))
            .unwrap_or(Value::Null),
        "age_seconds" => coerce_datetime(value, None)
            .map(|dt| {
                let elapsed = Utc::now().fixed_offset() - dt;
                Value::Float(elapsed.num_milliseconds() as f64 / 1000.0)
            })
            .unwrap_or(Value::Null),
        "before" => date_compare(value, first, Ordering::Less),
        "after" => date_compare(value, first, Ordering::Greater),

        // Statistics
        "pctile" => func_pctile(value, first),
        "median" => func_fixed_pctile(value, 50.0),
        "q1" => func_fixed_pctile(value, 25.0),
        "q3" => func_fixed_pctile(value, 75.0),
        "iqr" => func_iqr(value),
        "mode" => func_mode(value),
        "stdev" => func_stdev(value),

        _ => {
            return Err(PathError::operator(name, "unknown filter function"));
        }
    };
    Ok(result)
}

// --- Arithmetic helpers ---
//
// Integer arithmetic stays integral, decimals stay decimal, anything else
// numeric widens to float. Overflow widens to float rather than erroring.

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(n) => Some(Decimal::from(*n)),
        Value::Decimal(d) => Some(*d),
        Value::Float(f) => Decimal::from_f64_retain(*f),
        _ => None,
    }
}

fn num_add(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(match x.checked_add(*y) {
            Some(n) => Value::Int(n),
            None => Value::Float(*x as f64 + *y as f64),
        }),
        (Value::Decimal(_), _) | (_, Value::Decimal(_)) if a.is_numeric() && b.is_numeric() => {
            let x = to_decimal(a)?;
            let y = to_decimal(b)?;
            Some(match x.checked_add(y) {
                Some(d) => Value::Decimal(d),
                None => Value::Float(a.as_f64()? + b.as_f64()?),
            })
        }
        _ if a.is_numeric() && b.is_numeric() => Some(Value::Float(a.as_f64()? + b.as_f64()?)),
        _ => None,
    }
}

fn num_sub(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(match x.checked_sub(*y) {
            Some(n) => Value::Int(n),
            None => Value::Float(*x as f64 - *y as f64),
        }),
        (Value::Decimal(_), _) | (_, Value::Decimal(_)) if a.is_numeric() && b.is_numeric() => {
            let x = to_decimal(a)?;
            let y = to_decimal(b)?;
            Some(match x.checked_sub(y) {
                Some(d) => Value::Decimal(d),
                None => Value::Float(a.as_f64()? - b.as_f64()?),
            })
        }
        _ if a.is_numeric() && b.is_numeric() => Some(Value::Float(a.as_f64()? - b.as_f64()?)),
        _ => None,
    }
}

fn num_mul(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(match x.checked_mul(*y) {
            Some(n) => Value::Int(n),
            None => Value::Float(*x as f64 * *y as f64),
        }),
        (Value::Decimal(_), _) | (_, Value::Decimal(_)) if a.is_numeric() && b.is_numeric() => {
            let x = to_decimal(a)?;
            let y = to_decimal(b)?;
            Some(match x.checked_mul(y) {
                Some(d) => Value::Decimal(d),
                None => Value::Float(a.as_f64()? * b.as_f64()?),
            })
        }
        _ if a.is_numeric() && b.is_numeric() => Some(Value::Float(a.as_f64()? * b.as_f64()?)),
        _ => None,
    }
}

fn func_add(value: &Value, rhs: &Value) -> Value {
    if let Some(result) = num_add(value, rhs) {
        return result;
    }
    match (value, rhs) {
        (Value::String(a), Value::String(b)) => Value::String(format!("{}{}", a, b)),
        (Value::Array(a), Value::Array(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Value::Array(out)
        }
        _ => value.clone(),
    }
}

fn func_sub(value: &Value, rhs: &Value) -> Value {
    num_sub(value, rhs).unwrap_or_else(|| value.clone())
}

fn func_mul(value: &Value, rhs: &Value) -> Value {
    if let Some(result) = num_mul(value, rhs) {
        return result;
    }
    match (value, rhs) {
        (Value::String(s), Value::Int(n)) => Value::String(s.repeat((*n).max(0) as usize)),
        (Value::Array(items), Value::Int(n)) => {
            let mut out = Vec::new();
            for _ in 0..(*n).max(0) {
                out.extend(items.iter().cloned());
            }
            Value::Array(out)
        }
        _ => value.clone(),
    }
}

fn func_div(value: &Value, rhs: &Value) -> Value {
    if rhs.as_f64() == Some(0.0) {
        return Value::Null;
    }
    if !(value.is_numeric() && rhs.is_numeric()) {
        return value.clone();
    }
    if matches!(value, Value::Decimal(_)) || matches!(rhs, Value::Decimal(_)) {
        if let Some((x, y)) = to_decimal_pair(value, rhs) {
            return x.checked_div(y).map(Value::Decimal).unwrap_or(Value::Null);
        }
    }
    match (value.as_f64(), rhs.as_f64()) {
        (Some(x), Some(y)) => Value::Float(x / y),
        _ => value.clone(),
    }
}

fn func_mod(value: &Value, rhs: &Value) -> Value {
    if rhs.as_f64() == Some(0.0) {
        return Value::Null;
    }
    match (value, rhs) {
        // Python-style modulo: result takes the divisor's sign.
        (Value::Int(x), Value::Int(y)) => Value::Int(((x % y) + y) % y),
        _ if value.is_numeric() && rhs.is_numeric() => {
            match (value.as_f64(), rhs.as_f64()) {
                (Some(x), Some(y)) => Value::Float(x - y * (x / y).floor()),
                _ => value.clone(),
            }
        }
        _ => value.clone(),
    }
}

fn to_decimal_pair(a: &Value, b: &Value) -> Option<(Decimal, Decimal)> {
    Some((to_decimal(a)?, to_decimal(b)?))
}

fn func_neg(value: &Value) -> Value {
    match value {
        Value::Int(n) => n.checked_neg().map(Value::Int).unwrap_or(Value::Float(-(*n as f64))),
        Value::Float(f) => Value::Float(-f),
        Value::Decimal(d) => Value::Decimal(-*d),
        _ => value.clone(),
    }
}

fn func_pow(base: &Value, exponent: &Value) -> Value {
    match (base, exponent) {
        (Value::Int(b), Value::Int(e)) if *e >= 0 => {
            match u32::try_from(*e).ok().and_then(|e| b.checked_pow(e)) {
                Some(n) => Value::Int(n),
                None => Value::Float((*b as f64).powf(*e as f64)),
            }
        }
        _ if base.is_numeric() && exponent.is_numeric() => {
            match (base.as_f64(), exponent.as_f64()) {
                (Some(b), Some(e)) => Value::Float(b.powf(e)),
                _ => base.clone(),
            }
        }
        _ => base.clone(),
    }
}

fn func_sqrt(value: &Value) -> Value {
    match value.as_f64() {
        Some(f) if f < 0.0 => Value::Null,
        Some(f) => Value::Float(f.sqrt()),
        None => value.clone(),
    }
}

fn func_root(value: &Value, degree: &Value) -> Value {
    match (value.as_f64(), degree.as_f64()) {
        (Some(v), Some(d)) => {
            if v < 0.0 || d <= 0.0 {
                Value::Null
            } else {
                Value::Float(v.powf(1.0 / d))
            }
        }
        _ => value.clone(),
    }
}

fn round_half_even(x: f64, ndigits: i32) -> f64 {
    let factor = 10f64.powi(ndigits);
    let scaled = x * factor;
    if !scaled.is_finite() {
        return x;
    }
    let floor = scaled.floor();
    let diff = scaled - floor;
    let rounded = if (diff - 0.5).abs() < 1e-9 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / factor
}

fn func_round(value: &Value, args: &[Value]) -> Value {
    let ndigits = args.first().and_then(Value::as_i64);
    match value {
        Value::Int(_) => value.clone(),
        Value::Float(f) => match ndigits {
            None => Value::Int(round_half_even(*f, 0) as i64),
            Some(n) => Value::Float(round_half_even(*f, n as i32)),
        },
        Value::Decimal(d) => {
            let rounded = d.round_dp(ndigits.unwrap_or(0).clamp(0, 28) as u32);
            match ndigits {
                None => rounded.to_i64().map(Value::Int).unwrap_or(Value::Null),
                Some(_) => Value::Decimal(rounded),
            }
        }
        _ => value.clone(),
    }
}

fn func_floor(value: &Value) -> Value {
    match value {
        Value::Int(_) => value.clone(),
        Value::Float(f) => Value::Int(f.floor() as i64),
        Value::Decimal(d) => Value::Decimal(d.floor()),
        _ => value.clone(),
    }
}

fn func_ceil(value: &Value) -> Value {
    match value {
        Value::Int(_) => value.clone(),
        Value::Float(f) => Value::Int(f.ceil() as i64),
        Value::Decimal(d) => Value::Decimal(d.ceil()),
        _ => value.clone(),
    }
}

fn func_abs(value: &Value) -> Value {
    match value {
        Value::Int(n) => n.checked_abs().map(Value::Int).unwrap_or(Value::Float((*n as f64).abs())),
        Value::Float(f) => Value::Float(f.abs()),
        Value::Decimal(d) => Value::Decimal(d.abs()),
        _ => value.clone(),
    }
}

fn func_clamp(value: &Value, low: &Value, high: &Value) -> Value {
    let raised = match compare_values(value, low) {
        Some(Ordering::Less) => low.clone(),
        Some(_) => value.clone(),
        None => return value.clone(),
    };
    match compare_values(&raised, high) {
        Some(Ordering::Greater) => high.clone(),
        Some(_) => raised,
        None => value.clone(),
    }
}

fn func_sign(value: &Value) -> Value {
    match value.as_f64() {
        Some(f) => match f.partial_cmp(&0.0) {
            Some(Ordering::Greater) => Value::Int(1),
            Some(Ordering::Less) => Value::Int(-1),
            _ => Value::Int(0),
        },
        None => value.clone(),
    }
}

fn func_log(value: &Value, args: &[Value]) -> Value {
    let v = match value.as_f64() {
        Some(v) => v,
        None => return value.clone(),
    };
    let base = match args.first() {
        Some(arg) => match arg.as_f64() {
            Some(b) => b,
            None => return Value::Null,
        },
        None => std::f64::consts::E,
    };
    if v <= 0.0 || base <= 0.0 || base == 1.0 {
        return Value::Null;
    }
    Value::Float(v.ln() / base.ln())
}

fn func_exp(value: &Value) -> Value {
    match value.as_f64() {
        Some(f) => Value::Float(f.exp()),
        None => value.clone(),
    }
}

fn func_pct(value: &Value, percent: &Value) -> Value {
    match (value.as_f64(), percent.as_f64()) {
        (Some(v), Some(p)) => Value::Float(v * (p / 100.0)),
        _ => value.clone(),
    }
}

// --- Predicate helpers ---

fn ordered(value: &Value, threshold: &Value, wanted: Ordering, or_equal: bool) -> Value {
    let result = match compare_values(value, threshold) {
        Some(ordering) => ordering == wanted || (or_equal && ordering == Ordering::Equal),
        None => false,
    };
    Value::Bool(result)
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => s.contains(&needle.render()),
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::Object(map) => match needle {
            Value::String(key) => map.contains_key(key),
            _ => false,
        },
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// --- Conversion helpers ---

fn func_int(value: &Value) -> Value {
    match value {
        Value::Int(_) => value.clone(),
        Value::Float(f) => Value::Int(f.trunc() as i64),
        Value::Bool(b) => Value::Int(*b as i64),
        Value::Decimal(d) => d.trunc().to_i64().map(Value::Int).unwrap_or(Value::Null),
        Value::String(s) => s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn func_float(value: &Value) -> Value {
    match value {
        Value::Float(_) => value.clone(),
        Value::Int(n) => Value::Float(*n as f64),
        Value::Bool(b) => Value::Float(*b as i64 as f64),
        Value::Decimal(d) => d.to_f64().map(Value::Float).unwrap_or(Value::Null),
        Value::String(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn func_decimal(value: &Value) -> Value {
    match value {
        Value::Decimal(_) => value.clone(),
        Value::Int(n) => Value::Decimal(Decimal::from(*n)),
        Value::Float(f) => Decimal::from_f64_retain(*f)
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        Value::String(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn func_bool(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            let normalized = s.trim().to_lowercase();
            Value::Bool(matches!(
                normalized.as_str(),
                "1" | "true" | "yes" | "y" | "on"
            ))
        }
        other => Value::Bool(other.is_truthy()),
    }
}

// --- String helpers ---

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut boundary = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if boundary {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(ch);
            boundary = true;
        }
    }
    out
}

fn func_strip(value: &Value, args: &[Value]) -> Value {
    let text = value.render();
    let stripped = match args.first() {
        Some(Value::Null) | None => text.trim().to_string(),
        Some(chars) => {
            let set: Vec<char> = chars.render().chars().collect();
            text.trim_matches(|c: char| set.contains(&c)).to_string()
        }
    };
    Value::String(stripped)
}

fn func_split(value: &Value, args: &[Value]) -> Value {
    let text = value.render();
    let parts: Vec<Value> = match args.first() {
        Some(Value::Null) | None => text
            .split_whitespace()
            .map(|part| Value::String(part.to_string()))
            .collect(),
        Some(sep) => {
            let sep = sep.render();
            if sep.is_empty() {
                return Value::Null;
            }
            text.split(sep.as_str())
                .map(|part| Value::String(part.to_string()))
                .collect()
        }
    };
    Value::Array(parts)
}

fn func_join(value: &Value, sep: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(Value::render).collect();
            Value::String(rendered.join(&sep.render()))
        }
        other => Value::String(other.render()),
    }
}

fn func_matches(value: &Value, pattern: &Value) -> Result<Value, PathError> {
    let re = Regex::new(&pattern.render())
        .map_err(|err| PathError::operator("matches", format!("invalid pattern: {}", err)))?;
    Ok(Value::Bool(re.is_match(&value.render())))
}

// --- Collection helpers ---

fn func_len(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::Int(s.chars().count() as i64),
        Value::Array(items) => Value::Int(items.len() as i64),
        Value::Object(map) => Value::Int(map.len() as i64),
        _ => Value::Null,
    }
}

fn func_extreme(value: &Value, wanted: Ordering) -> Value {
    let items = match value.as_array() {
        Some(items) => items,
        None => return value.clone(),
    };
    let mut best: Option<&Value> = None;
    for item in items {
        best = match best {
            None => Some(item),
            Some(current) => {
                if compare_total(item, current) == wanted {
                    Some(item)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.cloned().unwrap_or(Value::Null)
}

fn func_sum(value: &Value) -> Value {
    let items = match value.as_array() {
        Some(items) => items,
        None => return value.clone(),
    };
    let mut total = Value::Int(0);
    for item in items {
        total = match num_add(&total, item) {
            Some(next) => next,
            None => return Value::Null,
        };
    }
    total
}

fn func_avg(value: &Value) -> Value {
    let items = match value.as_array() {
        Some(items) => items,
        None => return value.clone(),
    };
    if items.is_empty() {
        return Value::Null;
    }
    let total = func_sum(value);
    if total.is_null() {
        return Value::Null;
    }
    func_div(&total, &Value::Int(items.len() as i64))
}

fn func_unique(value: &Value) -> Value {
    let items = match value.as_array() {
        Some(items) => items,
        None => return value.clone(),
    };
    let mut seen: Vec<&Value> = Vec::new();
    let mut out = Vec::new();
    for item in items {
        if !seen.iter().any(|kept| values_equal(kept, item)) {
            seen.push(item);
            out.push(item.clone());
        }
    }
    Value::Array(out)
}

fn func_sorted(value: &Value, args: &[Value]) -> Value {
    let items = match value.as_array() {
        Some(items) => items,
        None => return value.clone(),
    };
    let mut out = items.clone();
    out.sort_by(compare_total);
    if args.first().map(Value::is_truthy).unwrap_or(false) {
        out.reverse();
    }
    Value::Array(out)
}

fn func_first(value: &Value) -> Value {
    match value {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn func_last(value: &Value) -> Value {
    match value {
        Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn func_pick(value: &Value, args: &[Value], keep: bool) -> Value {
    let map = match value.as_object() {
        Some(map) => map,
        None => return Value::Null,
    };
    let keys: Vec<String> = args.iter().map(Value::render).collect();
    let mut out = IndexMap::new();
    for (key, item) in map {
        if keys.contains(key) == keep {
            out.insert(key.clone(), item.clone());
        }
    }
    Value::Object(out)
}

// --- Datetime helpers ---

fn date_compare(value: &Value, rhs: &Value, wanted: Ordering) -> Value {
    match (coerce_datetime(value, None), coerce_datetime(rhs, None)) {
        (Some(left), Some(right)) => Value::Bool(left.cmp(&right) == wanted),
        _ => Value::Bool(false),
    }
}

// --- Statistics helpers ---

fn numeric_sequence(value: &Value) -> Option<Vec<f64>> {
    let items = value.as_array()?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let n = item
            .as_f64()
            .or_else(|| item.as_str().and_then(|s| s.trim().parse::<f64>().ok()))?;
        out.push(n);
    }
    Some(out)
}

fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let rank = (p / 100.0) * (sorted.len() as f64 - 1.0);
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;
    let fraction = rank - lower_idx as f64;
    let lower = sorted[lower_idx];
    let upper = sorted[upper_idx];
    Some(lower + (upper - lower) * fraction)
}

fn func_pctile(value: &Value, p: &Value) -> Value {
    let mut values = match numeric_sequence(value) {
        Some(values) => values,
        None => return value.clone(),
    };
    if values.is_empty() {
        return Value::Null;
    }
    let p = match p.as_f64() {
        Some(p) => p,
        None => return Value::Null,
    };
    values.sort_by(|a, b| a.total_cmp(b));
    percentile(&values, p).map(Value::Float).unwrap_or(Value::Null)
}

fn func_fixed_pctile(value: &Value, p: f64) -> Value {
    func_pctile(value, &Value::Float(p))
}

fn func_iqr(value: &Value) -> Value {
    let mut values = match numeric_sequence(value) {
        Some(values) => values,
        None => return value.clone(),
    };
    if values.is_empty() {
        return Value::Null;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    match (percentile(&values, 75.0), percentile(&values, 25.0)) {
        (Some(q3), Some(q1)) => Value::Float(q3 - q1),
        _ => Value::Null,
    }
}

fn func_mode(value: &Value) -> Value {
    let items = match value.as_array() {
        Some(items) => items,
        None => return value.clone(),
    };
    if items.is_empty() {
        return Value::Null;
    }
    let mut best: Option<&Value> = None;
    let mut best_count = 0usize;
    for candidate in items {
        let count = items
            .iter()
            .filter(|item| values_equal(item, candidate))
            .count();
        if count > best_count {
            best_count = count;
            best = Some(candidate);
        }
    }
    best.cloned().unwrap_or(Value::Null)
}

fn func_stdev(value: &Value) -> Value {
    let values = match numeric_sequence(value) {
        Some(values) => values,
        None => return value.clone(),
    };
    if values.is_empty() {
        return Value::Null;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|x| {
            let diff = *x - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    Value::Float(variance.sqrt())
}
