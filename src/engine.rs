//! The read-side interpreter: token traversal for `get` and `exists`.

use crate::ast::{ParsedPath, Token};
use crate::error::PathError;
use crate::functions;
use crate::parser;
use crate::pipeline;
use crate::value::Value;
use log::debug;

/// Options for [`get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Returned when the path does not resolve and `strict` is off.
    pub default: Value,
    /// Raise [`PathError::Resolution`] instead of returning the default.
    pub strict: bool,
}

/// Traversal outcome: a concrete value, or the undefined sentinel carrying
/// the token that failed to resolve (for strict-mode error messages).
pub(crate) enum Resolution {
    Hit(Value),
    Miss(String),
}

/// Reads the value (or projection) a path selects out of `data`.
pub fn get(data: &Value, path: &str, options: &GetOptions) -> Result<Value, PathError> {
    let parsed = parser::parse_path(path)?;
    let mut current = match resolve(data, &parsed.tokens, data)? {
        Resolution::Hit(value) => value,
        Resolution::Miss(token) => {
            if options.strict {
                return Err(PathError::resolution(path, &token, "path does not resolve"));
            }
            debug!("path '{}' missed at '{}', returning default", path, token);
            return Ok(options.default.clone());
        }
    };
    if let Some(transform) = &parsed.transform {
        current = pipeline::apply(transform, current, data)?;
    }
    Ok(current)
}

/// True when the path resolves to a defined value; a projection that
/// collected nothing counts as absent.
pub fn exists(data: &Value, path: &str, strict: bool) -> Result<bool, PathError> {
    let parsed = parser::parse_path(path)?;
    let mut current = match resolve(data, &parsed.tokens, data)? {
        Resolution::Hit(value) => value,
        Resolution::Miss(token) => {
            if strict {
                return Err(PathError::resolution(path, &token, "path does not resolve"));
            }
            return Ok(false);
        }
    };
    if let Some(transform) = &parsed.transform {
        current = pipeline::apply(transform, current, data)?;
    }
    if parsed.has_projection() {
        if let Value::Array(items) = &current {
            return Ok(!items.is_empty());
        }
    }
    Ok(true)
}

/// Applies a built-in filter (or a full `$name(...)|...` pipeline
/// expression) to a value outside of any path traversal.
pub fn run_filter_function(filter: &str, value: Value, args: &[Value]) -> Result<Value, PathError> {
    let trimmed = filter.trim();
    if trimmed.starts_with('$') {
        let compiled = parser::parse_pipeline(trimmed)?;
        return pipeline::apply(&compiled, value, &Value::Null);
    }
    functions::validate_call(trimmed, args.len())?;
    functions::apply_function(trimmed, &value, args)
}

/// Resolves a compiled `$$root` reference against the root document.
/// Root references always resolve strictly.
pub(crate) fn eval_root_ref(parsed: &ParsedPath, root: &Value) -> Result<Value, PathError> {
    let mut current = match resolve(root, &parsed.tokens, root)? {
        Resolution::Hit(value) => value,
        Resolution::Miss(token) => {
            return Err(PathError::resolution(
                "$$root",
                &token,
                "root reference does not resolve",
            ));
        }
    };
    if let Some(transform) = &parsed.transform {
        current = pipeline::apply(transform, current, root)?;
    }
    Ok(current)
}

/// Strict-mode pre-flight for writes: the given token prefix must resolve.
pub(crate) fn ensure_resolves(data: &Value, path: &str, tokens: &[Token]) -> Result<(), PathError> {
    match resolve(data, tokens, data)? {
        Resolution::Hit(_) => Ok(()),
        Resolution::Miss(token) => Err(PathError::resolution(
            path,
            &token,
            "strict mode requires the path to resolve",
        )),
    }
}

/// The recursive interpreter: transforms the cursor per token, recursing
/// with the remaining tokens. Projections (`Map`, wildcards, filters,
/// slices) build a fresh sequence and continue on it.
pub(crate) fn resolve(
    cursor: &Value,
    tokens: &[Token],
    root: &Value,
) -> Result<Resolution, PathError> {
    let (token, rest) = match tokens.split_first() {
        Some(pair) => pair,
        None => return Ok(Resolution::Hit(cursor.clone())),
    };

    match token {
        Token::RootKey(key) | Token::Key(key) => match cursor {
            Value::Object(map) => match map.get(key) {
                Some(child) => resolve(child, rest, root),
                None => Ok(Resolution::Miss(token.to_string())),
            },
            // Key access over a sequence extracts the key from every
            // mapping element that has it.
            Value::Array(items) => {
                let mut extracted = Vec::new();
                for item in items {
                    if let Some(found) = item.as_object().and_then(|map| map.get(key)) {
                        extracted.push(found.clone());
                    }
                }
                resolve(&Value::Array(extracted), rest, root)
            }
            _ => Ok(Resolution::Miss(token.to_string())),
        },

        Token::Root => resolve(root, rest, root),

        Token::Index(index) => match cursor {
            Value::Array(items) => match normalize_index(*index, items.len()) {
                Some(idx) => resolve(&items[idx], rest, root),
                None => Ok(Resolution::Miss(token.to_string())),
            },
            _ => Ok(Resolution::Miss(token.to_string())),
        },

        Token::Slice { start, stop, step } => match cursor {
            Value::Array(items) => {
                let picked: Vec<Value> = slice_indices(items.len(), *start, *stop, *step)
                    .into_iter()
                    .map(|idx| items[idx].clone())
                    .collect();
                resolve(&Value::Array(picked), rest, root)
            }
            _ => Ok(Resolution::Miss(token.to_string())),
        },

        // Map short-circuits: the remainder is consumed per element and
        // the collected hits are the result.
        Token::Map => match cursor {
            Value::Array(items) => {
                let mut collected = Vec::new();
                for item in items {
                    if let Resolution::Hit(value) = resolve(item, rest, root)? {
                        collected.push(value);
                    }
                }
                Ok(Resolution::Hit(Value::Array(collected)))
            }
            _ => Ok(Resolution::Miss(token.to_string())),
        },

        Token::Wildcard => {
            let children: Vec<&Value> = match cursor {
                Value::Object(map) => map.values().collect(),
                Value::Array(items) => items.iter().collect(),
                _ => return Ok(Resolution::Miss(token.to_string())),
            };
            let mut collected = Vec::new();
            for child in children {
                if let Resolution::Hit(value) = resolve(child, rest, root)? {
                    collected.push(value);
                }
            }
            Ok(Resolution::Hit(Value::Array(collected)))
        }

        Token::DeepWildcard => {
            let mut nodes = Vec::new();
            collect_preorder(cursor, &mut nodes);
            let mut collected = Vec::new();
            for node in nodes {
                // A key remainder never extracts out of sequence nodes
                // here: their mapping elements are visited on their own.
                if matches!(rest.first(), Some(Token::Key(_) | Token::RootKey(_)))
                    && node.is_array()
                {
                    continue;
                }
                if let Resolution::Hit(value) = resolve(node, rest, root)? {
                    collected.push(value);
                }
            }
            Ok(Resolution::Hit(Value::Array(collected)))
        }

        Token::Filter(matcher) => match cursor {
            Value::Array(items) => {
                let mut retained = Vec::new();
                for item in items {
                    if pipeline::matcher_matches(matcher, item, root)? {
                        retained.push(item.clone());
                    }
                }
                resolve(&Value::Array(retained), rest, root)
            }
            _ => Ok(Resolution::Miss(token.to_string())),
        },
    }
}

/// Pre-order enumeration: the node itself, then its children recursively
/// in insertion order.
fn collect_preorder<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(node);
    match node {
        Value::Object(map) => {
            for child in map.values() {
                collect_preorder(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_preorder(child, out);
            }
        }
        _ => {}
    }
}

/// Python-style index normalization: negative counts from the end.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let adjusted = if index < 0 { index + len } else { index };
    if (0..len).contains(&adjusted) {
        Some(adjusted as usize)
    } else {
        None
    }
}

/// Python-style slice index computation, including negative steps.
pub(crate) fn slice_indices(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Vec<usize> {
    let len = len as i64;
    let step = step.unwrap_or(1);
    if step == 0 || len == 0 {
        return Vec::new();
    }

    let adjust = |bound: Option<i64>, default: i64| -> i64 {
        match bound {
            None => default,
            Some(b) => {
                let shifted = if b < 0 { b + len } else { b };
                if step > 0 {
                    shifted.clamp(0, len)
                } else {
                    shifted.clamp(-1, len - 1)
                }
            }
        }
    };
    let start = adjust(start, if step > 0 { 0 } else { len - 1 });
    let stop = adjust(stop, if step > 0 { len } else { -1 });

    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    out
}
