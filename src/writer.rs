//! The write-side interpreter: in-place `set` and `unset` through `&mut`
//! recursion. Terminal writes commit in a short, scoped operation; parents
//! scaffold or overwrite the child slot before recursing into it.

use crate::ast::{CmpOp, Matcher, MatcherExpr, Operand, ParsedPath, Pipeline, Token};
use crate::engine;
use crate::error::PathError;
use crate::parser;
use crate::pipeline;
use crate::value::Value;
use indexmap::IndexMap;
use log::trace;

const NULL_ROOT: Value = Value::Null;

/// Options for [`set`].
#[derive(Debug, Clone)]
pub struct SetOptions {
    /// Require the parent path to already resolve.
    pub strict: bool,
    /// Create intermediate containers for missing path steps.
    pub create_missing: bool,
    /// Append a seeded element when a terminal filter matches nothing.
    pub create_filter_match: bool,
    /// Replace scalars (and wrong-shaped containers) standing where the
    /// path needs a container.
    pub overwrite_incompatible: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            strict: false,
            create_missing: true,
            create_filter_match: true,
            overwrite_incompatible: true,
        }
    }
}

#[derive(Clone, Copy)]
struct WriteContext<'a> {
    root: &'a Value,
    create_missing: bool,
    create_filter_match: bool,
    overwrite_incompatible: bool,
}

/// How the written value is produced per target.
enum WriteValue {
    /// Used as-is (root references are resolved to this up front).
    Literal(Value),
    /// Applied to each target's pre-write value.
    Pipeline(Pipeline),
}

/// Writes `value` at every target the path selects, mutating `data` in
/// place. String values beginning with `$` are interpreted as filter
/// pipelines over the pre-write value; `$$root...` strings resolve against
/// the document before writing.
pub fn set(data: &mut Value, path: &str, value: Value, options: &SetOptions) -> Result<(), PathError> {
    let parsed = parser::parse_path(path)?;
    if parsed.transform.is_some() {
        return Err(PathError::parse(
            path,
            "transform pipelines are not allowed in write paths",
        ));
    }
    let tokens = write_tokens(&parsed, path)?;
    if tokens.is_empty() {
        return Ok(());
    }

    if options.strict {
        engine::ensure_resolves(data, path, &tokens[..tokens.len() - 1])?;
    }

    let source = compile_write_value(value, data)?;

    // Root references inside predicates or pipeline arguments see a
    // snapshot of the tree taken before any mutation.
    let needs_root = matches!(&source, WriteValue::Pipeline(p) if p.references_root())
        || tokens
            .iter()
            .any(|token| matches!(token, Token::Filter(m) if m.expr.references_root()));
    let snapshot = if needs_root { Some(data.clone()) } else { None };
    let root = snapshot.as_ref().unwrap_or(&NULL_ROOT);

    // The root value's own type is never coerced.
    if !shape_matches(data, &tokens[0]) {
        return Ok(());
    }

    let ctx = WriteContext {
        root,
        create_missing: options.create_missing,
        create_filter_match: options.create_filter_match,
        overwrite_incompatible: options.overwrite_incompatible,
    };
    set_tokens(data, tokens, &source, &ctx)
}

/// Removes every target the path selects, mutating `data` in place.
pub fn unset(data: &mut Value, path: &str, strict: bool) -> Result<(), PathError> {
    let parsed = parser::parse_path(path)?;
    if parsed.transform.is_some() {
        return Err(PathError::parse(
            path,
            "transform pipelines are not allowed in write paths",
        ));
    }
    let tokens = write_tokens(&parsed, path)?;
    if tokens.is_empty() {
        return Ok(());
    }
    if strict {
        engine::ensure_resolves(data, path, tokens)?;
    }

    let needs_root = tokens
        .iter()
        .any(|token| matches!(token, Token::Filter(m) if m.expr.references_root()));
    let snapshot = if needs_root { Some(data.clone()) } else { None };
    let root = snapshot.as_ref().unwrap_or(&NULL_ROOT);

    if !shape_matches(data, &tokens[0]) {
        return Ok(());
    }
    unset_tokens(data, tokens, root)
}

/// `$$root` never appears in a write path; sequence roots are addressed
/// with the `.`-prefixed selector form instead.
fn write_tokens<'a>(parsed: &'a ParsedPath, path: &str) -> Result<&'a [Token], PathError> {
    if parsed
        .tokens
        .iter()
        .any(|token| matches!(token, Token::Root))
    {
        return Err(PathError::parse(
            path,
            "the '$$root' token is only supported in read paths",
        ));
    }
    Ok(&parsed.tokens)
}

fn compile_write_value(value: Value, data: &Value) -> Result<WriteValue, PathError> {
    let text = match &value {
        Value::String(s) => s.clone(),
        _ => return Ok(WriteValue::Literal(value)),
    };
    if text.starts_with("$$root") {
        let parsed = parser::parse_path(&text)?;
        let resolved = engine::eval_root_ref(&parsed, data)?;
        return Ok(WriteValue::Literal(resolved));
    }
    if text.starts_with('$') {
        if let Ok(compiled) = parser::parse_pipeline(&text) {
            return Ok(WriteValue::Pipeline(compiled));
        }
    }
    Ok(WriteValue::Literal(value))
}

fn resolve_write_value(
    source: &WriteValue,
    existing: &Value,
    ctx: &WriteContext,
) -> Result<Value, PathError> {
    match source {
        WriteValue::Literal(value) => Ok(value.clone()),
        WriteValue::Pipeline(compiled) => pipeline::apply(compiled, existing.clone(), ctx.root),
    }
}

/// Whether a child slot already has the shape the next token needs.
fn shape_matches(child: &Value, next: &Token) -> bool {
    match next {
        Token::RootKey(_) | Token::Key(_) => child.is_object(),
        Token::Index(_) | Token::Slice { .. } | Token::Map | Token::Filter(_) => child.is_array(),
        Token::Wildcard | Token::DeepWildcard => child.is_container(),
        Token::Root => true,
    }
}

fn scaffold_for(next: &Token) -> Value {
    if next.selects_sequence() {
        Value::Array(Vec::new())
    } else {
        Value::Object(IndexMap::new())
    }
}

// --- set ---

fn set_tokens(
    current: &mut Value,
    tokens: &[Token],
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    let (token, rest) = match tokens.split_first() {
        Some(pair) => pair,
        None => return Ok(()),
    };
    match token {
        Token::RootKey(key) | Token::Key(key) => set_key(current, key, rest, source, ctx),
        Token::Index(index) => set_index(current, *index, rest, source, ctx),
        Token::Slice { start, stop, step } => {
            set_slice(current, (*start, *stop, *step), rest, source, ctx)
        }
        Token::Map => set_map(current, rest, source, ctx),
        Token::Wildcard => set_wildcard(current, rest, source, ctx),
        Token::DeepWildcard => set_deep_wildcard(current, rest, source, ctx),
        Token::Filter(matcher) => set_filter(current, matcher, rest, source, ctx),
        Token::Root => Ok(()),
    }
}

fn set_key(
    current: &mut Value,
    key: &str,
    rest: &[Token],
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    let map = match current {
        Value::Object(map) => map,
        _ => return Ok(()),
    };

    if rest.is_empty() {
        if !map.contains_key(key) && !ctx.create_missing {
            return Ok(());
        }
        let existing = map.get(key).cloned().unwrap_or(Value::Null);
        let resolved = resolve_write_value(source, &existing, ctx)?;
        map.insert(key.to_string(), resolved);
        return Ok(());
    }

    let next = &rest[0];
    if !map.contains_key(key) {
        if !ctx.create_missing {
            return Ok(());
        }
        trace!("scaffolding '{}' for '{}'", key, next);
        map.insert(key.to_string(), scaffold_for(next));
    }
    if let Some(child) = map.get_mut(key) {
        if !shape_matches(child, next) {
            if !ctx.overwrite_incompatible {
                return Ok(());
            }
            *child = scaffold_for(next);
        }
        set_tokens(child, rest, source, ctx)?;
    }
    Ok(())
}

fn set_index(
    current: &mut Value,
    index: i64,
    rest: &[Token],
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    let items = match current {
        Value::Array(items) => items,
        _ => return Ok(()),
    };

    if rest.is_empty() {
        if index >= 0 && index as usize >= items.len() {
            // Out-of-range extension happens at the terminal only.
            if !ctx.create_missing {
                return Ok(());
            }
            while items.len() <= index as usize {
                items.push(Value::Null);
            }
        }
        if let Some(idx) = engine::normalize_index(index, items.len()) {
            let resolved = resolve_write_value(source, &items[idx], ctx)?;
            items[idx] = resolved;
        }
        return Ok(());
    }

    let next = &rest[0];
    if let Some(idx) = engine::normalize_index(index, items.len()) {
        let child = &mut items[idx];
        if !shape_matches(child, next) {
            if !ctx.overwrite_incompatible {
                return Ok(());
            }
            *child = scaffold_for(next);
        }
        set_tokens(child, rest, source, ctx)?;
    }
    Ok(())
}

fn set_slice(
    current: &mut Value,
    bounds: (Option<i64>, Option<i64>, Option<i64>),
    rest: &[Token],
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    let items = match current {
        Value::Array(items) => items,
        _ => return Ok(()),
    };
    let indices = engine::slice_indices(items.len(), bounds.0, bounds.1, bounds.2);

    if rest.is_empty() {
        for idx in indices {
            let resolved = resolve_write_value(source, &items[idx], ctx)?;
            items[idx] = resolved;
        }
        return Ok(());
    }

    let next = &rest[0];
    for idx in indices {
        let child = &mut items[idx];
        if !shape_matches(child, next) {
            if !ctx.overwrite_incompatible {
                continue;
            }
            *child = scaffold_for(next);
        }
        set_tokens(child, rest, source, ctx)?;
    }
    Ok(())
}

fn set_map(
    current: &mut Value,
    rest: &[Token],
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    let items = match current {
        Value::Array(items) => items,
        _ => return Ok(()),
    };

    if rest.is_empty() {
        for idx in 0..items.len() {
            let resolved = resolve_write_value(source, &items[idx], ctx)?;
            items[idx] = resolved;
        }
        return Ok(());
    }

    let next = &rest[0];
    if items.is_empty() {
        if !ctx.create_missing {
            return Ok(());
        }
        items.push(scaffold_for(next));
    }
    for idx in 0..items.len() {
        let child = &mut items[idx];
        if !shape_matches(child, next) {
            if !ctx.overwrite_incompatible {
                continue;
            }
            *child = scaffold_for(next);
        }
        set_tokens(child, rest, source, ctx)?;
    }
    Ok(())
}

fn set_wildcard(
    current: &mut Value,
    rest: &[Token],
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    match current {
        Value::Object(map) => {
            if rest.is_empty() {
                for (_, child) in map.iter_mut() {
                    let resolved = resolve_write_value(source, child, ctx)?;
                    *child = resolved;
                }
                return Ok(());
            }
            let next = &rest[0];
            for (_, child) in map.iter_mut() {
                if !shape_matches(child, next) {
                    if !ctx.overwrite_incompatible {
                        continue;
                    }
                    *child = scaffold_for(next);
                }
                set_tokens(child, rest, source, ctx)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            if rest.is_empty() {
                for idx in 0..items.len() {
                    let resolved = resolve_write_value(source, &items[idx], ctx)?;
                    items[idx] = resolved;
                }
                return Ok(());
            }
            let next = &rest[0];
            for child in items.iter_mut() {
                if !shape_matches(child, next) {
                    if !ctx.overwrite_incompatible {
                        continue;
                    }
                    *child = scaffold_for(next);
                }
                set_tokens(child, rest, source, ctx)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn set_deep_wildcard(
    current: &mut Value,
    rest: &[Token],
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    if !current.is_container() {
        return Ok(());
    }
    if rest.is_empty() {
        return deep_terminal_set(current, source, ctx);
    }
    // Per-target application never scaffolds new branches.
    let nested = WriteContext {
        create_missing: false,
        ..*ctx
    };
    deep_apply_set(current, rest, source, &nested)
}

/// Applies the remainder at the starting node and at every descendant
/// container, recursing into children after the node itself is handled.
fn deep_apply_set(
    node: &mut Value,
    rest: &[Token],
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    set_tokens(node, rest, source, ctx)?;
    match node {
        Value::Object(map) => {
            for (_, child) in map.iter_mut() {
                if child.is_container() {
                    deep_apply_set(child, rest, source, ctx)?;
                }
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                if child.is_container() {
                    deep_apply_set(child, rest, source, ctx)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Terminal `**` writes target leaf slots only, so a parent assignment
/// never clobbers a child assignment made by the same call.
fn deep_terminal_set(
    node: &mut Value,
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    match node {
        Value::Object(map) => {
            for (_, child) in map.iter_mut() {
                if child.is_container() {
                    deep_terminal_set(child, source, ctx)?;
                } else {
                    let resolved = resolve_write_value(source, child, ctx)?;
                    *child = resolved;
                }
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                if child.is_container() {
                    deep_terminal_set(child, source, ctx)?;
                } else {
                    let resolved = resolve_write_value(source, child, ctx)?;
                    *child = resolved;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn set_filter(
    current: &mut Value,
    matcher: &Matcher,
    rest: &[Token],
    source: &WriteValue,
    ctx: &WriteContext,
) -> Result<(), PathError> {
    let items = match current {
        Value::Array(items) => items,
        _ => return Ok(()),
    };

    let mut matched = Vec::with_capacity(items.len());
    for item in items.iter() {
        matched.push(pipeline::matcher_matches(matcher, item, ctx.root)?);
    }

    if !matched.iter().any(|m| *m) && ctx.create_missing && ctx.create_filter_match {
        if let Some(seed) = matcher_seed(&matcher.expr) {
            trace!("no element matched '[?{}]', appending seed", matcher.raw);
            items.push(seed);
            matched.push(true);
        }
    }

    if rest.is_empty() {
        for (idx, hit) in matched.iter().enumerate() {
            if !hit {
                continue;
            }
            let resolved = resolve_write_value(source, &items[idx], ctx)?;
            items[idx] = resolved;
        }
        return Ok(());
    }

    let next = &rest[0];
    for (idx, hit) in matched.iter().enumerate() {
        if !hit {
            continue;
        }
        let child = &mut items[idx];
        if !shape_matches(child, next) {
            if !ctx.overwrite_incompatible {
                continue;
            }
            *child = scaffold_for(next);
        }
        set_tokens(child, rest, source, ctx)?;
    }
    Ok(())
}

/// A matcher seeds a new element only when it is a conjunction of plain
/// `keypath == literal` atoms; dotted key paths scaffold nested mappings.
fn matcher_seed(expr: &MatcherExpr) -> Option<Value> {
    let mut seed = IndexMap::new();
    if collect_seed(expr, &mut seed) {
        Some(Value::Object(seed))
    } else {
        None
    }
}

fn collect_seed(expr: &MatcherExpr, out: &mut IndexMap<String, Value>) -> bool {
    match expr {
        MatcherExpr::Cmp(cmp) => {
            let value = match &cmp.operand {
                Operand::Literal(value) => value,
                _ => return false,
            };
            if cmp.op != CmpOp::Eq
                || cmp.subject.path.is_empty()
                || cmp.subject.pipeline.is_some()
            {
                return false;
            }
            insert_nested(out, &cmp.subject.path, value.clone());
            true
        }
        MatcherExpr::And(left, right) => collect_seed(left, out) && collect_seed(right, out),
        MatcherExpr::Or(_, _) | MatcherExpr::Not(_) => false,
    }
}

fn insert_nested(out: &mut IndexMap<String, Value>, path: &[String], value: Value) {
    if path.len() == 1 {
        out.insert(path[0].clone(), value);
        return;
    }
    let entry = out
        .entry(path[0].clone())
        .or_insert_with(|| Value::Object(IndexMap::new()));
    if let Value::Object(map) = entry {
        insert_nested(map, &path[1..], value);
    }
}

// --- unset ---

fn unset_tokens(current: &mut Value, tokens: &[Token], root: &Value) -> Result<(), PathError> {
    let (token, rest) = match tokens.split_first() {
        Some(pair) => pair,
        None => return Ok(()),
    };
    match token {
        Token::RootKey(key) | Token::Key(key) => {
            let map = match current {
                Value::Object(map) => map,
                _ => return Ok(()),
            };
            if rest.is_empty() {
                map.shift_remove(key);
                return Ok(());
            }
            if let Some(child) = map.get_mut(key) {
                unset_tokens(child, rest, root)?;
            }
            Ok(())
        }

        Token::Index(index) => {
            let items = match current {
                Value::Array(items) => items,
                _ => return Ok(()),
            };
            if rest.is_empty() {
                if let Some(idx) = engine::normalize_index(*index, items.len()) {
                    items.remove(idx);
                }
                return Ok(());
            }
            if let Some(idx) = engine::normalize_index(*index, items.len()) {
                unset_tokens(&mut items[idx], rest, root)?;
            }
            Ok(())
        }

        Token::Slice { start, stop, step } => {
            let items = match current {
                Value::Array(items) => items,
                _ => return Ok(()),
            };
            let mut indices = engine::slice_indices(items.len(), *start, *stop, *step);
            if rest.is_empty() {
                indices.sort_unstable_by(|a, b| b.cmp(a));
                for idx in indices {
                    items.remove(idx);
                }
                return Ok(());
            }
            for idx in indices {
                unset_tokens(&mut items[idx], rest, root)?;
            }
            Ok(())
        }

        Token::Map => {
            let items = match current {
                Value::Array(items) => items,
                _ => return Ok(()),
            };
            if rest.is_empty() {
                items.clear();
                return Ok(());
            }
            for child in items.iter_mut() {
                unset_tokens(child, rest, root)?;
            }
            Ok(())
        }

        Token::Wildcard => {
            match current {
                Value::Object(map) => {
                    if rest.is_empty() {
                        map.clear();
                        return Ok(());
                    }
                    for (_, child) in map.iter_mut() {
                        unset_tokens(child, rest, root)?;
                    }
                }
                Value::Array(items) => {
                    if rest.is_empty() {
                        items.clear();
                        return Ok(());
                    }
                    for child in items.iter_mut() {
                        unset_tokens(child, rest, root)?;
                    }
                }
                _ => {}
            }
            Ok(())
        }

        Token::DeepWildcard => {
            if !current.is_container() {
                return Ok(());
            }
            if rest.is_empty() {
                deep_terminal_unset(current);
                return Ok(());
            }
            deep_apply_unset(current, rest, root)
        }

        Token::Filter(matcher) => {
            let items = match current {
                Value::Array(items) => items,
                _ => return Ok(()),
            };
            let mut matched = Vec::with_capacity(items.len());
            for item in items.iter() {
                matched.push(pipeline::matcher_matches(matcher, item, root)?);
            }
            if rest.is_empty() {
                let mut hits = matched.iter();
                items.retain(|_| !*hits.next().unwrap_or(&false));
                return Ok(());
            }
            for (idx, hit) in matched.iter().enumerate() {
                if *hit {
                    unset_tokens(&mut items[idx], rest, root)?;
                }
            }
            Ok(())
        }

        Token::Root => Ok(()),
    }
}

/// Terminal `**` removals drop every leaf slot; containers stay in place.
fn deep_terminal_unset(node: &mut Value) {
    match node {
        Value::Object(map) => {
            map.retain(|_, child| child.is_container());
            for (_, child) in map.iter_mut() {
                deep_terminal_unset(child);
            }
        }
        Value::Array(items) => {
            items.retain(Value::is_container);
            for child in items.iter_mut() {
                deep_terminal_unset(child);
            }
        }
        _ => {}
    }
}

fn deep_apply_unset(node: &mut Value, rest: &[Token], root: &Value) -> Result<(), PathError> {
    unset_tokens(node, rest, root)?;
    match node {
        Value::Object(map) => {
            for (_, child) in map.iter_mut() {
                if child.is_container() {
                    deep_apply_unset(child, rest, root)?;
                }
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                if child.is_container() {
                    deep_apply_unset(child, rest, root)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}
