//! Pipeline application and compiled-predicate evaluation.

use crate::ast::{CmpOp, Comparison, FilterArg, Matcher, MatcherExpr, Operand, Pipeline, Subject};
use crate::engine;
use crate::error::PathError;
use crate::functions;
use crate::value::{compare_values, values_equal, Value};
use std::cmp::Ordering;

/// Runs a compiled pipeline over an input value. Stages execute left to
/// right; a `$name[]` stage maps over sequence inputs element-wise.
pub(crate) fn apply(pipeline: &Pipeline, input: Value, root: &Value) -> Result<Value, PathError> {
    let mut current = input;
    for stage in &pipeline.stages {
        let args = resolve_args(&stage.args, root)?;
        current = match current {
            Value::Array(items) if stage.map_over => {
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    mapped.push(functions::apply_function(&stage.name, &item, &args)?);
                }
                Value::Array(mapped)
            }
            other => functions::apply_function(&stage.name, &other, &args)?,
        };
    }
    Ok(current)
}

/// Resolves pipeline arguments: literals pass through, `$$root` references
/// evaluate against the root document.
fn resolve_args(args: &[FilterArg], root: &Value) -> Result<Vec<Value>, PathError> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            FilterArg::Literal(value) => out.push(value.clone()),
            FilterArg::Root(parsed) => out.push(engine::eval_root_ref(parsed, root)?),
        }
    }
    Ok(out)
}

/// Evaluates a compiled predicate against one sequence element.
pub(crate) fn matcher_matches(
    matcher: &Matcher,
    element: &Value,
    root: &Value,
) -> Result<bool, PathError> {
    eval_expr(&matcher.expr, element, root)
}

fn eval_expr(expr: &MatcherExpr, element: &Value, root: &Value) -> Result<bool, PathError> {
    match expr {
        MatcherExpr::Cmp(cmp) => eval_comparison(cmp, element, root),
        MatcherExpr::Not(inner) => Ok(!eval_expr(inner, element, root)?),
        MatcherExpr::And(left, right) => {
            if !eval_expr(left, element, root)? {
                return Ok(false);
            }
            eval_expr(right, element, root)
        }
        MatcherExpr::Or(left, right) => {
            if eval_expr(left, element, root)? {
                return Ok(true);
            }
            eval_expr(right, element, root)
        }
    }
}

fn eval_comparison(cmp: &Comparison, element: &Value, root: &Value) -> Result<bool, PathError> {
    let subject_value = resolve_subject(&cmp.subject, element, root)?;

    match &cmp.operand {
        // Pipeline operands are a truthiness test of the pipeline output,
        // only meaningful under == and !=.
        Operand::Pipeline { pipeline, negated } => {
            let truthy = match &subject_value {
                Some(value) => apply(pipeline, value.clone(), root)?.is_truthy() != *negated,
                None => false,
            };
            match cmp.op {
                CmpOp::Eq => Ok(truthy),
                CmpOp::Ne => Ok(!truthy),
                other => Err(PathError::operator(
                    &pipeline_name(pipeline),
                    format!("operator '{}' is not supported with filter pipelines", other),
                )),
            }
        }
        Operand::RootRef(parsed) => {
            let resolved = engine::eval_root_ref(parsed, root)?;
            Ok(compare_resolved(subject_value.as_ref(), cmp.op, &resolved))
        }
        Operand::Literal(expected) => {
            Ok(compare_resolved(subject_value.as_ref(), cmp.op, expected))
        }
    }
}

/// Walks the subject key path relative to the element; a missing key
/// yields the undefined sentinel (`None`).
fn resolve_subject(
    subject: &Subject,
    element: &Value,
    root: &Value,
) -> Result<Option<Value>, PathError> {
    let mut cursor = element;
    for key in &subject.path {
        cursor = match cursor.as_object().and_then(|map| map.get(key)) {
            Some(child) => child,
            None => return Ok(None),
        };
    }
    match &subject.pipeline {
        Some(pipeline) => apply(pipeline, cursor.clone(), root).map(Some),
        None => Ok(Some(cursor.clone())),
    }
}

/// Comparison against the undefined sentinel is false, except `!=` against
/// a concrete value, which is true.
fn compare_resolved(subject: Option<&Value>, op: CmpOp, expected: &Value) -> bool {
    let subject = match subject {
        Some(value) => value,
        None => return op == CmpOp::Ne,
    };
    match op {
        CmpOp::Eq => values_equal(subject, expected),
        CmpOp::Ne => !values_equal(subject, expected),
        CmpOp::Gt => compare_values(subject, expected) == Some(Ordering::Greater),
        CmpOp::Lt => compare_values(subject, expected) == Some(Ordering::Less),
        CmpOp::Ge => matches!(
            compare_values(subject, expected),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        CmpOp::Le => matches!(
            compare_values(subject, expected),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
    }
}

fn pipeline_name(pipeline: &Pipeline) -> String {
    pipeline
        .stages
        .first()
        .map(|stage| stage.name.clone())
        .unwrap_or_default()
}
