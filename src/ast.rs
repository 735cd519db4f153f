//! The compiled representation of a path expression: tokens, predicate
//! matchers and filter pipelines.

use crate::value::Value;
use std::fmt;

/// A fully parsed path: the token sequence plus the optional trailing
/// transform pipeline (`a.b.c|$double|$string`).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPath {
    pub tokens: Vec<Token>,
    pub transform: Option<Pipeline>,
}

impl ParsedPath {
    /// True when traversal can produce a collected sequence (used by
    /// `exists` to treat an empty projection as absent).
    pub fn has_projection(&self) -> bool {
        self.tokens.iter().any(|token| {
            matches!(
                token,
                Token::Map | Token::Wildcard | Token::DeepWildcard | Token::Filter(_)
            )
        })
    }

    /// True when evaluating the path needs the root document beyond the
    /// cursor: `$$root` references in predicates or pipeline arguments.
    pub fn references_root(&self) -> bool {
        let in_transform = self
            .transform
            .as_ref()
            .is_some_and(Pipeline::references_root);
        in_transform
            || self.tokens.iter().any(|token| match token {
                Token::Filter(matcher) => matcher.expr.references_root(),
                _ => false,
            })
    }
}

/// One unit of a compiled path.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Key access in the first segment of the path.
    RootKey(String),
    /// Child mapping access by name.
    Key(String),
    /// Reset the resolution cursor to the original root (`$$root`).
    Root,
    /// Sequence index; negative counts from the end.
    Index(i64),
    /// Sequence slice; absent bounds default to the full range, absent
    /// step to 1.
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    /// `[]` — apply the remainder of the path to every element.
    Map,
    /// `*` — one level of mapping values or sequence elements.
    Wildcard,
    /// `**` — every descendant, pre-order, starting node included.
    DeepWildcard,
    /// `[?...]` — retain sequence elements matching the predicate.
    Filter(Matcher),
}

impl Token {
    /// Whether a scaffolded container for this token must be a sequence.
    pub(crate) fn selects_sequence(&self) -> bool {
        matches!(
            self,
            Token::Index(_) | Token::Slice { .. } | Token::Map | Token::Filter(_)
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::RootKey(name) | Token::Key(name) => write!(f, "{}", name),
            Token::Root => write!(f, "$$root"),
            Token::Index(i) => write!(f, "[{}]", i),
            Token::Slice { start, stop, step } => {
                let part = |bound: &Option<i64>| match bound {
                    Some(n) => n.to_string(),
                    None => String::new(),
                };
                match step {
                    Some(s) => write!(f, "[{}:{}:{}]", part(start), part(stop), s),
                    None => write!(f, "[{}:{}]", part(start), part(stop)),
                }
            }
            Token::Map => write!(f, "[]"),
            Token::Wildcard => write!(f, "*"),
            Token::DeepWildcard => write!(f, "**"),
            Token::Filter(matcher) => write!(f, "[?{}]", matcher.raw),
        }
    }
}

/// A compiled predicate: the raw source text (kept for error messages) and
/// the boolean expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    pub raw: String,
    pub expr: MatcherExpr,
}

/// Boolean structure of a predicate: comparisons composed with `&&`, `||`,
/// `!` and parentheses.
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherExpr {
    Cmp(Comparison),
    Not(Box<MatcherExpr>),
    And(Box<MatcherExpr>, Box<MatcherExpr>),
    Or(Box<MatcherExpr>, Box<MatcherExpr>),
}

impl MatcherExpr {
    pub(crate) fn references_root(&self) -> bool {
        match self {
            MatcherExpr::Cmp(cmp) => {
                let in_subject = cmp
                    .subject
                    .pipeline
                    .as_ref()
                    .is_some_and(Pipeline::references_root);
                let in_operand = match &cmp.operand {
                    Operand::RootRef(_) => true,
                    Operand::Pipeline { pipeline, .. } => pipeline.references_root(),
                    Operand::Literal(_) => false,
                };
                in_subject || in_operand
            }
            MatcherExpr::Not(inner) => inner.references_root(),
            MatcherExpr::And(left, right) | MatcherExpr::Or(left, right) => {
                left.references_root() || right.references_root()
            }
        }
    }
}

/// A single `lhs op rhs` predicate atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub subject: Subject,
    pub op: CmpOp,
    pub operand: Operand,
}

/// The left-hand side of a predicate atom: the element itself (empty key
/// path) or a dotted key path relative to it, optionally post-processed by
/// a pipeline (`.|$len`).
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub path: Vec<String>,
    pub pipeline: Option<Pipeline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
        };
        write!(f, "{}", text)
    }
}

/// The right-hand side of a predicate atom.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal value; bare words parse as strings.
    Literal(Value),
    /// A pipeline applied to the lhs value; truthiness decides the match,
    /// `!` flips it. Only legal with `==` and `!=`.
    Pipeline { pipeline: Pipeline, negated: bool },
    /// A `$$root...` reference resolved against the root document.
    RootRef(Box<ParsedPath>),
}

/// An ordered chain of filter calls, `$name|$name(args)|...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<FilterCall>,
}

impl Pipeline {
    pub(crate) fn references_root(&self) -> bool {
        self.stages.iter().any(|stage| {
            stage
                .args
                .iter()
                .any(|arg| matches!(arg, FilterArg::Root(_)))
        })
    }
}

/// One stage of a pipeline. `map_over` is the `$name[]` suffix: apply the
/// filter to each element of a sequence input instead of the whole.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<FilterArg>,
    pub map_over: bool,
}

/// A filter argument: a literal, or a `$$root` reference resolved at
/// application time.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    Literal(Value),
    Root(Box<ParsedPath>),
}
