//! A `nom`-based parser for the path expression language.

use crate::ast::{
    CmpOp, Comparison, FilterArg, FilterCall, Matcher, MatcherExpr, Operand, ParsedPath, Pipeline,
    Subject, Token,
};
use crate::error::PathError;
use crate::functions;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, i64 as parse_i64, multispace0, one_of},
    combinator::{all_consuming, consumed, map, not, opt, peek, recognize},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};

// --- Main Public Parser ---

/// Parses a path string into its token sequence and optional trailing
/// transform pipeline, validating every filter call against the built-in
/// registry.
pub fn parse_path(path: &str) -> Result<ParsedPath, PathError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(PathError::parse(path, "path cannot be empty"));
    }
    let parsed = match all_consuming(path_expr).parse(trimmed) {
        Ok((_, parsed)) => parsed,
        Err(err) => return Err(PathError::parse(path, err.to_string())),
    };
    validate_path(&parsed)?;
    Ok(parsed)
}

/// Parses a standalone `$name(...)|$name...` pipeline expression.
pub(crate) fn parse_pipeline(expression: &str) -> Result<Pipeline, PathError> {
    let pipeline = match all_consuming(pipeline_expr).parse(expression.trim()) {
        Ok((_, pipeline)) => pipeline,
        Err(err) => return Err(PathError::parse(expression, err.to_string())),
    };
    validate_pipeline(&pipeline)?;
    Ok(pipeline)
}

// --- Registry validation ---
//
// Unknown filter names and bad arities are caught here, once, so that
// evaluation never re-checks per element.

fn validate_path(parsed: &ParsedPath) -> Result<(), PathError> {
    if let Some(pipeline) = &parsed.transform {
        validate_pipeline(pipeline)?;
    }
    for token in &parsed.tokens {
        if let Token::Filter(matcher) = token {
            validate_expr(&matcher.expr)?;
        }
    }
    Ok(())
}

fn validate_pipeline(pipeline: &Pipeline) -> Result<(), PathError> {
    for stage in &pipeline.stages {
        functions::validate_call(&stage.name, stage.args.len())?;
        for arg in &stage.args {
            if let FilterArg::Root(inner) = arg {
                validate_path(inner)?;
            }
        }
    }
    Ok(())
}

fn validate_expr(expr: &MatcherExpr) -> Result<(), PathError> {
    match expr {
        MatcherExpr::Cmp(cmp) => {
            if let Some(pipeline) = &cmp.subject.pipeline {
                validate_pipeline(pipeline)?;
            }
            match &cmp.operand {
                Operand::Pipeline { pipeline, .. } => validate_pipeline(pipeline),
                Operand::RootRef(inner) => validate_path(inner),
                Operand::Literal(_) => Ok(()),
            }
        }
        MatcherExpr::Not(inner) => validate_expr(inner),
        MatcherExpr::And(left, right) | MatcherExpr::Or(left, right) => {
            validate_expr(left)?;
            validate_expr(right)
        }
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn boundary_ok(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with('.') || rest.starts_with('|')
}

// --- Path & Segment Parsers ---

fn path_expr(input: &str) -> IResult<&str, ParsedPath> {
    let (i, mut tokens) = first_segment(input)?;
    let (i, rest) = many0(preceded(char('.'), segment)).parse(i)?;
    for seg in rest {
        tokens.extend(seg);
    }
    let (i, transform) = opt(preceded(char('|'), pipeline_expr)).parse(i)?;

    if let Some(Token::Key(name)) = tokens.first().cloned() {
        tokens[0] = Token::RootKey(name);
    }
    Ok((i, ParsedPath { tokens, transform }))
}

fn first_segment(input: &str) -> IResult<&str, Vec<Token>> {
    alt((dot_segment, segment)).parse(input)
}

/// Root identity: a leading `.` contributes no token, but may carry
/// bracket suffixes (`.[0]`, `.[]`, `.[?...]`) selecting against a
/// sequence root.
fn dot_segment(input: &str) -> IResult<&str, Vec<Token>> {
    let (i, _) = char('.').parse(input)?;
    many0(bracket_suffix).parse(i)
}

fn segment(input: &str) -> IResult<&str, Vec<Token>> {
    alt((
        deep_wildcard_segment,
        wildcard_segment,
        root_segment,
        key_segment,
    ))
    .parse(input)
}

fn deep_wildcard_segment(input: &str) -> IResult<&str, Vec<Token>> {
    let (i, _) = tag("**").parse(input)?;
    if !boundary_ok(i) {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    Ok((i, vec![Token::DeepWildcard]))
}

fn wildcard_segment(input: &str) -> IResult<&str, Vec<Token>> {
    let (i, _) = char('*').parse(input)?;
    if !boundary_ok(i) {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    Ok((i, vec![Token::Wildcard]))
}

fn root_segment(input: &str) -> IResult<&str, Vec<Token>> {
    let (i, _) = tag("$$root").parse(input)?;
    if !(boundary_ok(i) || i.starts_with('[')) {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    let (i, suffixes) = many0(bracket_suffix).parse(i)?;
    let mut tokens = vec![Token::Root];
    tokens.extend(suffixes);
    Ok((i, tokens))
}

fn key_segment(input: &str) -> IResult<&str, Vec<Token>> {
    let (i, name) = take_while1(|c: char| !matches!(c, '.' | '[' | ']' | '|')).parse(input)?;
    let (i, suffixes) = many0(bracket_suffix).parse(i)?;
    let mut tokens = vec![Token::Key(name.to_string())];
    tokens.extend(suffixes);
    Ok((i, tokens))
}

// --- Bracket Suffix Parsers ---

fn bracket_suffix(input: &str) -> IResult<&str, Token> {
    delimited(char('['), bracket_body, char(']')).parse(input)
}

fn bracket_body(input: &str) -> IResult<&str, Token> {
    alt((filter_body, slice_body, index_body, map_body)).parse(input)
}

fn map_body(input: &str) -> IResult<&str, Token> {
    map(peek(char(']')), |_| Token::Map).parse(input)
}

fn index_body(input: &str) -> IResult<&str, Token> {
    map(terminated(parse_i64, peek(char(']'))), Token::Index).parse(input)
}

fn slice_body(input: &str) -> IResult<&str, Token> {
    let (i, start) = opt(parse_i64).parse(input)?;
    let (i, _) = char(':').parse(i)?;
    let (i, stop) = opt(parse_i64).parse(i)?;
    let (i, step) = opt(preceded(char(':'), opt(parse_i64))).parse(i)?;
    let step = step.flatten();
    if step == Some(0) {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify)));
    }
    Ok((i, Token::Slice { start, stop, step }))
}

fn filter_body(input: &str) -> IResult<&str, Token> {
    let (i, _) = char('?').parse(input)?;
    let (i, (raw, expr)) = consumed(terminated(or_expr, multispace0)).parse(i)?;
    Ok((
        i,
        Token::Filter(Matcher {
            raw: raw.trim().to_string(),
            expr,
        }),
    ))
}

// --- Predicate Parsers (in order of precedence) ---

fn or_expr(input: &str) -> IResult<&str, MatcherExpr> {
    let (i, mut left) = and_expr(input)?;
    let (i, rest) = many0(preceded(ws(tag("||")), and_expr)).parse(i)?;
    for right in rest {
        left = MatcherExpr::Or(Box::new(left), Box::new(right));
    }
    Ok((i, left))
}

fn and_expr(input: &str) -> IResult<&str, MatcherExpr> {
    let (i, mut left) = not_expr(input)?;
    let (i, rest) = many0(preceded(ws(tag("&&")), not_expr)).parse(i)?;
    for right in rest {
        left = MatcherExpr::And(Box::new(left), Box::new(right));
    }
    Ok((i, left))
}

fn not_expr(input: &str) -> IResult<&str, MatcherExpr> {
    let (i, bang) = opt(ws(char('!'))).parse(input)?;
    if bang.is_some() {
        let (i, inner) = not_expr(i)?;
        return Ok((i, MatcherExpr::Not(Box::new(inner))));
    }
    primary(i)
}

fn primary(input: &str) -> IResult<&str, MatcherExpr> {
    alt((
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        map(comparison, MatcherExpr::Cmp),
    ))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, Comparison> {
    let (i, _) = multispace0(input)?;
    let (i, subject) = subject(i)?;
    let (i, op) = ws(cmp_op).parse(i)?;
    let (i, operand) = operand(i)?;
    Ok((i, Comparison { subject, op, operand }))
}

fn cmp_op(input: &str) -> IResult<&str, CmpOp> {
    alt((
        map(tag("=="), |_| CmpOp::Eq),
        map(tag("!="), |_| CmpOp::Ne),
        map(tag(">="), |_| CmpOp::Ge),
        map(tag("<="), |_| CmpOp::Le),
        map(tag(">"), |_| CmpOp::Gt),
        map(tag("<"), |_| CmpOp::Lt),
    ))
    .parse(input)
}

fn subject(input: &str) -> IResult<&str, Subject> {
    alt((dot_subject, keypath_subject)).parse(input)
}

/// `.`-rooted subject: the element itself, `.key.path` relative access,
/// either optionally post-processed by `|$pipeline`.
fn dot_subject(input: &str) -> IResult<&str, Subject> {
    let (i, _) = char('.').parse(input)?;
    let (i, path) = opt(key_path).parse(i)?;
    let (i, pipeline) = opt(preceded(char('|'), pipeline_expr)).parse(i)?;
    Ok((
        i,
        Subject {
            path: path.unwrap_or_default(),
            pipeline,
        },
    ))
}

fn keypath_subject(input: &str) -> IResult<&str, Subject> {
    let (i, path) = key_path(input)?;
    let (i, pipeline) = opt(preceded(char('|'), pipeline_expr)).parse(i)?;
    Ok((i, Subject { path, pipeline }))
}

fn key_path(input: &str) -> IResult<&str, Vec<String>> {
    map(separated_list1(char('.'), pred_ident), |parts| {
        parts.into_iter().map(str::to_string).collect()
    })
    .parse(input)
}

fn pred_ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-').parse(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((rootref_operand, pipeline_operand, literal_operand)).parse(input)
}

fn rootref_operand(input: &str) -> IResult<&str, Operand> {
    map(root_ref, |parsed| Operand::RootRef(Box::new(parsed))).parse(input)
}

/// A `$$root[.path][|pipeline]` reference, compiled to a nested path so
/// evaluation never re-parses. Parsed structurally in place, so the
/// enclosing predicate or argument grammar keeps its own terminators
/// (`]`, `)`, `,`, `&&`, `||`) and nom backtracks naturally.
fn root_ref(input: &str) -> IResult<&str, ParsedPath> {
    let (i, _) = tag("$$root").parse(input)?;
    if i.chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    let (i, suffixes) = many0(bracket_suffix).parse(i)?;
    let mut tokens = vec![Token::Root];
    tokens.extend(suffixes);
    let (i, rest) = many0(preceded(char('.'), root_ref_segment)).parse(i)?;
    for seg in rest {
        tokens.extend(seg);
    }
    let (i, transform) = opt(preceded(char('|'), pipeline_expr)).parse(i)?;
    Ok((i, ParsedPath { tokens, transform }))
}

fn root_ref_segment(input: &str) -> IResult<&str, Vec<Token>> {
    alt((
        deep_wildcard_segment,
        wildcard_segment,
        root_ref_key_segment,
    ))
    .parse(input)
}

/// Keys inside an embedded root reference stop at the characters the
/// surrounding predicate and argument grammars use as terminators.
fn root_ref_key_segment(input: &str) -> IResult<&str, Vec<Token>> {
    let (i, name) = take_while1(|c: char| {
        !matches!(
            c,
            '.' | '[' | ']' | '|' | '(' | ')' | ',' | '&' | ' ' | '=' | '!' | '<' | '>' | '\''
                | '"'
        )
    })
    .parse(input)?;
    let (i, suffixes) = many0(bracket_suffix).parse(i)?;
    let mut tokens = vec![Token::Key(name.to_string())];
    tokens.extend(suffixes);
    Ok((i, tokens))
}

fn pipeline_operand(input: &str) -> IResult<&str, Operand> {
    let (i, bang) = opt(char('!')).parse(input)?;
    let (i, pipeline) = pipeline_expr(i)?;
    Ok((
        i,
        Operand::Pipeline {
            pipeline,
            negated: bang.is_some(),
        },
    ))
}

fn literal_operand(input: &str) -> IResult<&str, Operand> {
    map(
        alt((quoted_string, number_literal, keyword_literal, bare_word)),
        Operand::Literal,
    )
    .parse(input)
}

// --- Pipeline Parsers ---

fn pipeline_expr(input: &str) -> IResult<&str, Pipeline> {
    map(separated_list1(char('|'), filter_stage), |stages| Pipeline {
        stages,
    })
    .parse(input)
}

fn filter_stage(input: &str) -> IResult<&str, FilterCall> {
    let (i, _) = char('$').parse(input)?;
    let (i, name) = filter_name(i)?;
    let (i, args) = opt(delimited(
        char('('),
        separated_list0(ws(char(',')), filter_arg),
        char(')'),
    ))
    .parse(i)?;
    let (i, map_over) = opt(tag("[]")).parse(i)?;
    Ok((
        i,
        FilterCall {
            name: name.to_string(),
            args: args.unwrap_or_default(),
            map_over: map_over.is_some(),
        },
    ))
}

fn filter_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn filter_arg(input: &str) -> IResult<&str, FilterArg> {
    alt((
        map(root_ref, |parsed| FilterArg::Root(Box::new(parsed))),
        map(arg_literal, FilterArg::Literal),
    ))
    .parse(input)
}

fn arg_literal(input: &str) -> IResult<&str, crate::value::Value> {
    alt((quoted_string, number_literal, keyword_literal, bare_arg)).parse(input)
}

// --- Literal Parsers ---

fn quoted_string(input: &str) -> IResult<&str, crate::value::Value> {
    map(
        alt((
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        )),
        |s: &str| crate::value::Value::String(s.to_string()),
    )
    .parse(input)
}

fn number_literal(input: &str) -> IResult<&str, crate::value::Value> {
    alt((int_literal, map(double, crate::value::Value::Float))).parse(input)
}

fn int_literal(input: &str) -> IResult<&str, crate::value::Value> {
    map(
        terminated(parse_i64, not(one_of(".eE"))),
        crate::value::Value::Int,
    )
    .parse(input)
}

fn keyword_literal(input: &str) -> IResult<&str, crate::value::Value> {
    let (i, word) = alt((tag("true"), tag("false"), tag("null"))).parse(input)?;
    if i.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_') {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    let value = match word {
        "true" => crate::value::Value::Bool(true),
        "false" => crate::value::Value::Bool(false),
        _ => crate::value::Value::Null,
    };
    Ok((i, value))
}

/// Unquoted predicate operands are passed through as strings.
fn bare_word(input: &str) -> IResult<&str, crate::value::Value> {
    map(
        take_while1(|c: char| {
            !matches!(
                c,
                ']' | ')' | '(' | '&' | '|' | ',' | ' ' | '=' | '!' | '<' | '>'
            )
        }),
        |s: &str| crate::value::Value::String(s.to_string()),
    )
    .parse(input)
}

fn bare_arg(input: &str) -> IResult<&str, crate::value::Value> {
    map(
        take_while1(|c: char| !matches!(c, ',' | ')' | '(')),
        |s: &str| crate::value::Value::String(s.trim().to_string()),
    )
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_parse_simple_path() {
        let parsed = parse_path("a.b.c").unwrap();
        assert_eq!(
            parsed.tokens,
            vec![
                Token::RootKey("a".into()),
                Token::Key("b".into()),
                Token::Key("c".into()),
            ]
        );
        assert!(parsed.transform.is_none());
    }

    #[test]
    fn test_parse_bracket_suffixes() {
        let parsed = parse_path("a.items[0][1:3].b[]").unwrap();
        assert_eq!(
            parsed.tokens,
            vec![
                Token::RootKey("a".into()),
                Token::Key("items".into()),
                Token::Index(0),
                Token::Slice {
                    start: Some(1),
                    stop: Some(3),
                    step: None
                },
                Token::Key("b".into()),
                Token::Map,
            ]
        );
    }

    #[test]
    fn test_parse_slice_variants() {
        let slice = |path: &str| parse_path(path).unwrap().tokens[1].clone();
        assert_eq!(
            slice("a[:2]"),
            Token::Slice {
                start: None,
                stop: Some(2),
                step: None
            }
        );
        assert_eq!(
            slice("a[1:]"),
            Token::Slice {
                start: Some(1),
                stop: None,
                step: None
            }
        );
        assert_eq!(
            slice("a[::2]"),
            Token::Slice {
                start: None,
                stop: None,
                step: Some(2)
            }
        );
        assert_eq!(
            slice("a[::-1]"),
            Token::Slice {
                start: None,
                stop: None,
                step: Some(-1)
            }
        );
        assert!(parse_path("a[::0]").is_err());
    }

    #[test]
    fn test_parse_wildcards_and_root() {
        let parsed = parse_path("a.*.**.$$root.x").unwrap();
        assert_eq!(
            parsed.tokens,
            vec![
                Token::RootKey("a".into()),
                Token::Wildcard,
                Token::DeepWildcard,
                Token::Root,
                Token::Key("x".into()),
            ]
        );
    }

    #[test]
    fn test_parse_root_identity_with_suffixes() {
        assert!(parse_path(".").unwrap().tokens.is_empty());

        let parsed = parse_path(".[1].v").unwrap();
        assert_eq!(parsed.tokens, vec![Token::Index(1), Token::Key("v".into())]);

        let parsed = parse_path("$$root[].v").unwrap();
        assert_eq!(
            parsed.tokens,
            vec![Token::Root, Token::Map, Token::Key("v".into())]
        );
    }

    #[test]
    fn test_parse_trailing_transform() {
        let parsed = parse_path("a.b|$double[]|$max").unwrap();
        let transform = parsed.transform.unwrap();
        assert_eq!(transform.stages.len(), 2);
        assert_eq!(transform.stages[0].name, "double");
        assert!(transform.stages[0].map_over);
        assert_eq!(transform.stages[1].name, "max");
        assert!(!transform.stages[1].map_over);
    }

    #[test]
    fn test_parse_filter_atom() {
        let parsed = parse_path("users[?id==2]").unwrap();
        let matcher = match &parsed.tokens[1] {
            Token::Filter(matcher) => matcher,
            other => panic!("expected filter token, got {:?}", other),
        };
        assert_eq!(matcher.raw, "id==2");
        let cmp = match &matcher.expr {
            MatcherExpr::Cmp(cmp) => cmp,
            other => panic!("expected comparison, got {:?}", other),
        };
        assert_eq!(cmp.subject.path, vec!["id".to_string()]);
        assert_eq!(cmp.op, CmpOp::Eq);
        assert_eq!(cmp.operand, Operand::Literal(Value::Int(2)));
    }

    #[test]
    fn test_parse_filter_boolean_precedence() {
        // || binds looser than &&
        let parsed = parse_path("u[?a==1 || b==2 && c==3]").unwrap();
        let matcher = match &parsed.tokens[1] {
            Token::Filter(matcher) => matcher,
            other => panic!("expected filter token, got {:?}", other),
        };
        match &matcher.expr {
            MatcherExpr::Or(left, right) => {
                assert!(matches!(**left, MatcherExpr::Cmp(_)));
                assert!(matches!(**right, MatcherExpr::And(_, _)));
            }
            other => panic!("expected or at the top, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_filter_not_and_groups() {
        let parsed = parse_path("u[?!(a==1 || b==2)]").unwrap();
        let matcher = match &parsed.tokens[1] {
            Token::Filter(matcher) => matcher,
            other => panic!("expected filter token, got {:?}", other),
        };
        assert!(matches!(matcher.expr, MatcherExpr::Not(_)));
    }

    #[test]
    fn test_parse_filter_subject_pipeline() {
        let parsed = parse_path("items[?.|$len>2]").unwrap();
        let matcher = match &parsed.tokens[1] {
            Token::Filter(matcher) => matcher,
            other => panic!("expected filter token, got {:?}", other),
        };
        let cmp = match &matcher.expr {
            MatcherExpr::Cmp(cmp) => cmp,
            other => panic!("expected comparison, got {:?}", other),
        };
        assert!(cmp.subject.path.is_empty());
        assert_eq!(cmp.subject.pipeline.as_ref().unwrap().stages[0].name, "len");
        assert_eq!(cmp.op, CmpOp::Gt);
    }

    #[test]
    fn test_parse_filter_pipeline_operand() {
        let parsed = parse_path("u[?id==!$even]").unwrap();
        let matcher = match &parsed.tokens[1] {
            Token::Filter(matcher) => matcher,
            other => panic!("expected filter token, got {:?}", other),
        };
        let cmp = match &matcher.expr {
            MatcherExpr::Cmp(cmp) => cmp,
            other => panic!("expected comparison, got {:?}", other),
        };
        match &cmp.operand {
            Operand::Pipeline { pipeline, negated } => {
                assert!(*negated);
                assert_eq!(pipeline.stages[0].name, "even");
            }
            other => panic!("expected pipeline operand, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_filter_dotted_subject_and_bare_operand() {
        let parsed = parse_path("u[?user.name==ada]").unwrap();
        let matcher = match &parsed.tokens[1] {
            Token::Filter(matcher) => matcher,
            other => panic!("expected filter token, got {:?}", other),
        };
        let cmp = match &matcher.expr {
            MatcherExpr::Cmp(cmp) => cmp,
            other => panic!("expected comparison, got {:?}", other),
        };
        assert_eq!(cmp.subject.path, vec!["user".to_string(), "name".to_string()]);
        assert_eq!(cmp.operand, Operand::Literal(Value::String("ada".into())));
    }

    #[test]
    fn test_parse_filter_args() {
        let parsed = parse_path("a|$clamp(0, 10)|$round(2)").unwrap();
        let transform = parsed.transform.unwrap();
        assert_eq!(
            transform.stages[0].args,
            vec![
                FilterArg::Literal(Value::Int(0)),
                FilterArg::Literal(Value::Int(10)),
            ]
        );
        assert_eq!(
            transform.stages[1].args,
            vec![FilterArg::Literal(Value::Int(2))]
        );
    }

    #[test]
    fn test_parse_root_reference_argument() {
        let parsed = parse_path("a|$default($$root.fallback)").unwrap();
        let transform = parsed.transform.unwrap();
        match &transform.stages[0].args[0] {
            FilterArg::Root(inner) => {
                assert_eq!(
                    inner.tokens,
                    vec![Token::Root, Token::Key("fallback".into())]
                );
            }
            other => panic!("expected root reference argument, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_root_reference_operand_without_spacing() {
        // no whitespace between the root reference and the boolean operator
        let parsed = parse_path("items[?a==$$root.x||b==1]").unwrap();
        let matcher = match &parsed.tokens[1] {
            Token::Filter(matcher) => matcher,
            other => panic!("expected filter token, got {:?}", other),
        };
        let (left, right) = match &matcher.expr {
            MatcherExpr::Or(left, right) => (left, right),
            other => panic!("expected or at the top, got {:?}", other),
        };
        match left.as_ref() {
            MatcherExpr::Cmp(cmp) => match &cmp.operand {
                Operand::RootRef(inner) => {
                    assert_eq!(inner.tokens, vec![Token::Root, Token::Key("x".into())]);
                }
                other => panic!("expected root reference operand, got {:?}", other),
            },
            other => panic!("expected comparison, got {:?}", other),
        }
        assert!(matches!(right.as_ref(), MatcherExpr::Cmp(_)));
    }

    #[test]
    fn test_parse_root_reference_operand_with_trailing_pipeline() {
        let parsed = parse_path("items[?a==$$root.x|$double&&b==1]").unwrap();
        let matcher = match &parsed.tokens[1] {
            Token::Filter(matcher) => matcher,
            other => panic!("expected filter token, got {:?}", other),
        };
        let left = match &matcher.expr {
            MatcherExpr::And(left, _) => left,
            other => panic!("expected and at the top, got {:?}", other),
        };
        match left.as_ref() {
            MatcherExpr::Cmp(cmp) => match &cmp.operand {
                Operand::RootRef(inner) => {
                    assert_eq!(inner.tokens, vec![Token::Root, Token::Key("x".into())]);
                    let transform = inner.transform.as_ref().unwrap();
                    assert_eq!(transform.stages[0].name, "double");
                }
                other => panic!("expected root reference operand, got {:?}", other),
            },
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert!(parse_path("").is_err());
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("a.b[").is_err());
        assert!(parse_path("a.b[?id==1").is_err());
        assert!(parse_path("a.b[?id==$gt(1)&&]").is_err());
        assert!(parse_path("a.b[?$len>3]").is_err());
        assert!(parse_path("a.b[abc]").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_filter_and_bad_arity() {
        let unknown = parse_path("a|$frobnicate");
        assert!(matches!(unknown, Err(PathError::Operator { .. })));

        let bad_arity = parse_path("a|$add");
        assert!(matches!(bad_arity, Err(PathError::Operator { .. })));
    }

    #[test]
    fn test_parse_determinism() {
        let first = parse_path("a.users[?id>=2 && name==x].tags[1:5:2]|$len").unwrap();
        let second = parse_path("a.users[?id>=2 && name==x].tags[1:5:2]|$len").unwrap();
        assert_eq!(first, second);
    }
}
