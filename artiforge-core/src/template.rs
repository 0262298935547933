//! Username template engine.
//!
//! Templates are plain text with `{{ }}` actions, in the style of Go's
//! `text/template`:
//!
//! ```text
//! v-{{.RoleName | truncate 24}}-{{random 8}}
//! ```
//!
//! An action is a pipeline of commands separated by `|`. The first command
//! is a field (`.DisplayName`, `.RoleName`), a literal, or a function call;
//! every later command must be a function call and receives the previous
//! value as its last argument. `{{-` and `-}}` trim whitespace from the
//! adjacent text.
//!
//! Only the functions in [`Function`] exist. Templates are checked fully at
//! [`UsernameTemplate::compile`] time (fields, function names, arity, and
//! argument kinds), so rendering a compiled template can only fail when the
//! [`TemplateContext`] lacks a field the template uses.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};
use thiserror::Error;

/// Template used when the admin configuration does not set one.
pub const DEFAULT_USERNAME_TEMPLATE: &str = "v-{{.RoleName | truncate 24}}-{{random 8}}";

/// Upper bound for `random n`.
pub const MAX_RANDOM_LENGTH: i64 = 256;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A template failed to compile.
///
/// `clause` is the offending piece of template text, usually a whole
/// `{{ ... }}` action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("template clause {clause:?}: {kind}")]
pub struct TemplateError {
    pub clause: String,
    pub kind: TemplateErrorKind,
}

impl TemplateError {
    fn new(clause: impl Into<String>, kind: TemplateErrorKind) -> Self {
        Self {
            clause: clause.into(),
            kind,
        }
    }
}

/// What went wrong while compiling a clause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateErrorKind {
    #[error("unclosed action")]
    Unclosed,

    #[error("unexpected closing delimiter")]
    UnexpectedClose,

    #[error("missing value for action")]
    EmptyAction,

    #[error("unknown field .{field}")]
    UnknownField { field: String },

    #[error("function {name:?} not defined")]
    UnknownFunction { name: String },

    #[error("wrong number of args for {function}: want {want} got {got}")]
    Arity {
        function: &'static str,
        want: usize,
        got: usize,
    },

    #[error("bad argument {position} for {function}: {message}")]
    BadArgument {
        function: &'static str,
        position: usize,
        message: String,
    },

    #[error("malformed expression: {message}")]
    Malformed { message: String },
}

/// Rendering a compiled template failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The template references a field the context does not carry.
    #[error("no value for field .{field} in template context")]
    MissingField { field: &'static str },

    /// A function received arguments its signature does not accept.
    #[error("invalid arguments for function {function}")]
    InvalidArguments { function: &'static str },
}

/// Request-scoped values a template may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    pub display_name: Option<String>,
    pub role_name: Option<String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }
}

/// Fields a template can read from the [`TemplateContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DisplayName,
    RoleName,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "DisplayName" => Some(Self::DisplayName),
            "RoleName" => Some(Self::RoleName),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::DisplayName => "DisplayName",
            Self::RoleName => "RoleName",
        }
    }

    fn lookup(self, ctx: &TemplateContext) -> Result<&str, EvalError> {
        let value = match self {
            Self::DisplayName => ctx.display_name.as_deref(),
            Self::RoleName => ctx.role_name.as_deref(),
        };
        value.ok_or(EvalError::MissingField { field: self.name() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Param {
    Int,
    Str,
}

/// The complete function registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `random n`: n cryptographically random alphanumeric characters.
    Random,
    /// `unix_time`: seconds since the epoch.
    UnixTime,
    /// `unix_time_millis`: milliseconds since the epoch.
    UnixTimeMillis,
    /// `uuid`: a random v4 UUID.
    Uuid,
    /// `truncate n s`: first n characters of s.
    Truncate,
    Lowercase,
    Uppercase,
    /// `replace old new s`
    Replace,
    /// `sha256 s`: lowercase hex digest.
    Sha256,
}

impl Function {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "random" => Self::Random,
            "unix_time" => Self::UnixTime,
            "unix_time_millis" => Self::UnixTimeMillis,
            "uuid" => Self::Uuid,
            "truncate" => Self::Truncate,
            "lowercase" => Self::Lowercase,
            "uppercase" => Self::Uppercase,
            "replace" => Self::Replace,
            "sha256" => Self::Sha256,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::UnixTime => "unix_time",
            Self::UnixTimeMillis => "unix_time_millis",
            Self::Uuid => "uuid",
            Self::Truncate => "truncate",
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
            Self::Replace => "replace",
            Self::Sha256 => "sha256",
        }
    }

    fn params(self) -> &'static [Param] {
        match self {
            Self::Random => &[Param::Int],
            Self::UnixTime | Self::UnixTimeMillis | Self::Uuid => &[],
            Self::Truncate => &[Param::Int, Param::Str],
            Self::Lowercase | Self::Uppercase | Self::Sha256 => &[Param::Str],
            Self::Replace => &[Param::Str, Param::Str, Param::Str],
        }
    }

    fn check_int(self, value: i64) -> Result<(), String> {
        match self {
            Self::Random if !(1..=MAX_RANDOM_LENGTH).contains(&value) => Err(format!(
                "length must be between 1 and {}, got {}",
                MAX_RANDOM_LENGTH, value
            )),
            Self::Truncate if value < 0 => {
                Err(format!("length must not be negative, got {}", value))
            }
            _ => Ok(()),
        }
    }

    fn apply(self, args: &[Value]) -> Result<String, EvalError> {
        Ok(match (self, args) {
            (Self::Random, [Value::Int(n)]) => OsRng
                .sample_iter(&Alphanumeric)
                .take(*n as usize)
                .map(char::from)
                .collect(),
            (Self::UnixTime, []) => Utc::now().timestamp().to_string(),
            (Self::UnixTimeMillis, []) => Utc::now().timestamp_millis().to_string(),
            (Self::Uuid, []) => uuid::Uuid::new_v4().to_string(),
            (Self::Truncate, [Value::Int(n), Value::Str(s)]) => {
                s.chars().take(*n as usize).collect()
            }
            (Self::Lowercase, [Value::Str(s)]) => s.to_lowercase(),
            (Self::Uppercase, [Value::Str(s)]) => s.to_uppercase(),
            (Self::Replace, [Value::Str(old), Value::Str(new), Value::Str(s)]) => {
                s.replace(old.as_str(), new)
            }
            (Self::Sha256, [Value::Str(s)]) => hex::encode(Sha256::digest(s.as_bytes())),
            _ => return Err(EvalError::InvalidArguments { function: self.name() }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Int(i64),
    Str(String),
    Field(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    fn into_string(self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Str(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Value(Arg),
    Call { function: Function, args: Vec<Arg> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Action(Vec<Command>),
}

/// A compiled username template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameTemplate {
    source: String,
    nodes: Vec<Node>,
}

impl UsernameTemplate {
    /// Compile `source`, checking every action against the field and
    /// function registries.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut nodes = Vec::new();
        let mut rest = source;
        let mut trim_next = false;

        loop {
            let Some(open) = rest.find(OPEN) else {
                push_text(&mut nodes, rest, trim_next, false)?;
                break;
            };

            let after = &rest[open + OPEN.len()..];
            let close = find_close(after)
                .ok_or_else(|| TemplateError::new(&rest[open..], TemplateErrorKind::Unclosed))?;
            let clause = &rest[open..open + OPEN.len() + close + CLOSE.len()];

            let mut body = &after[..close];
            let trim_left = has_left_trim(body);
            if trim_left {
                body = &body[2..];
            }
            let trim_right = has_right_trim(body);
            if trim_right {
                body = &body[..body.len() - 2];
            }

            push_text(&mut nodes, &rest[..open], trim_next, trim_left)?;
            let pipeline = parse_pipeline(body).map_err(|kind| TemplateError::new(clause, kind))?;
            nodes.push(Node::Action(pipeline));

            trim_next = trim_right;
            rest = &after[close + CLOSE.len()..];
        }

        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// The template text this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the template against `ctx`.
    pub fn render(&self, ctx: &TemplateContext) -> Result<String, EvalError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(pipeline) => out.push_str(&eval_pipeline(pipeline, ctx)?),
            }
        }
        Ok(out)
    }
}

impl FromStr for UsernameTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for UsernameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn push_text(
    nodes: &mut Vec<Node>,
    text: &str,
    trim_start: bool,
    trim_end: bool,
) -> Result<(), TemplateError> {
    if text.contains(CLOSE) {
        return Err(TemplateError::new(text, TemplateErrorKind::UnexpectedClose));
    }
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
    Ok(())
}

fn has_left_trim(body: &str) -> bool {
    let b = body.as_bytes();
    b.len() >= 2 && b[0] == b'-' && b[1].is_ascii_whitespace()
}

fn has_right_trim(body: &str) -> bool {
    let b = body.as_bytes();
    let n = b.len();
    n >= 2 && b[n - 1] == b'-' && b[n - 2].is_ascii_whitespace()
}

/// Byte offset of the first `}}` outside a quoted string.
fn find_close(s: &str) -> Option<usize> {
    let b = s.as_bytes();
    let mut i = 0;
    let mut quote: Option<u8> = None;
    while i < b.len() {
        match quote {
            Some(b'"') if b[i] == b'\\' => i += 1,
            Some(q) if b[i] == q => quote = None,
            Some(_) => {}
            None if b[i] == b'"' || b[i] == b'`' => quote = Some(b[i]),
            None if b[i..].starts_with(CLOSE.as_bytes()) => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Pipe,
    Field(String),
    Ident(String),
    Int(i64),
    Str(String),
}

fn malformed(message: impl Into<String>) -> TemplateErrorKind {
    TemplateErrorKind::Malformed {
        message: message.into(),
    }
}

fn tokenize(body: &str) -> Result<Vec<Token>, TemplateErrorKind> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '"' => {
                chars.next();
                tokens.push(Token::Str(read_quoted(&mut chars)?));
            }
            '`' => {
                chars.next();
                let raw: String = chars.by_ref().take_while(|&c| c != '`').collect();
                tokens.push(Token::Str(raw));
            }
            '.' => {
                chars.next();
                let name = take_ident(&mut chars);
                if name.is_empty() {
                    return Err(malformed("expected field name after '.'"));
                }
                tokens.push(Token::Field(name));
            }
            c if c == '-' || c.is_ascii_digit() => {
                let mut literal = String::new();
                literal.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    literal.push(d);
                    chars.next();
                }
                let n = literal
                    .parse()
                    .map_err(|_| malformed(format!("bad number syntax: {:?}", literal)))?;
                tokens.push(Token::Int(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                tokens.push(Token::Ident(take_ident(&mut chars)));
            }
            other => return Err(malformed(format!("unexpected {:?} in action", other))),
        }
    }

    Ok(tokens)
}

fn take_ident(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if !(c.is_alphanumeric() || c == '_') {
            break;
        }
        ident.push(c);
        chars.next();
    }
    ident
}

fn read_quoted(chars: &mut Peekable<Chars<'_>>) -> Result<String, TemplateErrorKind> {
    let mut s = String::new();
    loop {
        match chars.next() {
            None => return Err(malformed("unterminated quoted string")),
            Some('"') => return Ok(s),
            Some('\\') => match chars.next() {
                Some('n') => s.push('\n'),
                Some('t') => s.push('\t'),
                Some(c @ ('"' | '\\')) => s.push(c),
                Some(c) => return Err(malformed(format!("unknown escape sequence \\{}", c))),
                None => return Err(malformed("unterminated quoted string")),
            },
            Some(c) => s.push(c),
        }
    }
}

fn parse_pipeline(body: &str) -> Result<Vec<Command>, TemplateErrorKind> {
    let tokens = tokenize(body)?;
    if tokens.is_empty() {
        return Err(TemplateErrorKind::EmptyAction);
    }

    let mut pipeline = Vec::new();
    for (position, segment) in tokens.split(|t| *t == Token::Pipe).enumerate() {
        if segment.is_empty() {
            return Err(malformed("missing command in pipeline"));
        }
        pipeline.push(parse_command(segment, position > 0)?);
    }
    Ok(pipeline)
}

fn parse_arg(token: &Token) -> Result<Arg, TemplateErrorKind> {
    match token {
        Token::Int(n) => Ok(Arg::Int(*n)),
        Token::Str(s) => Ok(Arg::Str(s.clone())),
        Token::Field(name) => Field::parse(name)
            .map(Arg::Field)
            .ok_or_else(|| TemplateErrorKind::UnknownField { field: name.clone() }),
        Token::Ident(name) => Err(match Function::parse(name) {
            Some(_) => malformed(format!("function {} used as an argument", name)),
            None => TemplateErrorKind::UnknownFunction { name: name.clone() },
        }),
        Token::Pipe => Err(malformed("unexpected pipe")),
    }
}

fn parse_command(tokens: &[Token], piped: bool) -> Result<Command, TemplateErrorKind> {
    let (head, rest) = tokens
        .split_first()
        .ok_or_else(|| malformed("missing command"))?;

    let Token::Ident(name) = head else {
        let value = parse_arg(head)?;
        if !rest.is_empty() {
            return Err(malformed("can't give argument to non-function"));
        }
        if piped {
            return Err(malformed("only functions can follow a pipe"));
        }
        return Ok(Command::Value(value));
    };

    let function = Function::parse(name)
        .ok_or_else(|| TemplateErrorKind::UnknownFunction { name: name.clone() })?;
    let params = function.params();
    let got = rest.len() + usize::from(piped);
    if got != params.len() {
        return Err(TemplateErrorKind::Arity {
            function: function.name(),
            want: params.len(),
            got,
        });
    }

    let mut args = Vec::with_capacity(rest.len());
    for (i, (token, param)) in rest.iter().zip(params).enumerate() {
        let arg = parse_arg(token)?;
        let bad = |message: String| TemplateErrorKind::BadArgument {
            function: function.name(),
            position: i + 1,
            message,
        };
        match (param, &arg) {
            (Param::Int, Arg::Int(n)) => function.check_int(*n).map_err(bad)?,
            (Param::Int, _) => return Err(bad("expected an integer literal".to_string())),
            (Param::Str, Arg::Int(_)) => return Err(bad("expected a string".to_string())),
            (Param::Str, _) => {}
        }
        args.push(arg);
    }

    if piped && params.last() == Some(&Param::Int) {
        return Err(TemplateErrorKind::BadArgument {
            function: function.name(),
            position: params.len(),
            message: "cannot pipe a string into an integer argument".to_string(),
        });
    }

    Ok(Command::Call { function, args })
}

fn eval_pipeline(pipeline: &[Command], ctx: &TemplateContext) -> Result<String, EvalError> {
    let mut piped: Option<Value> = None;
    for command in pipeline {
        let value = match command {
            Command::Value(arg) => resolve(arg, ctx)?,
            Command::Call { function, args } => {
                let mut values = args
                    .iter()
                    .map(|arg| resolve(arg, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(input) = piped.take() {
                    values.push(Value::Str(input.into_string()));
                }
                Value::Str(function.apply(&values)?)
            }
        };
        piped = Some(value);
    }
    Ok(piped.map(Value::into_string).unwrap_or_default())
}

fn resolve(arg: &Arg, ctx: &TemplateContext) -> Result<Value, EvalError> {
    Ok(match arg {
        Arg::Int(n) => Value::Int(*n),
        Arg::Str(s) => Value::Str(s.clone()),
        Arg::Field(field) => Value::Str(field.lookup(ctx)?.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TemplateContext {
        TemplateContext::new()
            .with_display_name("token-alice")
            .with_role_name("readers")
    }

    fn compile_err(source: &str) -> TemplateErrorKind {
        UsernameTemplate::compile(source).unwrap_err().kind
    }

    #[test]
    fn test_default_template_compiles() {
        let template = UsernameTemplate::compile(DEFAULT_USERNAME_TEMPLATE).unwrap();

        let rendered = template.render(&ctx()).unwrap();
        assert!(rendered.starts_with("v-readers-"));
        assert_eq!(rendered.len(), "v-readers-".len() + 8);
    }

    #[test]
    fn test_plain_text_and_fields() {
        let template = UsernameTemplate::compile("u_{{.DisplayName}}_{{ .RoleName }}").unwrap();
        assert_eq!(template.render(&ctx()).unwrap(), "u_token-alice_readers");
        assert_eq!(template.source(), "u_{{.DisplayName}}_{{ .RoleName }}");
    }

    #[test]
    fn test_accepts_documented_example() {
        let source = "v_{{.DisplayName}}_{{.RoleName}}_{{random 10}}_{{unix_time}}";
        let template = UsernameTemplate::compile(source).unwrap();
        let rendered = template.render(&ctx()).unwrap();

        let parts: Vec<&str> = rendered.rsplitn(3, '_').collect();
        let (time, random) = (parts[0], parts[1]);
        assert!(time.parse::<i64>().unwrap() > 1_600_000_000);
        assert_eq!(random.len(), 10);
        assert!(random.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(parts[2].starts_with("v_token-alice_readers"));
    }

    #[test]
    fn test_random_is_not_repeated() {
        let template = UsernameTemplate::compile("{{random 32}}").unwrap();
        let a = template.render(&ctx()).unwrap();
        let b = template.render(&ctx()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_pipelines_and_functions() {
        let cases = [
            ("{{.RoleName | truncate 3}}", "rea"),
            ("{{truncate 5 .DisplayName}}", "token"),
            ("{{.RoleName | uppercase}}", "READERS"),
            ("{{\"MiXeD\" | lowercase}}", "mixed"),
            ("{{.DisplayName | replace \"-\" \"_\"}}", "token_alice"),
            ("{{.RoleName | truncate 100}}", "readers"),
            ("{{ 42 }}", "42"),
        ];
        for (source, expected) in cases {
            let template = UsernameTemplate::compile(source).unwrap();
            assert_eq!(template.render(&ctx()).unwrap(), expected, "{}", source);
        }
    }

    #[test]
    fn test_sha256_pipeline() {
        let template = UsernameTemplate::compile("{{.RoleName | sha256 | truncate 12}}").unwrap();
        let digest = hex::encode(Sha256::digest(b"readers"));
        assert_eq!(template.render(&ctx()).unwrap(), digest[..12]);
    }

    #[test]
    fn test_uuid_and_millis() {
        let template = UsernameTemplate::compile("{{uuid}} {{unix_time_millis}}").unwrap();
        let rendered = template.render(&ctx()).unwrap();
        let (id, millis) = rendered.split_once(' ').unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        assert!(millis.parse::<i64>().unwrap() > 1_600_000_000_000);
    }

    #[test]
    fn test_trim_markers() {
        let template = UsernameTemplate::compile("a   {{- .RoleName -}}   b").unwrap();
        assert_eq!(template.render(&ctx()).unwrap(), "areadersb");
    }

    #[test]
    fn test_quoted_close_delimiter() {
        let template = UsernameTemplate::compile("{{ \"}}\" }}").unwrap();
        assert_eq!(template.render(&ctx()).unwrap(), "}}");
    }

    #[test]
    fn test_unclosed_action() {
        let err = UsernameTemplate::compile("bad_{{ .RoleName }}_testing {{").unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::Unclosed);
        assert_eq!(err.clause, "{{");
    }

    #[test]
    fn test_unknown_field_names_clause() {
        let err = UsernameTemplate::compile("bad_{{ .somethingInvalid }}_testing {{").unwrap_err();
        assert_eq!(
            err.kind,
            TemplateErrorKind::UnknownField {
                field: "somethingInvalid".to_string()
            }
        );
        assert_eq!(err.clause, "{{ .somethingInvalid }}");
        assert!(err.to_string().contains("somethingInvalid"));
    }

    #[test]
    fn test_stray_close_delimiter() {
        assert_eq!(compile_err("abc}}"), TemplateErrorKind::UnexpectedClose);
    }

    #[test]
    fn test_empty_action() {
        assert_eq!(compile_err("x{{ }}"), TemplateErrorKind::EmptyAction);
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            compile_err("{{ env \"HOME\" }}"),
            TemplateErrorKind::UnknownFunction {
                name: "env".to_string()
            }
        );
    }

    #[test]
    fn test_arity_and_argument_kinds() {
        assert!(matches!(
            compile_err("{{random}}"),
            TemplateErrorKind::Arity { function: "random", want: 1, got: 0 }
        ));
        assert!(matches!(
            compile_err("{{unix_time 3}}"),
            TemplateErrorKind::Arity { function: "unix_time", .. }
        ));
        assert!(matches!(
            compile_err("{{random \"ten\"}}"),
            TemplateErrorKind::BadArgument { function: "random", .. }
        ));
        assert!(matches!(
            compile_err("{{random 0}}"),
            TemplateErrorKind::BadArgument { function: "random", .. }
        ));
        assert!(matches!(
            compile_err("{{.RoleName | random}}"),
            TemplateErrorKind::BadArgument { function: "random", .. }
        ));
        assert!(matches!(
            compile_err("{{truncate -1 .RoleName}}"),
            TemplateErrorKind::BadArgument { function: "truncate", .. }
        ));
    }

    #[test]
    fn test_malformed_pipelines() {
        for source in [
            "{{ | uppercase }}",
            "{{ .RoleName | }}",
            "{{ .RoleName .DisplayName }}",
            "{{ uppercase | .RoleName }}",
            "{{ \"open }}",
            "{{ . }}",
            "{{ a+b }}",
        ] {
            assert!(UsernameTemplate::compile(source).is_err(), "{}", source);
        }
    }

    #[test]
    fn test_missing_context_field_is_eval_error() {
        let template = UsernameTemplate::compile("{{.DisplayName}}").unwrap();
        let err = template
            .render(&TemplateContext::new().with_role_name("r"))
            .unwrap_err();
        assert_eq!(err, EvalError::MissingField { field: "DisplayName" });
    }

    #[test]
    fn test_from_str_and_display() {
        let template: UsernameTemplate = "x-{{.RoleName}}".parse().unwrap();
        assert_eq!(template.to_string(), "x-{{.RoleName}}");
    }
}
