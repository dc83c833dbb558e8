//! Fortran namelist text codec.
//!
//! Covers the subset the WRF/WRFDA tools read and write: `&group ... /`
//! blocks of `key = value[, value...]` bindings with integer, real, logical
//! and quoted string literals, `n*value` repeats and `!` comments.
use super::{Namelist, Value};
use crate::error::CycleError;
use anyhow::{anyhow, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    GroupStart(String),
    GroupEnd,
    Equals,
    Comma,
    Quoted(String),
    Word(String),
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_%]*$").expect("identifier regex"))
}

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?\d+$").expect("integer regex"))
}

fn real_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eEdD][+-]?\d+)?$").expect("real regex")
    })
}

fn repeat_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\*(.+)$").expect("repeat regex"))
}

/// Parse namelist text. `origin` names the source in error messages.
pub fn parse(text: &str, origin: &str) -> Result<Namelist> {
    let tokens = tokenize(text, origin)?;
    let mut namelist = Namelist::default();
    let mut idx = 0;
    while idx < tokens.len() {
        let Spanned { token, line } = &tokens[idx];
        let Token::GroupStart(name) = token else {
            return Err(parse_error(origin, *line, "expected `&group` header"));
        };
        namelist.ensure_group(name);
        idx += 1;
        idx = parse_group_body(&tokens, idx, name, &mut namelist, origin)?;
    }
    Ok(namelist)
}

fn parse_group_body(
    tokens: &[Spanned],
    mut idx: usize,
    group: &str,
    namelist: &mut Namelist,
    origin: &str,
) -> Result<usize> {
    loop {
        let Some(Spanned { token, line }) = tokens.get(idx) else {
            return Err(anyhow!(CycleError::parse(
                origin,
                format!("group &{group} is not terminated with `/`")
            )));
        };
        match token {
            Token::GroupEnd => return Ok(idx + 1),
            Token::Comma => idx += 1,
            Token::Word(key) if identifier_re().is_match(key) => {
                if tokens.get(idx + 1).map(|t| &t.token) != Some(&Token::Equals) {
                    return Err(parse_error(origin, *line, &format!("expected `=` after {key}")));
                }
                idx += 2;
                let mut values = Vec::new();
                while let Some(next) = tokens.get(idx) {
                    match &next.token {
                        Token::Comma => idx += 1,
                        Token::Quoted(text) => {
                            values.push(Value::Text(text.clone()));
                            idx += 1;
                        }
                        Token::Word(word) => {
                            let is_next_key =
                                tokens.get(idx + 1).map(|t| &t.token) == Some(&Token::Equals);
                            if is_next_key {
                                break;
                            }
                            values.extend(parse_literal(word, origin, next.line)?);
                            idx += 1;
                        }
                        Token::GroupEnd => break,
                        Token::Equals | Token::GroupStart(_) => {
                            return Err(parse_error(origin, next.line, "unexpected token"));
                        }
                    }
                }
                let value = match values.len() {
                    0 => {
                        return Err(parse_error(
                            origin,
                            *line,
                            &format!("missing value for {key}"),
                        ))
                    }
                    1 => values.remove(0),
                    _ => Value::Array(values),
                };
                namelist.set(group, key, value);
            }
            _ => return Err(parse_error(origin, *line, "expected `key = value`")),
        }
    }
}

/// Largest `n*value` repeat accepted.
const MAX_REPEAT: usize = 10_000;

fn parse_literal(word: &str, origin: &str, line: usize) -> Result<Vec<Value>> {
    if let Some(caps) = repeat_re().captures(word) {
        let count = caps[1]
            .parse::<usize>()
            .ok()
            .filter(|count| *count <= MAX_REPEAT)
            .ok_or_else(|| parse_error(origin, line, &format!("repeat count too large in {word}")))?;
        let value = parse_scalar(&caps[2])
            .ok_or_else(|| parse_error(origin, line, &format!("unrecognized value {word}")))?;
        return Ok(vec![value; count]);
    }
    parse_scalar(word)
        .map(|value| vec![value])
        .ok_or_else(|| parse_error(origin, line, &format!("unrecognized value {word}")))
}

fn parse_scalar(word: &str) -> Option<Value> {
    if let Some(text) = unquote(word) {
        return Some(Value::Text(text));
    }
    let lower = word.to_ascii_lowercase();
    if let Some(flag) = parse_logical(&lower) {
        return Some(Value::Logical(flag));
    }
    if integer_re().is_match(word) {
        return word.parse().ok().map(Value::Integer);
    }
    if real_re().is_match(word) {
        return lower.replace('d', "e").parse().ok().map(Value::Real);
    }
    None
}

/// Fortran logicals: an optional `.` then a word starting with `t` or `f`.
fn parse_logical(lower: &str) -> Option<bool> {
    let body = lower.strip_prefix('.').unwrap_or(lower);
    let body = body.strip_suffix('.').unwrap_or(body);
    if !body.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return None;
    }
    match body.chars().next()? {
        't' => Some(true),
        'f' => Some(false),
        _ => None,
    }
}

fn unquote(word: &str) -> Option<String> {
    let quote = word.chars().next().filter(|ch| *ch == '\'' || *ch == '"')?;
    let inner = word.strip_prefix(quote)?.strip_suffix(quote)?;
    let doubled = format!("{quote}{quote}");
    Some(inner.replace(&doubled, &quote.to_string()))
}

fn tokenize(text: &str, origin: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;
    while let Some(ch) = chars.next() {
        match ch {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '!' => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '=' => tokens.push(Spanned {
                token: Token::Equals,
                line,
            }),
            ',' => tokens.push(Spanned {
                token: Token::Comma,
                line,
            }),
            '/' => tokens.push(Spanned {
                token: Token::GroupEnd,
                line,
            }),
            '&' | '$' => {
                let mut name = String::new();
                while let Some(next) = chars.peek().copied() {
                    if next.is_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let name = name.to_ascii_lowercase();
                let token = if name == "end" || name.is_empty() {
                    Token::GroupEnd
                } else {
                    Token::GroupStart(name)
                };
                tokens.push(Spanned { token, line });
            }
            '\'' | '"' => {
                let start_line = line;
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(next) if next == ch => {
                            if chars.peek() == Some(&ch) {
                                value.push(ch);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        Some(next) => {
                            if next == '\n' {
                                line += 1;
                            }
                            value.push(next);
                        }
                        None => {
                            return Err(parse_error(origin, start_line, "unterminated string"));
                        }
                    }
                }
                tokens.push(Spanned {
                    token: Token::Quoted(value),
                    line: start_line,
                });
            }
            _ => {
                let mut word = String::from(ch);
                while let Some(next) = chars.peek().copied() {
                    if next.is_whitespace() || matches!(next, ',' | '=' | '/' | '!') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(Spanned {
                    token: Token::Word(word),
                    line,
                });
            }
        }
    }
    Ok(tokens)
}

fn parse_error(origin: &str, line: usize, detail: &str) -> anyhow::Error {
    anyhow!(CycleError::parse(origin, format!("line {line}: {detail}")))
}

/// Render a namelist in the layout the WRF tools expect.
pub fn render(namelist: &Namelist) -> String {
    let mut out = String::new();
    for (idx, group) in namelist.groups().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "&{}", group.name());
        for (key, value) in group.entries() {
            let _ = writeln!(out, "    {key} = {}", render_value(value));
        }
        out.push_str("/\n");
    }
    out
}

pub fn render_value(value: &Value) -> String {
    match value {
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => format!("{v:?}"),
        Value::Logical(true) => ".true.".to_string(),
        Value::Logical(false) => ".false.".to_string(),
        Value::Text(text) => format!("'{}'", text.replace('\'', "''")),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
    }
}
