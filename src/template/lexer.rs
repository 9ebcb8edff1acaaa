// src/template/lexer.rs

//! Splits template source into literal text and `{{ ... }}` action tokens.
//!
//! Trim markers (`{{- ` and ` -}}`) are applied here, so the parser only sees
//! already-trimmed text. Comments (`{{/* ... */}}`) are dropped.

use super::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `.`
    Dot,
    /// `.A.B` (path without the leading dot)
    Field(Vec<String>),
    /// `$` or `$.A.B`
    Root(Vec<String>),
    Ident(String),
    Str(String),
    Int(i64),
    Pipe,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Text(String),
    Action(Vec<Token>),
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub fn lex(src: &str) -> Result<Vec<Item>, TemplateError> {
    let mut items = Vec::new();
    let mut rest = src;
    let mut trim_next = false;

    loop {
        let Some(pos) = rest.find(OPEN) else {
            push_text(&mut items, rest, trim_next, false);
            break;
        };

        let mut after = &rest[pos + OPEN.len()..];
        let trim_left = has_trim_marker(after);
        if trim_left {
            after = &after[1..];
        }
        push_text(&mut items, &rest[..pos], trim_next, trim_left);

        let body = after.trim_start();
        let (tokens, remaining, trim_right) = if let Some(comment) = body.strip_prefix("/*") {
            let end = comment
                .find("*/")
                .ok_or_else(|| TemplateError::Parse("unclosed comment".to_string()))?;
            let (remaining, trim_right) = close_action(&comment[end + 2..])?;
            (None, remaining, trim_right)
        } else {
            let (tokens, remaining, trim_right) = lex_action(after)?;
            (Some(tokens), remaining, trim_right)
        };

        if let Some(tokens) = tokens {
            if tokens.is_empty() {
                return Err(TemplateError::Parse("missing value for command".to_string()));
            }
            items.push(Item::Action(tokens));
        }

        trim_next = trim_right;
        rest = remaining;
    }

    Ok(items)
}

fn push_text(items: &mut Vec<Item>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}

/// `{{-` only counts as a trim marker when followed by whitespace, so that
/// `{{-3}}` still lexes as a negative number.
fn has_trim_marker(after_open: &str) -> bool {
    let bytes = after_open.as_bytes();
    bytes.len() >= 2 && bytes[0] == b'-' && bytes[1].is_ascii_whitespace()
}

/// Consume the end of an action: optional whitespace, optional ` -`, then `}}`.
fn close_action(s: &str) -> Result<(&str, bool), TemplateError> {
    let s = s.trim_start();
    if let Some(rest) = s.strip_prefix(CLOSE) {
        return Ok((rest, false));
    }
    if let Some(rest) = s.strip_prefix("-}}") {
        return Ok((rest, true));
    }
    Err(TemplateError::Parse(format!(
        "unclosed action near {:?}",
        s.chars().take(20).collect::<String>()
    )))
}

fn lex_action(s: &str) -> Result<(Vec<Token>, &str, bool), TemplateError> {
    let mut tokens = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let here = &s[i..];
        if here.starts_with(CLOSE) {
            return Ok((tokens, &here[CLOSE.len()..], false));
        }
        if here.starts_with("-}}") && i > 0 && bytes[i - 1].is_ascii_whitespace() {
            return Ok((tokens, &here[3..], true));
        }

        match c {
            b'|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'"' => {
                let (value, len) = lex_quoted(here)?;
                tokens.push(Token::Str(value));
                i += len;
            }
            b'`' => {
                let end = here[1..]
                    .find('`')
                    .ok_or_else(|| TemplateError::Parse("unterminated raw string".to_string()))?;
                tokens.push(Token::Str(here[1..1 + end].to_string()));
                i += end + 2;
            }
            b'.' => {
                let (path, len) = lex_path(here);
                if path.is_empty() {
                    tokens.push(Token::Dot);
                    i += 1;
                } else {
                    tokens.push(Token::Field(path));
                    i += len;
                }
            }
            b'$' => {
                let (path, len) = lex_path(&here[1..]);
                if len == 0 && here[1..].starts_with(|ch: char| is_ident_char(ch)) {
                    return Err(TemplateError::Parse(format!(
                        "template variables are not supported: {}",
                        here.chars().take_while(|ch| !ch.is_whitespace()).collect::<String>()
                    )));
                }
                tokens.push(Token::Root(path));
                i += 1 + len;
            }
            b'-' | b'0'..=b'9' => {
                let len = here
                    .char_indices()
                    .skip(1)
                    .find(|(_, ch)| !ch.is_ascii_digit())
                    .map(|(idx, _)| idx)
                    .unwrap_or(here.len());
                let literal = &here[..len];
                let value = literal.parse::<i64>().map_err(|_| {
                    TemplateError::Parse(format!("bad number syntax: {literal:?}"))
                })?;
                tokens.push(Token::Int(value));
                i += len;
            }
            _ if is_ident_start(c as char) => {
                let len = here
                    .char_indices()
                    .find(|(_, ch)| !is_ident_char(*ch))
                    .map(|(idx, _)| idx)
                    .unwrap_or(here.len());
                tokens.push(Token::Ident(here[..len].to_string()));
                i += len;
            }
            _ => {
                return Err(TemplateError::Parse(format!(
                    "unexpected character {:?} in action",
                    here.chars().next().unwrap_or_default()
                )));
            }
        }
    }

    Err(TemplateError::Parse("unclosed action".to_string()))
}

/// Lex `.A.B.C` starting at a `.`; returns the path and consumed byte length.
/// A lone `.` yields an empty path.
fn lex_path(s: &str) -> (Vec<String>, usize) {
    let mut path = Vec::new();
    let mut consumed = 0;
    let mut rest = s;

    while let Some(after_dot) = rest.strip_prefix('.') {
        if !after_dot.starts_with(is_ident_start) {
            break;
        }
        let len = after_dot
            .char_indices()
            .find(|(_, ch)| !is_ident_char(*ch))
            .map(|(idx, _)| idx)
            .unwrap_or(after_dot.len());
        path.push(after_dot[..len].to_string());
        consumed += 1 + len;
        rest = &after_dot[len..];
    }

    (path, consumed)
}

fn lex_quoted(s: &str) -> Result<(String, usize), TemplateError> {
    let mut out = String::new();
    let mut chars = s.char_indices().skip(1);

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => return Ok((out, idx + 1)),
            '\\' => {
                let (_, escaped) = chars
                    .next()
                    .ok_or_else(|| TemplateError::Parse("unterminated quoted string".to_string()))?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' => '\\',
                    '"' => '"',
                    other => {
                        return Err(TemplateError::Parse(format!(
                            "unknown escape sequence: \\{other}"
                        )));
                    }
                });
            }
            '\n' => {
                return Err(TemplateError::Parse("unterminated quoted string".to_string()));
            }
            other => out.push(other),
        }
    }

    Err(TemplateError::Parse("unterminated quoted string".to_string()))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_text_and_pipeline() {
        let items = lex(r#"a-{{ env "HOSTNAME" | splitList "-" }}-b"#).unwrap();
        assert_eq!(
            items,
            vec![
                Item::Text("a-".into()),
                Item::Action(vec![
                    Token::Ident("env".into()),
                    Token::Str("HOSTNAME".into()),
                    Token::Pipe,
                    Token::Ident("splitList".into()),
                    Token::Str("-".into()),
                ]),
                Item::Text("-b".into()),
            ]
        );
    }

    #[test]
    fn trim_markers_strip_surrounding_whitespace() {
        let items = lex("a  \n {{- .Index -}} \n b").unwrap();
        assert_eq!(
            items,
            vec![
                Item::Text("a".into()),
                Item::Action(vec![Token::Field(vec!["Index".into()])]),
                Item::Text("b".into()),
            ]
        );
    }

    #[test]
    fn negative_number_is_not_a_trim_marker() {
        let items = lex("{{-3}}").unwrap();
        assert_eq!(items, vec![Item::Action(vec![Token::Int(-3)])]);
    }

    #[test]
    fn comments_are_dropped() {
        let items = lex("x{{/* note */}}y{{- /* trimmed */ -}} z").unwrap();
        assert_eq!(
            items,
            vec![Item::Text("x".into()), Item::Text("y".into()), Item::Text("z".into())]
        );
    }

    #[test]
    fn close_delimiter_inside_string_is_literal() {
        let items = lex(r#"{{ "}}" }}"#).unwrap();
        assert_eq!(items, vec![Item::Action(vec![Token::Str("}}".into())])]);
    }

    #[test]
    fn dot_field_and_root_paths() {
        let items = lex("{{ . }}{{ .A.B }}{{ $.C }}{{ $ }}").unwrap();
        assert_eq!(
            items,
            vec![
                Item::Action(vec![Token::Dot]),
                Item::Action(vec![Token::Field(vec!["A".into(), "B".into()])]),
                Item::Action(vec![Token::Root(vec!["C".into()])]),
                Item::Action(vec![Token::Root(vec![])]),
            ]
        );
    }

    #[test]
    fn unclosed_action_is_an_error() {
        assert!(lex("{{ .Index").is_err());
        assert!(lex(r#"{{ "open }}"#).is_err());
        assert!(lex("{{ }}").is_err());
    }
}
