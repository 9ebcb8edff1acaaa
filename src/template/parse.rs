// src/template/parse.rs

use std::collections::HashMap;
use std::sync::Arc;

use super::lexer::{lex, Item, Token};
use super::TemplateError;

/// Named sub-templates declared with `{{ define "name" }}...{{ end }}`.
pub type Defines = HashMap<String, Arc<Vec<Node>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Action(Pipeline),
    If {
        cond: Pipeline,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Range {
        over: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Template {
        name: String,
        arg: Option<Pipeline>,
    },
}

/// `cmd | cmd | ...`; each command's result is appended as the last argument
/// of the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline(pub Vec<Command>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(pub Vec<Operand>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Dot,
    Field(Vec<String>),
    Root(Vec<String>),
    Ident(String),
    Bool(bool),
    Nil,
    Str(String),
    Int(i64),
    Sub(Pipeline),
}

#[derive(Debug, Default)]
pub struct Parsed {
    pub root: Vec<Node>,
    pub defines: Defines,
}

enum Terminator {
    Eof,
    End,
    Else(Vec<Token>),
}

pub fn parse(src: &str) -> Result<Parsed, TemplateError> {
    let items = lex(src)?;
    let mut parser = Parser {
        items: items.into_iter(),
        defines: Defines::new(),
    };

    let (root, term) = parser.parse_list(true)?;
    match term {
        Terminator::Eof => Ok(Parsed {
            root,
            defines: parser.defines,
        }),
        Terminator::End => Err(TemplateError::Parse("unexpected {{end}}".to_string())),
        Terminator::Else(_) => Err(TemplateError::Parse("unexpected {{else}}".to_string())),
    }
}

struct Parser {
    items: std::vec::IntoIter<Item>,
    defines: Defines,
}

impl Parser {
    fn parse_list(&mut self, top_level: bool) -> Result<(Vec<Node>, Terminator), TemplateError> {
        let mut nodes = Vec::new();

        while let Some(item) = self.items.next() {
            let tokens = match item {
                Item::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action(tokens) => tokens,
            };

            let keyword = match tokens.first() {
                Some(Token::Ident(word)) => word.as_str(),
                _ => "",
            };

            match keyword {
                "end" => {
                    if tokens.len() > 1 {
                        return Err(TemplateError::Parse("unexpected tokens after end".to_string()));
                    }
                    return Ok((nodes, Terminator::End));
                }
                "else" => return Ok((nodes, Terminator::Else(tokens[1..].to_vec()))),
                "if" => nodes.push(self.parse_if(&tokens[1..])?),
                "range" => nodes.push(self.parse_range(&tokens[1..])?),
                "define" => {
                    if !top_level {
                        return Err(TemplateError::Parse(
                            "define is only allowed at the top level".to_string(),
                        ));
                    }
                    self.parse_define(&tokens[1..])?;
                }
                "template" => nodes.push(parse_template_call(&tokens[1..])?),
                _ => nodes.push(Node::Action(parse_pipeline(&tokens)?)),
            }
        }

        if top_level {
            Ok((nodes, Terminator::Eof))
        } else {
            Err(TemplateError::Parse("unexpected EOF, missing {{end}}".to_string()))
        }
    }

    fn parse_if(&mut self, cond_tokens: &[Token]) -> Result<Node, TemplateError> {
        let cond = parse_pipeline(cond_tokens)?;
        let (then, term) = self.parse_list(false)?;

        let otherwise = match term {
            Terminator::End => Vec::new(),
            Terminator::Else(rest) => match rest.first() {
                None => self.parse_block_until_end()?,
                // `else if` shares the closing `end` of the outer `if`.
                Some(Token::Ident(word)) if word == "if" => vec![self.parse_if(&rest[1..])?],
                Some(_) => {
                    return Err(TemplateError::Parse("unexpected tokens after else".to_string()));
                }
            },
            Terminator::Eof => unreachable!("nested parse_list never returns Eof"),
        };

        Ok(Node::If {
            cond,
            then,
            otherwise,
        })
    }

    fn parse_range(&mut self, tokens: &[Token]) -> Result<Node, TemplateError> {
        let over = parse_pipeline(tokens)?;
        let (body, term) = self.parse_list(false)?;

        let otherwise = match term {
            Terminator::End => Vec::new(),
            Terminator::Else(rest) if rest.is_empty() => self.parse_block_until_end()?,
            Terminator::Else(_) => {
                return Err(TemplateError::Parse("unexpected tokens after else".to_string()));
            }
            Terminator::Eof => unreachable!("nested parse_list never returns Eof"),
        };

        Ok(Node::Range {
            over,
            body,
            otherwise,
        })
    }

    fn parse_define(&mut self, tokens: &[Token]) -> Result<(), TemplateError> {
        let name = match tokens {
            [Token::Str(name)] => name.clone(),
            _ => {
                return Err(TemplateError::Parse(
                    "define expects a single quoted template name".to_string(),
                ));
            }
        };

        let body = self.parse_block_until_end()?;
        self.defines.insert(name, Arc::new(body));
        Ok(())
    }

    fn parse_block_until_end(&mut self) -> Result<Vec<Node>, TemplateError> {
        match self.parse_list(false)? {
            (nodes, Terminator::End) => Ok(nodes),
            _ => Err(TemplateError::Parse("expected {{end}}".to_string())),
        }
    }
}

fn parse_template_call(tokens: &[Token]) -> Result<Node, TemplateError> {
    match tokens {
        [Token::Str(name)] => Ok(Node::Template {
            name: name.clone(),
            arg: None,
        }),
        [Token::Str(name), rest @ ..] => Ok(Node::Template {
            name: name.clone(),
            arg: Some(parse_pipeline(rest)?),
        }),
        _ => Err(TemplateError::Parse(
            "template expects a quoted template name".to_string(),
        )),
    }
}

pub fn parse_pipeline(tokens: &[Token]) -> Result<Pipeline, TemplateError> {
    let mut cursor = 0;
    let pipeline = pipeline_at(tokens, &mut cursor)?;
    if cursor != tokens.len() {
        return Err(TemplateError::Parse("unexpected right paren".to_string()));
    }
    Ok(pipeline)
}

fn pipeline_at(tokens: &[Token], cursor: &mut usize) -> Result<Pipeline, TemplateError> {
    let mut commands = Vec::new();
    let mut operands = Vec::new();

    while let Some(token) = tokens.get(*cursor) {
        match token {
            Token::RParen => break,
            Token::Pipe => {
                if operands.is_empty() {
                    return Err(TemplateError::Parse("missing command before pipe".to_string()));
                }
                commands.push(Command(std::mem::take(&mut operands)));
                *cursor += 1;
            }
            Token::LParen => {
                *cursor += 1;
                let inner = pipeline_at(tokens, cursor)?;
                if tokens.get(*cursor) != Some(&Token::RParen) {
                    return Err(TemplateError::Parse("unclosed left paren".to_string()));
                }
                *cursor += 1;
                operands.push(Operand::Sub(inner));
            }
            other => {
                operands.push(operand_from(other));
                *cursor += 1;
            }
        }
    }

    if operands.is_empty() {
        return Err(TemplateError::Parse("missing value for command".to_string()));
    }
    commands.push(Command(operands));
    Ok(Pipeline(commands))
}

fn operand_from(token: &Token) -> Operand {
    match token {
        Token::Dot => Operand::Dot,
        Token::Field(path) => Operand::Field(path.clone()),
        Token::Root(path) => Operand::Root(path.clone()),
        Token::Ident(word) => match word.as_str() {
            "true" => Operand::Bool(true),
            "false" => Operand::Bool(false),
            "nil" => Operand::Nil,
            _ => Operand::Ident(word.clone()),
        },
        Token::Str(s) => Operand::Str(s.clone()),
        Token::Int(i) => Operand::Int(*i),
        Token::Pipe | Token::LParen | Token::RParen => {
            unreachable!("structural tokens are handled by pipeline_at")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_defines_separately_from_root() {
        let parsed = parse(r#"{{ define "a" }}A{{ end }}text"#).unwrap();
        assert_eq!(parsed.root, vec![Node::Text("text".into())]);
        assert_eq!(
            parsed.defines.get("a").map(|b| b.as_slice()),
            Some(&[Node::Text("A".into())][..])
        );
    }

    #[test]
    fn parses_nested_parens_and_pipes() {
        let parsed = parse("{{ add 1 (len .List) | printf \"%d\" }}").unwrap();
        let Node::Action(Pipeline(commands)) = &parsed.root[0] else {
            panic!("expected action");
        };
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0].0,
            vec![
                Operand::Ident("add".into()),
                Operand::Int(1),
                Operand::Sub(Pipeline(vec![Command(vec![
                    Operand::Ident("len".into()),
                    Operand::Field(vec!["List".into()]),
                ])])),
            ]
        );
    }

    #[test]
    fn else_if_chains_share_one_end() {
        let parsed = parse("{{ if .A }}a{{ else if .B }}b{{ else }}c{{ end }}").unwrap();
        let Node::If { otherwise, .. } = &parsed.root[0] else {
            panic!("expected if");
        };
        assert!(matches!(otherwise.as_slice(), [Node::If { .. }]));
    }

    #[test]
    fn structural_errors() {
        assert!(parse("{{ if .A }}a").is_err());
        assert!(parse("{{ end }}").is_err());
        assert!(parse("{{ else }}").is_err());
        assert!(parse("{{ (len .A }}").is_err());
        assert!(parse("{{ len .A) }}").is_err());
        assert!(parse("{{ | len }}").is_err());
        assert!(parse(r#"{{ if .A }}{{ define "x" }}{{ end }}{{ end }}"#).is_err());
        assert!(parse("{{ define x }}{{ end }}").is_err());
    }
}
