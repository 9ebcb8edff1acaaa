// src/template/exec.rs

use std::collections::HashMap;
use std::sync::Arc;

use super::funcs::{self, HelperContext};
use super::parse::{Command, Defines, Node, Operand, Pipeline};
use super::value::Value;
use super::TemplateError;

/// Remaining stack below which an include moves onto a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each additional stack segment.
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

/// State for a single render call.
///
/// The include counter lives here rather than in the template set, so two
/// renders never observe each other's recursion depth.
pub(crate) struct Exec<'a> {
    pub common: &'a Defines,
    pub local: &'a Defines,
    pub helpers: &'a HelperContext<'a>,
    pub root: &'a Value,
    pub include_limit: usize,
    pub include_depth: HashMap<String, usize>,
}

impl Exec<'_> {
    pub fn walk(&mut self, nodes: &[Node], dot: &Value, out: &mut String) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(pipeline) => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    out.push_str(&value.to_string());
                }
                Node::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    if self.eval_pipeline(cond, dot)?.is_truthy() {
                        self.walk(then, dot, out)?;
                    } else {
                        self.walk(otherwise, dot, out)?;
                    }
                }
                Node::Range {
                    over,
                    body,
                    otherwise,
                } => {
                    let items = match self.eval_pipeline(over, dot)? {
                        Value::Map(map) => map.into_values().collect(),
                        Value::Int(n) => (0..n.max(0)).map(Value::Int).collect(),
                        other => other.into_list()?,
                    };
                    if items.is_empty() {
                        self.walk(otherwise, dot, out)?;
                    }
                    for item in &items {
                        self.walk(body, item, out)?;
                    }
                }
                Node::Template { name, arg } => {
                    let data = match arg {
                        Some(pipeline) => self.eval_pipeline(pipeline, dot)?,
                        None => Value::Nil,
                    };
                    out.push_str(&self.include(name, &data)?);
                }
            }
        }
        Ok(())
    }

    fn eval_pipeline(&mut self, pipeline: &Pipeline, dot: &Value) -> Result<Value, TemplateError> {
        let mut piped = None;
        for command in &pipeline.0 {
            piped = Some(self.eval_command(command, dot, piped)?);
        }
        Ok(piped.unwrap_or_default())
    }

    fn eval_command(
        &mut self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        let (head, rest) = command
            .0
            .split_first()
            .ok_or_else(|| TemplateError::Exec("empty command".to_string()))?;

        if let Operand::Ident(name) = head {
            let mut args = rest
                .iter()
                .map(|operand| self.eval_operand(operand, dot))
                .collect::<Result<Vec<_>, _>>()?;
            args.extend(piped);
            return self.call(name, args);
        }

        if !rest.is_empty() || piped.is_some() {
            return Err(TemplateError::Exec(format!(
                "can't give argument to non-function {head:?}"
            )));
        }
        self.eval_operand(head, dot)
    }

    fn eval_operand(&mut self, operand: &Operand, dot: &Value) -> Result<Value, TemplateError> {
        Ok(match operand {
            Operand::Dot => dot.clone(),
            Operand::Field(path) => walk_path(dot, path),
            Operand::Root(path) => walk_path(self.root, path),
            Operand::Ident(name) => self.call(name, Vec::new())?,
            Operand::Bool(b) => Value::Bool(*b),
            Operand::Nil => Value::Nil,
            Operand::Str(s) => Value::Str(s.clone()),
            Operand::Int(i) => Value::Int(*i),
            Operand::Sub(pipeline) => self.eval_pipeline(pipeline, dot)?,
        })
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
        if name != "include" {
            return funcs::call(name, args, self.helpers);
        }

        let [template, data]: [Value; 2] = args.try_into().map_err(|args: Vec<Value>| {
            TemplateError::Exec(format!(
                "wrong number of args for include: want 2 got {}",
                args.len()
            ))
        })?;
        self.include(&template.to_string(), &data).map(Value::Str)
    }

    /// Execute a named sub-template, failing once `name` is nested deeper than
    /// the include limit.
    ///
    /// Nesting is real recursion, so the stack is grown on demand; deep
    /// includes fail with [`TemplateError::Recursion`] rather than overflow.
    fn include(&mut self, name: &str, data: &Value) -> Result<String, TemplateError> {
        let body = self.lookup(name)?;

        let depth = self.include_depth.entry(name.to_string()).or_insert(0);
        if *depth >= self.include_limit {
            return Err(TemplateError::Recursion(name.to_string()));
        }
        *depth += 1;

        let mut out = String::new();
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            self.walk(&body, data, &mut out)
        });

        if let Some(depth) = self.include_depth.get_mut(name) {
            *depth -= 1;
        }
        result.map(|()| out)
    }

    fn lookup(&self, name: &str) -> Result<Arc<Vec<Node>>, TemplateError> {
        self.local
            .get(name)
            .or_else(|| self.common.get(name))
            .cloned()
            .ok_or_else(|| TemplateError::Exec(format!("no such template {name:?}")))
    }
}

fn walk_path(start: &Value, path: &[String]) -> Value {
    path.iter().fold(start.clone(), |value, field| value.field(field))
}
