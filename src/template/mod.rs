// src/template/mod.rs

//! A small Go `text/template`-style engine for rendering node commands.
//!
//! Supported syntax:
//! - `{{ pipeline }}` with `|` chaining, parenthesised sub-pipelines,
//!   `.`, `.Field.Path`, `$`/`$.Field`, string/raw-string/int/bool literals
//! - `{{ if }}` / `{{ else if }}` / `{{ else }}` / `{{ end }}`
//! - `{{ range }}` / `{{ else }}` / `{{ end }}`
//! - `{{ define "name" }}...{{ end }}`, `{{ template "name" pipeline }}` and
//!   the `include "name" data` helper
//! - trim markers `{{- ` / ` -}}` and `{{/* comments */}}`
//!
//! A [`TemplateSet`] is built once from the config's common fragment and then
//! used to render any number of independent value templates.

mod exec;
pub mod funcs;
mod lexer;
mod parse;
pub mod value;

use std::collections::HashMap;

use thiserror::Error;

pub use funcs::HelperContext;
pub use value::Value;

use exec::Exec;
use parse::{parse, Defines};

/// Maximum nesting of one named template inside itself.
pub const DEFAULT_INCLUDE_LIMIT: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unable to parse template: {0}")]
    Parse(String),

    #[error("unable to render template: {0}")]
    Exec(String),

    #[error("unable to render template with a nested reference name: {0}")]
    Recursion(String),

    #[error("unable to render template: function {0:?} not defined")]
    UnknownFunction(String),
}

/// The parsed common fragment: named sub-templates shared by every render.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    defines: Defines,
    include_limit: usize,
}

impl TemplateSet {
    /// Parse the common fragment. Only its `define` blocks are kept.
    pub fn parse(common: &str) -> Result<Self, TemplateError> {
        let parsed = parse(common)?;
        Ok(Self {
            defines: parsed.defines,
            include_limit: DEFAULT_INCLUDE_LIMIT,
        })
    }

    pub fn with_include_limit(mut self, limit: usize) -> Self {
        self.include_limit = limit;
        self
    }

    /// Render `text` against `data`.
    ///
    /// `text` may declare its own `define` blocks; they shadow the common ones
    /// for this render only.
    pub fn render(
        &self,
        text: &str,
        data: &Value,
        helpers: &HelperContext<'_>,
    ) -> Result<String, TemplateError> {
        let parsed = parse(text)?;
        let mut exec = Exec {
            common: &self.defines,
            local: &parsed.defines,
            helpers,
            root: data,
            include_limit: self.include_limit,
            include_depth: HashMap::new(),
        };

        let mut out = String::new();
        exec.walk(&parsed.root, data, &mut out)?;
        Ok(out)
    }
}
