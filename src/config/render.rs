// src/config/render.rs

//! Turn a validated [`ConfigFile`] into the concrete command for this replica.
//!
//! Rendering happens in two passes. The index template is rendered first,
//! without `.Index` in scope, and parsed as this replica's ordinal. Every
//! command element and named argument is then rendered with `.Index` set.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::cluster::NodeAddresses;
use crate::config::model::ConfigFile;
use crate::errors::{KubevaliError, Result};
use crate::identity::{Environment, NodeIdentity};
use crate::template::{HelperContext, TemplateSet, Value};
use crate::types::{ArgValue, OutputTarget};

/// Executable path and argument vector, fixed once rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    pub path: String,
    pub args: Vec<String>,
}

impl RenderedCommand {
    /// The command as a single shell-style line, for logs and `--dry-run`.
    pub fn shell_command(&self) -> String {
        std::iter::once(&self.path)
            .chain(self.args.iter())
            .map(|part| shell_quote(part))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shell_command())
    }
}

fn shell_quote(part: &str) -> String {
    let plain = !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+".contains(c));
    if plain {
        part.to_string()
    } else {
        format!("'{}'", part.replace('\'', r"'\''"))
    }
}

/// Where and how this replica reports liveness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatTarget {
    pub id: String,
    pub keyword: String,
    pub threshold: Duration,
    pub report_interval: Duration,
    pub ping_url: String,
}

/// Everything the supervisor needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNode {
    pub identity: NodeIdentity,
    pub command: RenderedCommand,
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
    /// `None` when the watchlog is disabled.
    pub heartbeat: Option<HeartbeatTarget>,
}

pub fn render(
    cfg: &ConfigFile,
    env: &Environment,
    nodes: &dyn NodeAddresses,
) -> Result<RenderedNode> {
    let templates = TemplateSet::parse(&cfg.common_template)?;
    let helpers = HelperContext { env, nodes };
    let renderer = Renderer {
        templates: &templates,
        helpers: &helpers,
    };

    let identity = renderer.identity(cfg.index_template())?;
    let data = index_data(identity);

    let command = renderer.command(&cfg.node.command, &cfg.node.args, &data)?;
    let heartbeat = heartbeat_target(cfg, identity)?;

    debug!(index = identity.index, command = %command, "rendered node command");

    Ok(RenderedNode {
        identity,
        command,
        stdout: cfg.node.stdout,
        stderr: cfg.node.stderr,
        heartbeat,
    })
}

struct Renderer<'a> {
    templates: &'a TemplateSet,
    helpers: &'a HelperContext<'a>,
}

impl Renderer<'_> {
    fn render(&self, text: &str, data: &Value) -> Result<String> {
        Ok(self.templates.render(text, data, self.helpers)?)
    }

    fn identity(&self, index_template: &str) -> Result<NodeIdentity> {
        let rendered = self.render(index_template, &Value::Map(BTreeMap::new()))?;
        let index = rendered
            .trim()
            .parse::<usize>()
            .map_err(|source| KubevaliError::InvalidIndex {
                rendered: rendered.clone(),
                source,
            })?;
        Ok(NodeIdentity { index })
    }

    fn command(
        &self,
        command: &[String],
        args: &BTreeMap<String, ArgValue>,
        data: &Value,
    ) -> Result<RenderedCommand> {
        let mut parts = Vec::with_capacity(command.len() + args.len() * 2);
        for element in command {
            let rendered = self.render(element, data)?;
            if !rendered.is_empty() {
                parts.push(rendered);
            }
        }

        if parts.is_empty() {
            return Err(KubevaliError::ConfigError(
                "[node].command rendered to an empty command".to_string(),
            ));
        }

        for (name, value) in args {
            self.push_flag(&mut parts, name, value, data)?;
        }

        let path = parts.remove(0);
        Ok(RenderedCommand { path, args: parts })
    }

    fn push_flag(
        &self,
        parts: &mut Vec<String>,
        name: &str,
        value: &ArgValue,
        data: &Value,
    ) -> Result<()> {
        let flag = format!("--{name}");
        match value {
            ArgValue::Bool(b) => parts.extend([flag, b.to_string()]),
            ArgValue::Int(i) => parts.extend([flag, i.to_string()]),
            ArgValue::String(text) => {
                let rendered = self.render(text, data)?;
                if !rendered.is_empty() {
                    parts.extend([flag, rendered]);
                }
            }
            ArgValue::List(items) => {
                for item in items {
                    let rendered = self.render(item, data)?;
                    if !rendered.is_empty() {
                        parts.extend([flag.clone(), rendered]);
                    }
                }
            }
        }
        Ok(())
    }
}

fn index_data(identity: NodeIdentity) -> Value {
    let mut data = BTreeMap::new();
    data.insert("Index".to_string(), Value::Int(identity.index as i64));
    Value::Map(data)
}

fn heartbeat_target(cfg: &ConfigFile, identity: NodeIdentity) -> Result<Option<HeartbeatTarget>> {
    let watchlog = &cfg.watchlog;
    if !watchlog.enabled {
        return Ok(None);
    }

    let id = watchlog
        .healthcheck_ids
        .get(identity.index)
        .cloned()
        .ok_or(KubevaliError::NotEnoughHealthcheckIds {
            expected: identity.index + 1,
            got: watchlog.healthcheck_ids.len(),
        })?;

    Ok(Some(HeartbeatTarget {
        id,
        keyword: watchlog.keyword.clone(),
        threshold: watchlog.last_threshold.as_duration(),
        report_interval: watchlog.report_interval.as_duration(),
        ping_url: watchlog.ping_url.trim_end_matches('/').to_string(),
    }))
}
