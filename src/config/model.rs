// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{ArgValue, HumanDuration, OutputTarget};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// common_template = '''{{ define "name" }}validator-{{ .Index }}{{ end }}'''
///
/// [node]
/// command = ["/usr/bin/node", "--name", '{{ include "name" . }}']
///
/// [node.args]
/// rpc-port = 9933
///
/// [watchlog]
/// enabled = true
/// keyword = "Imported"
/// last_threshold = "5m"
/// healthcheck_ids = ["id-0", "id-1"]
/// ```
///
/// This is the unvalidated shape; use [`ConfigFile::try_from`] (or
/// [`crate::config::load_and_validate`]) before rendering.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Fragment of `define` blocks shared by every template in the file.
    #[serde(default)]
    pub common_template: String,

    #[serde(default)]
    pub node: NodeSection,

    #[serde(default)]
    pub watchlog: WatchlogSection,

    #[serde(default)]
    pub cluster: ClusterSection,
}

/// `[node]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    /// Template producing this replica's ordinal. When unset or blank the
    /// trailing `-` segment of `HOSTNAME` is used.
    #[serde(default)]
    pub index: Option<String>,

    /// Executable followed by its leading arguments, each a template.
    #[serde(default)]
    pub command: Vec<String>,

    /// Named flags appended after `command`, in flag-name order.
    #[serde(default)]
    pub args: BTreeMap<String, ArgValue>,

    #[serde(default)]
    pub stdout: OutputTarget,

    #[serde(default)]
    pub stderr: OutputTarget,
}

/// `[watchlog]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchlogSection {
    #[serde(default)]
    pub enabled: bool,

    /// Substring searched for in every output line.
    #[serde(default)]
    pub keyword: String,

    /// A match older than this is reported as a failure.
    #[serde(default = "default_last_threshold")]
    pub last_threshold: HumanDuration,

    #[serde(default = "default_report_interval")]
    pub report_interval: HumanDuration,

    #[serde(default = "default_ping_url")]
    pub ping_url: String,

    /// One check ID per replica, selected by node index.
    #[serde(default)]
    pub healthcheck_ids: Vec<String>,
}

fn default_last_threshold() -> HumanDuration {
    HumanDuration(Duration::from_secs(5 * 60))
}

fn default_report_interval() -> HumanDuration {
    HumanDuration(Duration::from_secs(60))
}

fn default_ping_url() -> String {
    "https://hc-ping.com".to_string()
}

impl Default for WatchlogSection {
    fn default() -> Self {
        Self {
            enabled: false,
            keyword: String::new(),
            last_threshold: default_last_threshold(),
            report_interval: default_report_interval(),
            ping_url: default_ping_url(),
            healthcheck_ids: Vec::new(),
        }
    }
}

/// `[cluster]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ClusterSection {
    /// External addresses of the cluster's nodes, used by `getRandomNodeIP`
    /// and `getNodeIPWithIndex`.
    #[serde(default)]
    pub external_addresses: Vec<String>,
}

/// A configuration that passed validation.
///
/// Only constructible through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub common_template: String,
    pub node: NodeSection,
    pub watchlog: WatchlogSection,
    pub cluster: ClusterSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            common_template: raw.common_template,
            node: raw.node,
            watchlog: raw.watchlog,
            cluster: raw.cluster,
        }
    }

    /// The index template, falling back to the host-name ordinal.
    pub fn index_template(&self) -> &str {
        match self.node.index.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => DEFAULT_INDEX_TEMPLATE,
        }
    }
}

/// Trailing `-` segment of the host name, e.g. `2` for `pod-statefulset-2`.
pub const DEFAULT_INDEX_TEMPLATE: &str = r#"{{ env "HOSTNAME" | splitList "-" | mustLast }}"#;
