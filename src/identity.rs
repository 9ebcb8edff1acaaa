// src/identity.rs

//! Node identity and the environment templates are rendered against.

use std::collections::BTreeMap;

/// Ordinal of this replica within its StatefulSet-like deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdentity {
    pub index: usize,
}

/// Environment variables visible to the `env` template helper.
///
/// Overrides take precedence; the process environment is consulted only when
/// `inherit` is set. Keeping the overrides explicit makes renders
/// reproducible in tests without touching the real process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    overrides: BTreeMap<String, String>,
    inherit: bool,
}

impl Environment {
    /// The real process environment.
    pub fn from_process() -> Self {
        Self {
            overrides: BTreeMap::new(),
            inherit: true,
        }
    }

    /// An environment containing only explicitly added variables.
    pub fn isolated() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(name) {
            return Some(value.clone());
        }
        if !self.inherit {
            return None;
        }

        match std::env::var(name) {
            Ok(value) => Some(value),
            // Shells export HOSTNAME but it is not guaranteed for exec'd
            // processes, so fall back to the system host name.
            Err(_) if name == "HOSTNAME" => hostname::get()
                .ok()
                .map(|h| h.to_string_lossy().into_owned()),
            Err(_) => None,
        }
    }
}
