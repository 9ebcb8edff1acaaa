#![allow(dead_code)]

use std::time::Duration;

use kubevali::config::{ConfigFile, HeartbeatTarget, RawConfigFile};
use kubevali::types::{ArgValue, HumanDuration, OutputTarget};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(command: &[&str]) -> Self {
        let mut config = RawConfigFile::default();
        config.node.command = command.iter().map(|s| s.to_string()).collect();
        Self { config }
    }

    pub fn with_common_template(mut self, common: &str) -> Self {
        self.config.common_template = common.to_string();
        self
    }

    pub fn with_index(mut self, index: &str) -> Self {
        self.config.node.index = Some(index.to_string());
        self
    }

    pub fn with_arg(mut self, flag: &str, value: ArgValue) -> Self {
        self.config.node.args.insert(flag.to_string(), value);
        self
    }

    pub fn with_outputs(mut self, stdout: OutputTarget, stderr: OutputTarget) -> Self {
        self.config.node.stdout = stdout;
        self.config.node.stderr = stderr;
        self
    }

    pub fn with_watchlog(mut self, keyword: &str, threshold: Duration, ids: &[&str]) -> Self {
        let watchlog = &mut self.config.watchlog;
        watchlog.enabled = true;
        watchlog.keyword = keyword.to_string();
        watchlog.last_threshold = HumanDuration(threshold);
        watchlog.healthcheck_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_addresses(mut self, addresses: &[&str]) -> Self {
        self.config.cluster.external_addresses = addresses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// A heartbeat target with a one-minute report interval.
pub fn heartbeat_target(keyword: &str, threshold: Duration) -> HeartbeatTarget {
    HeartbeatTarget {
        id: "check-0".to_string(),
        keyword: keyword.to_string(),
        threshold,
        report_interval: Duration::from_secs(60),
        ping_url: "https://hc-ping.invalid".to_string(),
    }
}
