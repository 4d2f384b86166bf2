//! Config providers: a hardcoded one for tests/defaults and, under the
//! `network` feature, a TOML file loader.
//!
//! Grounded in the teacher's `StaticConfigProvider`/`TomlConfigProvider`
//! split.

use crate::config::DhtConfig;
use crate::ports::ConfigProvider;

#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    config: DhtConfig,
}

impl StaticConfigProvider {
    pub fn new(config: DhtConfig) -> Self {
        Self { config }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn load(&self) -> DhtConfig {
        self.config.clone()
    }
}

#[cfg(feature = "network")]
mod toml_config {
    use super::*;
    use serde::Deserialize;
    use std::path::Path;

    #[derive(Debug, Deserialize, Default)]
    struct ConfigFile {
        #[serde(default)]
        node: NodeSection,
        #[serde(default)]
        bootstrap: BootstrapSection,
    }

    #[derive(Debug, Deserialize, Default)]
    struct NodeSection {
        udp_port: Option<u16>,
        k: Option<usize>,
        alpha: Option<usize>,
        rpc_timeout_secs: Option<u64>,
        lookup_deadline_secs: Option<u64>,
        peer_timeout_secs: Option<u64>,
        node_timeout_secs: Option<u64>,
        token_validity_secs: Option<u64>,
        secret_rotation_secs: Option<u64>,
        global_bandwidth_rate: Option<u64>,
        host_bandwidth_rate: Option<u64>,
    }

    #[derive(Debug, Deserialize, Default)]
    struct BootstrapSection {
        #[serde(default)]
        nodes: Vec<String>,
    }

    #[derive(Debug, thiserror::Error)]
    pub enum ConfigError {
        #[error("failed to read {path}: {error}")]
        Io { path: String, error: String },
        #[error("failed to parse config: {0}")]
        Parse(String),
    }

    /// Loads node configuration from a TOML file.
    ///
    /// ```toml
    /// [node]
    /// udp_port = 6881
    /// k = 8
    /// alpha = 3
    ///
    /// [bootstrap]
    /// nodes = ["router.bittorrent.com:6881"]
    /// ```
    pub struct TomlConfigProvider {
        config: DhtConfig,
    }

    impl TomlConfigProvider {
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
            let content =
                std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
                    path: path.as_ref().display().to_string(),
                    error: e.to_string(),
                })?;
            Self::parse(&content)
        }

        pub fn parse(content: &str) -> Result<Self, ConfigError> {
            let file: ConfigFile =
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            let defaults = DhtConfig::default();
            let bootstrap_nodes = file
                .bootstrap
                .nodes
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            let n = file.node;
            let config = DhtConfig {
                udp_port: n.udp_port.unwrap_or(defaults.udp_port),
                node_id: None,
                k: n.k.unwrap_or(defaults.k),
                alpha: n.alpha.unwrap_or(defaults.alpha),
                rpc_timeout_secs: n.rpc_timeout_secs.unwrap_or(defaults.rpc_timeout_secs),
                lookup_deadline_secs: n
                    .lookup_deadline_secs
                    .unwrap_or(defaults.lookup_deadline_secs),
                peer_timeout_secs: n.peer_timeout_secs.unwrap_or(defaults.peer_timeout_secs),
                node_timeout_secs: n.node_timeout_secs.unwrap_or(defaults.node_timeout_secs),
                token_validity_secs: n
                    .token_validity_secs
                    .unwrap_or(defaults.token_validity_secs),
                secret_rotation_secs: n
                    .secret_rotation_secs
                    .unwrap_or(defaults.secret_rotation_secs),
                global_bandwidth_rate: n
                    .global_bandwidth_rate
                    .unwrap_or(defaults.global_bandwidth_rate),
                host_bandwidth_rate: n
                    .host_bandwidth_rate
                    .unwrap_or(defaults.host_bandwidth_rate),
                bootstrap_nodes,
            };
            Ok(Self { config })
        }
    }

    impl ConfigProvider for TomlConfigProvider {
        fn load(&self) -> DhtConfig {
            self.config.clone()
        }
    }
}

#[cfg(feature = "network")]
pub use toml_config::{ConfigError, TomlConfigProvider};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_returns_its_config() {
        let provider = StaticConfigProvider::new(DhtConfig::for_testing());
        assert_eq!(provider.load().k, DhtConfig::for_testing().k);
    }

    #[cfg(feature = "network")]
    #[test]
    fn toml_provider_parses_bootstrap_nodes_and_overrides() {
        let toml = r#"
            [node]
            udp_port = 7000
            k = 16

            [bootstrap]
            nodes = ["127.0.0.1:6881"]
        "#;
        let provider = toml_config::TomlConfigProvider::parse(toml).unwrap();
        let cfg = provider.load();
        assert_eq!(cfg.udp_port, 7000);
        assert_eq!(cfg.k, 16);
        assert_eq!(cfg.bootstrap_nodes.len(), 1);
    }
}
