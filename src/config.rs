use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Environment variable that swaps the node source for the offline stub.
pub const STUB_NODES_ENV: &str = "F2S_STUB_NODES";

/// Naming and output knobs shared by the assign and template paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix of every resource template reference, e.g. `f2s/command`.
    pub resource_prefix: String,
    /// Node resources are named `<node_resource_prefix><node id>`.
    pub node_resource_prefix: String,
    /// Timeout for shell tasks that do not declare one, in seconds.
    pub shell_timeout: u64,
    /// Task ids left out of generated compositions.
    pub excluded_tasks: Vec<String>,
    pub node_placeholder: String,
    pub index_placeholder: String,
    /// Tag key of collection compositions.
    pub collection_grouping: String,
    pub puppet_modules: String,
    pub stub_nodes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            resource_prefix: "f2s".to_string(),
            node_resource_prefix: "node".to_string(),
            shell_timeout: 30,
            excluded_tasks: vec!["hiera".to_string(), "deploy_start".to_string()],
            node_placeholder: "#{node}#".to_string(),
            index_placeholder: "#{index}#".to_string(),
            collection_grouping: "role".to_string(),
            puppet_modules: "/etc/puppet/modules".to_string(),
            stub_nodes: false,
        }
    }
}

impl Config {
    /// Load configuration from disk, accepting JSON by default and TOML when the `toml` feature is enabled.
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let txt = fs::read_to_string(path_ref)
            .with_context(|| format!("unable to read config at {}", path_ref.display()))?;
        if let Ok(value) = serde_json::from_str::<Self>(&txt) {
            return Ok(value);
        }

        #[cfg(feature = "toml")]
        {
            if let Ok(value) = toml::from_str::<Self>(&txt) {
                return Ok(value);
            }
        }

        #[cfg(feature = "toml")]
        {
            anyhow::bail!(
                "unsupported config format in {}: expected JSON or TOML",
                path_ref.display()
            );
        }

        #[cfg(not(feature = "toml"))]
        {
            anyhow::bail!(
                "unsupported config format in {}: expected JSON (enable `toml` feature for TOML support)",
                path_ref.display()
            );
        }
    }

    /// Apply overrides taken from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var(STUB_NODES_ENV) {
            self.stub_nodes = value == "1" || value.eq_ignore_ascii_case("true");
        }
        self
    }

    pub fn template(&self, name: &str) -> String {
        format!("{}/{}", self.resource_prefix, name)
    }

    pub fn node_resource(&self, node_id: &str) -> String {
        format!("{}{}", self.node_resource_prefix, node_id)
    }

    pub fn is_excluded(&self, task_id: &str) -> bool {
        self.excluded_tasks.iter().any(|t| t == task_id)
    }
}
