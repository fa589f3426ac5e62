use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::processor::ProcessorOptions;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Send address block records for the node's pod CIDRs.
    pub use_pod_cidr: bool,
    /// Forget a node's tracked CIDRs once the node is deleted.
    pub prune_on_delete: bool,
    /// File of JSON-line change events; stdin when unset or "-".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    /// Capacity of the channel between the event source and the processor.
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_pod_cidr: true,
            prune_on_delete: true,
            input: None,
            channel_capacity: 128,
        }
    }
}

impl Config {
    /// Defaults, then `nodesync.toml`, `nodesync.json` and `NODESYNC_*`
    /// environment variables, later sources winning.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("nodesync.toml"))
            .merge(Json::file("nodesync.json"))
            .merge(Env::prefixed("NODESYNC_"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        if config.channel_capacity == 0 {
            anyhow::bail!("Invalid channel_capacity: must be at least 1");
        }

        // "-" is the conventional spelling of stdin
        if config.input.as_deref() == Some(std::path::Path::new("-")) {
            config.input = None;
        }

        Ok(config)
    }

    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            use_pod_cidr: self.use_pod_cidr,
            prune_on_delete: self.prune_on_delete,
        }
    }
}
