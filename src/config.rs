use std::error::Error;
use std::fs;
use std::path::Path;

use hexvox_hex::{HexConfig, HexSettings};
use hexvox_pool::{DEFAULT_STACK_SIZE, PoolConfig};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct ImportConfig {
    /// Worker count; defaults to the available parallelism.
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default = "default_stack_size")]
    pub stack_size: usize,
    #[serde(default)]
    pub hexagon: HexConfig,
}

fn default_stack_size() -> usize {
    DEFAULT_STACK_SIZE
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            threads: None,
            stack_size: default_stack_size(),
            hexagon: HexConfig::default(),
        }
    }
}

impl ImportConfig {
    pub fn pool_config(&self) -> PoolConfig {
        let mut cfg = match self.threads {
            Some(n) => PoolConfig::with_threads(n),
            None => PoolConfig::default(),
        };
        cfg.stack_size = self.stack_size;
        cfg.name_prefix = "hexvox-import".to_string();
        cfg
    }

    pub fn hex_settings(&self) -> Result<HexSettings, Box<dyn Error>> {
        Ok(HexSettings::from_config(&self.hexagon)?)
    }
}

pub fn load_config_from_str(s: &str) -> Result<ImportConfig, Box<dyn Error>> {
    let cfg: ImportConfig = toml::from_str(s)?;
    Ok(cfg)
}

pub fn load_config_from_path(path: &Path) -> Result<ImportConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    load_config_from_str(&s)
}
