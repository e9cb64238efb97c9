use crate::configuration::constants::common::ENV_PREFIX;
use config::{Config, ConfigError, Environment, File};
use serde_derive::Deserialize;
use std::path::{Path, PathBuf};

fn enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Report tests that never got a result when the run stops early.
    #[serde(default = "enabled")]
    pub heal_unreported: bool,
    /// File receiving the message stream. Standard output when absent.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "enabled")]
    pub flush_each_line: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            heal_unreported: true,
            output: None,
            flush_each_line: true,
        }
    }
}

impl Settings {
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }
        builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()
    }
}
