// src/config.rs

use crate::insights::InsightConfig;
use crate::narrative::NarrativeConfig;
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_input_dir")]
    pub input_dir: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_report_path")]
    pub report_path: String,
    /// Location handed to the enrichment source for every lookup.
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub insights: InsightConfig,
    #[serde(default)]
    pub narrative: NarrativeConfig,
}

fn default_input_dir() -> String {
    "receipts".to_string()
}

fn default_db_path() -> String {
    "data/orders.db".to_string()
}

fn default_report_path() -> String {
    "output.json".to_string()
}

fn default_location() -> String {
    "Amsterdam".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            db_path: default_db_path(),
            report_path: default_report_path(),
            location: default_location(),
            insights: InsightConfig::default(),
            narrative: NarrativeConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the config file, falling back to defaults when it is absent.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                info!(path = %path.as_ref().display(), error = %e, "No usable config — using defaults");
                Self::default()
            }
        }
    }
}
