use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_DATA_FILE, DEFAULT_PORT, DEFAULT_RESCALE_DEBOUNCE_MS, INITIAL_VIEWING_SCALE, MAX_MARKERS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data_file: String,
    pub port: u16,
    #[serde(default = "default_max_markers")]
    pub max_markers: usize,
    #[serde(default = "default_debounce")]
    pub rescale_debounce_ms: u64,
    #[serde(default = "default_scale")]
    pub initial_viewing_scale: f64,
}

fn default_max_markers() -> usize {
    MAX_MARKERS
}

fn default_debounce() -> u64 {
    DEFAULT_RESCALE_DEBOUNCE_MS
}

fn default_scale() -> f64 {
    INITIAL_VIEWING_SCALE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_file: DEFAULT_DATA_FILE.to_string(),
            port: DEFAULT_PORT,
            max_markers: MAX_MARKERS,
            rescale_debounce_ms: DEFAULT_RESCALE_DEBOUNCE_MS,
            initial_viewing_scale: INITIAL_VIEWING_SCALE,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Missing file means defaults
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(config_path).context("Failed to read config file")?;
        Ok(Self::parse(&content))
    }

    /// Parses `key = value` lines; values that don't parse keep their defaults
    pub fn parse(content: &str) -> Self {
        let mut settings = Settings::default();
        let mut config_map = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config_map.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        if let Some(data_file) = config_map.get("data_file") {
            settings.data_file = data_file.trim_matches('"').to_string();
        }
        if let Some(port) = config_map.get("port").and_then(|s| s.parse::<u16>().ok()) {
            settings.port = port;
        }
        if let Some(max) = config_map.get("max_markers").and_then(|s| s.parse::<usize>().ok()) {
            settings.max_markers = max;
        }
        if let Some(ms) = config_map
            .get("rescale_debounce_ms")
            .and_then(|s| s.parse::<u64>().ok())
        {
            settings.rescale_debounce_ms = ms;
        }
        if let Some(scale) = config_map
            .get("initial_viewing_scale")
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s > 0.0)
        {
            settings.initial_viewing_scale = scale;
        }

        settings
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Creating config directory")?;
        }

        let mut content = String::new();
        content.push_str("# QuakeGlobe Configuration File\n");
        content.push_str(&format!("data_file = \"{}\"\n", self.data_file));
        content.push_str(&format!("port = {}\n", self.port));
        content.push_str(&format!("max_markers = {}\n", self.max_markers));
        content.push_str(&format!("rescale_debounce_ms = {}\n", self.rescale_debounce_ms));
        content.push_str(&format!("initial_viewing_scale = {}\n", self.initial_viewing_scale));

        std::fs::write(config_path, content).context("Failed to write to config file")?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let mut path = std::env::current_exe()
            .unwrap_or_default()
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        if path.ends_with("target/debug") || path.ends_with("target/release") {
            path.pop();
            path.pop();
        }
        path.push("quakeglobe.ini");
        path
    }
}
