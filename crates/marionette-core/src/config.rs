use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::traits::Template;
use crate::types::Point;

fn default_step_delay_ms() -> u64 {
    250
}

fn default_channels() -> u32 {
    4
}

/// Engine tuning shared by both executors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay applied between linear steps when the workflow does not set
    /// its own.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

/// A named mapping point entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointConfig {
    pub x: i32,
    pub y: i32,
}

/// A named template entry pointing at a raw pixel file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub name: String,
    /// Path to a raw row-major pixel dump (no header).
    pub path: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
}

/// Top-level marionette configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub points: HashMap<String, PointConfig>,
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| EngineError::ConfigNotFound(path.display().to_string()))?;

        toml::from_str(&content).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Resolve the configured points into a name → point map.
    pub fn point_map(&self) -> HashMap<String, Point> {
        self.points
            .iter()
            .map(|(name, p)| (name.clone(), Point::new(p.x, p.y)))
            .collect()
    }

    /// Load every configured template's pixel data from disk.
    pub fn load_templates(&self) -> Result<Vec<Template>> {
        let mut templates = Vec::with_capacity(self.templates.len());
        for entry in &self.templates {
            let pixels = std::fs::read(&entry.path)?;
            let expected = (entry.width * entry.height * entry.channels) as usize;
            if pixels.len() != expected {
                return Err(EngineError::Config(format!(
                    "template '{}': {} has {} bytes, expected {} ({}x{}x{})",
                    entry.name,
                    entry.path,
                    pixels.len(),
                    expected,
                    entry.width,
                    entry.height,
                    entry.channels
                )));
            }
            templates.push(Template {
                name: entry.name.clone(),
                pixels,
                width: entry.width,
                height: entry.height,
                channels: entry.channels,
            });
        }
        Ok(templates)
    }
}
