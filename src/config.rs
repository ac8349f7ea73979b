use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::input_devices::{EvdevBackend, SelectionPolicy};
use crate::touch_driver::{DisplayResolution, EngineConfig, gesture::SwipeTiming};

/// `touchd` 的配置文件, 所有字段都有默认值
///
/// ```toml
/// input_dir = "/dev/input"
/// selection = { name_contains = "fts" }
/// display = { width = 1080, height = 2340 }
///
/// [swipe]
/// step_distance = 20
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchdConfig {
    pub input_dir: PathBuf,
    pub node_prefix: String,
    pub selection: SelectionPolicy,
    pub display: Option<DisplayResolution>,
    pub settle_delay_ms: u64,
    pub stop_grace_ms: u64,
    pub report_probe_failures: bool,
    pub swipe: SwipeTiming,
}

impl Default for TouchdConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("/dev/input"),
            node_prefix: "event".into(),
            selection: SelectionPolicy::default(),
            display: None,
            settle_delay_ms: 200,
            stop_grace_ms: 60,
            report_probe_failures: false,
            swipe: SwipeTiming::default(),
        }
    }
}

impl TouchdConfig {
    /// 没有给路径时使用默认配置
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        if let Some(display) = config.display {
            DisplayResolution::new(display.width, display.height)?;
        }
        Ok(config)
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            selection: self.selection.clone(),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            stop_grace: Duration::from_millis(self.stop_grace_ms),
            report_probe_failures: self.report_probe_failures,
            display: self.display,
        }
    }

    pub fn backend(&self) -> EvdevBackend {
        EvdevBackend::new(&self.input_dir, &self.node_prefix)
    }
}
