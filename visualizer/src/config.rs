use anyhow::Context;
use serde::{Deserialize, Serialize};
use sigcore::config::DashboardConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub dashboard: DashboardConfig,
    /// Audio file accepted as soon as the window opens.
    pub initial_file: Option<PathBuf>,
    /// Entries kept in the activity log.
    pub history_len: usize,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            dashboard: DashboardConfig::default(),
            initial_file: None,
            history_len: 20,
        }
    }
}

impl VisualizerConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("parsing visualizer config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("loading {}", path.display()))
    }

    /// Config named by the first command-line argument, defaults otherwise.
    pub fn from_args() -> anyhow::Result<Self> {
        match std::env::args_os().nth(1) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}
