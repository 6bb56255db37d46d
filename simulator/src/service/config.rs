use anyhow::Context;
use serde::{Deserialize, Serialize};
use sigcore::config::{ChannelDomain, DashboardConfig};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::generator::profile::GeneratorConfig;

/// Settings of the mock analysis service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    /// Length of every streamed waveform window.
    pub window_seconds: f64,
    /// A chunk poll advances by `window / steps_per_window` samples.
    pub steps_per_window: usize,
    /// Rate clips are analysed and streamed at.
    pub analysis_rate: u32,
    /// RMS level at or above which a clip is labelled `DRONE`.
    pub drone_threshold: f32,
    pub eeg: GeneratorConfig,
    pub ecg: GeneratorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            window_seconds: 2.0,
            steps_per_window: 20,
            analysis_rate: 16_000,
            drone_threshold: 0.05,
            eeg: GeneratorConfig::for_domain(ChannelDomain::Eeg),
            ecg: GeneratorConfig::for_domain(ChannelDomain::Ecg),
        }
    }
}

impl ServiceConfig {
    pub fn window_samples(&self) -> usize {
        ((self.window_seconds * self.analysis_rate as f64) as usize).max(1)
    }

    pub fn step_samples(&self) -> usize {
        (self.window_samples() / self.steps_per_window.max(1)).max(1)
    }

    pub fn generator(&self, domain: ChannelDomain) -> &GeneratorConfig {
        match domain {
            ChannelDomain::Eeg => &self.eeg,
            ChannelDomain::Ecg => &self.ecg,
        }
    }
}

/// Whole simulator configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub service: ServiceConfig,
    pub dashboard: DashboardConfig,
}

impl SimulatorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading simulator config {}", path_ref.display()))?;
        let config: SimulatorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing simulator config {}", path_ref.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn chunk_step_is_a_twentieth_of_the_window() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.window_samples(), 32_000);
        assert_eq!(cfg.step_samples(), 1_600);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"service:\n  bind: 0.0.0.0:9100\n  analysis_rate: 8000\ndashboard:\n  controller:\n    settle_delay_ms: 250\n  backend:\n    domain: human\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = SimulatorConfig::load(&path).unwrap();
        assert_eq!(cfg.service.bind.port(), 9100);
        assert_eq!(cfg.service.analysis_rate, 8_000);
        assert_eq!(cfg.service.steps_per_window, 20);
        assert_eq!(cfg.dashboard.controller.settle_delay_ms, 250);
        assert_eq!(cfg.dashboard.backend.domain.path(), "human");
        assert_eq!(cfg.dashboard.backend.analysis_path, "drone");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SimulatorConfig::load("/nonexistent/sim.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sim.yaml"));
    }
}
