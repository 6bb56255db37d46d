use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Timing and slider bounds of the playback/comparison controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub tick_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub default_resample_rate: u32,
    pub slider_min: u32,
    pub slider_max: u32,
    pub slider_step: u32,
    /// Rate assumed when the service does not report one.
    pub fallback_sample_rate: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            settle_delay_ms: 500,
            default_resample_rate: 16_000,
            slider_min: 8_000,
            slider_max: 48_000,
            slider_step: 1_000,
            fallback_sample_rate: 48_000,
        }
    }
}

impl ControllerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Upper slider bound for a signal sampled at `rate`.
    pub fn slider_ceiling(&self, rate: Option<u32>) -> u32 {
        match rate {
            Some(rate) if rate > 0 => self.slider_max.min(rate).max(self.slider_min),
            _ => self.slider_max,
        }
    }

    /// Clamps `value` into the slider range and snaps it to the step grid.
    pub fn snap_rate(&self, value: u32, rate: Option<u32>) -> u32 {
        let ceiling = self.slider_ceiling(rate);
        let clamped = value.clamp(self.slider_min, ceiling);
        if self.slider_step == 0 {
            return clamped;
        }
        let offset = clamped - self.slider_min;
        let steps = (offset + self.slider_step / 2) / self.slider_step;
        (self.slider_min + steps * self.slider_step).min(ceiling)
    }

    /// Rate the comparison opens with for a signal sampled at `rate`.
    pub fn initial_resample_rate(&self, rate: Option<u32>) -> u32 {
        let seed = match rate {
            Some(rate) if rate > 0 => self.default_resample_rate.min(rate),
            _ => self.default_resample_rate,
        };
        self.snap_rate(seed, rate)
    }
}

/// Audio page the controller serves; selects the endpoint prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Drone,
    Human,
    Doppler,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Drone, Domain::Human, Domain::Doppler];

    pub fn path(&self) -> &'static str {
        match self {
            Domain::Drone => "drone",
            Domain::Human => "human",
            Domain::Doppler => "doppler",
        }
    }
}

/// Multi-channel page flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelDomain {
    Eeg,
    Ecg,
}

impl ChannelDomain {
    pub const ALL: [ChannelDomain; 2] = [ChannelDomain::Eeg, ChannelDomain::Ecg];

    pub fn path(&self) -> &'static str {
        match self {
            ChannelDomain::Eeg => "eeg",
            ChannelDomain::Ecg => "ecg",
        }
    }

    pub fn max_channels(&self) -> usize {
        match self {
            ChannelDomain::Eeg => 8,
            ChannelDomain::Ecg => 12,
        }
    }

    pub fn lead_name(&self, index: usize) -> String {
        const ECG_LEADS: [&str; 12] = [
            "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
        ];
        match self {
            ChannelDomain::Ecg => ECG_LEADS
                .get(index)
                .map(|lead| lead.to_string())
                .unwrap_or_else(|| format!("Lead {}", index + 1)),
            ChannelDomain::Eeg => format!("Ch {}", index + 1),
        }
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|domain| domain.path() == value)
            .ok_or_else(|| format!("unknown audio domain '{}'", value))
    }
}

impl FromStr for ChannelDomain {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ChannelDomain::ALL
            .into_iter()
            .find(|domain| domain.path() == value)
            .ok_or_else(|| format!("unknown channel domain '{}'", value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Page the dashboard presents; selects Doppler synthesis.
    pub domain: Domain,
    /// Prefix of the detect and waveform-chunk endpoints. Every page
    /// analyses through it, whatever its `domain`.
    pub analysis_path: String,
    pub channel_domain: ChannelDomain,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".into(),
            domain: Domain::Drone,
            analysis_path: Domain::Drone.path().into(),
            channel_domain: ChannelDomain::Eeg,
        }
    }
}

/// Everything a dashboard binary needs to start the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub controller: ControllerConfig,
    pub backend: BackendConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_rate_never_exceeds_signal_rate() {
        let config = ControllerConfig::default();
        assert_eq!(config.initial_resample_rate(Some(48_000)), 16_000);
        assert_eq!(config.initial_resample_rate(Some(11_025)), 11_000);
        assert_eq!(config.initial_resample_rate(None), 16_000);
    }

    #[test]
    fn snap_rate_clamps_and_rounds_to_step() {
        let config = ControllerConfig::default();
        assert_eq!(config.snap_rate(3_000, Some(48_000)), 8_000);
        assert_eq!(config.snap_rate(12_600, Some(48_000)), 13_000);
        assert_eq!(config.snap_rate(40_000, Some(22_050)), 22_000);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: DashboardConfig =
            serde_json::from_str(r#"{"controller": {"settle_delay_ms": 250}}"#).unwrap();
        assert_eq!(config.controller.settle_delay_ms, 250);
        assert_eq!(config.controller.tick_interval_ms, 100);
        assert_eq!(config.backend.domain, Domain::Drone);
    }

    #[test]
    fn analysis_path_is_independent_of_the_page() {
        let config: BackendConfig = serde_json::from_str(r#"{"domain": "doppler"}"#).unwrap();
        assert_eq!(config.domain, Domain::Doppler);
        assert_eq!(config.analysis_path, "drone");

        let config: BackendConfig =
            serde_json::from_str(r#"{"domain": "human", "analysis_path": "voice"}"#).unwrap();
        assert_eq!(config.analysis_path, "voice");
    }

    #[test]
    fn domains_parse_from_their_path() {
        assert_eq!("doppler".parse::<Domain>(), Ok(Domain::Doppler));
        assert_eq!("ecg".parse::<ChannelDomain>(), Ok(ChannelDomain::Ecg));
        assert!("sar".parse::<Domain>().is_err());
    }
}
