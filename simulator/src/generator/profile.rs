use anyhow::{ensure, Context};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sigcore::config::ChannelDomain;
use sigcore::interface::wire::RecordingBody;
use std::f64::consts::PI;

/// Configuration for synthetic multi-channel recordings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub channels: usize,
    pub fs: f64,
    pub seconds: f64,
    /// Dominant rhythm in Hz (alpha band for EEG, heart rate for ECG).
    pub frequency: f64,
    pub noise: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::for_domain(ChannelDomain::Eeg)
    }
}

impl GeneratorConfig {
    pub fn for_domain(domain: ChannelDomain) -> Self {
        match domain {
            ChannelDomain::Eeg => Self {
                channels: 8,
                fs: 256.0,
                seconds: 10.0,
                frequency: 10.0,
                noise: 0.15,
                seed: 7,
            },
            ChannelDomain::Ecg => Self {
                channels: 12,
                fs: 500.0,
                seconds: 10.0,
                frequency: 1.2,
                noise: 0.03,
                seed: 11,
            },
        }
    }

    fn sample_count(&self) -> anyhow::Result<usize> {
        ensure!(self.fs > 0.0, "generator sample rate must be positive");
        let count = (self.fs * self.seconds).round();
        ensure!(count >= 1.0, "generator duration is shorter than one sample");
        Ok(count as usize)
    }
}

fn eeg_sample(t: f64, channel: usize, config: &GeneratorConfig) -> f64 {
    let phase = channel as f64 * 0.35;
    let alpha = (2.0 * PI * config.frequency * t + phase).sin();
    let theta = 0.4 * (2.0 * PI * 6.0 * t + 2.0 * phase).sin();
    alpha + theta
}

fn ecg_sample(t: f64, channel: usize, config: &GeneratorConfig) -> f64 {
    let beat = 1.0 / config.frequency.max(f64::EPSILON);
    let phase = (t % beat) / beat;
    let bump = |centre: f64, width: f64, height: f64| {
        height * (-((phase - centre) / width).powi(2)).exp()
    };
    let gain = 1.0 - 0.05 * channel as f64;
    gain * (bump(0.2, 0.04, 0.15) - bump(0.37, 0.01, 0.1) + bump(0.4, 0.012, 1.0)
        - bump(0.43, 0.01, 0.2)
        + bump(0.65, 0.06, 0.3))
}

/// Builds `data[channel][sample]` from the configured rhythm plus seeded noise.
pub fn build_channels(domain: ChannelDomain, config: &GeneratorConfig) -> anyhow::Result<Vec<Vec<f64>>> {
    let samples = config.sample_count()?;
    let channels = config.channels.max(1);
    let total = channels
        .checked_mul(samples)
        .context("overflow computing sample count for generator")?;
    log::debug!("[generator] {} channels x {} samples ({} total)", channels, samples, total);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut data = Vec::with_capacity(channels);
    for channel in 0..channels {
        let mut row = Vec::with_capacity(samples);
        for index in 0..samples {
            let t = index as f64 / config.fs;
            let clean = match domain {
                ChannelDomain::Eeg => eeg_sample(t, channel, config),
                ChannelDomain::Ecg => ecg_sample(t, channel, config),
            };
            let jitter = if config.noise > 0.0 {
                rng.gen_range(-config.noise..config.noise)
            } else {
                0.0
            };
            row.push(clean + jitter);
        }
        data.push(row);
    }
    Ok(data)
}

/// Demo recording in the shape the demo endpoints return.
pub fn build_recording(domain: ChannelDomain, config: &GeneratorConfig) -> anyhow::Result<RecordingBody> {
    let data = build_channels(domain, config)?;
    let duration = data.first().map(Vec::len).unwrap_or(0) as f64 / config.fs;
    let status = match domain {
        ChannelDomain::Eeg => "Normal EEG",
        ChannelDomain::Ecg => "Normal Sinus Rhythm",
    };
    Ok(RecordingBody {
        channels: data.len(),
        data,
        fs: config.fs,
        duration,
        prediction: Some("Normal".into()),
        confidence: Some(0.9),
        status: Some(status.into()),
    })
}
