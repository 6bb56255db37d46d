//! Headless run of the dashboard controller against an analysis service.

use anyhow::{bail, Context};
use sigcore::config::{DashboardConfig, Domain};
use sigcore::interface::HttpBackend;
use sigcore::pipeline::PlaybackStatus;
use sigcore::prelude::{DopplerParams, DopplerSynthesis, RawFile, ViewerSlot};
use sigcore::presentation::DashboardSnapshot;
use sigcore::telemetry::MetricsSnapshot;
use sigcore::DashboardHandle;
use std::path::Path;

/// What a finished replay observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySummary {
    pub prediction: Option<String>,
    pub windows: usize,
    pub members: Vec<String>,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Also stream the resampled comparison viewer.
    pub compare: bool,
    pub doppler: DopplerParams,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            compare: false,
            doppler: DopplerParams {
                v_start: -20.0,
                v_end: 20.0,
                f_source: 440.0,
            },
        }
    }
}

fn log_frames(snapshot: &DashboardSnapshot) {
    for frame in &snapshot.frames {
        let span = frame
            .window
            .span()
            .map(|(start, end)| format!("{:.2}s..{:.2}s", start, end))
            .unwrap_or_else(|| "empty".into());
        log::info!(
            "[replay] {:<9} {:<18} window {} cursor {:.0}",
            frame.slot.label(),
            frame.label,
            span,
            frame.playback.position
        );
    }
}

async fn attach_doppler(
    dashboard: &DashboardHandle,
    backend: &HttpBackend,
    params: DopplerParams,
) -> anyhow::Result<()> {
    let source = dashboard
        .source()
        .await?
        .context("no source loaded for the Doppler rendition")?;
    let derived = backend
        .generate_doppler(&source, params)
        .await
        .context("generating Doppler rendition")?;
    dashboard.attach_variant("Doppler", source, derived).await?;
    Ok(())
}

/// Plays `path` through a fresh controller until the primary stream completes.
pub async fn replay(
    path: &Path,
    backend: HttpBackend,
    config: &DashboardConfig,
    options: &ReplayOptions,
) -> anyhow::Result<ReplaySummary> {
    let raw = RawFile::from_path(path)
        .with_context(|| format!("reading replay input {}", path.display()))?;
    let dashboard = sigcore::spawn(backend.clone(), config.controller.clone());

    dashboard
        .accept(raw)
        .await
        .with_context(|| format!("accepting {}", path.display()))?;
    let analysed = dashboard
        .wait_for(|snapshot| {
            !snapshot.analyzing && (!snapshot.frames.is_empty() || snapshot.last_error.is_some())
        })
        .await?;
    if let Some(err) = analysed.last_error {
        bail!("analysis of {} failed: {}", path.display(), err);
    }
    let prediction = analysed
        .frame(ViewerSlot::Primary)
        .and_then(|frame| frame.analysis.predicted_label.clone());
    log::info!(
        "[replay] {} analysed: {}",
        path.display(),
        prediction.as_deref().unwrap_or("no prediction")
    );

    if backend.domain() == Domain::Doppler {
        attach_doppler(&dashboard, &backend, options.doppler).await?;
    }

    if options.compare {
        dashboard.enable_comparison().await?;
        let compared = dashboard
            .wait_for(|snapshot| {
                (snapshot.comparison.enabled && !snapshot.comparison.recomputing)
                    || snapshot.comparison.error.is_some()
            })
            .await?;
        if let Some(err) = compared.comparison.error {
            bail!("comparison failed: {}", err);
        }
        dashboard.start(ViewerSlot::Secondary).await?;
    }

    if !dashboard.start(ViewerSlot::Primary).await? {
        bail!("primary viewer could not start");
    }

    let mut updates = dashboard.subscribe();
    let mut windows = 0;
    let mut last_position = 0.0;
    let finished = loop {
        updates
            .changed()
            .await
            .context("dashboard stopped during replay")?;
        let snapshot = updates.borrow_and_update().clone();
        log_frames(&snapshot);
        let Some(primary) = snapshot.frame(ViewerSlot::Primary) else {
            bail!("primary viewer disappeared during replay");
        };
        if primary.playback.position != last_position {
            if primary.playback.position > 0.0 {
                windows += 1;
            }
            last_position = primary.playback.position;
        }
        match &primary.status {
            PlaybackStatus::Error(err) => bail!("playback failed: {}", err),
            PlaybackStatus::Stopped => break snapshot,
            PlaybackStatus::Playing => {}
        }
    };

    let metrics = dashboard.metrics().snapshot();
    dashboard.shutdown().await?;
    Ok(ReplaySummary {
        prediction,
        windows,
        members: finished.comparison.members,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::audio::{encode_wav, Clip};
    use crate::service::config::ServiceConfig;
    use crate::service::spawn_ephemeral;
    use sigcore::config::ControllerConfig;
    use std::io::Write;

    fn service() -> String {
        let addr = spawn_ephemeral(ServiceConfig {
            analysis_rate: 1_000,
            window_seconds: 0.5,
            steps_per_window: 5,
            ..ServiceConfig::default()
        });
        format!("http://{}/api", addr)
    }

    fn wav_file(rate: u32) -> tempfile::NamedTempFile {
        let samples = (0..rate)
            .map(|i| (i as f32 / rate as f32 * 300.0 * std::f32::consts::TAU).sin())
            .collect();
        let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        file.write_all(&encode_wav(&Clip::new(samples, rate)).unwrap())
            .unwrap();
        file
    }

    fn config(base_url: String, domain: Domain) -> DashboardConfig {
        let mut config = DashboardConfig::default();
        config.backend.base_url = base_url;
        config.backend.domain = domain;
        config
    }

    #[tokio::test]
    async fn replay_streams_every_window() {
        let file = wav_file(4_000);
        let config = config(service(), Domain::Drone);
        let backend = HttpBackend::new(&config.backend, &config.controller);
        let summary = replay(file.path(), backend, &config, &ReplayOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.prediction.as_deref(), Some("DRONE"));
        assert_eq!(summary.metrics.chunk.applied, 6);
        assert!(summary.windows > 0 && summary.windows <= 5);
        assert_eq!(summary.metrics.peak_outstanding_chunks, 1);
        assert_eq!(summary.metrics.outstanding_chunks, 0);
        assert_eq!(summary.members, vec!["Original".to_string()]);
    }

    #[tokio::test]
    async fn doppler_replay_attaches_the_shifted_clip() {
        let file = wav_file(4_000);
        let mut config = config(service(), Domain::Doppler);
        config.controller = ControllerConfig {
            default_resample_rate: 2_000,
            slider_min: 1_000,
            ..ControllerConfig::default()
        };
        let backend = HttpBackend::new(&config.backend, &config.controller);
        let options = ReplayOptions {
            compare: true,
            ..ReplayOptions::default()
        };
        let summary = replay(file.path(), backend, &config, &options).await.unwrap();
        assert_eq!(
            summary.members,
            vec![
                "Original".to_string(),
                "Doppler".to_string(),
                "Resampled 2000 Hz".to_string()
            ]
        );
        assert_eq!(summary.metrics.recompute.applied, 1);
    }
}
