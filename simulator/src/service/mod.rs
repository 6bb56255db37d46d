//! Mock analysis service speaking the dashboard's HTTP contracts.

pub mod config;
pub mod routes;
pub mod store;

use anyhow::Context;
use config::ServiceConfig;
use routes::{routes, ServiceState};
use std::net::SocketAddr;

/// Serves until Ctrl+C.
pub async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    let bind = config.bind;
    let state = ServiceState::new(config);
    log::info!(
        "[service] window {:.1}s, step 1/{}, analysis at {} Hz",
        state.config().window_seconds,
        state.config().steps_per_window,
        state.config().analysis_rate
    );
    let (addr, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(bind, async {
            // Shut down on the first signal; a failed listener means we simply never stop early.
            let _ = tokio::signal::ctrl_c().await;
        })
        .with_context(|| format!("binding analysis service to {}", bind))?;
    log::info!("[service] listening on http://{}/api (Ctrl+C to stop)", addr);
    server.await;
    log::info!("[service] stopped");
    Ok(())
}

/// Starts the service on a free local port and returns its address.
pub fn spawn_ephemeral(config: ServiceConfig) -> SocketAddr {
    let state = ServiceState::new(config);
    let (addr, server) = warp::serve(routes(state)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    log::info!("[service] listening on http://{}/api", addr);
    addr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::audio::{encode_wav, Clip};
    use sigcore::channels::{GraphRequest, MultiChannelBackend, ViewerKind};
    use sigcore::config::{BackendConfig, ChannelDomain, ControllerConfig, Domain};
    use sigcore::interface::HttpBackend;
    use sigcore::pipeline::PlaybackStatus;
    use sigcore::prelude::{
        AnalysisBackend, ChunkResponse, DashboardError, DopplerParams, DopplerSynthesis, RawFile,
        SignalFamily, Source, ViewerSlot,
    };
    use sigcore::intake::UploadIntake;
    use std::time::Duration;

    fn test_service() -> SocketAddr {
        spawn_ephemeral(ServiceConfig {
            analysis_rate: 1_000,
            window_seconds: 0.5,
            steps_per_window: 5,
            ..ServiceConfig::default()
        })
    }

    fn backend(addr: SocketAddr, domain: Domain) -> HttpBackend {
        let config = BackendConfig {
            base_url: format!("http://{}/api", addr),
            domain,
            channel_domain: ChannelDomain::Eeg,
            ..BackendConfig::default()
        };
        HttpBackend::new(&config, &ControllerConfig::default())
    }

    fn chirp_file(rate: u32) -> RawFile {
        let samples = (0..rate)
            .map(|i| {
                let t = i as f32 / rate as f32;
                (t * (200.0 + 300.0 * t) * std::f32::consts::TAU).sin() * 0.6
            })
            .collect();
        let bytes = encode_wav(&Clip::new(samples, rate)).unwrap();
        RawFile::new("chirp.wav", "audio/wav", bytes)
    }

    fn source(raw: RawFile) -> Source {
        UploadIntake::new(SignalFamily::Audio).accept(raw).unwrap()
    }

    #[tokio::test]
    async fn http_backend_analyzes_and_streams() {
        let addr = test_service();
        let backend = backend(addr, Domain::Drone);
        let source = source(chirp_file(4_000));

        let analysis = backend.analyze(&source).await.unwrap();
        assert_eq!(analysis.sample_rate, 4_000);
        assert_eq!(analysis.duration_seconds, 1.0);
        assert_eq!(analysis.initial_waveform.len(), 500);
        assert!(analysis.spectrogram.is_some());

        let chunk = backend.fetch_chunk(&analysis.analysis_id, 0.0).await.unwrap();
        match chunk {
            ChunkResponse::Window { window, new_position } => {
                assert_eq!(new_position, 100.0);
                assert_eq!(window.span().map(|(start, _)| start), Some(0.1));
            }
            ChunkResponse::Completed => panic!("stream ended early"),
        }
        assert_eq!(
            backend.fetch_chunk(&analysis.analysis_id, 500.0).await.unwrap(),
            ChunkResponse::Completed
        );
    }

    #[tokio::test]
    async fn every_page_analyses_through_the_drone_endpoints() {
        let addr = test_service();
        for domain in [Domain::Human, Domain::Doppler] {
            let backend = backend(addr, domain);
            let analysis = backend.analyze(&source(chirp_file(2_000))).await.unwrap();
            assert!(matches!(
                backend.fetch_chunk(&analysis.analysis_id, 0.0).await.unwrap(),
                ChunkResponse::Window { .. }
            ));
        }
    }

    #[tokio::test]
    async fn service_errors_surface_as_causes() {
        let addr = test_service();
        let backend = backend(addr, Domain::Human);
        let err = backend.fetch_chunk("expired.wav", 0.0).await.unwrap_err();
        assert_eq!(
            err,
            DashboardError::ChunkFetchFailed {
                cause: "File not found or session expired".into()
            }
        );
        let doppler = backend
            .generate_doppler(&source(chirp_file(1_000)), DopplerParams::default())
            .await
            .unwrap_err();
        assert!(matches!(doppler, DashboardError::Unsupported(_)));
        let prediction = backend
            .predict(&source(chirp_file(1_000)))
            .await
            .unwrap_err();
        assert!(matches!(prediction, DashboardError::Unsupported(_)));
    }

    #[tokio::test]
    async fn resample_produces_a_new_analysis() {
        let addr = test_service();
        let backend = backend(addr, Domain::Drone);
        let source = source(chirp_file(8_000));
        let original = backend.analyze(&source).await.unwrap();

        let derived = backend.resample(&source, 2_000).await.unwrap();
        assert_eq!(derived.source.name(), "chirp_2000hz.wav");
        assert_eq!(derived.analysis.sample_rate, 2_000);
        assert_eq!(derived.analysis.original_rate, Some(8_000));
        assert_ne!(derived.analysis.analysis_id, original.analysis_id);
    }

    #[tokio::test]
    async fn doppler_and_channel_capabilities() {
        let addr = test_service();
        let backend = backend(addr, Domain::Doppler);
        let source = source(chirp_file(4_000));
        let params = DopplerParams {
            v_start: -15.0,
            v_end: 25.0,
            f_source: 440.0,
        };
        let derived = backend.generate_doppler(&source, params).await.unwrap();
        assert_eq!(derived.analysis.sample_rate, 4_000);
        assert!(derived.source.bytes().starts_with(b"RIFF"));

        let passing = backend.simulate_passing(&source, params).await.unwrap();
        assert_eq!(passing.source.name(), "passing_chirp.wav");
        assert_eq!(passing.analysis.sample_rate, 4_000);

        let prediction = backend.predict(&source).await.unwrap();
        assert!(prediction.source_frequency > 0.0);
        assert!(prediction.start_speed.is_finite() && prediction.end_speed.is_finite());

        let recording = backend.load_demo().await.unwrap();
        assert_eq!(recording.channel_count, 8);
        let frame = backend
            .graph(GraphRequest {
                data: recording.data.clone(),
                fs: recording.fs,
                channels: vec![0, 3],
                viewer_type: ViewerKind::Xor,
                position: 2.0,
                zoom: 5.0,
                chunk_duration: 1.0,
                colormap: Default::default(),
                polar_mode: Default::default(),
                rec_ch_x: 0,
                rec_ch_y: 1,
                undersample_freq: Some(64),
            })
            .await
            .unwrap();
        assert_eq!(frame.traces.len(), 2);
        assert_eq!(frame.current_time, "2.00s / 10.00s");
    }

    #[tokio::test]
    async fn dashboard_plays_a_clip_to_completion() {
        let addr = test_service();
        let dashboard = sigcore::spawn(backend(addr, Domain::Drone), ControllerConfig::default());
        dashboard.accept(chirp_file(4_000)).await.unwrap();
        dashboard
            .wait_for(|snapshot| !snapshot.frames.is_empty())
            .await
            .unwrap();
        assert!(dashboard.start(ViewerSlot::Primary).await.unwrap());

        let finished = tokio::time::timeout(
            Duration::from_secs(10),
            dashboard.wait_for(|snapshot| snapshot.metrics.chunk.applied >= 6),
        )
        .await
        .unwrap()
        .unwrap();
        let primary = finished.frame(ViewerSlot::Primary).unwrap();
        assert_eq!(primary.status, PlaybackStatus::Stopped);
        assert_eq!(primary.playback.position, 0.0);
        assert_eq!(finished.metrics.peak_outstanding_chunks, 1);
        assert_eq!(finished.metrics.outstanding_chunks, 0);
        dashboard.shutdown().await.unwrap();
    }
}
