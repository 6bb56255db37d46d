use sigcore::config::ControllerConfig;
use sigcore::pipeline::PlaybackStatus;
use sigcore::prelude::{
    AnalysisBackend, AnalysisResult, ChunkResponse, DashResult, DashboardError, DerivedSignal,
    RawFile, Source, ViewerSlot, WaveformWindow, ZoomRange,
};
use sigcore::spawn;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Script {
    chunks: VecDeque<DashResult<ChunkResponse>>,
    chunk_positions: Vec<f64>,
    resample_rates: Vec<u32>,
    analyses: usize,
}

/// In-memory backend replaying canned responses.
#[derive(Clone, Default)]
struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    chunk_delay: Duration,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    fn with_chunks(chunks: Vec<DashResult<ChunkResponse>>) -> Self {
        let backend = Self::default();
        backend.script.lock().unwrap().chunks = chunks.into();
        backend
    }

    fn chunk_calls(&self) -> usize {
        self.script.lock().unwrap().chunk_positions.len()
    }

    fn resample_rates(&self) -> Vec<u32> {
        self.script.lock().unwrap().resample_rates.clone()
    }
}

fn initial_window() -> WaveformWindow {
    WaveformWindow::new(vec![0.0, 0.1], vec![0.0, 0.5]).unwrap()
}

fn analysis(id: String, rate: u32) -> AnalysisResult {
    AnalysisResult {
        analysis_id: id,
        predicted_label: Some("DRONE".into()),
        confidence: Some(0.92),
        initial_waveform: initial_window(),
        spectrogram: None,
        sample_rate: rate,
        duration_seconds: 4.0,
        original_rate: None,
    }
}

fn window_at(start: f64) -> ChunkResponse {
    ChunkResponse::Window {
        window: WaveformWindow::new(vec![start, start + 0.1], vec![0.25, 0.75]).unwrap(),
        new_position: start * 16_000.0,
    }
}

impl AnalysisBackend for ScriptedBackend {
    async fn analyze(&self, source: &Source) -> DashResult<AnalysisResult> {
        let mut script = self.script.lock().unwrap();
        script.analyses += 1;
        Ok(analysis(
            format!("{}-{}", source.name(), script.analyses),
            48_000,
        ))
    }

    async fn fetch_chunk(&self, _analysis_id: &str, position: f64) -> DashResult<ChunkResponse> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.chunk_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut script = self.script.lock().unwrap();
        script.chunk_positions.push(position);
        script
            .chunks
            .pop_front()
            .unwrap_or(Ok(ChunkResponse::Completed))
    }

    async fn resample(&self, source: &Source, target_rate: u32) -> DashResult<DerivedSignal> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.script.lock().unwrap().resample_rates.push(target_rate);
        let mut result = analysis(format!("resampled-{}", target_rate), target_rate);
        result.original_rate = Some(48_000);
        Ok(DerivedSignal {
            source: source.clone(),
            analysis: result,
        })
    }
}

fn wav() -> RawFile {
    RawFile::new("clip.wav", "audio/wav", vec![0; 32])
}

#[tokio::test(start_paused = true)]
async fn first_tick_applies_first_chunk() {
    let backend = ScriptedBackend::with_chunks(vec![Ok(window_at(0.1)), Ok(window_at(0.2))]);
    let dashboard = spawn(backend.clone(), ControllerConfig::default());

    dashboard.accept(wav()).await.unwrap();
    let ready = dashboard
        .wait_for(|snapshot| !snapshot.frames.is_empty())
        .await
        .unwrap();
    let primary = ready.frame(ViewerSlot::Primary).unwrap();
    assert_eq!(primary.analysis.sample_rate, 48_000);
    assert_eq!(primary.window, initial_window());

    assert!(dashboard.start(ViewerSlot::Primary).await.unwrap());
    let advanced = dashboard
        .wait_for(|snapshot| {
            snapshot
                .frame(ViewerSlot::Primary)
                .map(|frame| frame.playback.position > 0.0)
                .unwrap_or(false)
        })
        .await
        .unwrap();
    let primary = advanced.frame(ViewerSlot::Primary).unwrap();
    assert_eq!(primary.playback.position, 1_600.0);
    if let ChunkResponse::Window { window, .. } = window_at(0.1) {
        assert_eq!(primary.window, window);
    }
    dashboard.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn completion_stops_and_restores_initial_window() {
    let backend = ScriptedBackend::with_chunks(vec![
        Ok(window_at(0.1)),
        Ok(window_at(0.2)),
        Ok(ChunkResponse::Completed),
    ]);
    let dashboard = spawn(backend.clone(), ControllerConfig::default());
    dashboard.accept(wav()).await.unwrap();
    dashboard
        .wait_for(|snapshot| !snapshot.frames.is_empty())
        .await
        .unwrap();
    dashboard.start(ViewerSlot::Primary).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let snapshot = dashboard.snapshot();
    let primary = snapshot.frame(ViewerSlot::Primary).unwrap();
    assert_eq!(primary.status, PlaybackStatus::Stopped);
    assert_eq!(primary.playback.position, 0.0);
    assert_eq!(primary.window, initial_window());
    assert_eq!(backend.chunk_calls(), 3);
    dashboard.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn chunk_error_stops_polling_and_keeps_window() {
    let backend = ScriptedBackend::with_chunks(vec![
        Ok(window_at(0.1)),
        Err(DashboardError::chunk("connection reset")),
        Ok(window_at(0.3)),
    ]);
    let dashboard = spawn(backend.clone(), ControllerConfig::default());
    dashboard.accept(wav()).await.unwrap();
    dashboard
        .wait_for(|snapshot| !snapshot.frames.is_empty())
        .await
        .unwrap();
    dashboard.start(ViewerSlot::Primary).await.unwrap();

    let failed = dashboard
        .wait_for(|snapshot| snapshot.last_error.is_some())
        .await
        .unwrap();
    let primary = failed.frame(ViewerSlot::Primary).unwrap();
    assert!(matches!(primary.status, PlaybackStatus::Error(_)));
    if let ChunkResponse::Window { window, .. } = window_at(0.1) {
        assert_eq!(primary.window, window);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.chunk_calls(), 2);
    dashboard.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_chunks_never_overlap() {
    let mut backend =
        ScriptedBackend::with_chunks((1..=6).map(|i| Ok(window_at(i as f64 * 0.1))).collect());
    backend.chunk_delay = Duration::from_millis(350);
    let dashboard = spawn(backend.clone(), ControllerConfig::default());
    dashboard.accept(wav()).await.unwrap();
    dashboard
        .wait_for(|snapshot| !snapshot.frames.is_empty())
        .await
        .unwrap();
    dashboard.start(ViewerSlot::Primary).await.unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(backend.chunk_calls() >= 6);
    assert_eq!(backend.peak_in_flight.load(Ordering::SeqCst), 1);
    let metrics = dashboard.metrics().snapshot();
    assert_eq!(metrics.peak_outstanding_chunks, 1);
    assert_eq!(metrics.chunk.stale, 0);
    dashboard.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn outstanding_chunks_count_every_streaming_viewer() {
    let mut backend =
        ScriptedBackend::with_chunks((1..=20).map(|i| Ok(window_at(i as f64 * 0.1))).collect());
    backend.chunk_delay = Duration::from_millis(350);
    let dashboard = spawn(backend.clone(), ControllerConfig::default());
    dashboard.accept(wav()).await.unwrap();
    dashboard
        .wait_for(|snapshot| !snapshot.frames.is_empty())
        .await
        .unwrap();
    dashboard.enable_comparison().await.unwrap();
    dashboard
        .wait_for(|snapshot| snapshot.frames.len() == 2)
        .await
        .unwrap();

    dashboard.start(ViewerSlot::Primary).await.unwrap();
    dashboard.start(ViewerSlot::Secondary).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    dashboard.pause(ViewerSlot::Primary).unwrap();
    dashboard.pause(ViewerSlot::Secondary).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let metrics = dashboard.metrics().snapshot();
    assert_eq!(backend.peak_in_flight.load(Ordering::SeqCst), 2);
    assert_eq!(metrics.peak_outstanding_chunks, 2);
    assert_eq!(metrics.outstanding_chunks, 0);
    assert_eq!(
        metrics.chunk.issued,
        metrics.chunk.applied + metrics.chunk.stale + metrics.chunk.failed
    );
    dashboard.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rapid_slider_moves_issue_one_resample() {
    let backend = ScriptedBackend::default();
    let dashboard = spawn(backend.clone(), ControllerConfig::default());
    dashboard.accept(wav()).await.unwrap();
    dashboard
        .wait_for(|snapshot| !snapshot.frames.is_empty())
        .await
        .unwrap();

    dashboard.enable_comparison().await.unwrap();
    dashboard
        .wait_for(|snapshot| snapshot.frames.len() == 2)
        .await
        .unwrap();
    assert_eq!(backend.resample_rates(), vec![16_000]);

    for _ in 0..3 {
        dashboard.on_slider_change(8_000).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let settled = dashboard
        .wait_for(|snapshot| {
            snapshot.comparison.committed_value == Some(8_000) && !snapshot.comparison.recomputing
        })
        .await
        .unwrap();
    assert_eq!(backend.resample_rates(), vec![16_000, 8_000]);
    let secondary = settled.frame(ViewerSlot::Secondary).unwrap();
    assert_eq!(secondary.analysis.analysis_id, "resampled-8000");
    assert_eq!(secondary.analysis.original_rate, Some(48_000));
    dashboard.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn zoom_reaches_both_viewers_and_clears_on_disable() {
    let backend = ScriptedBackend::default();
    let dashboard = spawn(backend, ControllerConfig::default());
    dashboard.accept(wav()).await.unwrap();
    dashboard
        .wait_for(|snapshot| !snapshot.frames.is_empty())
        .await
        .unwrap();
    dashboard.enable_comparison().await.unwrap();
    dashboard
        .wait_for(|snapshot| snapshot.frames.len() == 2)
        .await
        .unwrap();

    let zoom = ZoomRange::new(0.02, 0.08);
    dashboard.set_zoom(Some(zoom)).unwrap();
    let zoomed = dashboard
        .wait_for(|snapshot| snapshot.zoom.is_some())
        .await
        .unwrap();
    assert!(zoomed.frames.iter().all(|frame| frame.zoom == Some(zoom)));

    dashboard.disable_comparison().unwrap();
    let disabled = dashboard
        .wait_for(|snapshot| !snapshot.comparison.enabled)
        .await
        .unwrap();
    assert_eq!(disabled.frames.len(), 1);
    assert!(disabled.zoom.is_none());
    assert_eq!(disabled.comparison.members.len(), 1);
    dashboard.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn new_upload_resets_playing_engine() {
    let backend =
        ScriptedBackend::with_chunks((1..=20).map(|i| Ok(window_at(i as f64 * 0.1))).collect());
    let dashboard = spawn(backend, ControllerConfig::default());
    dashboard.accept(wav()).await.unwrap();
    dashboard
        .wait_for(|snapshot| !snapshot.frames.is_empty())
        .await
        .unwrap();
    dashboard.start(ViewerSlot::Primary).await.unwrap();
    tokio::time::sleep(Duration::from_millis(450)).await;

    dashboard
        .accept(RawFile::new("other.wav", "audio/wav", vec![1; 32]))
        .await
        .unwrap();
    let replaced = dashboard
        .wait_for(|snapshot| {
            snapshot
                .frame(ViewerSlot::Primary)
                .map(|frame| frame.analysis.analysis_id.starts_with("other.wav"))
                .unwrap_or(false)
        })
        .await
        .unwrap();
    let primary = replaced.frame(ViewerSlot::Primary).unwrap();
    assert_eq!(primary.playback.position, 0.0);
    assert!(!primary.playback.is_playing);
    assert_eq!(primary.window, initial_window());
    dashboard.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rejected_upload_reports_invalid_type() {
    let dashboard = spawn(ScriptedBackend::default(), ControllerConfig::default());
    let err = dashboard
        .accept(RawFile::new("scan.png", "image/png", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, DashboardError::InvalidFileType { .. }));
    assert!(!dashboard.start(ViewerSlot::Primary).await.unwrap());
    dashboard.shutdown().await.unwrap();
    assert_eq!(
        dashboard.on_slider_change(9_000),
        Err(DashboardError::RuntimeClosed)
    );
}

#[tokio::test(start_paused = true)]
async fn variant_computed_before_a_new_upload_is_refused() {
    let backend = ScriptedBackend::default();
    let dashboard = spawn(backend.clone(), ControllerConfig::default());
    dashboard.accept(wav()).await.unwrap();
    dashboard
        .wait_for(|snapshot| !snapshot.frames.is_empty())
        .await
        .unwrap();
    let first = dashboard.source().await.unwrap().unwrap();
    let variant = backend.resample(&first, 8_000).await.unwrap();

    dashboard
        .accept(RawFile::new("other.wav", "audio/wav", vec![1; 32]))
        .await
        .unwrap();
    let err = dashboard
        .attach_variant("Doppler", first, variant.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, DashboardError::NotReady(_)));

    let replaced = dashboard
        .wait_for(|snapshot| {
            snapshot
                .frame(ViewerSlot::Primary)
                .map(|frame| frame.analysis.analysis_id.starts_with("other.wav"))
                .unwrap_or(false)
        })
        .await
        .unwrap();
    assert_eq!(replaced.comparison.members, vec!["Original"]);

    let current = dashboard.source().await.unwrap().unwrap();
    dashboard
        .attach_variant("Doppler", current, variant)
        .await
        .unwrap();
    let attached = dashboard
        .wait_for(|snapshot| snapshot.comparison.members.len() == 2)
        .await
        .unwrap();
    assert_eq!(attached.comparison.members, vec!["Original", "Doppler"]);
    dashboard.shutdown().await.unwrap();
}
