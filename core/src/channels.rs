//! Multi-channel (EEG/ECG) viewer.
//!
//! Unlike the audio pages the service renders the chart traces itself, so
//! playback here is a local clock: every tick moves `position` and asks for
//! one graph frame. Graph requests never overlap; changes made while one is
//! in flight collapse into a single follow-up carrying the latest settings.

use crate::config::{ChannelDomain, ControllerConfig};
use crate::intake::UploadIntake;
use crate::interface::wire::{GraphResponseBody, RecordingBody};
use crate::pipeline::{DebouncePipeline, SettleTimer};
use crate::prelude::{DashResult, DashboardError, RawFile, SignalFamily, Source};
use crate::telemetry::{LogManager, MetricsRecorder, RequestKind};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerKind {
    #[default]
    Continuous,
    Xor,
    Polar,
    Recurrence,
}

impl ViewerKind {
    pub const ALL: [ViewerKind; 4] = [
        ViewerKind::Continuous,
        ViewerKind::Xor,
        ViewerKind::Polar,
        ViewerKind::Recurrence,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Colormap {
    #[default]
    Viridis,
    Plasma,
    Hot,
    Cool,
    Jet,
    Rainbow,
}

impl Colormap {
    pub const ALL: [Colormap; 6] = [
        Colormap::Viridis,
        Colormap::Plasma,
        Colormap::Hot,
        Colormap::Cool,
        Colormap::Jet,
        Colormap::Rainbow,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolarMode {
    #[default]
    Fixed,
    Dynamic,
}

/// A loaded multi-channel recording; `data[channel][sample]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub data: Arc<Vec<Vec<f64>>>,
    pub fs: f64,
    pub duration: f64,
    pub prediction: Option<String>,
    pub confidence: Option<f32>,
    pub status: Option<String>,
    pub channel_count: usize,
}

impl From<RecordingBody> for Recording {
    fn from(body: RecordingBody) -> Self {
        let channel_count = if body.channels > 0 {
            body.channels
        } else {
            body.data.len()
        };
        Self {
            data: Arc::new(body.data),
            fs: body.fs,
            duration: body.duration,
            prediction: body.prediction,
            confidence: body.confidence,
            status: body.status,
            channel_count,
        }
    }
}

/// Body of one graph request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRequest {
    pub data: Arc<Vec<Vec<f64>>>,
    pub fs: f64,
    pub channels: Vec<usize>,
    pub viewer_type: ViewerKind,
    pub position: f64,
    pub zoom: f64,
    pub chunk_duration: f64,
    pub colormap: Colormap,
    pub polar_mode: PolarMode,
    pub rec_ch_x: usize,
    pub rec_ch_y: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undersample_freq: Option<u32>,
}

/// One rendered frame; traces are chart-library JSON passed through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphFrame {
    pub traces: Vec<serde_json::Value>,
    pub current_time: String,
}

impl From<GraphResponseBody> for GraphFrame {
    fn from(body: GraphResponseBody) -> Self {
        Self {
            traces: body.traces,
            current_time: body.current_time,
        }
    }
}

pub trait MultiChannelBackend: Send + Sync + 'static {
    fn load_demo(&self) -> impl Future<Output = DashResult<Recording>> + Send;

    fn upload(&self, source: &Source) -> impl Future<Output = DashResult<Recording>> + Send;

    fn graph(&self, request: GraphRequest) -> impl Future<Output = DashResult<GraphFrame>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphTicket {
    pub load_generation: u64,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub enum ChannelEffect {
    LoadDemo { generation: u64 },
    Upload { generation: u64, source: Source },
    Graph { ticket: GraphTicket, request: GraphRequest },
    ArmSettleTimer(SettleTimer),
}

#[derive(Debug, Clone)]
pub enum ChannelCompletion {
    Loaded {
        generation: u64,
        result: DashResult<Recording>,
    },
    Graph {
        ticket: GraphTicket,
        result: DashResult<GraphFrame>,
    },
}

#[derive(Debug, Clone)]
pub enum ChannelFeedback {
    Completed(ChannelCompletion),
    Settled(u64),
}

/// Owned view of the viewer for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSnapshot {
    pub source_name: Option<String>,
    pub loading: bool,
    pub channel_count: usize,
    pub max_channels: usize,
    pub channels: Vec<usize>,
    pub channel_names: Vec<String>,
    pub kind: ViewerKind,
    pub colormap: Colormap,
    pub polar_mode: PolarMode,
    pub position: f64,
    pub duration: f64,
    pub playing: bool,
    pub speed: f64,
    pub zoom: f64,
    pub chunk_duration: f64,
    pub recurrence_pair: (usize, usize),
    pub undersample_slider: Option<u32>,
    pub undersample_applied: Option<u32>,
    pub prediction: Option<String>,
    pub confidence: Option<f32>,
    pub frame: Option<GraphFrame>,
    pub last_error: Option<DashboardError>,
}

pub struct ChannelViewer {
    domain: ChannelDomain,
    tick_seconds: f64,
    intake: UploadIntake,
    recording: Option<Recording>,
    load_generation: u64,
    loading: bool,
    channels: Vec<usize>,
    kind: ViewerKind,
    zoom: f64,
    chunk_duration: f64,
    colormap: Colormap,
    polar_mode: PolarMode,
    recurrence_pair: (usize, usize),
    speed: f64,
    position: f64,
    playing: bool,
    frame: Option<GraphFrame>,
    sequence: u64,
    graph_in_flight: bool,
    graph_dirty: bool,
    undersample: DebouncePipeline<u32>,
    undersample_touched: bool,
    undersample_applied: Option<u32>,
    last_error: Option<DashboardError>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl ChannelViewer {
    pub fn new(domain: ChannelDomain, config: &ControllerConfig) -> Self {
        Self::with_metrics(domain, config, Arc::new(MetricsRecorder::new()))
    }

    pub fn with_metrics(
        domain: ChannelDomain,
        config: &ControllerConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            domain,
            tick_seconds: config.tick_interval().as_secs_f64(),
            intake: UploadIntake::new(SignalFamily::Tabular),
            recording: None,
            load_generation: 0,
            loading: false,
            channels: Vec::new(),
            kind: ViewerKind::default(),
            zoom: 5.0,
            chunk_duration: 2.0,
            colormap: Colormap::default(),
            polar_mode: PolarMode::default(),
            recurrence_pair: (0, 1),
            speed: 1.0,
            position: 0.0,
            playing: false,
            frame: None,
            sequence: 0,
            graph_in_flight: false,
            graph_dirty: false,
            undersample: DebouncePipeline::new(0, config.settle_delay()),
            undersample_touched: false,
            undersample_applied: None,
            last_error: None,
            metrics,
            logger: LogManager::new("channels"),
        }
    }

    pub fn domain(&self) -> ChannelDomain {
        self.domain
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    pub fn load_demo(&mut self) -> Vec<ChannelEffect> {
        self.intake.teardown();
        self.begin_load();
        vec![ChannelEffect::LoadDemo {
            generation: self.load_generation,
        }]
    }

    pub fn accept(&mut self, raw: RawFile) -> DashResult<Vec<ChannelEffect>> {
        let source = match self.intake.accept(raw) {
            Ok(source) => source,
            Err(err) => {
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };
        self.begin_load();
        Ok(vec![ChannelEffect::Upload {
            generation: self.load_generation,
            source,
        }])
    }

    fn begin_load(&mut self) {
        self.load_generation += 1;
        self.loading = true;
        self.last_error = None;
        self.metrics.record_issued(RequestKind::Analyze);
    }

    pub fn play(&mut self) -> bool {
        if self.recording.is_none() {
            return false;
        }
        self.playing = true;
        true
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn reset(&mut self) -> Vec<ChannelEffect> {
        self.playing = false;
        self.position = 0.0;
        self.request_graph()
    }

    pub fn seek(&mut self, position: f64) -> Vec<ChannelEffect> {
        let duration = self.duration();
        self.position = position.clamp(0.0, duration.max(0.0));
        self.request_graph()
    }

    /// Advances the local clock by one tick, wrapping at the end.
    pub fn tick(&mut self) -> Vec<ChannelEffect> {
        if !self.playing || self.recording.is_none() {
            return Vec::new();
        }
        self.position += self.speed * self.tick_seconds;
        if self.position >= self.duration() {
            self.position = 0.0;
        }
        self.request_graph()
    }

    pub fn toggle_channel(&mut self, channel: usize) -> Vec<ChannelEffect> {
        let mut channels = self.channels.clone();
        match channels.iter().position(|&selected| selected == channel) {
            Some(index) => {
                channels.remove(index);
            }
            None => channels.push(channel),
        }
        self.set_channels(channels)
    }

    /// Keeps only channels the recording has, up to the page limit.
    pub fn set_channels(&mut self, mut channels: Vec<usize>) -> Vec<ChannelEffect> {
        let available = self.channel_count().min(self.domain.max_channels());
        channels.retain(|&channel| channel < available);
        channels.sort_unstable();
        channels.dedup();
        self.channels = channels;
        self.request_graph()
    }

    pub fn set_kind(&mut self, kind: ViewerKind) -> Vec<ChannelEffect> {
        self.kind = kind;
        self.request_graph()
    }

    pub fn set_zoom(&mut self, seconds: f64) -> Vec<ChannelEffect> {
        self.zoom = seconds.max(0.1);
        self.request_graph()
    }

    pub fn set_chunk_duration(&mut self, seconds: f64) -> Vec<ChannelEffect> {
        self.chunk_duration = seconds.max(0.1);
        self.request_graph()
    }

    pub fn set_colormap(&mut self, colormap: Colormap) -> Vec<ChannelEffect> {
        self.colormap = colormap;
        self.request_graph()
    }

    pub fn set_polar_mode(&mut self, mode: PolarMode) -> Vec<ChannelEffect> {
        self.polar_mode = mode;
        self.request_graph()
    }

    pub fn set_recurrence_pair(&mut self, x: usize, y: usize) -> Vec<ChannelEffect> {
        let last = self.channel_count().saturating_sub(1);
        self.recurrence_pair = (x.min(last), y.min(last));
        self.request_graph()
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 10.0);
    }

    pub fn on_undersample_change(&mut self, frequency: u32) -> Vec<ChannelEffect> {
        self.undersample_touched = true;
        vec![ChannelEffect::ArmSettleTimer(
            self.undersample.on_slider_change(frequency),
        )]
    }

    /// Settled undersample values are applied through the next graph frame.
    pub fn on_timer(&mut self, token: u64) -> Vec<ChannelEffect> {
        let Some(ticket) = self.undersample.on_timer(token) else {
            return Vec::new();
        };
        self.undersample.resolve(ticket, true);
        self.undersample_applied = (ticket.value > 0).then_some(ticket.value);
        self.logger
            .trace(&format!("undersample set to {:?}", self.undersample_applied));
        self.request_graph()
    }

    pub fn clear_undersample(&mut self) -> Vec<ChannelEffect> {
        self.undersample.cancel();
        self.undersample_touched = false;
        self.undersample_applied = None;
        self.request_graph()
    }

    fn request_graph(&mut self) -> Vec<ChannelEffect> {
        let Some(request) = self.build_request() else {
            return Vec::new();
        };
        if self.graph_in_flight {
            self.graph_dirty = true;
            return Vec::new();
        }
        self.graph_in_flight = true;
        self.sequence += 1;
        self.metrics.record_issued(RequestKind::Graph);
        vec![ChannelEffect::Graph {
            ticket: GraphTicket {
                load_generation: self.load_generation,
                sequence: self.sequence,
            },
            request,
        }]
    }

    fn build_request(&self) -> Option<GraphRequest> {
        let recording = self.recording.as_ref()?;
        Some(GraphRequest {
            data: Arc::clone(&recording.data),
            fs: recording.fs,
            channels: self.channels.clone(),
            viewer_type: self.kind,
            position: self.position,
            zoom: self.zoom,
            chunk_duration: self.chunk_duration,
            colormap: self.colormap,
            polar_mode: self.polar_mode,
            rec_ch_x: self.recurrence_pair.0,
            rec_ch_y: self.recurrence_pair.1,
            undersample_freq: self.undersample_applied,
        })
    }

    pub fn feed(&mut self, feedback: ChannelFeedback) -> Vec<ChannelEffect> {
        match feedback {
            ChannelFeedback::Completed(completion) => self.complete(completion),
            ChannelFeedback::Settled(token) => self.on_timer(token),
        }
    }

    pub fn complete(&mut self, completion: ChannelCompletion) -> Vec<ChannelEffect> {
        match completion {
            ChannelCompletion::Loaded { generation, result } => {
                if generation != self.load_generation {
                    self.metrics.record_stale(RequestKind::Analyze);
                    return Vec::new();
                }
                self.loading = false;
                match result {
                    Ok(recording) => {
                        self.metrics.record_applied(RequestKind::Analyze);
                        self.install(recording);
                        self.request_graph()
                    }
                    Err(err) => {
                        self.logger.warn(&format!("{}", err));
                        self.metrics.record_failed(RequestKind::Analyze);
                        self.last_error = Some(err);
                        Vec::new()
                    }
                }
            }
            ChannelCompletion::Graph { ticket, result } => {
                self.graph_in_flight = false;
                match result {
                    _ if ticket.load_generation != self.load_generation => {
                        self.metrics.record_stale(RequestKind::Graph);
                    }
                    Ok(frame) => {
                        self.metrics.record_applied(RequestKind::Graph);
                        self.frame = Some(frame);
                    }
                    Err(err) => {
                        self.logger.warn(&format!("graph failed: {}", err));
                        self.metrics.record_failed(RequestKind::Graph);
                        self.frame = None;
                        self.last_error = Some(match err {
                            DashboardError::AnalysisFailed { .. } => err,
                            other => DashboardError::analysis(other),
                        });
                    }
                }
                if std::mem::take(&mut self.graph_dirty) {
                    return self.request_graph();
                }
                Vec::new()
            }
        }
    }

    fn install(&mut self, recording: Recording) {
        self.logger.record(&format!(
            "loaded {} channels at {} Hz ({:.1} s)",
            recording.channel_count, recording.fs, recording.duration
        ));
        let count = recording.channel_count.min(self.domain.max_channels());
        self.channels = (0..count.min(4)).collect();
        self.recurrence_pair = (0, 1.min(count.saturating_sub(1)));
        self.recording = Some(recording);
        self.position = 0.0;
        self.playing = false;
        self.frame = None;
        self.graph_dirty = false;
    }

    fn channel_count(&self) -> usize {
        self.recording
            .as_ref()
            .map(|recording| recording.channel_count)
            .unwrap_or(0)
    }

    fn duration(&self) -> f64 {
        self.recording
            .as_ref()
            .map(|recording| recording.duration)
            .unwrap_or(0.0)
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    pub fn frame(&self) -> Option<&GraphFrame> {
        self.frame.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn last_error(&self) -> Option<&DashboardError> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn teardown(&mut self) {
        self.intake.teardown();
        self.load_generation += 1;
        self.loading = false;
        self.recording = None;
        self.channels.clear();
        self.position = 0.0;
        self.playing = false;
        self.frame = None;
        self.graph_dirty = false;
        self.undersample.cancel();
        self.undersample_touched = false;
        self.undersample_applied = None;
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        let channel_count = self.channel_count();
        ChannelSnapshot {
            source_name: self.intake.current().map(|source| source.name().to_string()),
            loading: self.loading,
            channel_count,
            max_channels: self.domain.max_channels(),
            channels: self.channels.clone(),
            channel_names: (0..channel_count.min(self.domain.max_channels()))
                .map(|index| self.domain.lead_name(index))
                .collect(),
            kind: self.kind,
            colormap: self.colormap,
            polar_mode: self.polar_mode,
            position: self.position,
            duration: self.duration(),
            playing: self.playing,
            speed: self.speed,
            zoom: self.zoom,
            chunk_duration: self.chunk_duration,
            recurrence_pair: self.recurrence_pair,
            undersample_slider: self
                .undersample_touched
                .then(|| self.undersample.slider_value()),
            undersample_applied: self.undersample_applied,
            prediction: self
                .recording
                .as_ref()
                .and_then(|recording| recording.prediction.clone()),
            confidence: self
                .recording
                .as_ref()
                .and_then(|recording| recording.confidence),
            frame: self.frame.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(channels: usize, duration: f64) -> Recording {
        Recording {
            data: Arc::new(vec![vec![0.0; 10]; channels]),
            fs: 250.0,
            duration,
            prediction: Some("Normal".into()),
            confidence: Some(0.7),
            status: None,
            channel_count: channels,
        }
    }

    fn loaded(channels: usize, duration: f64) -> (ChannelViewer, GraphTicket) {
        let mut viewer = ChannelViewer::new(ChannelDomain::Eeg, &ControllerConfig::default());
        let generation = match &viewer.load_demo()[..] {
            [ChannelEffect::LoadDemo { generation }] => *generation,
            other => panic!("unexpected effects {:?}", other),
        };
        let effects = viewer.complete(ChannelCompletion::Loaded {
            generation,
            result: Ok(recording(channels, duration)),
        });
        let ticket = graph_ticket(&effects);
        (viewer, ticket)
    }

    fn graph_ticket(effects: &[ChannelEffect]) -> GraphTicket {
        match effects {
            [ChannelEffect::Graph { ticket, .. }] => *ticket,
            other => panic!("expected one graph request, got {:?}", other),
        }
    }

    fn frame(label: &str) -> GraphFrame {
        GraphFrame {
            traces: vec![serde_json::json!({ "name": label })],
            current_time: label.into(),
        }
    }

    #[test]
    fn loading_selects_first_four_channels() {
        let (viewer, _) = loaded(8, 10.0);
        assert_eq!(viewer.channels(), &[0, 1, 2, 3]);
        assert_eq!(viewer.position(), 0.0);
        assert!(!viewer.is_playing());
    }

    #[test]
    fn changes_during_flight_coalesce() {
        let (mut viewer, first) = loaded(8, 10.0);
        assert!(viewer.set_kind(ViewerKind::Xor).is_empty());
        assert!(viewer.set_zoom(2.0).is_empty());

        let effects = viewer.complete(ChannelCompletion::Graph {
            ticket: first,
            result: Ok(frame("first")),
        });
        match &effects[..] {
            [ChannelEffect::Graph { request, .. }] => {
                assert_eq!(request.viewer_type, ViewerKind::Xor);
                assert_eq!(request.zoom, 2.0);
            }
            other => panic!("unexpected effects {:?}", other),
        }
        assert_eq!(viewer.frame().unwrap().current_time, "first");
    }

    #[test]
    fn playback_wraps_at_duration() {
        let (mut viewer, first) = loaded(2, 0.25);
        viewer.complete(ChannelCompletion::Graph {
            ticket: first,
            result: Ok(frame("a")),
        });
        assert!(viewer.play());
        let ticket = graph_ticket(&viewer.tick());
        assert!((viewer.position() - 0.1).abs() < 1e-9);
        viewer.complete(ChannelCompletion::Graph {
            ticket,
            result: Ok(frame("b")),
        });
        let ticket = graph_ticket(&viewer.tick());
        viewer.complete(ChannelCompletion::Graph {
            ticket,
            result: Ok(frame("c")),
        });
        viewer.tick();
        assert_eq!(viewer.position(), 0.0);
    }

    #[test]
    fn graph_error_clears_traces() {
        let (mut viewer, first) = loaded(2, 5.0);
        viewer.complete(ChannelCompletion::Graph {
            ticket: first,
            result: Ok(frame("a")),
        });
        let ticket = graph_ticket(&viewer.set_kind(ViewerKind::Polar));
        viewer.complete(ChannelCompletion::Graph {
            ticket,
            result: Err(DashboardError::Unsupported("polar".into())),
        });
        assert!(viewer.frame().is_none());
        assert!(matches!(
            viewer.last_error(),
            Some(DashboardError::AnalysisFailed { .. })
        ));
    }

    #[test]
    fn channel_selection_is_bounded_by_recording() {
        let (mut viewer, _) = loaded(3, 5.0);
        viewer.set_channels(vec![2, 0, 7, 2]);
        assert_eq!(viewer.channels(), &[0, 2]);
        viewer.toggle_channel(0);
        assert_eq!(viewer.channels(), &[2]);
    }

    #[test]
    fn undersample_waits_for_settle() {
        let (mut viewer, first) = loaded(2, 5.0);
        viewer.complete(ChannelCompletion::Graph {
            ticket: first,
            result: Ok(frame("a")),
        });
        let tokens: Vec<u64> = [200, 150, 100]
            .into_iter()
            .flat_map(|value| viewer.on_undersample_change(value))
            .map(|effect| match effect {
                ChannelEffect::ArmSettleTimer(timer) => timer.token,
                other => panic!("unexpected effect {:?}", other),
            })
            .collect();
        assert!(viewer.on_timer(tokens[0]).is_empty());
        match &viewer.on_timer(tokens[2])[..] {
            [ChannelEffect::Graph { request, .. }] => {
                assert_eq!(request.undersample_freq, Some(100))
            }
            other => panic!("unexpected effects {:?}", other),
        }
    }

    #[test]
    fn graph_for_previous_recording_is_dropped() {
        let (mut viewer, first) = loaded(2, 5.0);
        let generation = match &viewer.load_demo()[..] {
            [ChannelEffect::LoadDemo { generation }] => *generation,
            other => panic!("unexpected effects {:?}", other),
        };
        viewer.complete(ChannelCompletion::Graph {
            ticket: first,
            result: Ok(frame("old")),
        });
        assert!(viewer.frame().is_none());

        let effects = viewer.complete(ChannelCompletion::Loaded {
            generation,
            result: Ok(recording(4, 5.0)),
        });
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn seek_and_pair_stay_inside_the_recording() {
        let (mut viewer, first) = loaded(3, 4.0);
        viewer.complete(ChannelCompletion::Graph {
            ticket: first,
            result: Ok(frame("a")),
        });
        let ticket = graph_ticket(&viewer.seek(9.0));
        assert_eq!(viewer.position(), 4.0);
        assert!(viewer.set_recurrence_pair(1, 7).is_empty());
        assert!(viewer.set_polar_mode(PolarMode::Dynamic).is_empty());
        assert!(viewer.set_colormap(Colormap::Hot).is_empty());
        assert!(viewer.set_chunk_duration(0.0).is_empty());
        viewer.set_speed(50.0);

        let effects = viewer.complete(ChannelCompletion::Graph {
            ticket,
            result: Ok(frame("b")),
        });
        match &effects[..] {
            [ChannelEffect::Graph { request, .. }] => {
                assert_eq!((request.rec_ch_x, request.rec_ch_y), (1, 2));
                assert_eq!(request.polar_mode, PolarMode::Dynamic);
                assert_eq!(request.colormap, Colormap::Hot);
                assert_eq!(request.chunk_duration, 0.1);
            }
            other => panic!("unexpected effects {:?}", other),
        }
        assert_eq!(viewer.snapshot().speed, 10.0);
    }
}
