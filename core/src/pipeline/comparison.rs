use crate::config::ControllerConfig;
use crate::pipeline::debounce::{DebouncePipeline, RecomputeTicket, SettleTimer};
use crate::pipeline::playback::PlaybackEngine;
use crate::prelude::{
    AnalysisResult, DashResult, DashboardError, DerivedSignal, Source, ViewerSlot, ZoomRange,
};
use crate::telemetry::{LogManager, MetricsRecorder, RequestKind};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Original,
    Derived,
    Resampled { rate: u32 },
}

/// One comparable signal of the set. Members are never mutated, only
/// replaced wholesale.
#[derive(Debug, Clone)]
pub struct ComparisonMember {
    pub label: String,
    pub kind: MemberKind,
    pub source: Source,
    pub analysis: Arc<AnalysisResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeOutcome {
    pub applied: bool,
    pub error: Option<DashboardError>,
    pub next: Option<RecomputeTicket<u32>>,
}

/// Keeps the ordered set `[original, derived.., resampled?]` and the
/// viewers bound to the pair under the carousel cursor.
///
/// The left viewer of pair 0 is the page's primary engine, which lives
/// outside the orchestrator; any other left member is played by `anchor`.
pub struct ComparisonOrchestrator {
    enabled: bool,
    members: Vec<ComparisonMember>,
    cursor: usize,
    pipeline: DebouncePipeline<u32>,
    secondary: PlaybackEngine,
    anchor: PlaybackEngine,
    zoom: Option<ZoomRange>,
    recompute_error: Option<DashboardError>,
    config: ControllerConfig,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl ComparisonOrchestrator {
    pub fn new(config: ControllerConfig, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            enabled: false,
            members: Vec::new(),
            cursor: 0,
            pipeline: DebouncePipeline::new(config.default_resample_rate, config.settle_delay()),
            secondary: PlaybackEngine::new(ViewerSlot::Secondary, metrics.clone()),
            anchor: PlaybackEngine::new(ViewerSlot::Anchor, metrics.clone()),
            zoom: None,
            recompute_error: None,
            config,
            logger: LogManager::new("comparison"),
            metrics,
        }
    }

    /// Drops every member and every derived view state.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.members.clear();
        self.cursor = 0;
        self.pipeline.cancel();
        self.secondary.clear();
        self.anchor.clear();
        self.zoom = None;
        self.recompute_error = None;
    }

    pub fn set_original(&mut self, source: Source, analysis: Arc<AnalysisResult>) {
        self.reset();
        self.members.push(ComparisonMember {
            label: "Original".into(),
            kind: MemberKind::Original,
            source,
            analysis,
        });
    }

    /// Adds a derived signal ahead of the resampled slot. While comparison
    /// runs, the resample base moves to the new member and a recompute
    /// against it is requested.
    pub fn attach_variant(
        &mut self,
        label: impl Into<String>,
        derived: DerivedSignal,
    ) -> DashResult<Option<RecomputeTicket<u32>>> {
        if self.members.is_empty() {
            return Err(DashboardError::NotReady(
                "analyze the original signal before attaching variants".into(),
            ));
        }
        let member = ComparisonMember {
            label: label.into(),
            kind: MemberKind::Derived,
            source: derived.source,
            analysis: Arc::new(derived.analysis),
        };
        self.logger.record(&format!("attached variant {}", member.label));
        match self.resampled_index() {
            Some(index) => self.members.insert(index, member),
            None => self.members.push(member),
        }
        if !self.enabled {
            return Ok(None);
        }
        self.rebind();
        let value = self.pipeline.slider_value();
        self.pipeline.cancel();
        let ticket = self.pipeline.commit_now(value);
        Ok(self.issue(ticket))
    }

    /// Turns comparison on. `initial` overrides the seeded rate; the first
    /// recompute is requested right away.
    pub fn enable(&mut self, initial: Option<u32>) -> DashResult<Option<RecomputeTicket<u32>>> {
        let rate = self
            .original_rate()
            .ok_or_else(|| DashboardError::NotReady("no analysed signal to compare".into()))?;
        if self.enabled {
            return Ok(None);
        }
        self.enabled = true;
        self.recompute_error = None;
        self.cursor = 0;
        let seed = match initial {
            Some(value) => self.config.snap_rate(value, Some(rate)),
            None => self.config.initial_resample_rate(Some(rate)),
        };
        self.logger
            .record(&format!("comparison enabled at {} Hz", seed));
        self.rebind();
        let ticket = self.pipeline.commit_now(seed);
        Ok(self.issue(ticket))
    }

    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.pipeline.cancel();
        self.members
            .retain(|member| !matches!(member.kind, MemberKind::Resampled { .. }));
        self.cursor = 0;
        self.secondary.clear();
        self.anchor.clear();
        self.zoom = None;
        self.recompute_error = None;
        self.logger.record("comparison disabled");
    }

    pub fn on_slider_change(&mut self, value: u32) -> Option<SettleTimer> {
        if !self.enabled {
            return None;
        }
        let snapped = self.config.snap_rate(value, self.original_rate());
        Some(self.pipeline.on_slider_change(snapped))
    }

    pub fn on_timer(&mut self, token: u64) -> Option<RecomputeTicket<u32>> {
        let ticket = self.pipeline.on_timer(token);
        self.issue(ticket)
    }

    fn issue(&self, ticket: Option<RecomputeTicket<u32>>) -> Option<RecomputeTicket<u32>> {
        if let Some(ticket) = &ticket {
            self.metrics.record_issued(RequestKind::Recompute);
            self.logger
                .trace(&format!("recompute at {} Hz", ticket.value));
        }
        ticket
    }

    /// Signal the next recompute runs against: the last member that is not
    /// itself a resampled rendition.
    pub fn resample_base(&self) -> Option<&ComparisonMember> {
        self.members
            .iter()
            .rev()
            .find(|member| !matches!(member.kind, MemberKind::Resampled { .. }))
    }

    pub fn resolve(
        &mut self,
        ticket: RecomputeTicket<u32>,
        result: DashResult<DerivedSignal>,
    ) -> RecomputeOutcome {
        let resolution = self.pipeline.resolve(ticket, result.is_ok());
        let next = self.issue(resolution.next);
        if !resolution.apply || !self.enabled {
            self.metrics.record_stale(RequestKind::Recompute);
            return RecomputeOutcome {
                applied: false,
                error: None,
                next,
            };
        }

        match result {
            Ok(derived) => {
                let mut analysis = derived.analysis;
                if analysis.original_rate.is_none() {
                    analysis.original_rate =
                        self.resample_base().map(|base| base.analysis.sample_rate);
                }
                let member = ComparisonMember {
                    label: format!("Resampled {} Hz", ticket.value),
                    kind: MemberKind::Resampled { rate: ticket.value },
                    source: derived.source,
                    analysis: Arc::new(analysis),
                };
                match self.resampled_index() {
                    Some(index) => self.members[index] = member,
                    None => self.members.push(member),
                }
                self.recompute_error = None;
                self.metrics.record_applied(RequestKind::Recompute);
                self.rebind();
                RecomputeOutcome {
                    applied: true,
                    error: None,
                    next,
                }
            }
            Err(err) => {
                let err = as_recompute_error(err);
                self.logger.warn(&format!("{}", err));
                self.metrics.record_failed(RequestKind::Recompute);
                self.recompute_error = Some(err.clone());
                RecomputeOutcome {
                    applied: false,
                    error: Some(err),
                    next,
                }
            }
        }
    }

    /// Moves the cursor by `delta` pairs, clamped to the set. Returns true
    /// if the displayed pair changed.
    pub fn move_carousel(&mut self, delta: isize) -> bool {
        if self.members.len() < 2 {
            return false;
        }
        let last = (self.members.len() - 2) as isize;
        let target = (self.cursor as isize + delta).clamp(0, last) as usize;
        if target == self.cursor {
            return false;
        }
        self.cursor = target;
        self.rebind();
        true
    }

    /// Loads the pair under the cursor into the viewers that show it. An
    /// engine whose member did not change is left untouched.
    fn rebind(&mut self) {
        self.cursor = self.cursor.min(self.members.len().saturating_sub(2));
        if !self.enabled || self.members.len() < 2 {
            self.secondary.clear();
            self.anchor.clear();
            return;
        }
        let left = self.members[self.cursor].analysis.clone();
        let right = self.members[self.cursor + 1].analysis.clone();
        if self.cursor == 0 {
            self.anchor.clear();
        } else if !bound_to(&self.anchor, &left) {
            self.anchor.load(left);
        }
        if !bound_to(&self.secondary, &right) {
            self.secondary.load(right);
        }
    }

    fn resampled_index(&self) -> Option<usize> {
        self.members
            .iter()
            .position(|member| matches!(member.kind, MemberKind::Resampled { .. }))
    }

    pub fn set_zoom(&mut self, zoom: Option<ZoomRange>) {
        self.zoom = zoom;
    }

    pub fn zoom(&self) -> Option<ZoomRange> {
        self.zoom
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn members(&self) -> &[ComparisonMember] {
        &self.members
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn displayed_pair(&self) -> Option<(usize, usize)> {
        (self.enabled && self.members.len() >= 2).then(|| (self.cursor, self.cursor + 1))
    }

    pub fn original_rate(&self) -> Option<u32> {
        self.members.first().map(|member| member.analysis.sample_rate)
    }

    pub fn slider_value(&self) -> u32 {
        self.pipeline.slider_value()
    }

    pub fn committed_value(&self) -> Option<u32> {
        self.pipeline.committed_value()
    }

    pub fn is_recomputing(&self) -> bool {
        self.pipeline.is_pending() || self.pipeline.is_in_flight()
    }

    pub fn recompute_error(&self) -> Option<&DashboardError> {
        self.recompute_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.recompute_error = None;
    }

    pub fn secondary(&self) -> &PlaybackEngine {
        &self.secondary
    }

    pub fn anchor(&self) -> &PlaybackEngine {
        &self.anchor
    }

    /// Engine for `slot`; the primary engine is not owned here.
    pub fn engine_mut(&mut self, slot: ViewerSlot) -> Option<&mut PlaybackEngine> {
        match slot {
            ViewerSlot::Secondary => Some(&mut self.secondary),
            ViewerSlot::Anchor => Some(&mut self.anchor),
            ViewerSlot::Primary => None,
        }
    }

    pub fn label_for(&self, slot: ViewerSlot) -> Option<&str> {
        let index = match slot {
            ViewerSlot::Primary => 0,
            ViewerSlot::Anchor => self.cursor,
            ViewerSlot::Secondary => self.cursor + 1,
        };
        self.members.get(index).map(|member| member.label.as_str())
    }
}

fn bound_to(engine: &PlaybackEngine, analysis: &Arc<AnalysisResult>) -> bool {
    engine
        .analysis()
        .map(|bound| Arc::ptr_eq(bound, analysis))
        .unwrap_or(false)
}

fn as_recompute_error(err: DashboardError) -> DashboardError {
    match err {
        DashboardError::AnalysisFailed { cause } | DashboardError::ChunkFetchFailed { cause } => {
            DashboardError::recompute(cause)
        }
        DashboardError::RecomputeFailed { .. } => err,
        other => DashboardError::recompute(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::{RawFile, SignalFamily, WaveformWindow};
    use crate::intake::UploadIntake;

    fn result(id: &str, rate: u32) -> AnalysisResult {
        AnalysisResult {
            analysis_id: id.into(),
            predicted_label: None,
            confidence: None,
            initial_waveform: WaveformWindow::new(vec![0.0, 0.1], vec![0.0, 0.5]).unwrap(),
            spectrogram: None,
            sample_rate: rate,
            duration_seconds: 4.0,
            original_rate: None,
        }
    }

    fn source(name: &str) -> Source {
        UploadIntake::new(SignalFamily::Audio)
            .accept(RawFile::new(name, "audio/wav", vec![0; 8]))
            .unwrap()
    }

    fn derived(id: &str, rate: u32) -> DerivedSignal {
        DerivedSignal {
            source: source(&format!("{}.wav", id)),
            analysis: result(id, rate),
        }
    }

    fn orchestrator() -> ComparisonOrchestrator {
        let mut orchestrator =
            ComparisonOrchestrator::new(ControllerConfig::default(), Arc::new(MetricsRecorder::new()));
        orchestrator.set_original(source("clip.wav"), Arc::new(result("orig", 48_000)));
        orchestrator
    }

    #[test]
    fn enable_requires_an_original() {
        let mut orchestrator =
            ComparisonOrchestrator::new(ControllerConfig::default(), Arc::new(MetricsRecorder::new()));
        assert!(matches!(
            orchestrator.enable(None),
            Err(DashboardError::NotReady(_))
        ));
        assert!(!orchestrator.is_enabled());
    }

    #[test]
    fn enable_seeds_default_rate_and_recomputes_immediately() {
        let mut orchestrator = orchestrator();
        let ticket = orchestrator.enable(None).unwrap().unwrap();
        assert_eq!(ticket.value, 16_000);
        assert_eq!(orchestrator.committed_value(), Some(16_000));
        assert!(orchestrator.enable(None).unwrap().is_none());
    }

    #[test]
    fn resolved_recompute_becomes_secondary_member() {
        let mut orchestrator = orchestrator();
        let ticket = orchestrator.enable(None).unwrap().unwrap();
        let outcome = orchestrator.resolve(ticket, Ok(derived("down", 16_000)));

        assert!(outcome.applied);
        assert_eq!(orchestrator.members().len(), 2);
        assert_eq!(orchestrator.displayed_pair(), Some((0, 1)));
        let bound = orchestrator.secondary().analysis().unwrap();
        assert_eq!(bound.analysis_id, "down");
        assert_eq!(bound.original_rate, Some(48_000));
    }

    #[test]
    fn recompute_failure_keeps_comparison_enabled() {
        let mut orchestrator = orchestrator();
        let ticket = orchestrator.enable(None).unwrap().unwrap();
        let outcome = orchestrator.resolve(ticket, Err(DashboardError::analysis("503")));

        assert_eq!(outcome.error, Some(DashboardError::recompute("503")));
        assert!(orchestrator.is_enabled());
        assert!(orchestrator.recompute_error().is_some());
        assert_eq!(orchestrator.members().len(), 1);
    }

    #[test]
    fn disable_drops_resampled_member_and_late_result() {
        let mut orchestrator = orchestrator();
        let first = orchestrator.enable(None).unwrap().unwrap();
        orchestrator.resolve(first, Ok(derived("down", 16_000)));
        orchestrator.set_zoom(Some(ZoomRange::new(0.5, 1.5)));

        let timer = orchestrator.on_slider_change(8_000).unwrap();
        let in_flight = orchestrator.on_timer(timer.token).unwrap();
        orchestrator.disable();

        assert_eq!(orchestrator.members().len(), 1);
        assert!(orchestrator.zoom().is_none());
        assert!(orchestrator.secondary().analysis().is_none());

        let outcome = orchestrator.resolve(in_flight, Ok(derived("late", 8_000)));
        assert!(!outcome.applied);
        assert_eq!(orchestrator.members().len(), 1);
    }

    #[test]
    fn slider_is_clamped_to_original_rate() {
        let mut orchestrator = ComparisonOrchestrator::new(
            ControllerConfig::default(),
            Arc::new(MetricsRecorder::new()),
        );
        orchestrator.set_original(source("clip.wav"), Arc::new(result("orig", 22_050)));
        let ticket = orchestrator.enable(None).unwrap().unwrap();
        assert_eq!(ticket.value, 16_000);

        orchestrator.on_slider_change(44_100);
        assert_eq!(orchestrator.slider_value(), 22_000);
    }

    #[test]
    fn carousel_moves_without_dropping_members() {
        let mut orchestrator = orchestrator();
        orchestrator
            .attach_variant("Doppler", derived("doppler", 48_000))
            .unwrap();
        let ticket = orchestrator.enable(None).unwrap().unwrap();
        assert_eq!(orchestrator.resample_base().unwrap().label, "Doppler");
        orchestrator.resolve(ticket, Ok(derived("down", 16_000)));
        assert_eq!(orchestrator.members().len(), 3);

        assert_eq!(
            orchestrator.secondary().analysis().unwrap().analysis_id,
            "doppler"
        );
        assert!(orchestrator.move_carousel(1));
        assert_eq!(orchestrator.displayed_pair(), Some((1, 2)));
        assert_eq!(
            orchestrator.anchor().analysis().unwrap().analysis_id,
            "doppler"
        );
        assert_eq!(
            orchestrator.secondary().analysis().unwrap().analysis_id,
            "down"
        );
        assert!(!orchestrator.move_carousel(5));
        assert!(orchestrator.move_carousel(-1));
        assert!(orchestrator.anchor().analysis().is_none());
        assert_eq!(orchestrator.members().len(), 3);
    }

    #[test]
    fn attaching_variant_while_enabled_rebases_recompute() {
        let mut orchestrator = orchestrator();
        let first = orchestrator.enable(None).unwrap().unwrap();
        orchestrator.resolve(first, Ok(derived("down", 16_000)));

        let ticket = orchestrator
            .attach_variant("Doppler", derived("doppler", 48_000))
            .unwrap()
            .unwrap();
        assert_eq!(ticket.value, 16_000);
        assert_eq!(orchestrator.members()[1].label, "Doppler");
        assert!(matches!(
            orchestrator.members()[2].kind,
            MemberKind::Resampled { rate: 16_000 }
        ));
    }
}
