//! One page controller for every audio domain.
//!
//! `SignalController` is sans-IO: operations return [`Effect`]s for a driver
//! to execute, and the driver hands results back through [`Feedback`].
//! Every effect carries the ticket or generation it was issued under, so a
//! result that outlived its state is recognised and dropped.

use crate::config::ControllerConfig;
use crate::intake::UploadIntake;
use crate::pipeline::{
    ChunkOutcome, ChunkTicket, ComparisonOrchestrator, PlaybackEngine, RecomputeTicket,
    SettleTimer,
};
use crate::prelude::{
    AnalysisResult, ChunkResponse, DashResult, DashboardError, DerivedSignal, RawFile,
    SignalFamily, Source, ViewerSlot, ZoomRange,
};
use crate::presentation::{project, ComparisonSnapshot, DashboardSnapshot, ViewerFrame};
use crate::telemetry::{LogManager, MetricsRecorder, RequestKind};
use std::sync::Arc;

/// Side effect requested by the controller.
#[derive(Debug, Clone)]
pub enum Effect {
    Analyze { generation: u64, source: Source },
    FetchChunk(ChunkTicket),
    Resample {
        ticket: RecomputeTicket<u32>,
        source: Source,
    },
    ArmSettleTimer(SettleTimer),
}

#[derive(Debug, Clone)]
pub enum Completion {
    Analyzed {
        generation: u64,
        result: DashResult<AnalysisResult>,
    },
    Chunk {
        ticket: ChunkTicket,
        result: DashResult<ChunkResponse>,
    },
    Resampled {
        ticket: RecomputeTicket<u32>,
        result: DashResult<DerivedSignal>,
    },
}

/// What a driver reports back after executing an [`Effect`].
#[derive(Debug, Clone)]
pub enum Feedback {
    Completed(Completion),
    Settled(u64),
}

pub struct SignalController {
    config: ControllerConfig,
    intake: UploadIntake,
    primary: PlaybackEngine,
    comparison: ComparisonOrchestrator,
    analysis_generation: u64,
    analyzing: bool,
    last_error: Option<DashboardError>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl SignalController {
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_metrics(config, Arc::new(MetricsRecorder::new()))
    }

    pub fn with_metrics(config: ControllerConfig, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            intake: UploadIntake::new(SignalFamily::Audio),
            primary: PlaybackEngine::new(ViewerSlot::Primary, metrics.clone()),
            comparison: ComparisonOrchestrator::new(config.clone(), metrics.clone()),
            config,
            analysis_generation: 0,
            analyzing: false,
            last_error: None,
            metrics,
            logger: LogManager::default(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Takes a new upload. On success everything derived from the previous
    /// source is discarded and the initial analysis is requested.
    pub fn accept(&mut self, raw: RawFile) -> DashResult<Vec<Effect>> {
        let source = match self.intake.accept(raw) {
            Ok(source) => source,
            Err(err) => {
                self.logger.warn(&format!("{}", err));
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };
        self.logger.record(&format!("accepted {}", source.name()));
        self.reset_derived();
        self.analyze()
    }

    /// Requests analysis of the current source.
    pub fn analyze(&mut self) -> DashResult<Vec<Effect>> {
        let source = self
            .intake
            .current()
            .cloned()
            .ok_or_else(|| DashboardError::NotReady("no source uploaded".into()))?;
        self.analysis_generation += 1;
        self.analyzing = true;
        self.metrics.record_issued(RequestKind::Analyze);
        Ok(vec![Effect::Analyze {
            generation: self.analysis_generation,
            source,
        }])
    }

    fn reset_derived(&mut self) {
        self.analysis_generation += 1;
        self.analyzing = false;
        self.primary.clear();
        self.comparison.reset();
        self.last_error = None;
    }

    fn engine_mut(&mut self, slot: ViewerSlot) -> Option<&mut PlaybackEngine> {
        match slot {
            ViewerSlot::Primary => Some(&mut self.primary),
            other => self.comparison.engine_mut(other),
        }
    }

    pub fn start(&mut self, slot: ViewerSlot) -> bool {
        self.engine_mut(slot)
            .map(|engine| engine.start())
            .unwrap_or(false)
    }

    pub fn pause(&mut self, slot: ViewerSlot) {
        if let Some(engine) = self.engine_mut(slot) {
            engine.pause();
        }
    }

    pub fn restart(&mut self, slot: ViewerSlot) {
        if let Some(engine) = self.engine_mut(slot) {
            engine.restart();
        }
    }

    /// One cadence step: at most one chunk poll per engine.
    pub fn tick(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        for slot in [ViewerSlot::Primary, ViewerSlot::Secondary, ViewerSlot::Anchor] {
            if let Some(ticket) = self.engine_mut(slot).and_then(|engine| engine.tick()) {
                effects.push(Effect::FetchChunk(ticket));
            }
        }
        effects
    }

    pub fn enable_comparison(&mut self) -> DashResult<Vec<Effect>> {
        let ticket = self.comparison.enable(None)?;
        Ok(self.resample_effect(ticket))
    }

    pub fn disable_comparison(&mut self) {
        self.comparison.disable();
    }

    pub fn on_slider_change(&mut self, value: u32) -> Vec<Effect> {
        self.comparison
            .on_slider_change(value)
            .map(Effect::ArmSettleTimer)
            .into_iter()
            .collect()
    }

    pub fn on_timer(&mut self, token: u64) -> Vec<Effect> {
        let ticket = self.comparison.on_timer(token);
        self.resample_effect(ticket)
    }

    fn resample_effect(&self, ticket: Option<RecomputeTicket<u32>>) -> Vec<Effect> {
        let base = self.comparison.resample_base();
        match (ticket, base) {
            (Some(ticket), Some(base)) => vec![Effect::Resample {
                ticket,
                source: base.source.clone(),
            }],
            _ => Vec::new(),
        }
    }

    /// Last writer wins; every viewer renders against the same range.
    pub fn set_zoom(&mut self, zoom: Option<ZoomRange>) {
        self.comparison.set_zoom(zoom);
    }

    pub fn move_carousel(&mut self, delta: isize) -> bool {
        self.comparison.move_carousel(delta)
    }

    /// Adds a signal derived from `base`. A variant computed from a source
    /// that has since been replaced is refused.
    pub fn attach_variant(
        &mut self,
        label: impl Into<String>,
        base: &Source,
        derived: DerivedSignal,
    ) -> DashResult<Vec<Effect>> {
        let label = label.into();
        if !self.intake.current().is_some_and(|current| current.same_as(base)) {
            self.logger
                .warn(&format!("dropped variant {} of a replaced source", label));
            return Err(DashboardError::NotReady(format!(
                "{} was computed from a source that is no longer loaded",
                label
            )));
        }
        let ticket = self.comparison.attach_variant(label, derived)?;
        Ok(self.resample_effect(ticket))
    }

    pub fn feed(&mut self, feedback: Feedback) -> Vec<Effect> {
        match feedback {
            Feedback::Completed(completion) => self.complete(completion),
            Feedback::Settled(token) => self.on_timer(token),
        }
    }

    pub fn complete(&mut self, completion: Completion) -> Vec<Effect> {
        match completion {
            Completion::Analyzed { generation, result } => {
                self.complete_analysis(generation, result);
                Vec::new()
            }
            Completion::Chunk { ticket, result } => {
                let outcome = match self.engine_mut(ticket.slot) {
                    Some(engine) => engine.complete(&ticket, result),
                    None => {
                        self.metrics.record_stale(RequestKind::Chunk);
                        ChunkOutcome::Stale
                    }
                };
                if let ChunkOutcome::Failed(err) = outcome {
                    self.last_error = Some(err);
                }
                Vec::new()
            }
            Completion::Resampled { ticket, result } => {
                let outcome = self.comparison.resolve(ticket, result);
                if let Some(err) = outcome.error {
                    self.last_error = Some(err);
                }
                self.resample_effect(outcome.next)
            }
        }
    }

    fn complete_analysis(&mut self, generation: u64, result: DashResult<AnalysisResult>) {
        if generation != self.analysis_generation {
            self.metrics.record_stale(RequestKind::Analyze);
            return;
        }
        self.analyzing = false;
        let source = match self.intake.current() {
            Some(source) => source.clone(),
            None => return,
        };
        match result {
            Ok(analysis) => {
                self.logger.record(&format!(
                    "analysis {} ready: {} Hz, {:.2} s",
                    analysis.analysis_id, analysis.sample_rate, analysis.duration_seconds
                ));
                self.metrics.record_applied(RequestKind::Analyze);
                let analysis = Arc::new(analysis);
                self.primary.load(analysis.clone());
                self.comparison.set_original(source, analysis);
                self.last_error = None;
            }
            Err(err) => {
                self.logger.warn(&format!("{}", err));
                self.metrics.record_failed(RequestKind::Analyze);
                self.last_error = Some(err);
            }
        }
    }

    /// Drops the source and everything derived from it.
    pub fn teardown(&mut self) {
        self.intake.teardown();
        self.reset_derived();
    }

    /// Viewers currently on screen, left to right.
    pub fn frames(&self) -> Vec<ViewerFrame<'_>> {
        let zoom = self.comparison.zoom();
        let mut frames = Vec::with_capacity(2);
        match self.comparison.displayed_pair() {
            Some((left, _)) => {
                let left_engine = if left == 0 {
                    &self.primary
                } else {
                    self.comparison.anchor()
                };
                let left_slot = left_engine.slot();
                frames.extend(project(left_engine, self.label_for(left_slot), zoom));
                frames.extend(project(
                    self.comparison.secondary(),
                    self.label_for(ViewerSlot::Secondary),
                    zoom,
                ));
            }
            None => frames.extend(project(
                &self.primary,
                self.label_for(ViewerSlot::Primary),
                zoom,
            )),
        }
        frames
    }

    fn label_for(&self, slot: ViewerSlot) -> &str {
        self.comparison.label_for(slot).unwrap_or("Original")
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let rate = self.comparison.original_rate();
        DashboardSnapshot {
            source_name: self.intake.current().map(|source| source.name().to_string()),
            analyzing: self.analyzing,
            frames: self.frames().iter().map(|frame| frame.to_snapshot()).collect(),
            comparison: ComparisonSnapshot {
                enabled: self.comparison.is_enabled(),
                slider_value: self.comparison.slider_value(),
                committed_value: self.comparison.committed_value(),
                slider_min: self.config.slider_min,
                slider_max: self.config.slider_ceiling(rate),
                slider_step: self.config.slider_step,
                cursor: self.comparison.cursor(),
                members: self
                    .comparison
                    .members()
                    .iter()
                    .map(|member| member.label.clone())
                    .collect(),
                recomputing: self.comparison.is_recomputing(),
                error: self.comparison.recompute_error().cloned(),
            },
            zoom: self.comparison.zoom(),
            last_error: self.last_error.clone(),
            metrics: self.metrics.snapshot(),
        }
    }

    pub fn last_error(&self) -> Option<&DashboardError> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
        self.comparison.dismiss_error();
    }

    pub fn primary(&self) -> &PlaybackEngine {
        &self.primary
    }

    pub fn comparison(&self) -> &ComparisonOrchestrator {
        &self.comparison
    }

    pub fn source(&self) -> Option<&Source> {
        self.intake.current()
    }
}
