use crate::prelude::{AnalysisResult, ChunkResponse, DashResult, DashboardError, ViewerSlot, WaveformWindow};
use crate::telemetry::{LogManager, MetricsRecorder, RequestKind};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Error(DashboardError),
}

/// Position and play flag as seen by the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub position: f64,
    pub is_playing: bool,
}

/// One chunk poll, stamped with the generation it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkTicket {
    pub slot: ViewerSlot,
    pub generation: u64,
    pub analysis_id: String,
    pub position: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Advanced { position: f64 },
    Completed,
    Failed(DashboardError),
    /// Issued under an older generation; nothing was applied.
    Stale,
}

/// Streams display windows for one analysis result.
///
/// The engine never performs I/O. `tick` hands out at most one
/// [`ChunkTicket`] at a time and `complete` applies its response; a ticket
/// from before the last `load`/`pause`/`restart` is dropped on arrival.
pub struct PlaybackEngine {
    slot: ViewerSlot,
    analysis: Option<Arc<AnalysisResult>>,
    window: WaveformWindow,
    position: f64,
    status: PlaybackStatus,
    generation: u64,
    outstanding: Option<u64>,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl PlaybackEngine {
    pub fn new(slot: ViewerSlot, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            slot,
            analysis: None,
            window: WaveformWindow::empty(),
            position: 0.0,
            status: PlaybackStatus::Stopped,
            generation: 0,
            outstanding: None,
            logger: LogManager::new(slot.label()),
            metrics,
        }
    }

    /// Binds a new result; always lands in `Stopped` at position 0.
    pub fn load(&mut self, analysis: Arc<AnalysisResult>) {
        self.logger
            .trace(&format!("loading analysis {}", analysis.analysis_id));
        self.window = analysis.initial_waveform.clone();
        self.analysis = Some(analysis);
        self.position = 0.0;
        self.status = PlaybackStatus::Stopped;
        self.invalidate();
    }

    pub fn clear(&mut self) {
        self.analysis = None;
        self.window = WaveformWindow::empty();
        self.position = 0.0;
        self.status = PlaybackStatus::Stopped;
        self.invalidate();
    }

    /// Returns false when there is nothing to play or playback already runs.
    pub fn start(&mut self) -> bool {
        if self.analysis.is_none() || self.is_playing() {
            return false;
        }
        self.status = PlaybackStatus::Playing;
        self.logger
            .trace(&format!("playing from position {}", self.position));
        true
    }

    /// Stops streaming but keeps the position so `start` resumes from it.
    pub fn pause(&mut self) {
        if self.is_playing() {
            self.status = PlaybackStatus::Stopped;
            self.invalidate();
        }
    }

    pub fn restart(&mut self) {
        self.status = PlaybackStatus::Stopped;
        self.position = 0.0;
        self.window = self
            .analysis
            .as_ref()
            .map(|analysis| analysis.initial_waveform.clone())
            .unwrap_or_default();
        self.invalidate();
    }

    /// Next poll, if playing and the previous poll has resolved.
    pub fn tick(&mut self) -> Option<ChunkTicket> {
        if !self.is_playing() || self.outstanding.is_some() {
            return None;
        }
        let analysis = self.analysis.as_ref()?;
        self.outstanding = Some(self.generation);
        self.metrics.record_issued(RequestKind::Chunk);
        Some(ChunkTicket {
            slot: self.slot,
            generation: self.generation,
            analysis_id: analysis.analysis_id.clone(),
            position: self.position,
        })
    }

    pub fn complete(
        &mut self,
        ticket: &ChunkTicket,
        result: DashResult<ChunkResponse>,
    ) -> ChunkOutcome {
        if self.outstanding == Some(ticket.generation) {
            self.outstanding = None;
        }
        if ticket.generation != self.generation || !self.is_playing() {
            self.metrics.record_stale(RequestKind::Chunk);
            return ChunkOutcome::Stale;
        }

        match result {
            Ok(ChunkResponse::Window {
                window,
                new_position,
            }) => {
                self.window = window;
                self.position = new_position.max(0.0);
                self.metrics.record_applied(RequestKind::Chunk);
                ChunkOutcome::Advanced {
                    position: self.position,
                }
            }
            Ok(ChunkResponse::Completed) => {
                self.logger.trace("stream completed");
                self.metrics.record_applied(RequestKind::Chunk);
                self.restart();
                ChunkOutcome::Completed
            }
            Err(err) => {
                self.logger.warn(&format!("chunk fetch failed: {}", err));
                self.metrics.record_failed(RequestKind::Chunk);
                self.status = PlaybackStatus::Error(err.clone());
                self.invalidate();
                ChunkOutcome::Failed(err)
            }
        }
    }

    fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn slot(&self) -> ViewerSlot {
        self.slot
    }

    pub fn analysis(&self) -> Option<&Arc<AnalysisResult>> {
        self.analysis.as_ref()
    }

    pub fn window(&self) -> &WaveformWindow {
        &self.window
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            position: self.position,
            is_playing: self.is_playing(),
        }
    }
}
