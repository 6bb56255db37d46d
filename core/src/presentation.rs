//! Render-ready projection of the controller state.
//!
//! Nothing here owns state: frames borrow from the engines and are rebuilt
//! on every change. [`DashboardSnapshot`] is the owned copy published to
//! views that live on another task.

use crate::pipeline::{PlaybackEngine, PlaybackState, PlaybackStatus};
use crate::prelude::{AnalysisResult, DashboardError, Spectrogram, ViewerSlot, WaveformWindow, ZoomRange};
use crate::telemetry::MetricsSnapshot;
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ViewerFrame<'a> {
    pub slot: ViewerSlot,
    pub label: &'a str,
    pub window: &'a WaveformWindow,
    pub analysis: &'a Arc<AnalysisResult>,
    pub zoom: Option<ZoomRange>,
    pub playback: PlaybackState,
    pub status: &'a PlaybackStatus,
}

impl<'a> ViewerFrame<'a> {
    pub fn time(&self) -> &'a [f64] {
        self.window.time()
    }

    pub fn amplitude(&self) -> &'a [f32] {
        self.window.amplitude()
    }

    pub fn spectrogram(&self) -> Option<&'a Spectrogram> {
        self.analysis.spectrogram.as_ref()
    }

    pub fn prediction(&self) -> Option<(&'a str, Option<f32>)> {
        self.analysis
            .predicted_label
            .as_deref()
            .map(|label| (label, self.analysis.confidence))
    }

    /// Sample indices that fall inside the zoom window; everything without zoom.
    pub fn visible_range(&self) -> Range<usize> {
        visible_range(self.window.time(), self.zoom)
    }

    pub fn to_snapshot(&self) -> ViewerSnapshot {
        ViewerSnapshot {
            slot: self.slot,
            label: self.label.to_string(),
            window: self.window.clone(),
            analysis: Arc::clone(self.analysis),
            zoom: self.zoom,
            playback: self.playback,
            status: self.status.clone(),
        }
    }
}

/// Projects one engine. `None` until the engine has a result bound.
pub fn project<'a>(
    engine: &'a PlaybackEngine,
    label: &'a str,
    zoom: Option<ZoomRange>,
) -> Option<ViewerFrame<'a>> {
    let analysis = engine.analysis()?;
    Some(ViewerFrame {
        slot: engine.slot(),
        label,
        window: engine.window(),
        analysis,
        zoom,
        playback: engine.state(),
        status: engine.status(),
    })
}

pub fn visible_range(time: &[f64], zoom: Option<ZoomRange>) -> Range<usize> {
    match zoom {
        Some(zoom) => {
            let start = time.partition_point(|&t| t < zoom.low);
            let end = time.partition_point(|&t| t <= zoom.high);
            start..end.max(start)
        }
        None => 0..time.len(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSnapshot {
    pub slot: ViewerSlot,
    pub label: String,
    pub window: WaveformWindow,
    pub analysis: Arc<AnalysisResult>,
    pub zoom: Option<ZoomRange>,
    pub playback: PlaybackState,
    pub status: PlaybackStatus,
}

impl ViewerSnapshot {
    pub fn visible_range(&self) -> Range<usize> {
        visible_range(self.window.time(), self.zoom)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonSnapshot {
    pub enabled: bool,
    pub slider_value: u32,
    pub committed_value: Option<u32>,
    pub slider_min: u32,
    pub slider_max: u32,
    pub slider_step: u32,
    pub cursor: usize,
    pub members: Vec<String>,
    pub recomputing: bool,
    pub error: Option<DashboardError>,
}

impl ComparisonSnapshot {
    pub fn can_move(&self, delta: isize) -> bool {
        if !self.enabled || self.members.len() < 2 {
            return false;
        }
        let target = self.cursor as isize + delta;
        target >= 0 && target <= (self.members.len() - 2) as isize
    }
}

/// Everything a view needs for one redraw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub source_name: Option<String>,
    pub analyzing: bool,
    pub frames: Vec<ViewerSnapshot>,
    pub comparison: ComparisonSnapshot,
    pub zoom: Option<ZoomRange>,
    pub last_error: Option<DashboardError>,
    pub metrics: MetricsSnapshot,
}

impl DashboardSnapshot {
    pub fn frame(&self, slot: ViewerSlot) -> Option<&ViewerSnapshot> {
        self.frames.iter().find(|frame| frame.slot == slot)
    }
}
