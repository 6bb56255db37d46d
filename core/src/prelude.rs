use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::future::Future;

pub use crate::intake::{RawFile, SignalFamily, Source, SourceHandle};

/// Error taxonomy shared by every pipeline of the controller.
///
/// Errors are plain values: they are cloned into controller state so the
/// view can surface them, and none of them is fatal to the dashboard.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    #[error("invalid file type for {name}: got '{media_type}', expected {expected} input")]
    InvalidFileType {
        name: String,
        media_type: String,
        expected: SignalFamily,
    },
    #[error("analysis failed: {cause}")]
    AnalysisFailed { cause: String },
    #[error("chunk fetch failed: {cause}")]
    ChunkFetchFailed { cause: String },
    #[error("recompute failed: {cause}")]
    RecomputeFailed { cause: String },
    #[error("not ready: {0}")]
    NotReady(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("dashboard runtime has stopped")]
    RuntimeClosed,
}

impl DashboardError {
    pub fn analysis(cause: impl ToString) -> Self {
        Self::AnalysisFailed {
            cause: cause.to_string(),
        }
    }

    pub fn chunk(cause: impl ToString) -> Self {
        Self::ChunkFetchFailed {
            cause: cause.to_string(),
        }
    }

    pub fn recompute(cause: impl ToString) -> Self {
        Self::RecomputeFailed {
            cause: cause.to_string(),
        }
    }
}

pub type DashResult<T> = Result<T, DashboardError>;

/// Rejections raised while building a [`WaveformWindow`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    #[error("time has {time} points but amplitude has {amplitude}")]
    LengthMismatch { time: usize, amplitude: usize },
    #[error("time decreases at index {index}")]
    NonMonotonic { index: usize },
}

/// Paired time/amplitude arrays for one display window.
///
/// Both arrays always have the same length and `time` never decreases.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaveformWindow {
    time: Vec<f64>,
    amplitude: Vec<f32>,
}

impl WaveformWindow {
    pub fn new(time: Vec<f64>, amplitude: Vec<f32>) -> Result<Self, WindowError> {
        if time.len() != amplitude.len() {
            return Err(WindowError::LengthMismatch {
                time: time.len(),
                amplitude: amplitude.len(),
            });
        }
        if let Some(index) = time.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(WindowError::NonMonotonic { index: index + 1 });
        }
        Ok(Self { time, amplitude })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn amplitude(&self) -> &[f32] {
        &self.amplitude
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// First and last timestamp of the window.
    pub fn span(&self) -> Option<(f64, f64)> {
        match (self.time.first(), self.time.last()) {
            (Some(&start), Some(&end)) => Some((start, end)),
            _ => None,
        }
    }
}

/// Rejections raised while building a [`Spectrogram`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SpectrogramError {
    #[error("spectrogram has {rows} rows for {frequencies} frequencies")]
    RowCount { rows: usize, frequencies: usize },
    #[error("spectrogram row {row} has {frames} frames, expected {expected}")]
    RowLength {
        row: usize,
        frames: usize,
        expected: usize,
    },
    #[error("spectrogram grid: {0}")]
    Shape(String),
}

/// Time/frequency grid in decibels, rows are frequency bins and columns time frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    times: Vec<f64>,
    frequencies: Vec<f64>,
    magnitude_db: Array2<f32>,
}

impl Spectrogram {
    /// Builds the grid from row-major `z[frequency][frame]` rows.
    pub fn from_rows(
        times: Vec<f64>,
        frequencies: Vec<f64>,
        rows: Vec<Vec<f32>>,
    ) -> Result<Self, SpectrogramError> {
        let (height, width) = (frequencies.len(), times.len());
        if rows.len() != height {
            return Err(SpectrogramError::RowCount {
                rows: rows.len(),
                frequencies: height,
            });
        }
        if let Some(row) = rows.iter().position(|row| row.len() != width) {
            return Err(SpectrogramError::RowLength {
                row,
                frames: rows[row].len(),
                expected: width,
            });
        }
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let magnitude_db = Array2::from_shape_vec((height, width), flat)
            .map_err(|err| SpectrogramError::Shape(err.to_string()))?;
        Ok(Self {
            times,
            frequencies,
            magnitude_db,
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn magnitude_db(&self) -> &Array2<f32> {
        &self.magnitude_db
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude_db.is_empty()
    }
}

/// Result of analysing one source. Never mutated once received; a new
/// parameter value always yields a new result.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub analysis_id: String,
    pub predicted_label: Option<String>,
    pub confidence: Option<f32>,
    pub initial_waveform: WaveformWindow,
    pub spectrogram: Option<Spectrogram>,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    /// Rate of the signal this one was resampled from, when known.
    pub original_rate: Option<u32>,
}

/// Reply to one chunk poll.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkResponse {
    Window {
        window: WaveformWindow,
        new_position: f64,
    },
    Completed,
}

/// A signal produced by the service from another one (resampled, Doppler shifted).
#[derive(Debug, Clone)]
pub struct DerivedSignal {
    pub source: Source,
    pub analysis: AnalysisResult,
}

/// Visible x-axis window shared by every viewer on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub low: f64,
    pub high: f64,
}

impl ZoomRange {
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Scales the range around its centre; factors below 1 zoom in.
    pub fn scaled(&self, factor: f64) -> Self {
        let centre = (self.low + self.high) / 2.0;
        let half = self.width() * factor.max(f64::EPSILON) / 2.0;
        Self::new(centre - half, centre + half)
    }

    /// Shifts the range by a fraction of its width.
    pub fn panned(&self, fraction: f64) -> Self {
        let offset = self.width() * fraction;
        Self::new(self.low + offset, self.high + offset)
    }
}

/// Which on-screen viewer an engine or request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewerSlot {
    Primary,
    Secondary,
    /// Left-hand viewer when the carousel has moved past the original signal.
    Anchor,
}

impl ViewerSlot {
    pub fn label(&self) -> &'static str {
        match self {
            ViewerSlot::Primary => "primary",
            ViewerSlot::Secondary => "secondary",
            ViewerSlot::Anchor => "anchor",
        }
    }
}

/// Parameters of the Doppler pass-by rendition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DopplerParams {
    pub v_start: f64,
    pub v_end: f64,
    pub f_source: f64,
}

impl Default for DopplerParams {
    fn default() -> Self {
        Self {
            v_start: 0.0,
            v_end: 20.0,
            f_source: 440.0,
        }
    }
}

/// Pass-by parameters read back from a recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DopplerPrediction {
    /// m/s, positive while approaching.
    pub start_speed: f64,
    pub end_speed: f64,
    /// Hz.
    pub source_frequency: f64,
}

impl DopplerPrediction {
    pub fn start_kmh(&self) -> f64 {
        self.start_speed * 3.6
    }

    pub fn end_kmh(&self) -> f64 {
        self.end_speed * 3.6
    }
}

/// Capability set the playback and comparison controller runs against.
pub trait AnalysisBackend: Send + Sync + 'static {
    fn analyze(&self, source: &Source) -> impl Future<Output = DashResult<AnalysisResult>> + Send;

    fn fetch_chunk(
        &self,
        analysis_id: &str,
        position: f64,
    ) -> impl Future<Output = DashResult<ChunkResponse>> + Send;

    /// Re-analysis at another rate. Always yields a fresh result and source.
    fn resample(
        &self,
        source: &Source,
        target_rate: u32,
    ) -> impl Future<Output = DashResult<DerivedSignal>> + Send;
}

/// Doppler renditions of an uploaded signal, and the inverse estimate.
pub trait DopplerSynthesis: Send + Sync + 'static {
    fn generate_doppler(
        &self,
        source: &Source,
        params: DopplerParams,
    ) -> impl Future<Output = DashResult<DerivedSignal>> + Send;

    /// Approach over the first half of the clip, recede over the second.
    fn simulate_passing(
        &self,
        source: &Source,
        params: DopplerParams,
    ) -> impl Future<Output = DashResult<DerivedSignal>> + Send;

    fn predict(&self, source: &Source) -> impl Future<Output = DashResult<DopplerPrediction>> + Send;
}
