//! JSON bodies exchanged with the analysis service.
//!
//! The same structs are used by the HTTP client and by the mock service, so
//! both sides agree on field names by construction.

use crate::prelude::{AnalysisResult, ChunkResponse, DopplerPrediction, Spectrogram, WaveformWindow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireWaveform {
    pub time: Vec<f64>,
    pub amplitude: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sr: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireSpectrogram {
    /// Frame times in seconds.
    pub x: Vec<f64>,
    /// Bin frequencies in Hz.
    pub y: Vec<f64>,
    /// `z[frequency][frame]` in dB.
    pub z: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
    pub file_id: String,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    pub initial_waveform: WireWaveform,
    #[serde(default)]
    pub spectrogram: Option<WireSpectrogram>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRequestBody {
    pub file_id: String,
    pub position: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkResponseBody {
    pub completed: bool,
    #[serde(default)]
    pub time: Vec<f64>,
    #[serde(default)]
    pub amplitude: Vec<f32>,
    #[serde(default)]
    pub new_position: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownsampleResponseBody {
    pub original_rate: u32,
    pub new_rate: u32,
    #[serde(default)]
    pub original_audio: Option<String>,
    pub downsampled_audio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DopplerRequestBody {
    pub contents: String,
    pub v_start: f64,
    pub v_end: f64,
    #[serde(default)]
    pub f_source: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DopplerResponseBody {
    pub src: String,
    pub file_id: String,
    pub initial_waveform: WireWaveform,
    #[serde(default)]
    pub spectrogram: Option<WireSpectrogram>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub observed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DopplerPredictRequestBody {
    pub contents: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DopplerPredictResponseBody {
    pub predicted_start_speed: f64,
    pub predicted_end_speed: f64,
    pub predicted_source_frequency: f64,
}

impl From<DopplerPredictResponseBody> for DopplerPrediction {
    fn from(body: DopplerPredictResponseBody) -> Self {
        Self {
            start_speed: body.predicted_start_speed,
            end_speed: body.predicted_end_speed,
            source_frequency: body.predicted_source_frequency,
        }
    }
}

/// Multi-channel recording as returned by the demo and upload endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingBody {
    pub data: Vec<Vec<f64>>,
    pub fs: f64,
    pub duration: f64,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "leads")]
    pub channels: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphResponseBody {
    #[serde(default)]
    pub traces: Vec<serde_json::Value>,
    #[serde(default)]
    pub current_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl WireWaveform {
    pub fn into_window(self) -> Result<WaveformWindow, String> {
        WaveformWindow::new(self.time, self.amplitude).map_err(|err| err.to_string())
    }
}

impl From<&WaveformWindow> for WireWaveform {
    fn from(window: &WaveformWindow) -> Self {
        Self {
            time: window.time().to_vec(),
            amplitude: window.amplitude().to_vec(),
            sr: None,
        }
    }
}

impl WireSpectrogram {
    pub fn into_spectrogram(self) -> Result<Spectrogram, String> {
        Spectrogram::from_rows(self.x, self.y, self.z).map_err(|err| err.to_string())
    }
}

/// Builds an [`AnalysisResult`] from a detect-shaped reply. `fallback_rate`
/// is used when the waveform carries no `sr`.
pub fn analysis_from_wire(
    file_id: String,
    prediction: Option<String>,
    confidence: Option<f32>,
    waveform: WireWaveform,
    spectrogram: Option<WireSpectrogram>,
    duration: Option<f64>,
    fallback_rate: u32,
) -> Result<AnalysisResult, String> {
    let sample_rate = waveform.sr.filter(|rate| *rate > 0).unwrap_or(fallback_rate);
    let initial_waveform = waveform.into_window()?;
    let spectrogram = spectrogram
        .map(WireSpectrogram::into_spectrogram)
        .transpose()?;
    let duration_seconds = duration
        .or_else(|| {
            spectrogram
                .as_ref()
                .and_then(|grid| grid.times().last().copied())
        })
        .or_else(|| initial_waveform.span().map(|(_, end)| end))
        .unwrap_or(0.0);
    Ok(AnalysisResult {
        analysis_id: file_id,
        predicted_label: prediction,
        confidence,
        initial_waveform,
        spectrogram,
        sample_rate,
        duration_seconds,
        original_rate: None,
    })
}

impl DetectResponse {
    pub fn into_analysis(self, fallback_rate: u32) -> Result<AnalysisResult, String> {
        analysis_from_wire(
            self.file_id,
            self.prediction,
            self.confidence,
            self.initial_waveform,
            self.spectrogram,
            self.duration,
            fallback_rate,
        )
    }
}

impl ChunkResponseBody {
    pub fn completed() -> Self {
        Self {
            completed: true,
            ..Default::default()
        }
    }

    pub fn into_response(self, position: f64) -> Result<ChunkResponse, String> {
        if self.completed {
            return Ok(ChunkResponse::Completed);
        }
        let window = WaveformWindow::new(self.time, self.amplitude).map_err(|err| err.to_string())?;
        Ok(ChunkResponse::Window {
            window,
            new_position: self.new_position.unwrap_or(position),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_reply_uses_reported_rate_and_spectrogram_span() {
        let body = r#"{
            "file_id": "abc.wav",
            "prediction": "DRONE",
            "initial_waveform": {"time": [0.0, 0.1], "amplitude": [0.0, 0.5], "sr": 22050},
            "spectrogram": {"x": [0.0, 1.5, 3.9], "y": [0.0, 100.0], "z": [[-1, -2, -3], [-4, -5, -6]]}
        }"#;
        let reply: DetectResponse = serde_json::from_str(body).unwrap();
        let analysis = reply.into_analysis(48_000).unwrap();
        assert_eq!(analysis.sample_rate, 22_050);
        assert_eq!(analysis.duration_seconds, 3.9);
        assert_eq!(analysis.confidence, None);
        assert_eq!(analysis.spectrogram.unwrap().magnitude_db().dim(), (2, 3));
    }

    #[test]
    fn detect_reply_without_rate_falls_back() {
        let reply = DetectResponse {
            file_id: "id".into(),
            prediction: None,
            confidence: None,
            initial_waveform: WireWaveform {
                time: vec![0.0, 2.0],
                amplitude: vec![0.1, 0.2],
                sr: None,
            },
            spectrogram: None,
            duration: None,
        };
        let analysis = reply.into_analysis(48_000).unwrap();
        assert_eq!(analysis.sample_rate, 48_000);
        assert_eq!(analysis.duration_seconds, 2.0);
    }

    #[test]
    fn completed_chunk_carries_no_window() {
        let reply: ChunkResponseBody = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert_eq!(reply.into_response(800.0).unwrap(), ChunkResponse::Completed);
    }

    #[test]
    fn malformed_chunk_is_rejected() {
        let reply = ChunkResponseBody {
            completed: false,
            time: vec![0.0, 0.1],
            amplitude: vec![0.0],
            new_position: Some(1.0),
        };
        assert!(reply.into_response(0.0).is_err());
    }

    #[test]
    fn prediction_reply_maps_onto_speeds() {
        let body = r#"{"predicted_start_speed": 12.5, "predicted_end_speed": -3.0, "predicted_source_frequency": 440.0}"#;
        let reply: DopplerPredictResponseBody = serde_json::from_str(body).unwrap();
        let prediction = DopplerPrediction::from(reply);
        assert_eq!(prediction.start_speed, 12.5);
        assert_eq!(prediction.end_speed, -3.0);
        assert_eq!(prediction.source_frequency, 440.0);
    }

    #[test]
    fn recording_accepts_lead_count_alias() {
        let body = r#"{"data": [[0.0, 1.0]], "fs": 250, "duration": 0.008, "leads": 1}"#;
        let recording: RecordingBody = serde_json::from_str(body).unwrap();
        assert_eq!(recording.channels, 1);
    }
}
