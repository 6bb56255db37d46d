use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use sigcore::interface::wire::WireWaveform;
use std::io::Cursor;

const EPS: f32 = 1e-8;

/// Mono clip with samples normalised to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub samples: Vec<f32>,
    pub rate: u32,
}

impl Clip {
    pub fn new(samples: Vec<f32>, rate: u32) -> Self {
        Self { samples, rate }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        if self.rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.rate as f64
    }

    pub fn resampled(&self, rate: u32) -> Clip {
        Clip::new(resample_linear(&self.samples, self.rate, rate), rate)
    }

    /// Window of `length` samples from `start`, with times in seconds.
    pub fn window(&self, start: usize, length: usize) -> WireWaveform {
        let start = start.min(self.samples.len());
        let end = start.saturating_add(length).min(self.samples.len());
        let chunk = &self.samples[start..end];
        let rate = self.rate.max(1) as f64;
        let start_time = start as f64 / rate;
        let end_time = start_time + chunk.len() as f64 / rate;
        WireWaveform {
            time: linspace(start_time, end_time, chunk.len()),
            amplitude: chunk.to_vec(),
            sr: None,
        }
    }
}

/// Decodes a WAV byte buffer, averaging channels down to mono.
pub fn decode_wav(bytes: &[u8]) -> anyhow::Result<Clip> {
    let mut reader = WavReader::new(Cursor::new(bytes)).context("reading WAV header")?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("reading float samples")?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()
                .context("reading integer samples")?
        }
    };
    if spec.sample_rate == 0 {
        bail!("WAV declares a zero sample rate");
    }
    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok(Clip::new(samples, spec.sample_rate))
}

/// Encodes a clip as 16-bit PCM, peak-normalised.
pub fn encode_wav(clip: &Clip) -> anyhow::Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: clip.rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let peak = clip
        .samples
        .iter()
        .fold(0.0f32, |acc, value| acc.max(value.abs()))
        + EPS;
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec).context("creating WAV writer")?;
        for sample in &clip.samples {
            let scaled = (sample / peak * i16::MAX as f32).round() as i16;
            writer.write_sample(scaled).context("writing WAV sample")?;
        }
        writer.finalize().context("finalising WAV")?;
    }
    Ok(buffer.into_inner())
}

pub fn wav_data_uri(clip: &Clip) -> anyhow::Result<String> {
    let bytes = encode_wav(clip)?;
    Ok(format!("data:audio/wav;base64,{}", STANDARD.encode(bytes)))
}

pub fn decode_data_uri(uri: &str) -> anyhow::Result<Vec<u8>> {
    let (_, payload) = uri
        .split_once(',')
        .context("data URI has no payload separator")?;
    STANDARD
        .decode(payload.trim())
        .context("decoding base64 payload")
}

/// Linear-interpolation resampler; good enough for a mock service.
pub fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() || from == 0 || to == 0 {
        return samples.to_vec();
    }
    let out_len = ((samples.len() as u64 * to as u64) / from as u64).max(1) as usize;
    let ratio = from as f64 / to as f64;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|index| {
            let position = index as f64 * ratio;
            let left = (position.floor() as usize).min(last);
            let right = (left + 1).min(last);
            let frac = (position - left as f64) as f32;
            samples[left] * (1.0 - frac) + samples[right] * frac
        })
        .collect()
}

/// `count` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let span = end - start;
            let last = (count - 1) as f64;
            (0..count).map(|i| start + span * i as f64 / last).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(rate: u32, seconds: f32) -> Clip {
        let count = (rate as f32 * seconds) as usize;
        let samples = (0..count)
            .map(|i| (i as f32 / rate as f32 * 440.0 * std::f32::consts::TAU).sin() * 0.5)
            .collect();
        Clip::new(samples, rate)
    }

    #[test]
    fn wav_encoding_survives_decode() {
        let clip = tone(8_000, 0.25);
        let decoded = decode_wav(&encode_wav(&clip).unwrap()).unwrap();
        assert_eq!(decoded.rate, 8_000);
        assert_eq!(decoded.len(), clip.len());
        let peak = decoded.samples.iter().fold(0.0f32, |a, v| a.max(v.abs()));
        assert!((peak - 1.0).abs() < 1e-3);
    }

    #[test]
    fn resample_scales_length_by_rate_ratio() {
        let clip = tone(48_000, 0.5);
        assert_eq!(clip.resampled(16_000).len(), 8_000);
        assert_eq!(resample_linear(&[1.0, 2.0], 10, 10), vec![1.0, 2.0]);
    }

    #[test]
    fn window_times_follow_start_offset() {
        let clip = Clip::new(vec![0.0; 100], 10);
        let window = clip.window(20, 10);
        assert_eq!(window.amplitude.len(), 10);
        assert_eq!(window.time.first().copied(), Some(2.0));
        assert_eq!(window.time.last().copied(), Some(3.0));
        assert!(clip.window(95, 10).time.len() == 5);
    }

    #[test]
    fn data_uri_payload_decodes() {
        let uri = wav_data_uri(&tone(8_000, 0.125)).unwrap();
        assert!(uri.starts_with("data:audio/wav;base64,"));
        let clip = decode_wav(&decode_data_uri(&uri).unwrap()).unwrap();
        assert_eq!(clip.len(), 1_000);
        assert!(decode_data_uri("nonsense").is_err());
    }
}
