//! Doppler rendition of a clip for a source moving at linearly changing speed.

use sigcore::interface::wire::WireSpectrogram;
use std::ops::Range;

pub const SPEED_OF_SOUND: f64 = 343.0;
const EPS: f64 = 1e-8;
/// How much faster the source gets while receding, m/s.
const RECEDE_ACCELERATION: f64 = 5.0;

/// Time-warps `samples` as heard from a source whose velocity moves
/// linearly from `v_start` to `v_end` (m/s, positive = approaching).
/// The result is peak-normalised.
pub fn apply_doppler(samples: &[f32], v_start: f64, v_end: f64) -> Vec<f32> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }

    let mut indices = Vec::with_capacity(n);
    let mut total = 0.0;
    for i in 0..n {
        let v = if n == 1 {
            v_start
        } else {
            v_start + (v_end - v_start) * i as f64 / (n - 1) as f64
        };
        total += factor(v);
        indices.push(total);
    }

    let first = indices[0];
    let span = indices[n - 1] - first;
    let last = (n - 1) as f64;
    let warped: Vec<f32> = indices
        .iter()
        .enumerate()
        .map(|(i, index)| {
            let position = if span == 0.0 {
                i as f64
            } else {
                (index - first) / span * last
            };
            interpolate(samples, position)
        })
        .collect();

    normalised(warped)
}

fn normalised(samples: Vec<f32>) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |acc, v| acc.max(v.abs())) + EPS as f32;
    samples.into_iter().map(|v| v / peak).collect()
}

/// Fades in for an approaching source and out for a receding one.
pub fn apply_envelope(samples: &mut [f32], v_start: f64, v_end: f64) {
    let (from, to) = if v_end > v_start { (0.2, 1.0) } else { (1.0, 0.2) };
    linear_envelope(samples, from, to);
}

fn linear_envelope(samples: &mut [f32], from: f32, to: f32) {
    let n = samples.len();
    for (i, sample) in samples.iter_mut().enumerate() {
        let t = if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
        *sample *= from + (to - from) * t;
    }
}

/// A pass-by rendition and the speeds of its receding leg.
#[derive(Debug, Clone, PartialEq)]
pub struct Passing {
    pub samples: Vec<f32>,
    pub recede_start: f64,
    pub recede_end: f64,
}

/// The first half approaches from `v_start` to `v_end`; the second half
/// recedes from `|v_end|`, speeding up and fading out.
pub fn simulate_passing(samples: &[f32], v_start: f64, v_end: f64) -> Passing {
    let (approach, recede) = samples.split_at(samples.len() / 2);
    let mut passing = apply_doppler(approach, v_start, v_end);
    apply_envelope(&mut passing, v_start, v_end);

    let recede_start = -v_end.abs();
    let recede_end = recede_start - RECEDE_ACCELERATION;
    let mut tail = apply_doppler(recede, recede_start, recede_end);
    linear_envelope(&mut tail, 1.0, 0.12);
    passing.extend(tail);

    Passing {
        samples: normalised(passing),
        recede_start,
        recede_end,
    }
}

/// Observed frequency for a source emitting `f_source` at speed `v`.
pub fn observed_frequency(f_source: f64, v: f64) -> f64 {
    f_source * factor(v)
}

/// Speed at which a source emitting `f_source` is heard at `f_observed`.
pub fn speed_for(f_source: f64, f_observed: f64) -> f64 {
    if f_observed <= 0.0 {
        return 0.0;
    }
    SPEED_OF_SOUND * (1.0 - f_source / f_observed)
}

/// Speeds and emitted frequency read back from a recorded pass-by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassageEstimate {
    pub start_speed: f64,
    pub end_speed: f64,
    pub source_frequency: f64,
}

/// Spectral-peak estimate: the loudest bin over the whole clip is taken as
/// the emitted frequency, the loudest bins of the first and last quarter as
/// the frequencies heard at the start and the end.
pub fn estimate_passage(grid: &WireSpectrogram) -> Option<PassageEstimate> {
    let frames = grid.x.len();
    if frames == 0 {
        return None;
    }
    let quarter = (frames / 4).max(1);
    let source_frequency = peak_frequency(grid, 0..frames)?;
    let start = peak_frequency(grid, 0..quarter)?;
    let end = peak_frequency(grid, frames - quarter..frames)?;
    Some(PassageEstimate {
        start_speed: speed_for(source_frequency, start),
        end_speed: speed_for(source_frequency, end),
        source_frequency,
    })
}

fn peak_frequency(grid: &WireSpectrogram, frames: Range<usize>) -> Option<f64> {
    grid.z
        .iter()
        .zip(&grid.y)
        .filter_map(|(row, frequency)| {
            let level: f32 = row.get(frames.clone())?.iter().sum();
            Some((level, *frequency))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, frequency)| frequency)
}

fn factor(v: f64) -> f64 {
    SPEED_OF_SOUND / (SPEED_OF_SOUND - v + EPS)
}

fn interpolate(samples: &[f32], position: f64) -> f32 {
    let last = samples.len() - 1;
    let left = (position.floor().max(0.0) as usize).min(last);
    let right = (left + 1).min(last);
    let frac = (position - left as f64).clamp(0.0, 1.0) as f32;
    samples[left] * (1.0 - frac) + samples[right] * frac
}
