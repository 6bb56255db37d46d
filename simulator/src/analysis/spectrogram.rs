use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use sigcore::interface::wire::WireSpectrogram;
use std::f32::consts::PI;
use std::sync::Arc;

const FLOOR_DB: f32 = -80.0;

/// Short-time Fourier transform with a Hann window, reported in dB
/// relative to the loudest bin and clipped at -80 dB.
pub struct Stft {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    hop: usize,
}

impl Stft {
    pub fn new(size: usize, hop: usize) -> Self {
        let size = size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let window = (0..size)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
            .collect();
        Self {
            fft,
            window,
            hop: hop.max(1),
        }
    }

    pub fn size(&self) -> usize {
        self.window.len()
    }

    pub fn analyze(&self, samples: &[f32], rate: u32) -> WireSpectrogram {
        let size = self.size();
        let bins = size / 2 + 1;
        let frames = if samples.len() <= size {
            1
        } else {
            (samples.len() - size) / self.hop + 1
        };

        let mut magnitudes = vec![vec![0.0f32; frames]; bins];
        let mut buffer = vec![Complex32::zero(); size];
        for frame in 0..frames {
            let offset = frame * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = samples.get(offset + i).copied().unwrap_or(0.0);
                *slot = Complex32::new(sample * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            for (bin, row) in magnitudes.iter_mut().enumerate() {
                row[frame] = buffer[bin].norm();
            }
        }

        let reference = magnitudes
            .iter()
            .flatten()
            .fold(f32::EPSILON, |acc, value| acc.max(*value));
        let z = magnitudes
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|value| (20.0 * (value.max(1e-10) / reference).log10()).max(FLOOR_DB))
                    .collect()
            })
            .collect();

        let rate = rate.max(1) as f64;
        WireSpectrogram {
            x: (0..frames)
                .map(|frame| (frame * self.hop) as f64 / rate)
                .collect(),
            y: (0..bins)
                .map(|bin| bin as f64 * rate / size as f64)
                .collect(),
            z,
        }
    }
}

impl Default for Stft {
    fn default() -> Self {
        Self::new(512, 256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_dimensions_follow_size_and_hop() {
        let stft = Stft::new(64, 32);
        let grid = stft.analyze(&vec![0.1; 640], 1_000);
        assert_eq!(grid.y.len(), 33);
        assert_eq!(grid.x.len(), 19);
        assert_eq!(grid.z.len(), 33);
        assert!(grid.z.iter().all(|row| row.len() == 19));
    }

    #[test]
    fn tone_peaks_in_its_bin() {
        let rate = 1_024;
        let samples: Vec<f32> = (0..rate)
            .map(|i| (2.0 * PI * 128.0 * i as f32 / rate as f32).sin())
            .collect();
        let stft = Stft::new(128, 64);
        let grid = stft.analyze(&samples, rate as u32);
        let loudest = grid
            .z
            .iter()
            .enumerate()
            .max_by(|a, b| a.1[2].total_cmp(&b.1[2]))
            .map(|(bin, _)| bin)
            .unwrap();
        assert_eq!(grid.y[loudest], 128.0);
        assert!(grid.z.iter().flatten().all(|db| *db <= 0.0 && *db >= FLOOR_DB));
    }
}
