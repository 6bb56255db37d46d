/// Label and confidence for a clip, decided by its RMS level.
pub fn classify(samples: &[f32], threshold: f32) -> (String, f32) {
    let level = rms(samples);
    let threshold = threshold.max(f32::EPSILON);
    let margin = ((level - threshold).abs() / threshold).min(1.0);
    let confidence = 0.5 + 0.5 * margin;
    let label = if level >= threshold { "DRONE" } else { "NOT_DRONE" };
    (label.to_string(), confidence)
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|value| value * value).sum();
    (energy / samples.len() as f32).sqrt()
}
