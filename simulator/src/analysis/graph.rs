use serde_json::{json, Value};
use sigcore::channels::{GraphRequest, ViewerKind};
use sigcore::config::ChannelDomain;
use sigcore::interface::wire::GraphResponseBody;

const PALETTE: [&str; 12] = [
    "#667eea", "#764ba2", "#f093fb", "#f5576c", "#11998e", "#38ef7d", "#4facfe", "#00f2fe",
    "#fa709a", "#fee140", "#30cfd0", "#330867",
];
const STACK_OFFSET: f64 = 5.0;

/// Keeps every `fs / target`-th sample when `target` is below `fs`.
pub fn undersample(data: &[Vec<f64>], fs: f64, target: Option<u32>) -> (Vec<Vec<f64>>, f64) {
    let Some(target) = target.map(f64::from).filter(|t| *t > 0.0 && *t < fs) else {
        return (data.to_vec(), fs);
    };
    let factor = (fs / target) as usize;
    if factor <= 1 {
        return (data.to_vec(), fs);
    }
    let decimated = data
        .iter()
        .map(|row| row.iter().step_by(factor).copied().collect())
        .collect();
    (decimated, target)
}

fn wrapped_window(row: &[f64], start: usize, length: usize) -> Vec<f64> {
    if row.is_empty() {
        return Vec::new();
    }
    (0..length).map(|i| row[(start + i) % row.len()]).collect()
}

fn start_index(position: f64, fs: f64, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    ((position.max(0.0) * fs) as usize) % total
}

fn trace_name(domain: ChannelDomain, channel: usize) -> String {
    match domain {
        ChannelDomain::Ecg => format!("Lead {}", domain.lead_name(channel)),
        ChannelDomain::Eeg => domain.lead_name(channel),
    }
}

pub fn continuous_traces(
    domain: ChannelDomain,
    data: &[Vec<f64>],
    fs: f64,
    request: &GraphRequest,
) -> Vec<Value> {
    let length = ((request.zoom * fs) as usize).max(1);
    let times: Vec<f64> = (0..length)
        .map(|i| request.position + i as f64 / fs)
        .collect();

    request
        .channels
        .iter()
        .enumerate()
        .filter_map(|(slot, &channel)| {
            let row = data.get(channel)?;
            let start = start_index(request.position, fs, row.len());
            let y: Vec<f64> = wrapped_window(row, start, length)
                .into_iter()
                .map(|value| value + slot as f64 * STACK_OFFSET)
                .collect();
            Some(json!({
                "x": times,
                "y": y,
                "mode": "lines",
                "name": trace_name(domain, channel),
                "line": {"width": 2, "color": PALETTE[slot % PALETTE.len()]},
            }))
        })
        .collect()
}

/// Differences between the chunk at `position` and the one after it, kept
/// only where the two disagree in sign.
pub fn xor_traces(
    domain: ChannelDomain,
    data: &[Vec<f64>],
    fs: f64,
    request: &GraphRequest,
) -> Vec<Value> {
    let length = ((request.chunk_duration * fs) as usize).max(1);
    let times: Vec<f64> = (0..length).map(|i| i as f64 / fs).collect();

    request
        .channels
        .iter()
        .enumerate()
        .filter_map(|(slot, &channel)| {
            let row = data.get(channel)?;
            let start = start_index(request.position, fs, row.len());
            let first = wrapped_window(row, start, length);
            let second = wrapped_window(row, (start + length) % row.len().max(1), length);
            let y: Vec<Option<f64>> = first
                .iter()
                .zip(&second)
                .map(|(a, b)| ((*a > 0.0) != (*b > 0.0)).then_some(b - a))
                .collect();
            Some(json!({
                "x": times,
                "y": y,
                "mode": "lines+markers",
                "name": trace_name(domain, channel),
                "line": {"width": 2, "color": PALETTE[slot % PALETTE.len()]},
                "marker": {"size": 4},
            }))
        })
        .collect()
}

/// One graph frame for `request`; polar and recurrence views are not rendered.
pub fn render(domain: ChannelDomain, request: &GraphRequest) -> GraphResponseBody {
    let (data, fs) = undersample(&request.data, request.fs, request.undersample_freq);
    let fs = fs.max(f64::EPSILON);
    let samples = data.first().map(Vec::len).unwrap_or(0);
    let traces = match request.viewer_type {
        ViewerKind::Continuous => continuous_traces(domain, &data, fs, request),
        ViewerKind::Xor => xor_traces(domain, &data, fs, request),
        ViewerKind::Polar | ViewerKind::Recurrence => Vec::new(),
    };
    GraphResponseBody {
        traces,
        current_time: format!("{:.2}s / {:.2}s", request.position, samples as f64 / fs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigcore::channels::{Colormap, PolarMode};
    use std::sync::Arc;

    fn request(kind: ViewerKind, data: Vec<Vec<f64>>) -> GraphRequest {
        GraphRequest {
            data: Arc::new(data),
            fs: 4.0,
            channels: vec![0, 1],
            viewer_type: kind,
            position: 0.5,
            zoom: 1.0,
            chunk_duration: 1.0,
            colormap: Colormap::Viridis,
            polar_mode: PolarMode::Fixed,
            rec_ch_x: 0,
            rec_ch_y: 1,
            undersample_freq: None,
        }
    }

    #[test]
    fn continuous_traces_are_stacked_and_wrap() {
        let data = vec![vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], vec![1.0; 6]];
        let body = render(ChannelDomain::Eeg, &request(ViewerKind::Continuous, data));
        assert_eq!(body.traces.len(), 2);
        assert_eq!(body.traces[0]["y"], json!([2.0, 3.0, 4.0, 5.0]));
        assert_eq!(body.traces[1]["y"], json!([6.0, 6.0, 6.0, 6.0]));
        assert_eq!(body.traces[0]["name"], "Ch 1");
        assert_eq!(body.current_time, "0.50s / 1.50s");
    }

    #[test]
    fn xor_marks_only_sign_changes() {
        let data = vec![vec![1.0, 1.0, 1.0, 1.0, 1.0, -1.0, 1.0, -1.0]];
        let mut req = request(ViewerKind::Xor, data);
        req.position = 0.0;
        req.channels = vec![0];
        let body = render(ChannelDomain::Ecg, &req);
        assert_eq!(body.traces[0]["y"], json!([null, -2.0, null, -2.0]));
        assert_eq!(body.traces[0]["name"], "Lead I");
    }

    #[test]
    fn undersampling_decimates_below_native_rate() {
        let data = vec![(0..8).map(f64::from).collect::<Vec<_>>()];
        let (decimated, fs) = undersample(&data, 8.0, Some(2));
        assert_eq!(fs, 2.0);
        assert_eq!(decimated[0], vec![0.0, 4.0]);
        let (same, fs) = undersample(&data, 8.0, Some(16));
        assert_eq!(fs, 8.0);
        assert_eq!(same, data);
    }

    #[test]
    fn unrendered_kinds_return_no_traces() {
        let body = render(ChannelDomain::Eeg, &request(ViewerKind::Polar, vec![vec![0.0; 4]]));
        assert!(body.traces.is_empty());
    }
}
