use iced::{
    mouse,
    widget::canvas::{self, Frame, Geometry, Path, Stroke},
    Color, Point, Rectangle, Renderer, Size, Theme,
};
use serde_json::Value;
use sigcore::prelude::{Spectrogram, ZoomRange};
use sigcore::presentation::visible_range;

const BACKGROUND: Color = Color::from_rgb(0.05, 0.05, 0.05);
const TRACE: Color = Color::from_rgb(0.18, 0.72, 0.89);
const FLOOR_DB: f32 = -80.0;
const MAX_CELLS: usize = 160;

/// Buttons that act on the shared zoom window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomAction {
    In,
    Out,
    PanLeft,
    PanRight,
    Reset,
}

/// Next zoom window. Without a current window the full span is the base;
/// without either there is nothing to zoom.
pub fn apply_zoom(
    action: ZoomAction,
    current: Option<ZoomRange>,
    full: Option<(f64, f64)>,
) -> Option<ZoomRange> {
    if action == ZoomAction::Reset {
        return None;
    }
    let base = current.or_else(|| full.map(|(low, high)| ZoomRange::new(low, high)))?;
    Some(match action {
        ZoomAction::In => base.scaled(0.5),
        ZoomAction::Out => base.scaled(2.0),
        ZoomAction::PanLeft => base.panned(-0.25),
        ZoomAction::PanRight => base.panned(0.25),
        ZoomAction::Reset => base,
    })
}

fn background(renderer: &Renderer, bounds: Rectangle) -> Frame {
    let mut frame = Frame::new(renderer, bounds.size());
    frame.fill_rectangle(Point::ORIGIN, bounds.size(), BACKGROUND);
    frame
}

fn stroke_line(frame: &mut Frame, points: &[Point], color: Color) {
    if points.len() < 2 {
        return;
    }
    let path = Path::new(|builder| {
        builder.move_to(points[0]);
        for point in &points[1..] {
            builder.line_to(*point);
        }
    });
    frame.stroke(&path, Stroke::default().with_width(1.5).with_color(color));
}

/// Streamed waveform window, clipped to the shared zoom range.
pub struct WaveformChart<'a> {
    pub time: &'a [f64],
    pub amplitude: &'a [f32],
    pub zoom: Option<ZoomRange>,
}

impl WaveformChart<'_> {
    fn x_range(&self) -> Option<(f64, f64)> {
        match self.zoom {
            Some(zoom) => Some((zoom.low, zoom.high)),
            None => Some((*self.time.first()?, *self.time.last()?)),
        }
    }
}

impl<Message> canvas::Program<Message> for WaveformChart<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = background(renderer, bounds);
        let Some((low, high)) = self.x_range() else {
            return vec![frame.into_geometry()];
        };
        let span = (high - low).max(f64::EPSILON);
        let range = visible_range(self.time, self.zoom);
        let peak = self.amplitude[range.clone()]
            .iter()
            .fold(0.0f32, |peak, value| peak.max(value.abs()))
            .max(1e-6);
        let mid = bounds.height / 2.0;

        let points: Vec<Point> = range
            .map(|i| {
                let x = ((self.time[i] - low) / span) as f32 * bounds.width;
                let y = mid - self.amplitude[i] / peak * (mid - 4.0);
                Point::new(x, y)
            })
            .collect();
        stroke_line(&mut frame, &points, TRACE);
        vec![frame.into_geometry()]
    }
}

/// dB level in `[FLOOR_DB, 0]` to a dark-to-bright heat colour.
pub fn heat(db: f32) -> Color {
    let level = ((db - FLOOR_DB) / -FLOOR_DB).clamp(0.0, 1.0);
    if level < 0.5 {
        let t = level * 2.0;
        Color::from_rgb(0.45 * t, 0.05, 0.35 * t + 0.05)
    } else {
        let t = (level - 0.5) * 2.0;
        Color::from_rgb(0.45 + 0.55 * t, 0.05 + 0.85 * t, 0.4 - 0.25 * t)
    }
}

/// Full-length spectrogram heatmap; the zoom window selects the columns.
pub struct SpectrogramChart<'a> {
    pub spectrogram: &'a Spectrogram,
    pub zoom: Option<ZoomRange>,
}

impl<Message> canvas::Program<Message> for SpectrogramChart<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = background(renderer, bounds);
        let grid = self.spectrogram.magnitude_db();
        let (rows, _) = grid.dim();
        let columns = visible_range(self.spectrogram.times(), self.zoom);
        if rows == 0 || columns.is_empty() {
            return vec![frame.into_geometry()];
        }

        let row_stride = rows.div_ceil(MAX_CELLS);
        let col_stride = columns.len().div_ceil(MAX_CELLS);
        let shown_rows = rows.div_ceil(row_stride);
        let shown_cols = columns.len().div_ceil(col_stride);
        let cell = Size::new(
            bounds.width / shown_cols as f32,
            bounds.height / shown_rows as f32,
        );

        for (cx, col) in columns.step_by(col_stride).enumerate() {
            for (cy, row) in (0..rows).step_by(row_stride).enumerate() {
                // Low frequencies at the bottom.
                let y = bounds.height - (cy + 1) as f32 * cell.height;
                frame.fill_rectangle(
                    Point::new(cx as f32 * cell.width, y),
                    cell,
                    heat(grid[[row, col]]),
                );
            }
        }
        vec![frame.into_geometry()]
    }
}

/// One drawable line pulled out of a service-rendered trace. Gaps (null
/// samples) split the line into segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub segments: Vec<Vec<(f64, f64)>>,
}

pub fn line_series(trace: &Value) -> Option<Series> {
    let xs = trace.get("x")?.as_array()?;
    let ys = trace.get("y")?.as_array()?;
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (x, y) in xs.iter().zip(ys) {
        match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => current.push((x, y)),
            _ if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            _ => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    let name = trace
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("trace")
        .to_string();
    Some(Series { name, segments })
}

fn parse_color(value: Option<&Value>) -> Option<Color> {
    let hex = value?.as_str()?.strip_prefix('#')?;
    let channel = |at: usize| {
        hex.get(at..at + 2)
            .and_then(|digits| u8::from_str_radix(digits, 16).ok())
    };
    Some(Color::from_rgb8(channel(0)?, channel(2)?, channel(4)?))
}

/// Line traces of a multi-channel graph frame.
pub struct ChannelChart {
    series: Vec<(Series, Color)>,
}

impl ChannelChart {
    pub fn new(traces: &[Value]) -> Self {
        let series = traces
            .iter()
            .filter_map(|trace| {
                let color = parse_color(trace.pointer("/line/color")).unwrap_or(TRACE);
                line_series(trace).map(|series| (series, color))
            })
            .collect();
        Self { series }
    }

    fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self
            .series
            .iter()
            .flat_map(|(series, _)| series.segments.iter().flatten());
        let &(x, y) = points.next()?;
        Some(points.fold((x, x, y, y), |(x0, x1, y0, y1), &(x, y)| {
            (x0.min(x), x1.max(x), y0.min(y), y1.max(y))
        }))
    }
}

impl<Message> canvas::Program<Message> for ChannelChart {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = background(renderer, bounds);
        let Some((x0, x1, y0, y1)) = self.bounds() else {
            return vec![frame.into_geometry()];
        };
        let width = (x1 - x0).max(f64::EPSILON);
        let height = (y1 - y0).max(f64::EPSILON);
        let project = |(x, y): (f64, f64)| {
            Point::new(
                ((x - x0) / width) as f32 * bounds.width,
                bounds.height - ((y - y0) / height) as f32 * (bounds.height - 8.0) - 4.0,
            )
        };
        for (series, color) in &self.series {
            for segment in &series.segments {
                let points: Vec<Point> = segment.iter().copied().map(project).collect();
                stroke_line(&mut frame, &points, *color);
            }
        }
        vec![frame.into_geometry()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zoom_starts_from_the_full_span() {
        let full = Some((0.0, 4.0));
        assert_eq!(
            apply_zoom(ZoomAction::In, None, full),
            Some(ZoomRange::new(1.0, 3.0))
        );
        assert_eq!(
            apply_zoom(ZoomAction::PanRight, Some(ZoomRange::new(1.0, 3.0)), full),
            Some(ZoomRange::new(1.5, 3.5))
        );
        assert_eq!(
            apply_zoom(ZoomAction::Reset, Some(ZoomRange::new(1.0, 3.0)), full),
            None
        );
        assert_eq!(apply_zoom(ZoomAction::Out, None, None), None);
    }

    #[test]
    fn null_samples_split_a_trace() {
        let trace = json!({
            "name": "Ch 1 ⊕ Ch 2",
            "x": [0.0, 0.5, 1.0, 1.5, 2.0],
            "y": [1.0, null, null, 2.0, 3.0],
        });
        let series = line_series(&trace).unwrap();
        assert_eq!(series.name, "Ch 1 ⊕ Ch 2");
        assert_eq!(
            series.segments,
            vec![vec![(0.0, 1.0)], vec![(1.5, 2.0), (2.0, 3.0)]]
        );
        assert!(line_series(&json!({"type": "heatmap", "z": [[1.0]]})).is_none());
    }

    #[test]
    fn trace_colours_come_from_hex() {
        let chart = ChannelChart::new(&[json!({
            "x": [0.0, 1.0],
            "y": [0.0, 5.0],
            "line": {"color": "#ff8000"},
        })]);
        assert_eq!(chart.series[0].1, Color::from_rgb8(255, 128, 0));
        assert_eq!(chart.bounds(), Some((0.0, 1.0, 0.0, 5.0)));
    }

    #[test]
    fn heat_saturates_outside_the_db_range() {
        assert_eq!(heat(-120.0), heat(FLOOR_DB));
        assert_eq!(heat(10.0), heat(0.0));
    }
}
