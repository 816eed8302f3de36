use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
    /// Visible span; front ends fit to the data when `None`.
    pub range: Option<[f64; 2]>,
}

impl Axis {
    pub fn new(label: impl Into<String>, range: Option<[f64; 2]>) -> Self {
        Self {
            label: Some(label.into()),
            range,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis {
                label: None,
                range: None,
            },
            y: Axis {
                label: None,
                range: None,
            },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Range of all points along one dimension (0 = x, 1 = y).
    pub fn data_bounds(&self, dim: usize) -> Option<[f64; 2]> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for series in &self.series {
            match series {
                Series::Line(line) => {
                    for p in &line.points {
                        lo = lo.min(p[dim]);
                        hi = hi.max(p[dim]);
                    }
                }
            }
        }
        if lo.is_finite() && hi.is_finite() {
            Some([lo, hi])
        } else {
            None
        }
    }

    /// Axis range if set, otherwise the data bounds, widened when degenerate.
    pub fn resolved_range(&self, dim: usize) -> [f64; 2] {
        let axis = if dim == 0 { &self.x } else { &self.y };
        let [lo, hi] = axis
            .range
            .or_else(|| self.data_bounds(dim))
            .unwrap_or([0.0, 1.0]);
        if (hi - lo).abs() < f64::EPSILON {
            [lo - 1.0, hi + 1.0]
        } else {
            [lo, hi]
        }
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

pub fn figure_from_points(
    title: &str,
    name: &str,
    points: Vec<[f64; 2]>,
    color: u32,
) -> Figure {
    let mut fig = Figure::new(Some(title.to_string()));
    fig.add_series(Series::Line(LineSeries {
        name: name.into(),
        points,
        style: Style {
            width: 2.0,
            color: Color(color),
        },
    }));
    fig
}
