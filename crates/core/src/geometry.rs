//! Stroke geometry engine
//!
//! Turns the raw pointer samples of one gesture into a closed, fillable outline.
//! The outline is a freehand-style envelope around the streamlined centre line whose
//! radius follows (real or simulated) pressure. The final boundary is smoothed into
//! quadratic segments so the whole stroke can be drawn with one fill operation.
//!
//! Everything here is pure: degenerate input yields an empty path, never a panic.

use crate::model::{Stroke, StrokePoint, StrokeTool, HIGHLIGHTER_WIDTH_FACTOR};

/// How quickly simulated pressure follows pointer speed
const RATE_OF_PRESSURE_CHANGE: f32 = 0.275;

/// Slightly more than PI so half-turn rotations never land exactly on the seam
const FIXED_PI: f32 = std::f32::consts::PI + 0.0001;

/// Pressure used for samples that carry none
const DEFAULT_PRESSURE: f32 = 0.5;

/// Points closer than this to the end of the stroke are dropped from the envelope
const END_TRIM_LENGTH: f32 = 3.0;

/// 2D vector in canonical pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, factor: f32) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }

    /// Perpendicular vector (rotated a quarter turn)
    pub fn perpendicular(self) -> Vec2 {
        Vec2::new(self.y, -self.x)
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; the zero vector stays zero
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len > f32::EPSILON && len.is_finite() {
            self.scale(1.0 / len)
        } else {
            Vec2::ZERO
        }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        self.sub(other).length()
    }

    pub fn distance_squared(self, other: Vec2) -> f32 {
        let d = self.sub(other);
        d.dot(d)
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        self.add(other.sub(self).scale(t))
    }

    pub fn midpoint(self, other: Vec2) -> Vec2 {
        Vec2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Rotate around `center` by `radians`
    pub fn rotate_around(self, center: Vec2, radians: f32) -> Vec2 {
        let (sin, cos) = radians.sin_cos();
        let px = self.x - center.x;
        let py = self.y - center.y;
        Vec2::new(px * cos - py * sin + center.x, px * sin + py * cos + center.y)
    }

    /// Move `distance` along `direction`
    pub fn project(self, direction: Vec2, distance: f32) -> Vec2 {
        self.add(direction.scale(distance))
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Parameters of the freehand outline transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineOptions {
    /// Base stroke width in canonical pixels
    pub size: f32,
    /// How much pressure thins the stroke (0 = constant width)
    pub thinning: f32,
    /// Minimum spacing between outline points, relative to size
    pub smoothing: f32,
    /// How strongly raw samples are pulled toward the previous point
    pub streamline: f32,
    /// Derive pressure from pointer speed instead of the samples
    pub simulate_pressure: bool,
}

impl OutlineOptions {
    /// Rendering parameters fixed by the tool
    ///
    /// Highlighters are flat and wide (no thinning, 8x width); pens thin moderately
    /// with pressure; erasers use a constant width.
    pub fn for_tool(tool: StrokeTool, size: f32, simulate_pressure: bool) -> Self {
        let (size, thinning) = match tool {
            StrokeTool::Pen => (size, 0.5),
            StrokeTool::Highlighter => (size * HIGHLIGHTER_WIDTH_FACTOR, 0.0),
            StrokeTool::Eraser => (size, 0.0),
        };

        Self { size, thinning, smoothing: 0.5, streamline: 0.5, simulate_pressure }
    }

    /// Options for a stored stroke
    ///
    /// Pressure is simulated for the whole stroke when its first sample has none,
    /// even if later samples do.
    pub fn for_stroke(stroke: &Stroke) -> Self {
        let simulate = stroke.points.first().map_or(true, |p| p.pressure.is_none());
        Self::for_tool(stroke.tool, stroke.size, simulate)
    }
}

/// Shorthand for [`OutlineOptions::for_tool`]
pub fn outline_options(tool: StrokeTool, size: f32, simulate_pressure: bool) -> OutlineOptions {
    OutlineOptions::for_tool(tool, size, simulate_pressure)
}

/// A streamlined centre-line sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSample {
    pub point: Vec2,
    pub pressure: f32,
    /// Unit vector pointing back toward the previous sample
    pub vector: Vec2,
    /// Distance from the previous sample
    pub distance: f32,
    /// Length of the centre line up to this sample
    pub running_length: f32,
}

/// Streamline raw pointer samples into centre-line samples
pub fn stroke_points(points: &[StrokePoint], options: &OutlineOptions) -> Vec<StrokeSample> {
    let mut raw: Vec<(Vec2, f32)> = points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .map(|p| {
            let pressure = p.pressure.filter(|v| v.is_finite()).unwrap_or(DEFAULT_PRESSURE);
            (Vec2::new(p.x, p.y), pressure.clamp(0.0, 1.0))
        })
        .collect();

    if raw.is_empty() {
        return Vec::new();
    }

    // Two samples give too little to streamline; interpolate a few in between
    if raw.len() == 2 {
        let (first, last) = (raw[0], raw[1]);
        raw.truncate(1);
        for i in 1..5 {
            let t = i as f32 / 4.0;
            raw.push((first.0.lerp(last.0, t), first.1 + (last.1 - first.1) * t));
        }
    }

    if raw.len() == 1 {
        let (point, pressure) = raw[0];
        raw.push((point.add(Vec2::new(1.0, 1.0)), pressure));
    }

    let t = 0.15 + (1.0 - options.streamline.clamp(0.0, 1.0)) * 0.85;
    let max = raw.len() - 1;

    let mut prev = StrokeSample {
        point: raw[0].0,
        pressure: raw[0].1,
        vector: Vec2::new(1.0, 1.0),
        distance: 0.0,
        running_length: 0.0,
    };
    let mut samples = vec![prev];
    let mut running_length = 0.0;
    let mut reached_minimum_length = false;

    for (i, &(target, pressure)) in raw.iter().enumerate().skip(1) {
        let point = if i == max { target } else { prev.point.lerp(target, t) };

        if point == prev.point {
            continue;
        }

        let distance = point.distance(prev.point);
        running_length += distance;

        if i < max && !reached_minimum_length {
            if running_length < options.size {
                continue;
            }
            reached_minimum_length = true;
        }

        prev = StrokeSample {
            point,
            pressure,
            vector: prev.point.sub(point).normalized(),
            distance,
            running_length,
        };
        samples.push(prev);
    }

    samples[0].vector = samples.get(1).map(|s| s.vector).unwrap_or(Vec2::ZERO);
    samples
}

fn stroke_radius(size: f32, thinning: f32, pressure: f32) -> f32 {
    size * (0.5 - thinning * (0.5 - pressure))
}

fn simulated_pressure(previous: f32, distance: f32, size: f32) -> f32 {
    let speed = (distance / size).min(1.0);
    let rate = (1.0 - speed).min(1.0);
    (previous + (rate - previous) * (speed * RATE_OF_PRESSURE_CHANGE)).min(1.0)
}

/// Outline polygon around the centre line, including round caps
pub fn outline_points(samples: &[StrokeSample], options: &OutlineOptions) -> Vec<Vec2> {
    let size = options.size;
    if samples.is_empty() || !(size > 0.0) {
        return Vec::new();
    }

    let last = samples.len() - 1;
    let total_length = samples[last].running_length;
    let min_distance = (size * options.smoothing).powi(2);

    let mut left: Vec<Vec2> = Vec::new();
    let mut right: Vec<Vec2> = Vec::new();

    let mut prev_pressure = samples.iter().take(10).fold(samples[0].pressure, |acc, sample| {
        let pressure = if options.simulate_pressure {
            simulated_pressure(acc, sample.distance, size)
        } else {
            sample.pressure
        };
        (acc + pressure) / 2.0
    });

    let mut radius = stroke_radius(size, options.thinning, samples[last].pressure);
    let mut first_radius: Option<f32> = None;
    let mut prev_vector = samples[0].vector;
    let mut pl = samples[0].point;
    let mut pr = pl;
    let mut prev_was_sharp = false;

    for (i, sample) in samples.iter().enumerate() {
        if i < last && total_length - sample.running_length < END_TRIM_LENGTH {
            continue;
        }

        let mut pressure = sample.pressure;
        if options.thinning != 0.0 {
            if options.simulate_pressure {
                pressure = simulated_pressure(prev_pressure, sample.distance, size);
            }
            radius = stroke_radius(size, options.thinning, pressure);
        } else {
            radius = size / 2.0;
        }
        radius = radius.max(0.01);
        first_radius.get_or_insert(radius);

        let point = sample.point;
        let next_vector = if i < last { samples[i + 1].vector } else { sample.vector };
        let next_dot = if i < last { sample.vector.dot(next_vector) } else { 1.0 };
        let prev_dot = sample.vector.dot(prev_vector);

        let is_sharp = prev_dot < 0.0 && !prev_was_sharp;
        let next_is_sharp = next_dot < 0.0;

        if is_sharp || next_is_sharp {
            // Round the corner with a half turn on each side
            let offset = prev_vector.perpendicular().scale(radius);
            for step in 0..=13 {
                let t = step as f32 / 13.0;
                pl = point.sub(offset).rotate_around(point, FIXED_PI * t);
                left.push(pl);
                pr = point.add(offset).rotate_around(point, -FIXED_PI * t);
                right.push(pr);
            }
            if next_is_sharp {
                prev_was_sharp = true;
            }
            continue;
        }

        prev_was_sharp = false;

        if i == last {
            let offset = sample.vector.perpendicular().scale(radius);
            left.push(point.sub(offset));
            right.push(point.add(offset));
            continue;
        }

        let offset = next_vector.lerp(sample.vector, next_dot).perpendicular().scale(radius);

        let tl = point.sub(offset);
        if i <= 1 || pl.distance_squared(tl) > min_distance {
            left.push(tl);
            pl = tl;
        }

        let tr = point.add(offset);
        if i <= 1 || pr.distance_squared(tr) > min_distance {
            right.push(tr);
            pr = tr;
        }

        prev_pressure = pressure;
        prev_vector = sample.vector;
    }

    let first_point = samples[0].point;
    let last_point =
        if samples.len() > 1 { samples[last].point } else { first_point.add(Vec2::new(1.0, 1.0)) };

    if samples.len() == 1 {
        let direction = first_point.sub(last_point).perpendicular().normalized();
        let start = first_point.project(direction, -first_radius.unwrap_or(radius));
        return (1..=13)
            .map(|step| start.rotate_around(first_point, FIXED_PI * 2.0 * step as f32 / 13.0))
            .collect();
    }

    let start_cap: Vec<Vec2> = match right.first() {
        Some(&anchor) => (1..=13)
            .map(|step| anchor.rotate_around(first_point, FIXED_PI * step as f32 / 13.0))
            .collect(),
        None => Vec::new(),
    };

    let direction = samples[last].vector.neg().perpendicular();
    let cap_start = last_point.project(direction, radius);
    let end_cap: Vec<Vec2> = (1..29)
        .map(|step| cap_start.rotate_around(last_point, FIXED_PI * 3.0 * step as f32 / 29.0))
        .collect();

    let mut outline = left;
    outline.extend(end_cap);
    outline.extend(right.into_iter().rev());
    outline.extend(start_cap);
    outline.retain(|p| p.is_finite());
    outline
}

/// One quadratic Bezier segment of a fill path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadSegment {
    pub control: Vec2,
    pub to: Vec2,
}

/// Closed boundary of a stroke, ready for a single fill
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillPath {
    pub start: Vec2,
    pub segments: Vec<QuadSegment>,
}

impl FillPath {
    /// The no-op path
    pub fn empty() -> Self {
        Self::default()
    }

    /// Smooth an outline polygon into quadratic segments
    ///
    /// Each outline point becomes the control point of a segment ending halfway to the
    /// next point; the last segment wraps back toward the first point.
    pub fn from_outline(outline: &[Vec2]) -> Self {
        if outline.len() < 2 {
            return Self::empty();
        }

        let segments = outline
            .iter()
            .enumerate()
            .map(|(i, &point)| {
                let next = outline[(i + 1) % outline.len()];
                QuadSegment { control: point, to: point.midpoint(next) }
            })
            .collect();

        Self { start: outline[0], segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// A non-empty path always ends back at its start (the implicit close)
    pub fn is_closed(&self) -> bool {
        !self.is_empty()
    }

    /// Flatten to a polygon whose last vertex repeats the first
    pub fn flatten(&self, tolerance: f32) -> Vec<Vec2> {
        if self.is_empty() {
            return Vec::new();
        }

        let tolerance = if tolerance > 0.0 { tolerance } else { 0.25 };
        let mut polygon = vec![self.start];
        let mut current = self.start;

        for segment in &self.segments {
            let deviation = current.sub(segment.control.scale(2.0)).add(segment.to).length();
            let steps = ((deviation / tolerance).sqrt() * 0.5).ceil().clamp(1.0, 16.0) as usize;
            for step in 1..=steps {
                let t = step as f32 / steps as f32;
                let a = current.lerp(segment.control, t);
                let b = segment.control.lerp(segment.to, t);
                polygon.push(a.lerp(b, t));
            }
            current = segment.to;
        }

        polygon.push(self.start);
        polygon
    }

    /// Bounding box as (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        if self.is_empty() {
            return None;
        }
        let mut bounds = (self.start.x, self.start.y, self.start.x, self.start.y);
        for segment in &self.segments {
            for p in [segment.control, segment.to] {
                bounds.0 = bounds.0.min(p.x);
                bounds.1 = bounds.1.min(p.y);
                bounds.2 = bounds.2.max(p.x);
                bounds.3 = bounds.3.max(p.y);
            }
        }
        Some(bounds)
    }
}

/// Shorthand for [`FillPath::from_outline`]
pub fn fill_path(outline: &[Vec2]) -> FillPath {
    FillPath::from_outline(outline)
}

/// Fill boundary for raw samples with explicit options
pub fn fill_path_for_points(points: &[StrokePoint], options: &OutlineOptions) -> FillPath {
    if points.len() < 2 {
        return FillPath::empty();
    }
    let samples = stroke_points(points, options);
    fill_path(&outline_points(&samples, options))
}

/// Fill boundary for a stored stroke
pub fn stroke_fill_path(stroke: &Stroke) -> FillPath {
    fill_path_for_points(&stroke.points, &OutlineOptions::for_stroke(stroke))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Color;

    fn line(n: usize, pressure: Option<f32>) -> Vec<StrokePoint> {
        (0..n)
            .map(|i| {
                let x = 10.0 + i as f32 * 6.0;
                let y = 50.0 + (i as f32 * 0.4).sin() * 8.0;
                StrokePoint { x, y, pressure }
            })
            .collect()
    }

    fn stroke(tool: StrokeTool, points: Vec<StrokePoint>) -> Stroke {
        Stroke::new(points, tool, Color::BLACK, 4.0, 1.0)
    }

    #[test]
    fn test_degenerate_input_is_empty() {
        assert!(stroke_fill_path(&stroke(StrokeTool::Pen, vec![])).is_empty());
        let dot = stroke(StrokeTool::Pen, vec![StrokePoint::new(1.0, 1.0)]);
        assert!(stroke_fill_path(&dot).is_empty());
        assert!(FillPath::empty().flatten(0.5).is_empty());
        assert!(FillPath::empty().bounds().is_none());
    }

    #[test]
    fn test_two_points_produce_closed_boundary() {
        let path = stroke_fill_path(&stroke(
            StrokeTool::Pen,
            vec![StrokePoint::new(0.0, 0.0), StrokePoint::new(40.0, 0.0)],
        ));
        assert!(!path.is_empty());
        assert!(path.is_closed());

        let polygon = path.flatten(0.5);
        assert!(polygon.len() > 3);
        assert_eq!(polygon.first(), polygon.last());
    }

    #[test]
    fn test_many_points_cover_the_centre_line() {
        let points = line(30, None);
        let path = stroke_fill_path(&stroke(StrokeTool::Pen, points.clone()));
        let (min_x, _, max_x, _) = path.bounds().unwrap();
        assert!(min_x <= points[0].x);
        assert!(max_x >= points[points.len() - 1].x);
    }

    #[test]
    fn test_identical_points_do_not_panic() {
        let points = vec![StrokePoint::new(5.0, 5.0); 12];
        let path = stroke_fill_path(&stroke(StrokeTool::Pen, points));
        for p in path.flatten(0.5) {
            assert!(p.x.is_finite() && p.y.is_finite());
        }
    }

    #[test]
    fn test_non_finite_points_are_ignored() {
        let mut points = line(10, None);
        points.push(StrokePoint::new(f32::NAN, 3.0));
        let path = stroke_fill_path(&stroke(StrokeTool::Pen, points));
        assert!(!path.is_empty());
        assert!(path.flatten(0.5).iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn test_tool_parameters() {
        let highlighter = outline_options(StrokeTool::Highlighter, 3.0, true);
        assert_eq!(highlighter.thinning, 0.0);
        assert_eq!(highlighter.size, 24.0);

        let pen = outline_options(StrokeTool::Pen, 3.0, true);
        assert_eq!(pen.thinning, 0.5);
        assert_eq!(pen.size, 3.0);
    }

    #[test]
    fn test_highlighter_outline_is_flat_and_wide() {
        let points = (0..20).map(|i| StrokePoint::new(i as f32 * 10.0, 100.0)).collect();
        let s = stroke(StrokeTool::Highlighter, points);
        let path = stroke_fill_path(&s);
        let (_, min_y, _, max_y) = path.bounds().unwrap();
        let width = max_y - min_y;
        // 4.0 * 8 = 32 px wide, give or take the cap smoothing
        assert!(width > 28.0 && width < 36.0, "width was {width}");
    }

    #[test]
    fn test_pressure_simulation_follows_first_sample() {
        let mut points = line(10, None);
        points[3].pressure = Some(0.9);
        assert!(OutlineOptions::for_stroke(&stroke(StrokeTool::Pen, points)).simulate_pressure);

        let mut points = line(10, Some(0.7));
        points[3].pressure = None;
        assert!(!OutlineOptions::for_stroke(&stroke(StrokeTool::Pen, points)).simulate_pressure);
    }

    #[test]
    fn test_pressure_thins_pen_strokes() {
        let light = line(20, Some(0.1));
        let heavy = line(20, Some(1.0));
        let light_path = stroke_fill_path(&stroke(StrokeTool::Pen, light));
        let heavy_path = stroke_fill_path(&stroke(StrokeTool::Pen, heavy));

        let height = |p: &FillPath| {
            let (_, min_y, _, max_y) = p.bounds().unwrap();
            max_y - min_y
        };
        assert!(height(&heavy_path) > height(&light_path));
    }

    #[test]
    fn test_fill_path_uses_midpoints() {
        let outline = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)];
        let path = FillPath::from_outline(&outline);
        assert_eq!(path.segments.len(), 3);
        assert_eq!(path.segments[0], QuadSegment { control: outline[0], to: Vec2::new(5.0, 0.0) });
        assert_eq!(path.segments[2].to, Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_streamline_keeps_first_and_last_sample() {
        let points = line(15, None);
        let options = OutlineOptions::for_tool(StrokeTool::Pen, 2.0, true);
        let samples = stroke_points(&points, &options);
        assert_eq!(samples[0].point, Vec2::new(points[0].x, points[0].y));
        let last = samples.last().unwrap().point;
        assert_eq!(last, Vec2::new(points[14].x, points[14].y));
    }

    #[test]
    fn test_vector_helpers() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
        let rotated = Vec2::new(1.0, 0.0).rotate_around(Vec2::ZERO, std::f32::consts::FRAC_PI_2);
        assert!(rotated.x.abs() < 1e-5 && (rotated.y - 1.0).abs() < 1e-5);
        assert_eq!(Vec2::new(2.0, 4.0).midpoint(Vec2::new(4.0, 8.0)), Vec2::new(3.0, 6.0));
    }
}
