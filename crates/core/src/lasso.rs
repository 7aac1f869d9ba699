//! Lasso selection and hit-testing
//!
//! A stroke belongs to a lasso selection when any one of its sample points lies
//! inside the lasso polygon (ray casting, even-odd).

use crate::model::{Stroke, StrokePoint};

/// Ray-casting point-in-polygon test
///
/// Polygons with fewer than three vertices contain nothing.
pub fn point_in_polygon(x: f32, y: f32, polygon: &[StrokePoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let (xi, yi) = (polygon[i].x, polygon[i].y);
        let (xj, yj) = (polygon[j].x, polygon[j].y);

        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Whether any point of the stroke is inside the lasso
pub fn stroke_in_lasso(stroke: &Stroke, lasso: &[StrokePoint]) -> bool {
    lasso.len() >= 3 && stroke.points.iter().any(|p| point_in_polygon(p.x, p.y, lasso))
}

/// Indices of the strokes captured by a lasso, ascending
pub fn select_strokes(strokes: &[Stroke], lasso: &[StrokePoint]) -> Vec<usize> {
    if lasso.len() < 3 {
        return Vec::new();
    }

    strokes
        .iter()
        .enumerate()
        .filter(|(_, stroke)| stroke_in_lasso(stroke, lasso))
        .map(|(index, _)| index)
        .collect()
}

/// Topmost stroke whose centre line passes within `tolerance` of a point
pub fn stroke_at(strokes: &[Stroke], x: f32, y: f32, tolerance: f32) -> Option<usize> {
    let target = StrokePoint::new(x, y);
    strokes.iter().enumerate().rev().find_map(|(index, stroke)| {
        let reach = tolerance + stroke.size / 2.0;
        let hit = match stroke.points.as_slice() {
            [] => false,
            [only] => only.distance_to(&target) <= reach,
            points => points.windows(2).any(|w| point_near_segment(&target, &w[0], &w[1], reach)),
        };
        hit.then_some(index)
    })
}

fn point_near_segment(
    point: &StrokePoint,
    start: &StrokePoint,
    end: &StrokePoint,
    tolerance: f32,
) -> bool {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-6 {
        return point.distance_to(start) <= tolerance;
    }

    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq).clamp(0.0, 1.0);
    let closest = StrokePoint::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&closest) <= tolerance
}

/// Strokes selected on one page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    /// Zero-based page index
    pub page: usize,
    /// Ascending, de-duplicated stroke indices
    pub indices: Vec<usize>,
}

impl Selection {
    pub fn new(page: usize, mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self { page, indices }
    }

    /// Run a lasso over the strokes of `page`
    pub fn from_lasso(page: usize, strokes: &[Stroke], lasso: &[StrokePoint]) -> Self {
        Self { page, indices: select_strokes(strokes, lasso) }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }
}
