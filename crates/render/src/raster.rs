//! Anti-aliased polygon fill
//!
//! Scanline fill with the non-zero winding rule. Each pixel row is sampled on a few
//! sub-rows and horizontal coverage is exact, so one call fills a whole shape in a
//! single pass and overlapping parts of the same shape never blend twice.

use image::Rgba;
use scoremark_core::Vec2;

use crate::engine::RgbaImage;

const SUBSAMPLES: usize = 4;

/// How filled coverage is applied to the target
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    /// Source-over with a straight-alpha color
    Over { r: u8, g: u8, b: u8, alpha: f32 },
    /// Remove alpha from the target
    Erase,
}

/// Fill `polygons` as one shape
pub fn fill_polygons(target: &mut RgbaImage, polygons: &[Vec<Vec2>], paint: Paint) {
    let (width, height) = target.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let edges: Vec<(Vec2, Vec2)> = polygons
        .iter()
        .filter(|polygon| polygon.len() >= 3)
        .flat_map(|polygon| {
            polygon.iter().enumerate().map(move |(i, &a)| (a, polygon[(i + 1) % polygon.len()]))
        })
        .filter(|(a, b)| {
            a.y != b.y && a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()
        })
        .collect();

    if edges.is_empty() {
        return;
    }

    let (mut min_y, mut max_y, mut min_x, mut max_x) = (f32::MAX, f32::MIN, f32::MAX, f32::MIN);
    for (a, b) in &edges {
        min_y = min_y.min(a.y.min(b.y));
        max_y = max_y.max(a.y.max(b.y));
        min_x = min_x.min(a.x.min(b.x));
        max_x = max_x.max(a.x.max(b.x));
    }

    let row_start = min_y.floor().max(0.0) as u32;
    let row_end = (max_y.ceil().max(0.0) as u32).min(height);
    let col_start = min_x.floor().max(0.0) as u32;
    let col_end = (max_x.ceil().max(0.0) as u32).min(width);
    if row_start >= row_end || col_start >= col_end {
        return;
    }

    let span = (col_end - col_start) as usize;
    let mut coverage = vec![0.0f32; span];
    let mut crossings: Vec<(f32, i32)> = Vec::new();
    let weight = 1.0 / SUBSAMPLES as f32;

    for row in row_start..row_end {
        coverage.iter_mut().for_each(|c| *c = 0.0);

        for sub in 0..SUBSAMPLES {
            let sample_y = row as f32 + (sub as f32 + 0.5) * weight;

            crossings.clear();
            for (a, b) in &edges {
                let (top, bottom, winding) = if a.y < b.y { (a, b, 1) } else { (b, a, -1) };
                if sample_y < top.y || sample_y >= bottom.y {
                    continue;
                }
                let t = (sample_y - top.y) / (bottom.y - top.y);
                crossings.push((top.x + (bottom.x - top.x) * t, winding));
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if winding != 0 {
                    add_span(&mut coverage, col_start as f32, pair[0].0, pair[1].0, weight);
                }
            }
        }

        for (offset, &cover) in coverage.iter().enumerate() {
            if cover <= 0.0 {
                continue;
            }
            let pixel = target.get_pixel_mut(col_start + offset as u32, row);
            apply(pixel, paint, cover.min(1.0));
        }
    }
}

fn add_span(coverage: &mut [f32], origin: f32, start: f32, end: f32, weight: f32) {
    let limit = coverage.len() as f32;
    let start = (start - origin).clamp(0.0, limit);
    let end = (end - origin).clamp(0.0, limit);
    if end <= start {
        return;
    }

    let first = start.floor() as usize;
    let last = end.floor() as usize;
    if first == last {
        coverage[first] += (end - start) * weight;
        return;
    }

    coverage[first] += (first as f32 + 1.0 - start) * weight;
    for cell in &mut coverage[first + 1..last] {
        *cell += weight;
    }
    if last < coverage.len() {
        coverage[last] += (end - last as f32) * weight;
    }
}

fn apply(pixel: &mut Rgba<u8>, paint: Paint, coverage: f32) {
    match paint {
        Paint::Over { r, g, b, alpha } => {
            let src_a = (alpha * coverage).clamp(0.0, 1.0);
            if src_a <= 0.0 {
                return;
            }
            let dst_a = pixel[3] as f32 / 255.0;
            let out_a = src_a + dst_a * (1.0 - src_a);
            let blend = |src: u8, dst: u8| {
                let value = (src as f32 * src_a + dst as f32 * dst_a * (1.0 - src_a)) / out_a;
                value.round().clamp(0.0, 255.0) as u8
            };
            let alpha = (out_a * 255.0).round() as u8;
            *pixel = Rgba([blend(r, pixel[0]), blend(g, pixel[1]), blend(b, pixel[2]), alpha]);
        }
        Paint::Erase => {
            let remaining = pixel[3] as f32 * (1.0 - coverage);
            pixel[3] = remaining.round().clamp(0.0, 255.0) as u8;
            if pixel[3] == 0 {
                *pixel = Rgba([0, 0, 0, 0]);
            }
        }
    }
}

/// Composite `overlay` onto `base` in place (source-over)
pub fn composite_over(base: &mut RgbaImage, overlay: &RgbaImage) {
    if base.dimensions() != overlay.dimensions() {
        return;
    }
    for (dst, src) in base.pixels_mut().zip(overlay.pixels()) {
        if src[3] == 0 {
            continue;
        }
        let alpha = src[3] as f32 / 255.0;
        apply(dst, Paint::Over { r: src[0], g: src[1], b: src[2], alpha }, 1.0);
    }
}
