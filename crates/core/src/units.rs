//! Percentage helpers for UI controls that size things relative to a container
//!
//! Not used for annotation coordinates, which always live in canonical pixels.

/// Pixels covered by `percent` of `total`
pub fn percent_to_px(percent: f32, total: f32) -> f32 {
    if !percent.is_finite() || !total.is_finite() {
        return 0.0;
    }
    percent / 100.0 * total
}

/// Share of `total` covered by `px`, in percent
pub fn px_to_percent(px: f32, total: f32) -> f32 {
    if total == 0.0 || !px.is_finite() || !total.is_finite() {
        return 0.0;
    }
    px / total * 100.0
}
