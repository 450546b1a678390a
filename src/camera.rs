//! Free-fly camera rig: heading/pitch orientation driven by jerk-smoothed
//! pointer deltas, integer scroll-zoom, and zoom-distance smoothing (§4.6).
//! Grounded on the teacher's `bevy_panorbit_camera` integration (an orbit
//! camera driven by heading/pitch/radius) generalized here to a standalone
//! struct that composes its own view/projection matrices instead of
//! leaning on Bevy's `Transform`.

use glam::{Mat4, Vec3};

const TWO_PI: f32 = std::f32::consts::TAU;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
const DEG_PER_PIXEL_RAD: f32 = 0.066 * std::f32::consts::PI / 180.0;

/// Pointer deltas larger than this, arriving more than `JERK_RATIO` times
/// the previous frame's delta, are treated as a single-frame pointer-lock
/// spike rather than real input (§4.6 "Jerk smoothing").
const JERK_THRESHOLD: f32 = 400.0;
const JERK_RATIO: f32 = 4.0;
/// Weight kept from the old history value when a spike is suppressed, so
/// the tracked delta drifts toward a genuine trend instead of freezing.
const JERK_HISTORY_BLEND: f32 = 0.5;

/// Replaces `raw` with the last-seen delta when it looks like a
/// single-frame pointer-lock spike, and folds it into `last` either way —
/// a blend on suppression, a direct replacement otherwise (§4.6).
fn suppress_jerk(last: &mut f32, raw: f32) -> f32 {
    let is_spike = raw.abs() > JERK_THRESHOLD && *last != 0.0 && (raw / *last).abs() > JERK_RATIO;
    if is_spike {
        let used = *last;
        *last = *last * JERK_HISTORY_BLEND + raw * (1.0 - JERK_HISTORY_BLEND);
        used
    } else {
        *last = raw;
        raw
    }
}

/// Smooths a value toward a target by an exponential-decay factor per
/// step: multiplying the remaining error by `(1 - rate)^dt` rather than
/// snapping directly avoids a visible pop when the zoom target changes.
/// Distinct from jerk smoothing above — this only ever damps the
/// zoom/follow distance, never heading or pitch.
fn smooth_towards(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    let decay = (1.0 - rate).clamp(0.0, 1.0).powf(dt.max(0.0));
    target + (current - target) * decay
}

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    heading: f32,
    pitch: f32,
    last_dx: f32,
    last_dy: f32,
    zoom: f32,
    smoothed_zoom: f32,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Camera {
    pub fn new(position: Vec3, aspect: f32) -> Self {
        Self {
            position,
            heading: 0.0,
            pitch: 0.0,
            last_dx: 0.0,
            last_dy: 0.0,
            zoom: 4.0,
            smoothed_zoom: 4.0,
            fov_y: 60f32.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Rotates from a raw frame pointer delta `(dx, dy)` in pixels (§4.6).
    /// Each axis is passed through [`suppress_jerk`] before being scaled
    /// into radians, so a single-frame pointer-lock spike never swings the
    /// camera; heading wraps into `[0, 2pi)` and pitch clamps to just
    /// short of vertical.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let dx = suppress_jerk(&mut self.last_dx, dx);
        let dy = suppress_jerk(&mut self.last_dy, dy);
        self.heading = (self.heading + dx * DEG_PER_PIXEL_RAD).rem_euclid(TWO_PI);
        self.pitch = (self.pitch + dy * DEG_PER_PIXEL_RAD).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Scroll-wheel zoom: `delta` is the signed step count for this event
    /// (typically `±1` per wheel notch), clamped to `[0, 10]` integer zoom
    /// levels (§4.6 "Scroll zoom").
    pub fn scroll_zoom(&mut self, delta: i32) {
        self.zoom = (self.zoom + delta as f32).clamp(0.0, 10.0);
    }

    /// Advances smoothing of the zoom distance toward its target by `dt`
    /// seconds. Heading/pitch are not smoothed — only the distance.
    pub fn update(&mut self, dt: f32) {
        self.smoothed_zoom = smooth_towards(self.smoothed_zoom, self.zoom, 0.85, dt);
    }

    /// Unit direction the camera looks along: `+z` rotated about x by
    /// pitch, then about y by heading (§4.6).
    pub fn direction(&self) -> Vec3 {
        let (sh, ch) = self.heading.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(ch * cp, sp, sh * cp).normalize()
    }

    fn view_matrix_from(&self, position: Vec3) -> Mat4 {
        let eye = position - self.direction() * self.smoothed_zoom;
        Mat4::look_at_rh(eye, position, Vec3::Y)
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix_from(self.position)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Builds `projection * view` for a mesh anchored at world position
    /// `offset` rather than the origin, by subtracting `offset` from the
    /// camera's own position before the view matrix is built (§4.6
    /// `getTransformFor`) — lets per-chunk world positions be folded into
    /// the transform instead of baked into every vertex.
    pub fn get_transform_for(&self, offset: Vec3) -> Mat4 {
        self.projection_matrix() * self.view_matrix_from(self.position - offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_wraps_heading_and_clamps_pitch() {
        let mut cam = Camera::new(Vec3::ZERO, 1.0);
        let big = TWO_PI / DEG_PER_PIXEL_RAD;
        cam.rotate(big + 0.1 / DEG_PER_PIXEL_RAD, 100_000.0 / DEG_PER_PIXEL_RAD);
        assert!((cam.heading - 0.1).abs() < 1e-2);
        assert!(cam.pitch < std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn scroll_zoom_is_clamped() {
        let mut cam = Camera::new(Vec3::ZERO, 1.0);
        for _ in 0..20 {
            cam.scroll_zoom(-1);
        }
        assert_eq!(cam.zoom, 0.0);
        for _ in 0..20 {
            cam.scroll_zoom(1);
        }
        assert_eq!(cam.zoom, 10.0);
    }

    #[test]
    fn zoom_smoothing_converges_without_overshoot() {
        let mut cam = Camera::new(Vec3::ZERO, 1.0);
        cam.scroll_zoom(6); // target becomes 10.0
        for _ in 0..600 {
            cam.update(1.0 / 60.0);
        }
        assert!((cam.smoothed_zoom - 10.0).abs() < 0.01);
    }

    #[test]
    fn direction_is_unit_length() {
        let mut cam = Camera::new(Vec3::ZERO, 1.0);
        cam.rotate(20.0, 8.0);
        assert!((cam.direction().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn a_single_frame_spike_is_replaced_by_the_previous_delta() {
        let mut last = 10.0f32;
        let used = suppress_jerk(&mut last, 5000.0);
        assert_eq!(used, 10.0);
        // history drifts toward the spike instead of freezing at 10.0
        assert!(last > 10.0 && last < 5000.0);
    }

    #[test]
    fn a_small_delta_is_never_suppressed() {
        let mut last = 10.0f32;
        let used = suppress_jerk(&mut last, 12.0);
        assert_eq!(used, 12.0);
        assert_eq!(last, 12.0);
    }

    #[test]
    fn a_large_delta_consistent_with_history_is_not_a_spike() {
        // ratio to the previous delta stays under JERK_RATIO, so a
        // genuinely fast real turn is not mistaken for a spike
        let mut last = 300.0f32;
        let used = suppress_jerk(&mut last, 500.0);
        assert_eq!(used, 500.0);
        assert_eq!(last, 500.0);
    }

    #[test]
    fn get_transform_for_matches_view_projection_at_zero_offset() {
        let cam = Camera::new(Vec3::new(1.0, 2.0, 3.0), 1.0);
        let direct = cam.view_projection();
        let offset = cam.get_transform_for(Vec3::ZERO);
        for i in 0..16 {
            assert!((direct.to_cols_array()[i] - offset.to_cols_array()[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn get_transform_for_folds_the_offset_into_the_eye_position() {
        let mut cam = Camera::new(Vec3::new(5.0, 0.0, 0.0), 1.0);
        cam.scroll_zoom(0);
        let shifted = cam.get_transform_for(Vec3::new(5.0, 0.0, 0.0));
        // with the mesh offset equal to the camera's own position, this is
        // the transform a camera sitting at the origin would produce
        let at_origin = Camera::new(Vec3::ZERO, 1.0).view_projection();
        for i in 0..16 {
            assert!((shifted.to_cols_array()[i] - at_origin.to_cols_array()[i]).abs() < 1e-4);
        }
    }
}
