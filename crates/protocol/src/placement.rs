use serde::{Deserialize, Serialize};

/// A column-ordered 4x4 affine pose, row-vector convention: the last row
/// carries the translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose(pub [[f64; 4]; 4]);

impl Pose {
    pub fn translation(&self) -> (f64, f64) {
        (self.0[3][0], self.0[3][1])
    }
}

/// Free-transform animation parameters for an advanced comment, fully
/// resolved: poses, opacity ramp, and the three phase boundaries (pre-delay
/// hold, active transform, post-transform hold) clamped to the lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub start: Pose,
    pub end: Pose,
    pub opacity_start: f64,
    pub opacity_end: f64,
    /// Total lifetime in seconds.
    pub lifetime: f64,
    /// Seconds before the pose transform begins.
    pub transform_delay: f64,
    /// Seconds the pose transform runs.
    pub transform_duration: f64,
    pub linear: bool,
    pub stroke: bool,
    pub font_family: String,
    /// The display text extracted from the payload.
    pub text: String,
}

impl TransformSpec {
    /// Opacity at `t` seconds into the lifetime. The ramp is linear over the
    /// whole lifetime regardless of the transform phases.
    pub fn opacity_at(&self, t: f64) -> f64 {
        if self.lifetime <= 0.0 {
            return self.opacity_end;
        }
        let frac = (t / self.lifetime).clamp(0.0, 1.0);
        self.opacity_start + (self.opacity_end - self.opacity_start) * frac
    }

    /// Pose at `t` seconds into the lifetime: held at `start` before the
    /// transform phase, interpolated across it, held at `end` after.
    pub fn pose_at(&self, t: f64) -> Pose {
        if t <= self.transform_delay || self.transform_duration <= 0.0 {
            return self.start;
        }
        let frac = ((t - self.transform_delay) / self.transform_duration).clamp(0.0, 1.0);
        let mut m = self.start.0;
        for col in 0..4 {
            m[3][col] += (self.end.0[3][col] - self.start.0[3][col]) * frac;
        }
        Pose(m)
    }
}

/// How an admitted comment moves across the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Motion {
    /// Horizontal translation from `from_x` to `to_x` over the duration.
    Scroll { from_x: f64, to_x: f64 },
    /// Stationary, horizontally centered; the lane offset is measured from
    /// the top edge when `from_bottom` is false, from the bottom otherwise.
    Rest { from_bottom: bool },
    /// Free transform driven by an advanced payload.
    Transform(Box<TransformSpec>),
}

/// Everything the rendering surface needs to mount and animate one comment.
///
/// The engine owns timing: it schedules the matching removal itself, so the
/// surface only paints and moves the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Cross-axis offset of the reserved lane. May exceed the surface extent
    /// when multi-lane overflow kicked in; presentation wraps it with
    /// `lane % surface_extent`.
    pub lane: f64,
    /// Measured text box, pixels.
    pub width: f64,
    pub height: f64,
    /// Remaining visible lifetime in seconds (already shortened by `delay`).
    pub duration: f64,
    /// Seconds already elapsed of the nominal animation; non-zero when the
    /// comment is admitted mid-flight after a seek. The surface starts the
    /// animation this far in rather than from the beginning.
    pub delay: f64,
    pub font_size: f64,
    pub opacity: f64,
    pub motion: Motion,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TransformSpec {
        let mut start = [[0.0; 4]; 4];
        let mut end = [[0.0; 4]; 4];
        for i in 0..4 {
            start[i][i] = 1.0;
            end[i][i] = 1.0;
        }
        start[3][0] = 100.0;
        end[3][0] = 300.0;
        TransformSpec {
            start: Pose(start),
            end: Pose(end),
            opacity_start: 1.0,
            opacity_end: 0.0,
            lifetime: 4.0,
            transform_delay: 1.0,
            transform_duration: 2.0,
            linear: true,
            stroke: false,
            font_family: String::new(),
            text: "t".into(),
        }
    }

    #[test]
    fn opacity_ramps_linearly_over_lifetime() {
        let s = spec();
        assert!((s.opacity_at(0.0) - 1.0).abs() < 1e-9);
        assert!((s.opacity_at(2.0) - 0.5).abs() < 1e-9);
        assert!((s.opacity_at(4.0)).abs() < 1e-9);
        assert!((s.opacity_at(99.0)).abs() < 1e-9);
    }

    #[test]
    fn pose_holds_then_interpolates_then_holds() {
        let s = spec();
        assert_eq!(s.pose_at(0.5).translation().0, 100.0);
        assert!((s.pose_at(2.0).translation().0 - 200.0).abs() < 1e-9);
        assert_eq!(s.pose_at(3.5).translation().0, 300.0);
    }
}
