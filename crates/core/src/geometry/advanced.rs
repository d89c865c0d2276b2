//! Free-transform ("advanced") comments.
//!
//! The structured payload rides in the comment's text field as a JSON array:
//!
//! ```text
//! [120, 340, "1-0", 3.85, "text", 30, 20, 560, 780, 1000, 300, 0, "NSimSun", 1]
//!  │    │     │     │      │      │   │   │    │    │     │    │   │         └ stroke flag
//!  │    │     │     │      │      │   │   │    │    │     │    │   └ font family
//!  │    │     │     │      │      │   │   │    │    │     │    └ linear easing flag
//!  │    │     │     │      │      │   │   │    │    │     └ transform delay (ms)
//!  │    │     │     │      │      │   │   │    │    └ transform duration (ms)
//!  │    │     │     │      │      │   │   └────┴ end x, y
//!  │    │     │     │      │      └───┴ rotation around Z, Y (degrees)
//!  │    │     │     │      └ display text
//!  │    │     │     └ lifetime (s)
//!  │    │     └ "opacityStart-opacityEnd"
//!  └────┴ start x, y
//! ```
//!
//! Numbers may arrive as JSON numbers or numeric strings; coordinates below
//! 1.0 are fractions of the surface. Anything non-numeric, non-finite, or a
//! non-positive lifetime rejects the whole comment; it never reaches the
//! rendering surface.

use std::f64::consts::PI;

use barrage_protocol::{Comment, Motion, Placement, Pose, TransformSpec};
use serde_json::Value;
use thiserror::Error;

use crate::alloc::LaneAllocator;
use crate::geometry::{GeometryStrategy, LayoutContext, PlacementError};

#[derive(Debug, Error)]
pub enum AdvancedParseError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not an array")]
    NotAnArray,
    #[error("payload has {0} elements, need at least 9")]
    TooShort(usize),
    #[error("non-numeric field at index {0}")]
    NonNumeric(usize),
    #[error("malformed opacity ramp {0:?}")]
    BadOpacity(String),
    #[error("non-positive lifetime")]
    BadLifetime,
}

fn numeric(params: &[Value], index: usize) -> Result<f64, AdvancedParseError> {
    let value = match params.get(index) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(AdvancedParseError::NonNumeric(index)),
    }
}

fn numeric_or(params: &[Value], index: usize, default: f64) -> Result<f64, AdvancedParseError> {
    if params.get(index).is_none_or(Value::is_null) {
        return Ok(default);
    }
    numeric(params, index)
}

fn truthy(params: &[Value], index: usize) -> bool {
    match params.get(index) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "0",
        _ => false,
    }
}

fn text_at(params: &[Value], index: usize) -> String {
    match params.get(index) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Row-vector pose from Z/Y rotation angles (degrees) and a translation.
fn pose(rot_z: f64, rot_y: f64, x: f64, y: f64) -> Pose {
    let (sin_z, cos_z) = (-rot_z * PI / 180.0).sin_cos();
    let (sin_y, cos_y) = (rot_y * PI / 180.0).sin_cos();
    Pose([
        [cos_y * cos_z, -cos_y * sin_z, sin_y, 0.0],
        [sin_z, cos_z, 0.0, 0.0],
        [-sin_y * cos_z, sin_y * sin_z, cos_y, 0.0],
        [x, y, 0.0, 1.0],
    ])
}

/// Parse and validate an advanced payload against the current surface size.
pub fn parse_payload(
    text: &str,
    surface_width: f64,
    surface_height: f64,
) -> Result<TransformSpec, AdvancedParseError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Array(params) = value else {
        return Err(AdvancedParseError::NotAnArray);
    };
    if params.len() < 9 {
        return Err(AdvancedParseError::TooShort(params.len()));
    }

    let mut start_x = numeric(&params, 0)?;
    let mut start_y = numeric(&params, 1)?;
    let mut end_x = numeric(&params, 7)?;
    let mut end_y = numeric(&params, 8)?;
    let lifetime = numeric(&params, 3)?;
    if lifetime <= 0.0 {
        return Err(AdvancedParseError::BadLifetime);
    }

    let ramp = text_at(&params, 2);
    let (opacity_start, opacity_end) = ramp
        .split_once('-')
        .and_then(|(a, b)| Some((a.trim().parse::<f64>().ok()?, b.trim().parse::<f64>().ok()?)))
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .ok_or_else(|| AdvancedParseError::BadOpacity(ramp.clone()))?;

    let rot_z = numeric_or(&params, 5, 0.0)?;
    let rot_y = numeric_or(&params, 6, 0.0)?;
    let mut transform_duration = numeric_or(&params, 9, 0.0)? / 1000.0;
    let mut transform_delay = numeric_or(&params, 10, 0.0)? / 1000.0;

    // Fractional coordinates are surface-relative.
    if start_x < 1.0 {
        start_x *= surface_width;
    }
    if start_y < 1.0 {
        start_y *= surface_height;
    }
    if end_x < 1.0 {
        end_x *= surface_width;
    }
    if end_y < 1.0 {
        end_y *= surface_height;
    }

    // Clamp the transform phases inside the lifetime.
    transform_delay = transform_delay.clamp(0.0, lifetime);
    if transform_delay + transform_duration > lifetime {
        transform_duration = lifetime - transform_delay;
    }
    transform_duration = transform_duration.max(0.0);

    Ok(TransformSpec {
        start: pose(rot_z, rot_y, start_x, start_y),
        end: pose(rot_z, rot_y, end_x, end_y),
        opacity_start,
        opacity_end,
        lifetime,
        transform_delay,
        transform_duration,
        linear: truthy(&params, 11),
        stroke: truthy(&params, 13),
        font_family: text_at(&params, 12),
        text: text_at(&params, 4),
    })
}

/// Advanced comments bypass lane allocation entirely; the payload carries
/// its own coordinates.
pub struct AdvancedStrategy;

impl GeometryStrategy for AdvancedStrategy {
    fn place(
        &self,
        comment: &Comment,
        ctx: &LayoutContext,
        _lanes: &mut LaneAllocator,
    ) -> Result<Placement, PlacementError> {
        let spec = parse_payload(&comment.text, ctx.surface_width, ctx.surface_height)?;
        let remaining = spec.lifetime - ctx.delay;
        if remaining <= 0.0 {
            return Err(PlacementError::Expired);
        }

        Ok(Placement {
            lane: 0.0,
            width: ctx.surface_width,
            height: ctx.surface_height,
            duration: remaining,
            delay: ctx.delay,
            // Advanced comments use their raw size, not the scaled font.
            font_size: comment.size,
            opacity: ctx.opacity,
            motion: Motion::Transform(Box::new(spec)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str =
        r#"[120,340,"1-0",3.85,"advanced test",30,20,560,780,1000,300,0,"NSimSun",1]"#;

    #[test]
    fn parses_the_documented_sample() {
        let spec = parse_payload(SAMPLE, 1920.0, 1080.0).unwrap();
        assert_eq!(spec.start.translation(), (120.0, 340.0));
        assert_eq!(spec.end.translation(), (560.0, 780.0));
        assert!((spec.lifetime - 3.85).abs() < 1e-9);
        assert!((spec.opacity_start - 1.0).abs() < 1e-9);
        assert!(spec.opacity_end.abs() < 1e-9);
        assert!((spec.transform_duration - 1.0).abs() < 1e-9);
        assert!((spec.transform_delay - 0.3).abs() < 1e-9);
        assert!(!spec.linear);
        assert!(spec.stroke);
        assert_eq!(spec.font_family, "NSimSun");
        assert_eq!(spec.text, "advanced test");
    }

    #[test]
    fn zero_rotation_yields_identity_orientation() {
        let spec = parse_payload(r#"[10,20,"1-1",2,"t",0,0,30,40]"#, 800.0, 600.0).unwrap();
        let m = spec.start.0;
        assert_eq!(m[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(m[1], [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(m[2], [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(m[3], [10.0, 20.0, 0.0, 1.0]);
    }

    #[test]
    fn fractional_coordinates_scale_to_the_surface() {
        let spec = parse_payload(r#"[0.5,0.25,"1-1",2,"t",0,0,0.75,0.5]"#, 800.0, 600.0).unwrap();
        assert_eq!(spec.start.translation(), (400.0, 150.0));
        assert_eq!(spec.end.translation(), (600.0, 300.0));
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let spec =
            parse_payload(r#"["120","340","1-0","3.85","t","0","0","560","780"]"#, 1.0, 1.0)
                .unwrap();
        assert_eq!(spec.start.translation(), (120.0, 340.0));
    }

    #[test]
    fn phases_clamp_to_the_lifetime() {
        // 9s transform delayed 2s inside a 3s lifetime.
        let spec = parse_payload(r#"[10,20,"1-0",3,"t",0,0,30,40,9000,2000]"#, 1.0, 1.0).unwrap();
        assert!((spec.transform_delay - 2.0).abs() < 1e-9);
        assert!((spec.transform_duration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_payload("not-json", 1.0, 1.0),
            Err(AdvancedParseError::Json(_))
        ));
        assert!(matches!(
            parse_payload("{\"a\":1}", 1.0, 1.0),
            Err(AdvancedParseError::NotAnArray)
        ));
        assert!(matches!(
            parse_payload("[1,2,3]", 1.0, 1.0),
            Err(AdvancedParseError::TooShort(3))
        ));
        assert!(matches!(
            parse_payload(r#"[1,"oops","1-0",3,"t",0,0,5,6]"#, 1.0, 1.0),
            Err(AdvancedParseError::NonNumeric(1))
        ));
        assert!(matches!(
            parse_payload(r#"[1,2,"bad",3,"t",0,0,5,6]"#, 1.0, 1.0),
            Err(AdvancedParseError::BadOpacity(_))
        ));
        assert!(matches!(
            parse_payload(r#"[1,2,"1-0",0,"t",0,0,5,6]"#, 1.0, 1.0),
            Err(AdvancedParseError::BadLifetime)
        ));
    }
}
