//! Per-mode placement: each presentation mode computes a comment's
//! duration, velocity and lane request, and yields the [`Placement`] bundle
//! handed to the rendering surface.

pub mod advanced;
pub mod fixed;
pub mod scroll;

use barrage_protocol::{Comment, CommentMode, Placement};
use thiserror::Error;

use crate::alloc::LaneAllocator;

/// Everything a strategy needs besides the comment itself.
#[derive(Debug, Clone, Copy)]
pub struct LayoutContext {
    pub surface_width: f64,
    pub surface_height: f64,
    /// Measured comment box, pixels.
    pub width: f64,
    pub height: f64,
    /// Scroll velocity multiplier from the options.
    pub speed: f64,
    /// Seconds of animation already elapsed (mid-flight admission after a
    /// seek); zero during normal playback.
    pub delay: f64,
    pub font_size: f64,
    pub opacity: f64,
}

/// Why a single comment's admission failed. Always local to that comment.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// The allocator has no free lane; the comment is dropped, not retried.
    #[error("no free lane")]
    Exhausted,
    /// The comment's lifetime already elapsed before admission.
    #[error("lifetime already elapsed")]
    Expired,
    #[error("malformed advanced payload: {0}")]
    Malformed(#[from] advanced::AdvancedParseError),
}

/// One implementation per presentation mode.
pub trait GeometryStrategy {
    fn place(
        &self,
        comment: &Comment,
        ctx: &LayoutContext,
        lanes: &mut LaneAllocator,
    ) -> Result<Placement, PlacementError>;
}

/// Width-derived scroll velocity in px/s: wider comments move faster so
/// everything on screen reads at a similar pace.
pub fn velocity(width: f64, speed: f64) -> f64 {
    (40.0 * width.max(1.0).log10() + 100.0) * speed
}

static SCROLL: scroll::ScrollStrategy = scroll::ScrollStrategy { reverse: false };
static REVERSE: scroll::ScrollStrategy = scroll::ScrollStrategy { reverse: true };
static TOP: fixed::FixedStrategy = fixed::FixedStrategy { from_bottom: false };
static BOTTOM: fixed::FixedStrategy = fixed::FixedStrategy { from_bottom: true };
static ADVANCED: advanced::AdvancedStrategy = advanced::AdvancedStrategy;

/// Mode dispatch. Unknown numeric feed codes already collapsed to `Scroll`
/// at ingestion, so this lookup is total.
pub fn strategy_for(mode: CommentMode) -> &'static dyn GeometryStrategy {
    match mode {
        CommentMode::Scroll => &SCROLL,
        CommentMode::Reverse => &REVERSE,
        CommentMode::Top => &TOP,
        CommentMode::Bottom => &BOTTOM,
        CommentMode::Advanced => &ADVANCED,
    }
}
