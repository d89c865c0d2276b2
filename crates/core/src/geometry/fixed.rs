use barrage_protocol::{Comment, Motion, Placement};

use crate::alloc::{LaneAllocator, LaneRequest};
use crate::geometry::{GeometryStrategy, LayoutContext, PlacementError};

/// Resting comments hold their lane for a fixed five seconds.
pub const FIXED_LIFETIME: f64 = 5.0;

/// Top- and bottom-pinned comments: no horizontal motion, purely temporal
/// lane freeness.
pub struct FixedStrategy {
    pub from_bottom: bool,
}

impl GeometryStrategy for FixedStrategy {
    fn place(
        &self,
        comment: &Comment,
        ctx: &LayoutContext,
        lanes: &mut LaneAllocator,
    ) -> Result<Placement, PlacementError> {
        let remaining = FIXED_LIFETIME - ctx.delay;
        if remaining <= 0.0 {
            return Err(PlacementError::Expired);
        }

        let lane = lanes
            .try_allocate(&LaneRequest {
                appear_at: comment.appear_at,
                duration: remaining,
                width: ctx.width,
                height: ctx.height,
            })
            .ok_or(PlacementError::Exhausted)?;

        Ok(Placement {
            lane,
            width: ctx.width,
            height: ctx.height,
            duration: remaining,
            delay: ctx.delay,
            font_size: ctx.font_size,
            opacity: ctx.opacity,
            motion: Motion::Rest {
                from_bottom: self.from_bottom,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use barrage_protocol::CommentMode;

    use super::*;

    fn ctx() -> LayoutContext {
        LayoutContext {
            surface_width: 800.0,
            surface_height: 600.0,
            width: 120.0,
            height: 30.0,
            speed: 1.0,
            delay: 0.0,
            font_size: 25.0,
            opacity: 0.8,
        }
    }

    #[test]
    fn rests_for_five_seconds() {
        let strategy = FixedStrategy { from_bottom: false };
        let mut lanes = LaneAllocator::new(600.0);
        let c = Comment::new(0.0, CommentMode::Top, "x");
        let p = strategy.place(&c, &ctx(), &mut lanes).unwrap();
        assert!((p.duration - FIXED_LIFETIME).abs() < 1e-9);
        assert!(matches!(p.motion, Motion::Rest { from_bottom: false }));
    }

    #[test]
    fn seek_past_lifetime_drops_before_allocation() {
        let strategy = FixedStrategy { from_bottom: true };
        let mut lanes = LaneAllocator::new(600.0);
        let c = Comment::new(0.0, CommentMode::Bottom, "x");
        let mut context = ctx();
        context.delay = 6.0;
        assert!(matches!(
            strategy.place(&c, &context, &mut lanes),
            Err(PlacementError::Expired)
        ));
        // Nothing was reserved.
        assert!(lanes.lists().iter().all(Vec::is_empty));
    }

    #[test]
    fn concurrent_resting_comments_stack() {
        let strategy = FixedStrategy { from_bottom: true };
        let mut lanes = LaneAllocator::new(100.0);
        let context = LayoutContext {
            height: 40.0,
            ..ctx()
        };
        let c = Comment::new(0.0, CommentMode::Bottom, "x");
        let first = strategy.place(&c, &context, &mut lanes).unwrap();
        let second = strategy.place(&c, &context, &mut lanes).unwrap();
        assert_eq!(first.lane, 0.0);
        assert_eq!(second.lane, 40.0);
        assert!(matches!(
            strategy.place(&c, &context, &mut lanes),
            Err(PlacementError::Exhausted)
        ));
    }
}
