//! Core engine for barrage: a scheduling and lane-allocation engine for
//! timed overlay comments ("bullet comments") over media playback.
//!
//! The host owns playback and rendering; this crate owns everything in
//! between. A [`Scheduler`] releases comments as the media position passes
//! their timestamps, per-mode [geometry strategies](geometry) turn each
//! release into a [`barrage_protocol::Placement`], a [`LaneAllocator`] per
//! mode keeps concurrent comments from overlapping, and a pausable
//! [`Clock`] times each mounted node's removal. [`Engine`] wires the
//! pieces to a host-provided [`RenderSurface`].

pub mod alloc;
pub mod clock;
pub mod engine;
pub mod feed;
pub mod geometry;
pub mod scheduler;

pub use alloc::{LaneAllocator, LaneRequest, Segment};
pub use clock::{Clock, ManualSource, MonotonicSource, TimeSource};
pub use engine::{Engine, HeuristicMeasurer, NodeId, RenderSurface, TextMeasurer};
pub use feed::{FeedError, parse_json};
pub use geometry::{GeometryStrategy, LayoutContext, PlacementError, strategy_for, velocity};
pub use scheduler::{Release, Scheduler};
