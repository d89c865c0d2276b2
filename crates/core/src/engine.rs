//! The playback-facing engine: owns the clock, the scheduler and one lane
//! allocator per presentation mode, and drives comments from release to
//! removal.
//!
//! The engine is single-threaded and tick-driven. The host calls the
//! `handle_*` methods as playback events arrive and `tick` once per frame
//! with the current media position; everything else follows from those.

use std::rc::Rc;

use barrage_protocol::{Comment, CommentMode, EngineOptions, Placement};
use tracing::{debug, warn};

use crate::alloc::LaneAllocator;
use crate::clock::{Clock, MonotonicSource, TimeSource};
use crate::geometry::{LayoutContext, PlacementError, strategy_for};
use crate::scheduler::{Release, Scheduler};

/// Handle for one mounted comment on the rendering surface.
pub type NodeId = u64;

/// What the engine needs from a renderer. The engine owns all timing: it
/// schedules each node's removal itself, so a surface only paints.
pub trait RenderSurface {
    fn mount(&mut self, id: NodeId, comment: &Comment, placement: &Placement);
    fn remove(&mut self, id: NodeId);
}

/// Text extent oracle, `(width, height)` in pixels for a given font size.
pub trait TextMeasurer {
    fn measure(&self, text: &str, font_size: f64) -> (f64, f64);
}

/// Glyph-count heuristic: ASCII at 0.6em, everything else (CJK and friends)
/// at a full em. Hosts with real font metrics substitute their own.
pub struct HeuristicMeasurer;

impl TextMeasurer for HeuristicMeasurer {
    fn measure(&self, text: &str, font_size: f64) -> (f64, f64) {
        let width: f64 = text
            .chars()
            .map(|ch| if ch.is_ascii() { font_size * 0.6 } else { font_size })
            .sum();
        (width.ceil(), (font_size + 4.0).ceil())
    }
}

/// One allocator per presentation mode. Advanced comments position
/// themselves, so their allocator exists only to keep dispatch uniform.
struct LaneBank {
    scroll: LaneAllocator,
    reverse: LaneAllocator,
    top: LaneAllocator,
    bottom: LaneAllocator,
    advanced: LaneAllocator,
}

impl LaneBank {
    fn new(scroll_extent: f64, full_extent: f64) -> Self {
        Self {
            scroll: LaneAllocator::new(scroll_extent),
            reverse: LaneAllocator::new(scroll_extent),
            top: LaneAllocator::new(full_extent),
            bottom: LaneAllocator::new(full_extent),
            advanced: LaneAllocator::new(full_extent),
        }
    }

    fn for_mode(&mut self, mode: CommentMode) -> &mut LaneAllocator {
        match mode {
            CommentMode::Scroll => &mut self.scroll,
            CommentMode::Reverse => &mut self.reverse,
            CommentMode::Top => &mut self.top,
            CommentMode::Bottom => &mut self.bottom,
            CommentMode::Advanced => &mut self.advanced,
        }
    }

    fn each_mut(&mut self, mut f: impl FnMut(&mut LaneAllocator)) {
        f(&mut self.scroll);
        f(&mut self.reverse);
        f(&mut self.top);
        f(&mut self.bottom);
        f(&mut self.advanced);
    }
}

pub struct Engine<S: RenderSurface> {
    surface: S,
    measurer: Box<dyn TextMeasurer>,
    clock: Clock<NodeId>,
    scheduler: Scheduler,
    lanes: LaneBank,
    options: EngineOptions,
    surface_width: f64,
    surface_height: f64,
    position: f64,
    playing: bool,
    active: Vec<NodeId>,
    next_id: NodeId,
}

impl<S: RenderSurface> Engine<S> {
    pub fn new(surface: S, options: EngineOptions, width: f64, height: f64) -> Self {
        Self::with_source(surface, options, width, height, Rc::new(MonotonicSource::new()))
    }

    /// Construct against an explicit time source (tests, headless drivers).
    pub fn with_source(
        surface: S,
        options: EngineOptions,
        width: f64,
        height: f64,
        source: Rc<dyn TimeSource>,
    ) -> Self {
        let mut lanes = LaneBank::new(height * options.display_area_rate, height);
        lanes.each_mut(|a| a.set_multi_lane(options.enable_multi_lane));
        Self {
            surface,
            measurer: Box::new(HeuristicMeasurer),
            clock: Clock::new(source),
            scheduler: Scheduler::new(options.backlog_window),
            lanes,
            options,
            surface_width: width,
            surface_height: height,
            position: 0.0,
            playing: false,
            active: Vec::new(),
            next_id: 0,
        }
    }

    pub fn set_measurer(&mut self, measurer: Box<dyn TextMeasurer>) {
        self.measurer = measurer;
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Replace the comment queue with a freshly parsed feed.
    pub fn load_feed(&mut self, comments: Vec<Comment>) {
        self.scheduler.ingest(comments);
    }

    /// Inject a live (user-sent) comment. It is stamped slightly in the
    /// future so the regular release path picks it up on the next tick.
    pub fn add_comment(&mut self, mut comment: Comment) {
        comment.appear_at = self.position + self.options.live_send_delay;
        self.scheduler.insert(comment);
    }

    pub fn set_options(&mut self, options: EngineOptions) {
        self.options = options;
        let scroll_extent = self.surface_height * self.options.display_area_rate;
        self.lanes.scroll.set_extent(scroll_extent);
        self.lanes.reverse.set_extent(scroll_extent);
        let enable = self.options.enable_multi_lane;
        self.lanes.each_mut(|a| a.set_multi_lane(enable));
        self.scheduler.set_backlog_window(self.options.backlog_window);
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn handle_play(&mut self) {
        self.playing = true;
        self.clock.resume();
    }

    pub fn handle_pause(&mut self) {
        self.playing = false;
        self.clock.pause();
    }

    /// A seek started: everything on screen belongs to the old position, so
    /// unmount it all, forget lane occupancy, and restart the engine clock.
    /// Comments shortly before the target re-enter mid-flight on the next
    /// tick after `handle_seeked`.
    pub fn handle_seeking(&mut self, target: f64) {
        for id in self.active.drain(..) {
            self.surface.remove(id);
        }
        self.lanes.each_mut(LaneAllocator::clear);
        self.clock.pause();
        self.clock.reset();
        self.scheduler.seek(target);
        self.position = target;
    }

    pub fn handle_seeked(&mut self) {
        if self.playing {
            self.clock.resume();
        }
    }

    /// Playback rate changed; existing lane occupancies age accordingly.
    pub fn handle_rate_change(&mut self, rate: f64) {
        self.lanes.each_mut(|a| a.set_speed_factor(rate));
    }

    /// Playback ran off the end: unmount everything and drop the queue.
    /// Replaying afterwards needs a fresh `load_feed`.
    pub fn handle_ended(&mut self) {
        self.clear();
    }

    /// Surface resized. Lane offsets are not reflowed; segments that no
    /// longer fit are evicted lazily by the allocators.
    pub fn handle_resize(&mut self, width: f64, height: f64) {
        self.surface_width = width;
        self.surface_height = height;
        let scroll_extent = height * self.options.display_area_rate;
        self.lanes.scroll.set_extent(scroll_extent);
        self.lanes.reverse.set_extent(scroll_extent);
        self.lanes.top.set_extent(height);
        self.lanes.bottom.set_extent(height);
        self.lanes.advanced.set_extent(height);
    }

    /// Hide or show the comment layer. While hidden the scheduler keeps
    /// consuming due entries without releasing them; nothing is retroactively
    /// shown on unhide.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.scheduler.set_hidden(hidden);
    }

    /// Per-frame drive: expire overdue nodes, then admit whatever came due
    /// at the given media position.
    pub fn tick(&mut self, position: f64) {
        self.position = position;
        for id in self.clock.tick() {
            self.surface.remove(id);
            self.active.retain(|&a| a != id);
        }
        if !self.playing {
            return;
        }
        for release in self.scheduler.advance(position) {
            self.admit(release);
        }
    }

    /// Tear down: unmount everything and drop all queued state.
    pub fn clear(&mut self) {
        for id in self.active.drain(..) {
            self.surface.remove(id);
        }
        self.lanes.each_mut(LaneAllocator::clear);
        self.scheduler.clear();
        self.clock.pause();
        self.clock.reset();
    }

    fn admit(&mut self, release: Release) {
        let mut comment = release.comment;
        // Lane occupancy reasons in media seconds: an occupant admitted at
        // media `m` for `d` wall seconds vacates at `m + d * rate`, which is
        // what the allocator's rate-scaled predicate computes. Removal runs
        // on the engine clock separately.
        comment.appear_at = self.position;

        let font_size = comment.size * self.options.font_size_scale;
        let (width, height) = if comment.mode == CommentMode::Advanced {
            (self.surface_width, self.surface_height)
        } else {
            self.measurer.measure(&comment.text, font_size)
        };
        let ctx = LayoutContext {
            surface_width: self.surface_width,
            surface_height: self.surface_height,
            width,
            height,
            speed: self.options.speed,
            delay: release.delay,
            font_size,
            opacity: self.options.opacity,
        };

        let lanes = self.lanes.for_mode(comment.mode);
        match strategy_for(comment.mode).place(&comment, &ctx, lanes) {
            Ok(placement) => {
                let id = self.next_id;
                self.next_id += 1;
                if self.clock.after(placement.duration * 1000.0, id).is_some() {
                    // Degenerate lifetime: expire synchronously, never mount.
                    return;
                }
                self.surface.mount(id, &comment, &placement);
                self.active.push(id);
            }
            Err(PlacementError::Malformed(err)) => {
                warn!(%err, text = %comment.text, "dropping malformed advanced comment");
            }
            Err(err) => {
                debug!(%err, text = %comment.text, "dropping comment");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualSource;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        mounted: Vec<(NodeId, Comment, Placement)>,
        removed: Vec<NodeId>,
    }

    impl RenderSurface for Recorder {
        fn mount(&mut self, id: NodeId, comment: &Comment, placement: &Placement) {
            self.mounted.push((id, comment.clone(), placement.clone()));
        }

        fn remove(&mut self, id: NodeId) {
            self.removed.push(id);
        }
    }

    fn engine(src: &Rc<ManualSource>) -> Engine<Recorder> {
        Engine::with_source(
            Recorder::default(),
            EngineOptions::default(),
            800.0,
            600.0,
            Rc::clone(src) as Rc<dyn TimeSource>,
        )
    }

    #[test]
    fn admits_due_comments_and_expires_them() {
        let src = Rc::new(ManualSource::new());
        let mut e = engine(&src);
        e.load_feed(vec![Comment::new(1.0, CommentMode::Scroll, "hello")]);
        e.handle_play();

        e.tick(0.5);
        assert!(e.surface().mounted.is_empty());

        e.tick(1.0);
        assert_eq!(e.surface().mounted.len(), 1);
        assert_eq!(e.active_count(), 1);
        let duration = e.surface().mounted[0].2.duration;

        src.advance_ms(duration * 1000.0 + 1.0);
        e.tick(2.0);
        assert_eq!(e.surface().removed, vec![0]);
        assert_eq!(e.active_count(), 0);
    }

    #[test]
    fn paused_engine_neither_admits_nor_expires() {
        let src = Rc::new(ManualSource::new());
        let mut e = engine(&src);
        e.load_feed(vec![Comment::new(0.0, CommentMode::Top, "pinned")]);
        e.handle_play();
        e.tick(0.0);
        assert_eq!(e.surface().mounted.len(), 1);

        e.handle_pause();
        src.advance_ms(60_000.0);
        e.tick(30.0);
        assert!(e.surface().removed.is_empty());
    }

    #[test]
    fn seeking_unmounts_everything_and_replays_the_backlog() {
        let src = Rc::new(ManualSource::new());
        let mut e = engine(&src);
        e.load_feed(vec![
            Comment::new(0.0, CommentMode::Scroll, "early"),
            Comment::new(20.0, CommentMode::Scroll, "late"),
        ]);
        e.handle_play();
        e.tick(0.0);
        assert_eq!(e.surface().mounted.len(), 1);

        e.handle_seeking(2.0);
        assert_eq!(e.surface().removed, vec![0]);
        e.handle_seeked();

        // The early comment is inside the backlog window, so it re-enters
        // mid-flight with a catch-up delay.
        e.tick(2.0);
        assert_eq!(e.surface().mounted.len(), 2);
        let replay = &e.surface().mounted[1].2;
        assert!((replay.delay - 2.0).abs() < 1e-9);
        assert!(replay.duration > 0.0);
    }

    #[test]
    fn malformed_advanced_payload_is_dropped_without_mounting() {
        let src = Rc::new(ManualSource::new());
        let mut e = engine(&src);
        e.load_feed(vec![Comment::new(0.0, CommentMode::Advanced, "not-json")]);
        e.handle_play();
        e.tick(0.0);
        assert!(e.surface().mounted.is_empty());
        // A later valid comment is unaffected.
        e.add_comment(Comment::new(0.0, CommentMode::Scroll, "fine"));
        e.tick(1.0);
        assert_eq!(e.surface().mounted.len(), 1);
    }

    #[test]
    fn live_comments_are_stamped_slightly_ahead() {
        let src = Rc::new(ManualSource::new());
        let mut e = engine(&src);
        e.handle_play();
        e.tick(5.0);
        e.add_comment(Comment::new(0.0, CommentMode::Scroll, "live"));
        // Not due at the same position...
        e.tick(5.0);
        assert!(e.surface().mounted.is_empty());
        // ...but due one send-delay later.
        e.tick(5.0 + e.options().live_send_delay);
        assert_eq!(e.surface().mounted.len(), 1);
    }

    #[test]
    fn hidden_layer_consumes_without_mounting() {
        let src = Rc::new(ManualSource::new());
        let mut e = engine(&src);
        e.load_feed(vec![Comment::new(0.0, CommentMode::Scroll, "unseen")]);
        e.set_hidden(true);
        e.handle_play();
        e.tick(1.0);
        assert!(e.surface().mounted.is_empty());
        e.set_hidden(false);
        e.tick(2.0);
        assert!(e.surface().mounted.is_empty());
    }

    /// At half rate a resting comment stays visible for its full 5 wall
    /// seconds, which is 2.5 media seconds; its lane must not be handed out
    /// before then.
    #[test]
    fn halved_rate_keeps_a_lane_until_its_occupant_unmounts() {
        let src = Rc::new(ManualSource::new());
        let mut e = engine(&src);
        e.handle_rate_change(0.5);
        e.load_feed(vec![
            Comment::new(0.0, CommentMode::Top, "one"),
            Comment::new(2.0, CommentMode::Top, "two"),
            Comment::new(3.0, CommentMode::Top, "three"),
        ]);
        e.handle_play();
        e.tick(0.0);
        assert_eq!(e.surface().mounted.len(), 1);

        // Wall time runs twice as fast as media at rate 0.5.
        src.advance_ms(4000.0);
        e.tick(2.0);
        assert_eq!(e.surface().mounted.len(), 2);
        // The first occupant is still on screen, so the lane is not shared.
        assert!(e.surface().removed.is_empty());
        let first = e.surface().mounted[0].2.lane;
        let second = e.surface().mounted[1].2.lane;
        assert_ne!(second, first);

        // By media 3.0 (wall 6.0) it has unmounted and the lane is reusable.
        src.advance_ms(2000.0);
        e.tick(3.0);
        assert_eq!(e.surface().removed, vec![0]);
        assert_eq!(e.surface().mounted[2].2.lane, first);
    }

    #[test]
    fn ended_unmounts_and_drops_the_queue() {
        let src = Rc::new(ManualSource::new());
        let mut e = engine(&src);
        e.load_feed(vec![
            Comment::new(0.0, CommentMode::Top, "shown"),
            Comment::new(10.0, CommentMode::Top, "never"),
        ]);
        e.handle_play();
        e.tick(0.0);
        assert_eq!(e.surface().mounted.len(), 1);

        e.handle_ended();
        assert_eq!(e.surface().removed, vec![0]);
        assert_eq!(e.active_count(), 0);

        // The queue is gone; replaying needs a fresh feed.
        e.handle_play();
        e.tick(20.0);
        assert_eq!(e.surface().mounted.len(), 1);
    }

    #[test]
    fn resize_rescales_the_scroll_band_only() {
        let src = Rc::new(ManualSource::new());
        let mut e = engine(&src);
        e.handle_resize(1000.0, 400.0);
        assert_eq!(e.lanes.scroll.extent(), 200.0);
        assert_eq!(e.lanes.top.extent(), 400.0);
    }
}
