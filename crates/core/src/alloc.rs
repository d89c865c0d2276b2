//! First-fit lane allocation with merge/split/overflow policies.
//!
//! One allocator serves one presentation mode. It owns an ordered list of
//! lane segments on the surface cross-axis; a segment remembers who last
//! occupied it and for how long, so freeness is a pure function of the
//! requesting comment's appear time. When the primary list is full and
//! multi-lane overflow is enabled, additional parallel lists are created on
//! demand and their offsets are encoded past the surface extent.

/// A reserved lane slice, `[lane_start, lane_end)` on the cross-axis.
///
/// The occupancy fields describe the current (or most recent) occupant;
/// they go stale rather than being cleared, and the free predicates reason
/// about them temporally.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub lane_start: f64,
    pub lane_end: f64,
    /// Playback (media) seconds at which the occupant appeared.
    pub occupied_from: f64,
    /// Occupant lifetime in wall seconds, unscaled.
    pub occupied_duration: f64,
    pub occupant_width: f64,
}

impl Segment {
    pub fn span(&self) -> f64 {
        self.lane_end - self.lane_start
    }
}

/// One lane reservation request.
#[derive(Debug, Clone, Copy)]
pub struct LaneRequest {
    /// Playback (media) seconds at which the comment appears.
    pub appear_at: f64,
    /// On-screen lifetime in wall seconds.
    pub duration: f64,
    pub width: f64,
    pub height: f64,
}

const SPAN_EPSILON: f64 = 1e-9;

/// Interval allocator for a single presentation mode.
pub struct LaneAllocator {
    lists: Vec<Vec<Segment>>,
    extent: f64,
    speed_factor: f64,
    multi_lane: bool,
}

impl LaneAllocator {
    pub fn new(extent: f64) -> Self {
        Self {
            lists: Vec::new(),
            extent,
            speed_factor: 1.0,
            multi_lane: false,
        }
    }

    pub fn extent(&self) -> f64 {
        self.extent
    }

    pub fn set_multi_lane(&mut self, enable: bool) {
        self.multi_lane = enable;
    }

    /// Playback rate; converts occupant wall lifetimes into the media
    /// seconds the temporal free predicate reasons in.
    pub fn set_speed_factor(&mut self, rate: f64) {
        self.speed_factor = rate;
    }

    /// Update capacity and lazily evict any segment that now hangs past the
    /// edge. No reflow: surviving segments keep their offsets.
    pub fn set_extent(&mut self, extent: f64) {
        self.extent = extent;
        for list in &mut self.lists {
            list.retain(|seg| seg.lane_end <= extent);
        }
    }

    /// Drop all lane lists (seek / end of playback).
    pub fn clear(&mut self) {
        self.lists.clear();
    }

    /// The purely temporal free predicate used for resting comments: a lane
    /// is free once its occupant's scaled lifetime has elapsed.
    pub fn is_vacated(&self, seg: &Segment, appear_at: f64) -> bool {
        seg.occupied_from + seg.occupied_duration * self.speed_factor <= appear_at
    }

    /// First-fit allocation with the default temporal predicate.
    pub fn try_allocate(&mut self, req: &LaneRequest) -> Option<f64> {
        let speed = self.speed_factor;
        self.try_allocate_with(req, |seg| {
            seg.occupied_from + seg.occupied_duration * speed <= req.appear_at
        })
    }

    /// First-fit allocation with a caller-supplied free predicate (scrolling
    /// modes pass the catch-up-safe one).
    ///
    /// Returns the lane offset, with overflow lists encoded as
    /// `list_index * extent + lane_start`; `None` means the comment must be
    /// dropped.
    pub fn try_allocate_with(
        &mut self,
        req: &LaneRequest,
        is_free: impl Fn(&Segment) -> bool,
    ) -> Option<f64> {
        if !(req.height.is_finite() && req.width.is_finite() && req.appear_at.is_finite()) {
            return None;
        }
        if req.height <= 0.0 || req.height > self.extent {
            return None;
        }

        let mut list_index = 0;
        loop {
            if list_index >= self.lists.len() {
                self.lists.push(Vec::new());
            }
            if let Some(start) = Self::allocate_in(
                &mut self.lists[list_index],
                self.extent,
                req,
                &is_free,
            ) {
                return Some(list_index as f64 * self.extent + start);
            }
            if !self.multi_lane {
                return None;
            }
            list_index += 1;
        }
    }

    /// Scan one lane list left-to-right: exact reuse, split, or
    /// merge-then-resplit; append at the tail if everything else fails.
    fn allocate_in(
        list: &mut Vec<Segment>,
        extent: f64,
        req: &LaneRequest,
        is_free: &impl Fn(&Segment) -> bool,
    ) -> Option<f64> {
        let mut i = 0;
        while i < list.len() {
            if !is_free(&list[i]) {
                i += 1;
                continue;
            }

            let span = list[i].span();
            if (span - req.height).abs() < SPAN_EPSILON {
                Self::occupy(&mut list[i], req);
                return Some(list[i].lane_start);
            }

            if span > req.height {
                // Shrink to exactly the requested height; the remainder
                // keeps the old occupancy metadata, stale as it is.
                let remainder = Segment {
                    lane_start: list[i].lane_start + req.height,
                    lane_end: list[i].lane_end,
                    occupied_from: list[i].occupied_from,
                    occupied_duration: list[i].occupied_duration,
                    occupant_width: list[i].occupant_width,
                };
                Self::occupy(&mut list[i], req);
                let start = list[i].lane_start;
                list.insert(i + 1, remainder);
                return Some(start);
            }

            // Too small: try to merge with following free segments until the
            // accumulated span reaches the requested height.
            if let Some(start) = Self::merge_at(list, i, req, is_free) {
                return Some(start);
            }
            i += 1;
        }

        // No existing segment works; append past the tail if it still fits.
        let tail = list.last().map_or(0.0, |seg| seg.lane_end);
        if tail + req.height > extent {
            return None;
        }
        list.push(Segment {
            lane_start: tail,
            lane_end: tail + req.height,
            occupied_from: req.appear_at,
            occupied_duration: req.duration,
            occupant_width: req.width,
        });
        Some(tail)
    }

    /// Merge `list[index]` with following free segments while the combined
    /// span is still short of the request. Collapses the run into one
    /// segment, re-splits any excess, and occupies the front.
    fn merge_at(
        list: &mut Vec<Segment>,
        index: usize,
        req: &LaneRequest,
        is_free: &impl Fn(&Segment) -> bool,
    ) -> Option<f64> {
        let mut cur = index;
        let mut end = list[index].lane_end;
        while cur + 1 < list.len()
            && is_free(&list[cur + 1])
            && end - list[index].lane_start < req.height
        {
            cur += 1;
            end = list[cur].lane_end;
        }

        if end - list[index].lane_start < req.height {
            return None;
        }

        // Metadata for any re-split remainder comes from the last segment of
        // the merged run; never invent new timing.
        let last = list[cur].clone();
        list.drain(index + 1..=cur);

        if end - list[index].lane_start > req.height + SPAN_EPSILON {
            list.insert(
                index + 1,
                Segment {
                    lane_start: list[index].lane_start + req.height,
                    lane_end: end,
                    occupied_from: last.occupied_from,
                    occupied_duration: last.occupied_duration,
                    occupant_width: last.occupant_width,
                },
            );
        }

        Self::occupy(&mut list[index], req);
        Some(list[index].lane_start)
    }

    fn occupy(seg: &mut Segment, req: &LaneRequest) {
        seg.lane_end = seg.lane_start + req.height;
        seg.occupied_from = req.appear_at;
        seg.occupied_duration = req.duration;
        seg.occupant_width = req.width;
    }

    /// All lane lists, primary first. Exposed for diagnostics and tests.
    pub fn lists(&self) -> &[Vec<Segment>] {
        &self.lists
    }
}
