//! Time-ordered release of comments against the playback position.
//!
//! The queue is kept sorted by appearance time and walked with a cursor:
//! every comment is released exactly once per forward pass, in order, even
//! when the position jumps several entries between ticks. Seeking rewinds
//! the cursor with a binary search instead of rescanning the queue.

use barrage_protocol::Comment;

/// A comment the scheduler has decided to show now.
#[derive(Debug)]
pub struct Release {
    pub comment: Comment,
    /// Seconds of the comment's animation that have already elapsed.
    /// Non-zero only on the first pass after a seek, where backlog entries
    /// re-enter mid-flight.
    pub delay: f64,
}

#[derive(Debug)]
pub struct Scheduler {
    queue: Vec<Comment>,
    cursor: usize,
    hidden: bool,
    /// Set by a seek; the next `advance` stamps catch-up delays.
    pending_seek_delay: bool,
    backlog_window: f64,
    /// Last position handed to `advance`; everything at or before it has
    /// been consumed. Inserts cannot tell played from pending entries at
    /// the cursor boundary by position alone, so this disambiguates.
    played_to: f64,
}

impl Scheduler {
    pub fn new(backlog_window: f64) -> Self {
        Self {
            queue: Vec::new(),
            cursor: 0,
            hidden: false,
            pending_seek_delay: false,
            backlog_window,
            played_to: f64::NEG_INFINITY,
        }
    }

    pub fn set_backlog_window(&mut self, window: f64) {
        self.backlog_window = window;
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the queue with a full feed. Sorts by appearance time and
    /// rewinds the cursor to the start.
    pub fn ingest(&mut self, mut comments: Vec<Comment>) {
        comments.sort_by(|a, b| a.appear_at.total_cmp(&b.appear_at));
        self.queue = comments;
        self.cursor = 0;
        self.played_to = f64::NEG_INFINITY;
    }

    /// Insert a single comment at its sorted position. A comment stamped in
    /// the already-played region (at or before the last advanced position)
    /// counts as consumed: the cursor shifts over it so it is never
    /// released late.
    pub fn insert(&mut self, comment: Comment) {
        let pos = self
            .queue
            .partition_point(|c| c.appear_at <= comment.appear_at);
        let played = pos <= self.cursor && comment.appear_at <= self.played_to;
        self.queue.insert(pos, comment);
        if pos < self.cursor || played {
            self.cursor += 1;
        }
    }

    /// Release every comment due at `now`, advancing the cursor past them.
    pub fn advance(&mut self, now: f64) -> Vec<Release> {
        let mut releases = Vec::new();
        while let Some(comment) = self.queue.get(self.cursor) {
            if comment.appear_at > now {
                break;
            }
            if !self.hidden {
                let delay = if self.pending_seek_delay {
                    (now - comment.appear_at).max(0.0)
                } else {
                    0.0
                };
                releases.push(Release {
                    comment: comment.clone(),
                    delay,
                });
            }
            self.cursor += 1;
        }
        self.pending_seek_delay = false;
        self.played_to = now;
        releases
    }

    /// Rewind (or fast-forward) to `target`. Comments inside the backlog
    /// window before the target are replayed mid-flight on the next
    /// `advance`; everything earlier is skipped.
    pub fn seek(&mut self, target: f64) {
        let horizon = target - self.backlog_window;
        self.cursor = self.queue.partition_point(|c| c.appear_at < horizon);
        self.pending_seek_delay = true;
        // Backlog entries behind the target are replayable, not played.
        self.played_to = horizon;
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.cursor = 0;
        self.pending_seek_delay = false;
        self.played_to = f64::NEG_INFINITY;
    }
}
