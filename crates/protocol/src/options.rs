use serde::{Deserialize, Serialize};

/// User-facing engine configuration.
///
/// `display_area_rate` limits how much of the surface cross-axis scrolling
/// comments may occupy; resting and advanced comments always get the full
/// extent. `speed` multiplies the width-derived scroll velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// 0.75, 1.0 or 1.25.
    pub font_size_scale: f64,
    /// 0..=1, applied to every mounted comment.
    pub opacity: f64,
    /// Scroll velocity multiplier.
    pub speed: f64,
    /// 0.25, 0.5, 0.75 or 1.0: share of the cross-axis available to
    /// scrolling lanes.
    pub display_area_rate: f64,
    /// Allow overflow lane lists once the primary list is full.
    pub enable_multi_lane: bool,
    /// Seconds behind a seek target within which comments are still shown,
    /// time-shifted, instead of skipped.
    pub backlog_window: f64,
    /// Seconds ahead of the playhead a live-sent comment is stamped, so the
    /// cursor has not already passed it.
    pub live_send_delay: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            font_size_scale: 1.0,
            opacity: 0.8,
            speed: 1.0,
            display_area_rate: 0.5,
            enable_multi_lane: false,
            backlog_window: 10.0,
            live_send_delay: 0.1,
        }
    }
}
