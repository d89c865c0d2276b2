use serde::{Deserialize, Serialize};

/// Which presentation mode a comment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentMode {
    /// Right-to-left scrolling text (the common case).
    Scroll,
    /// Resting text pinned to the top band.
    Top,
    /// Resting text pinned to the bottom band.
    Bottom,
    /// Left-to-right scrolling text.
    Reverse,
    /// Free-transform comment; the payload lives in `Comment::text`.
    Advanced,
}

impl CommentMode {
    /// Map a numeric feed mode code. Codes 1–3 are all plain scrolling
    /// comments; unknown codes fall back to `Scroll`.
    pub fn from_code(code: u32) -> Self {
        match code {
            4 => Self::Bottom,
            5 => Self::Top,
            6 => Self::Reverse,
            7 => Self::Advanced,
            _ => Self::Scroll,
        }
    }
}

/// An sRGB color with alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `"#rgb"`, `"#rrggbb"` or a bare decimal color code (the form
    /// most feeds carry). Anything unparseable yields white.
    pub fn parse(s: &str) -> Self {
        if let Some(hex) = s.strip_prefix('#') {
            match hex.len() {
                3 => {
                    if let Ok(v) = u32::from_str_radix(hex, 16) {
                        let (r, g, b) = ((v >> 8) & 0xf, (v >> 4) & 0xf, v & 0xf);
                        return Self::rgb((r * 17) as u8, (g * 17) as u8, (b * 17) as u8);
                    }
                }
                6 => {
                    if let Ok(v) = u32::from_str_radix(hex, 16) {
                        return Self::from_u32(v);
                    }
                }
                _ => {}
            }
            return Self::WHITE;
        }
        s.parse::<u32>().map_or(Self::WHITE, Self::from_u32)
    }

    fn from_u32(v: u32) -> Self {
        Self::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }
}

/// A single time-stamped comment.
///
/// Immutable once dispatched, except `appear_at`, which the scheduler
/// rewrites when a live (user-sent) comment is injected with a computed
/// future timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// When the comment becomes due, in playback seconds.
    pub appear_at: f64,
    pub mode: CommentMode,
    /// Base font size in pixels (18 small, 25 standard, 36 large).
    pub size: f64,
    pub color: Color,
    /// Display text; for `Advanced` mode this holds the structured payload.
    pub text: String,
}

impl Comment {
    pub fn new(appear_at: f64, mode: CommentMode, text: impl Into<String>) -> Self {
        Self {
            appear_at,
            mode,
            size: 25.0,
            color: Color::WHITE,
            text: text.into(),
        }
    }
}
