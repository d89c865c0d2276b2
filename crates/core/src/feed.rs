//! Comment-feed ingestion.
//!
//! A feed is a JSON array of flat records with the numeric mode codes of
//! the upstream format. Each record is parsed in isolation: one that is
//! unreadable (wrong field type, out-of-range number, non-finite
//! appearance time) is skipped with a debug event, not fatal. Only a
//! malformed document fails the whole load.

use barrage_protocol::{Color, Comment, CommentMode};
use serde::Deserialize;
use serde_json::Value;
use serde_json::value::RawValue;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid feed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_size() -> f64 {
    25.0
}

#[derive(Debug, Deserialize)]
struct FeedRecord {
    begin: f64,
    #[serde(default)]
    mode: u32,
    #[serde(default = "default_size")]
    size: f64,
    #[serde(default)]
    color: Option<Value>,
    #[serde(default)]
    text: String,
}

fn color_of(value: Option<&Value>) -> Color {
    match value {
        Some(Value::String(s)) => Color::parse(s),
        Some(Value::Number(n)) => Color::parse(&n.to_string()),
        _ => Color::WHITE,
    }
}

/// Parse a JSON feed into unsorted comments. Ordering is the scheduler's
/// job at ingestion.
pub fn parse_json(bytes: &[u8]) -> Result<Vec<Comment>, FeedError> {
    // Split the array without interpreting the records, so a single bad
    // record cannot poison its neighbors.
    let records: Vec<&RawValue> = serde_json::from_slice(bytes)?;
    Ok(records
        .into_iter()
        .filter_map(|raw| {
            let record: FeedRecord = match serde_json::from_str(raw.get()) {
                Ok(record) => record,
                Err(err) => {
                    debug!(%err, record = raw.get(), "skipping unreadable feed record");
                    return None;
                }
            };
            if !record.begin.is_finite() {
                debug!(text = %record.text, "skipping feed record with non-finite begin");
                return None;
            }
            Some(Comment {
                appear_at: record.begin,
                mode: CommentMode::from_code(record.mode),
                size: record.size,
                color: color_of(record.color.as_ref()),
                text: record.text,
            })
        })
        .collect())
}
