use serde::Deserialize;

use crate::data::Timeline;
use crate::error::TimelineError;

/// Accepted top-level shapes for a timeline bundle.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTimelines {
    Wrapped { timelines: Vec<Timeline> },
    List(Vec<Timeline>),
    Single(Box<Timeline>),
}

/// Parse one timeline from JSON and run the structural checks in
/// [`Timeline::validate_basic`].
///
/// Notes:
/// - Keyframes may appear in any order; they are sorted on load.
/// - Missing handles default to the linear handles.
/// - `settings` is preserved verbatim.
pub fn parse_timeline_json(s: &str) -> Result<Timeline, TimelineError> {
    let timeline: Timeline =
        serde_json::from_str(s).map_err(|e| TimelineError::Malformed(format!("parse error: {e}")))?;
    timeline.validate_basic()?;
    Ok(timeline)
}

/// Parse a bundle: a single timeline, an array, or `{ "timelines": [...] }`.
pub fn parse_timelines_json(s: &str) -> Result<Vec<Timeline>, TimelineError> {
    let stored: StoredTimelines =
        serde_json::from_str(s).map_err(|e| TimelineError::Malformed(format!("parse error: {e}")))?;
    let timelines = match stored {
        StoredTimelines::Wrapped { timelines } | StoredTimelines::List(timelines) => timelines,
        StoredTimelines::Single(timeline) => vec![*timeline],
    };
    for timeline in &timelines {
        timeline.validate_basic()?;
    }
    Ok(timelines)
}

pub fn timeline_to_json(timeline: &Timeline) -> Result<String, TimelineError> {
    serde_json::to_string_pretty(timeline).map_err(|e| TimelineError::Malformed(e.to_string()))
}
