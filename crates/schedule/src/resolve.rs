use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::{MarketStatus, ScheduleRecord};

pub const NO_SCHEDULE_REASON: &str = "No schedule found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusVerdict {
    pub status: MarketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StatusVerdict {
    fn plain(status: MarketStatus) -> Self {
        Self {
            status,
            reason: None,
        }
    }
}

/// Formats `now` the way schedule times are authored (`HH:MM`, 24-hour).
pub fn clock_string(now: NaiveTime) -> String {
    now.format("%H:%M").to_string()
}

/// Resolves the market status for the latest record at wall-clock `now`.
pub fn resolve(record: Option<&ScheduleRecord>, now: NaiveTime) -> StatusVerdict {
    resolve_at(record, &clock_string(now))
}

/// Resolution against an already formatted `HH:MM` clock reading.
///
/// Order matters: an empty store is closed, a manual override wins over
/// everything (malformed times included), and only then is the window
/// consulted. `is_open_today` is not part of the decision.
pub fn resolve_at(record: Option<&ScheduleRecord>, current_time: &str) -> StatusVerdict {
    let Some(record) = record else {
        return StatusVerdict {
            status: MarketStatus::Closed,
            reason: Some(NO_SCHEDULE_REASON.to_string()),
        };
    };

    if record.manual_override {
        return StatusVerdict::plain(record.manual_status);
    }

    if within_window(
        &record.market_open_time,
        &record.market_close_time,
        current_time,
    ) {
        StatusVerdict::plain(MarketStatus::Open)
    } else {
        StatusVerdict::plain(MarketStatus::Closed)
    }
}

/// Inclusive lexicographic window test. Only meaningful for zero-padded
/// `HH:MM` values with `open <= close`; an inverted window never matches.
pub fn within_window(open: &str, close: &str, current_time: &str) -> bool {
    open <= current_time && current_time <= close
}
