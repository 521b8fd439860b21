//! Market schedule records and the rules that turn the latest one into an
//! open/closed verdict.

mod resolve;
mod validate;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use resolve::{clock_string, resolve, resolve_at, within_window, StatusVerdict, NO_SCHEDULE_REASON};
pub use validate::{is_clock_time, ScheduleInput, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    #[default]
    Closed,
}

impl MarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Open => "open",
            MarketStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown market status {0:?}, expected `open` or `closed`")]
pub struct UnknownStatus(pub String);

impl FromStr for MarketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(MarketStatus::Open),
            "closed" => Ok(MarketStatus::Closed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// One immutable version of the market schedule, as persisted by the store.
///
/// `id` and `updated_at` are assigned at write time and define version order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub id: i64,
    pub market_open_time: String,
    pub market_close_time: String,
    pub is_open_today: bool,
    pub manual_override: bool,
    pub manual_status: MarketStatus,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// A schedule version waiting to be appended. Produced by
/// [`ScheduleInput::validate`] or derived from an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchedule {
    pub market_open_time: String,
    pub market_close_time: String,
    pub is_open_today: bool,
    pub manual_override: bool,
    pub manual_status: MarketStatus,
    pub updated_by: String,
}

impl NewSchedule {
    /// Same hours as `base`, with the manual override forced to `status`.
    pub fn forced(base: &ScheduleRecord, status: MarketStatus, updated_by: &str) -> Self {
        Self {
            market_open_time: base.market_open_time.clone(),
            market_close_time: base.market_close_time.clone(),
            is_open_today: base.is_open_today,
            manual_override: true,
            manual_status: status,
            updated_by: updated_by.to_string(),
        }
    }

    /// Same hours as `base`, back under time-window control.
    pub fn released(base: &ScheduleRecord, updated_by: &str) -> Self {
        Self {
            manual_override: false,
            ..Self::forced(base, base.manual_status, updated_by)
        }
    }
}
