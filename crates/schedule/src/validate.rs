use serde::{Deserialize, Serialize};

use crate::{MarketStatus, NewSchedule};

/// Schedule update as submitted by an administrator, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    #[serde(default, alias = "market_open_time")]
    pub market_open_time: Option<String>,
    #[serde(default, alias = "market_close_time")]
    pub market_close_time: Option<String>,
    #[serde(default, alias = "is_open_today")]
    pub is_open_today: Option<bool>,
    #[serde(default, alias = "manual_override")]
    pub manual_override: Option<bool>,
    #[serde(default, alias = "manual_status")]
    pub manual_status: Option<String>,
    #[serde(default, alias = "updated_by")]
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("`{field}` must be a 24-hour HH:MM time, got {value:?}")]
    MalformedTime { field: &'static str, value: String },
    #[error("market opens at {open} but closes at {close}; windows may not cross midnight")]
    InvertedWindow { open: String, close: String },
    #[error("`updatedBy` must not be blank")]
    BlankActor,
    #[error("`manualStatus` must be `open` or `closed` when `manualOverride` is set, got {0:?}")]
    InvalidManualStatus(String),
}

impl ScheduleInput {
    pub fn validate(&self) -> Result<NewSchedule, ValidationError> {
        let open = clock_field("marketOpenTime", self.market_open_time.as_deref())?;
        let close = clock_field("marketCloseTime", self.market_close_time.as_deref())?;
        if open > close {
            return Err(ValidationError::InvertedWindow { open, close });
        }

        let updated_by = self
            .updated_by
            .as_deref()
            .ok_or(ValidationError::MissingField("updatedBy"))?
            .trim();
        if updated_by.is_empty() {
            return Err(ValidationError::BlankActor);
        }

        let manual_override = self.manual_override.unwrap_or(false);
        let manual_status = match (manual_override, self.manual_status.as_deref()) {
            (true, None) => return Err(ValidationError::MissingField("manualStatus")),
            (true, Some(raw)) => raw
                .parse::<MarketStatus>()
                .map_err(|_| ValidationError::InvalidManualStatus(raw.to_string()))?,
            // not consulted without an override
            (false, raw) => raw.and_then(|s| s.parse::<MarketStatus>().ok()).unwrap_or_default(),
        };

        Ok(NewSchedule {
            market_open_time: open,
            market_close_time: close,
            is_open_today: self.is_open_today.unwrap_or(true),
            manual_override,
            manual_status,
            updated_by: updated_by.to_string(),
        })
    }
}

fn clock_field(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField(field))?.trim();
    if !is_clock_time(value) {
        return Err(ValidationError::MalformedTime {
            field,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

/// True for zero-padded 24-hour `HH:MM` strings, the only form for which
/// lexicographic order matches clock order.
pub fn is_clock_time(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hour = (digits[0] - b'0') * 10 + (digits[1] - b'0');
    let minute = (digits[2] - b'0') * 10 + (digits[3] - b'0');
    hour < 24 && minute < 60
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular() -> ScheduleInput {
        ScheduleInput {
            market_open_time: Some("09:30".into()),
            market_close_time: Some("16:00".into()),
            is_open_today: None,
            manual_override: Some(false),
            manual_status: None,
            updated_by: Some("admin".into()),
        }
    }

    #[test]
    fn accepts_regular_session_with_defaults() {
        let new = regular().validate().expect("valid schedule");
        assert_eq!(new.market_open_time, "09:30");
        assert_eq!(new.market_close_time, "16:00");
        assert!(new.is_open_today);
        assert!(!new.manual_override);
        assert_eq!(new.manual_status, MarketStatus::Closed);
        assert_eq!(new.updated_by, "admin");
    }

    #[test]
    fn clock_time_shapes() {
        for ok in ["00:00", "09:30", "23:59", "12:00"] {
            assert!(is_clock_time(ok), "{ok} should be accepted");
        }
        for bad in ["9:30", "24:00", "12:60", "12-00", "noon", "", "12:000", "１2:00"] {
            assert!(!is_clock_time(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn rejects_missing_and_malformed_times() {
        let input = ScheduleInput {
            market_open_time: None,
            ..regular()
        };
        assert_eq!(
            input.validate(),
            Err(ValidationError::MissingField("marketOpenTime"))
        );

        let input = ScheduleInput {
            market_close_time: Some("4pm".into()),
            ..regular()
        };
        let err = input.validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MalformedTime {
                field: "marketCloseTime",
                value: "4pm".into()
            }
        );
        assert!(err.to_string().contains("HH:MM"));
    }

    #[test]
    fn rejects_inverted_window() {
        let input = ScheduleInput {
            market_open_time: Some("22:00".into()),
            market_close_time: Some("06:00".into()),
            ..regular()
        };
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvertedWindow { .. })
        ));
    }

    #[test]
    fn single_minute_window_is_allowed() {
        let input = ScheduleInput {
            market_open_time: Some("12:00".into()),
            market_close_time: Some("12:00".into()),
            ..regular()
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn rejects_missing_or_blank_actor() {
        let input = ScheduleInput {
            updated_by: None,
            ..regular()
        };
        assert_eq!(
            input.validate(),
            Err(ValidationError::MissingField("updatedBy"))
        );
        let input = ScheduleInput {
            updated_by: Some("   ".into()),
            ..regular()
        };
        assert_eq!(input.validate(), Err(ValidationError::BlankActor));
    }

    #[test]
    fn override_requires_a_known_status() {
        let input = ScheduleInput {
            manual_override: Some(true),
            manual_status: None,
            ..regular()
        };
        assert_eq!(
            input.validate(),
            Err(ValidationError::MissingField("manualStatus"))
        );

        let input = ScheduleInput {
            manual_override: Some(true),
            manual_status: Some("halted".into()),
            ..regular()
        };
        assert_eq!(
            input.validate(),
            Err(ValidationError::InvalidManualStatus("halted".into()))
        );

        let input = ScheduleInput {
            manual_override: Some(true),
            manual_status: Some("Open".into()),
            ..regular()
        };
        let new = input.validate().expect("override open");
        assert!(new.manual_override);
        assert_eq!(new.manual_status, MarketStatus::Open);
    }

    #[test]
    fn status_is_ignored_without_override() {
        let input = ScheduleInput {
            manual_status: Some("halted".into()),
            ..regular()
        };
        let new = input.validate().expect("status not validated without override");
        assert_eq!(new.manual_status, MarketStatus::Closed);

        let input = ScheduleInput {
            manual_status: Some("open".into()),
            ..regular()
        };
        assert_eq!(input.validate().unwrap().manual_status, MarketStatus::Open);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let input = ScheduleInput {
            market_open_time: Some(" 09:30".into()),
            updated_by: Some(" ops ".into()),
            ..regular()
        };
        let new = input.validate().unwrap();
        assert_eq!(new.market_open_time, "09:30");
        assert_eq!(new.updated_by, "ops");
    }

    #[test]
    fn accepts_camel_and_snake_case_bodies() {
        let camel: ScheduleInput = serde_json::from_value(serde_json::json!({
            "marketOpenTime": "09:30",
            "marketCloseTime": "16:00",
            "isOpenToday": true,
            "manualOverride": true,
            "manualStatus": "closed",
            "updatedBy": "admin"
        }))
        .unwrap();
        let snake: ScheduleInput = serde_json::from_value(serde_json::json!({
            "market_open_time": "09:30",
            "market_close_time": "16:00",
            "is_open_today": true,
            "manual_override": true,
            "manual_status": "closed",
            "updated_by": "admin"
        }))
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.validate().unwrap().manual_status, MarketStatus::Closed);
    }
}
