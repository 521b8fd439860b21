//! HTTP surface for market status queries and schedule administration.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Local, NaiveTime};
use metrics::MetricsHandle;
use schedule::{resolve, ScheduleInput, ScheduleRecord, StatusVerdict, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storage::{Store, StoreError, DEFAULT_HISTORY_LIMIT};
use tracing::{error, warn};

pub const UPDATED_MESSAGE: &str = "Market schedule updated";
pub const STORE_FAILURE_MESSAGE: &str = "schedule store unavailable";
pub const ENCODE_FAILURE_MESSAGE: &str = "response encoding failed";

/// Source of the wall-clock time of day used for window checks. Must be the
/// same clock administrators author open/close times in.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveTime;
}

/// Server local time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveTime {
        Local::now().time()
    }
}

pub struct FixedClock(pub NaiveTime);

impl FixedClock {
    /// `None` for an out-of-range hour or minute.
    pub fn at(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveTime {
        self.0
    }
}

#[derive(Clone)]
pub struct AppState {
    store: Store,
    clock: Arc<dyn Clock>,
    metrics: MetricsHandle,
}

impl AppState {
    pub fn new(store: Store, clock: impl Clock + 'static, metrics: MetricsHandle) -> Self {
        Self {
            store,
            clock: Arc::new(clock),
            metrics,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/market/status", get(market_status))
        .route(
            "/api/admin/market/schedule",
            get(current_schedule).post(update_schedule),
        )
        .route("/api/admin/market/schedule/history", get(schedule_history))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn market_status(State(st): State<AppState>) -> Result<Json<StatusVerdict>, ApiError> {
    let latest = st.store.latest().await?;
    let verdict = resolve(latest.as_ref(), st.clock.now());
    st.metrics.record_status(verdict.status.as_str());
    Ok(Json(verdict))
}

/// The latest record, or `{}` when no schedule was ever written.
async fn current_schedule(State(st): State<AppState>) -> Result<Json<Value>, ApiError> {
    let body = match st.store.latest().await? {
        Some(record) => serde_json::to_value(record).map_err(ApiError::Encode)?,
        None => Value::Object(Default::default()),
    };
    Ok(Json(body))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub message: String,
}

async fn update_schedule(
    State(st): State<AppState>,
    Json(input): Json<ScheduleInput>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let new = input.validate().map_err(|err| {
        st.metrics.record_rejection();
        warn!(error = %err, "schedule update rejected");
        ApiError::Validation(err)
    })?;
    st.store.append(&new).await?;
    st.metrics.record_append();
    Ok(Json(UpdateResponse {
        success: true,
        message: UPDATED_MESSAGE.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<u32>,
}

async fn schedule_history(
    State(st): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ScheduleRecord>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(st.store.history(limit).await?))
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Store(StoreError),
    Encode(serde_json::Error),
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            // driver detail stays in the log, clients get a fixed message
            ApiError::Store(err) => {
                error!(error = %err, "schedule store request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    STORE_FAILURE_MESSAGE.to_string(),
                )
            }
            ApiError::Encode(err) => {
                error!(error = %err, "response encoding failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ENCODE_FAILURE_MESSAGE.to_string(),
                )
            }
        };
        let body = Json(UpdateResponse {
            success: false,
            message,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_rejects_out_of_range_times() {
        assert!(FixedClock::at(24, 0).is_none());
        assert!(FixedClock::at(9, 60).is_none());
        let clock = FixedClock::at(9, 30).expect("valid clock time");
        assert_eq!(clock.now(), NaiveTime::from_hms_opt(9, 30, 0).expect("time"));
    }
}
