use std::str::FromStr;

use chrono::{DateTime, Utc};
use schedule::{MarketStatus, NewSchedule, ScheduleRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Executor, SqlitePool};
use tracing::info;

pub const INIT_SQL: &str = include_str!("../../../scripts/init_db.sql");

pub const REQUIRED_TABLES: &[&str] = &["market_schedule"];

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 500;

const MEMORY_PREFIX: &str = "sqlite::memory:";

const COLUMNS: &str = "id, market_open_time, market_close_time, is_open_today, manual_override, \
                       manual_status, updated_by, updated_at_ms";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("schedule store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("schedule row {id} is unreadable: {detail}")]
    Corrupt { id: i64, detail: String },
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: i64,
    market_open_time: String,
    market_close_time: String,
    is_open_today: bool,
    manual_override: bool,
    manual_status: String,
    updated_by: String,
    updated_at_ms: i64,
}

impl TryFrom<ScheduleRow> for ScheduleRecord {
    type Error = StoreError;

    fn try_from(row: ScheduleRow) -> Result<Self> {
        // the status only matters under an override; otherwise it is never validated
        let manual_status = match MarketStatus::from_str(&row.manual_status) {
            Ok(status) => status,
            Err(err) if row.manual_override => {
                return Err(StoreError::Corrupt {
                    id: row.id,
                    detail: err.to_string(),
                })
            }
            Err(_) => MarketStatus::Closed,
        };
        let updated_at =
            DateTime::<Utc>::from_timestamp_millis(row.updated_at_ms).ok_or_else(|| {
                StoreError::Corrupt {
                    id: row.id,
                    detail: format!("updated_at_ms {} out of range", row.updated_at_ms),
                }
            })?;
        Ok(ScheduleRecord {
            id: row.id,
            market_open_time: row.market_open_time,
            market_close_time: row.market_close_time,
            is_open_today: row.is_open_today,
            manual_override: row.manual_override,
            manual_status,
            updated_by: row.updated_by,
            updated_at,
        })
    }
}

/// Append-only schedule log. Every write is a new row; the current schedule
/// is always re-read, never cached.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        // each in-memory connection would be its own database
        let pool = if path.starts_with(MEMORY_PREFIX) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };
        run_init_sql(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persists `schedule` as the newest version and returns it with its
    /// assigned id and timestamp. Values are stored as given.
    ///
    /// Id assignment and the timestamp floor happen inside one statement, so
    /// concurrent appends serialize on SQLite's write lock and `updated_at`
    /// never runs backwards relative to `id`. The floor reads only the newest
    /// row, which by that same invariant holds the largest timestamp.
    pub async fn append(&self, schedule: &NewSchedule) -> Result<ScheduleRecord> {
        let now_ms = Utc::now().timestamp_millis();
        let sql = format!(
            "INSERT INTO market_schedule \
             (market_open_time, market_close_time, is_open_today, manual_override, manual_status, updated_by, updated_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, \
                     MAX(?7, COALESCE((SELECT updated_at_ms FROM market_schedule ORDER BY id DESC LIMIT 1), 0))) \
             RETURNING {COLUMNS}"
        );
        let row: ScheduleRow = sqlx::query_as(&sql)
            .bind(&schedule.market_open_time)
            .bind(&schedule.market_close_time)
            .bind(schedule.is_open_today)
            .bind(schedule.manual_override)
            .bind(schedule.manual_status.as_str())
            .bind(&schedule.updated_by)
            .bind(now_ms)
            .fetch_one(&self.pool)
            .await?;
        let record = ScheduleRecord::try_from(row)?;
        info!(
            id = record.id,
            updated_by = %record.updated_by,
            manual_override = record.manual_override,
            "schedule version appended"
        );
        Ok(record)
    }

    /// The highest-id record, or `None` when nothing was ever written.
    pub async fn latest(&self) -> Result<Option<ScheduleRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM market_schedule ORDER BY id DESC LIMIT 1");
        let row: Option<ScheduleRow> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;
        row.map(ScheduleRecord::try_from).transpose()
    }

    /// Newest-first slice of the audit history.
    pub async fn history(&self, limit: u32) -> Result<Vec<ScheduleRecord>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let sql = format!("SELECT {COLUMNS} FROM market_schedule ORDER BY id DESC LIMIT ?1");
        let rows: Vec<ScheduleRow> = sqlx::query_as(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ScheduleRecord::try_from).collect()
    }

    pub async fn validate_required_tables(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for table in REQUIRED_TABLES {
            let found: Option<(String,)> =
                sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
                    .bind(*table)
                    .fetch_optional(&self.pool)
                    .await?;
            if found.is_none() {
                missing.push((*table).to_string());
            }
        }
        Ok(missing)
    }
}

pub async fn init_sqlite(path: &str) -> Result<Store> {
    let store = Store::connect(path).await?;
    info!(path = path, "sqlite initialized");
    Ok(store)
}

async fn run_init_sql(pool: &SqlitePool) -> Result<()> {
    pool.execute(INIT_SQL).await?;
    Ok(())
}
