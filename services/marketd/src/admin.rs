use admin_ipc::{AdminRequest, AdminResponse};
use anyhow::{bail, Result};
use http_api::Clock;
use metrics::MetricsHandle;
use schedule::{resolve, NewSchedule};
use storage::Store;
use tracing::{info, warn};

/// Serves one admin socket request against the live store.
pub async fn handle(
    store: &Store,
    metrics: &MetricsHandle,
    clock: &dyn Clock,
    req: AdminRequest,
) -> Result<AdminResponse> {
    match req {
        AdminRequest::Status => {
            let latest = store.latest().await?;
            let verdict = resolve(latest.as_ref(), clock.now());
            metrics.record_status(verdict.status.as_str());
            Ok(AdminResponse::Status(verdict))
        }
        AdminRequest::Schedule => Ok(AdminResponse::Schedule(store.latest().await?)),
        AdminRequest::History { limit } => Ok(AdminResponse::History(store.history(limit).await?)),
        AdminRequest::Update(input) => {
            let new = match input.validate() {
                Ok(new) => new,
                Err(err) => {
                    metrics.record_rejection();
                    warn!(error = %err, "admin schedule update rejected");
                    return Err(err.into());
                }
            };
            append(store, metrics, new).await
        }
        AdminRequest::Override { status, updated_by } => {
            let Some(base) = store.latest().await? else {
                bail!("no schedule exists to override");
            };
            info!(%status, by = %updated_by, "manual override requested");
            append(store, metrics, NewSchedule::forced(&base, status, &updated_by)).await
        }
        AdminRequest::ClearOverride { updated_by } => {
            let Some(base) = store.latest().await? else {
                bail!("no schedule exists to release");
            };
            info!(by = %updated_by, "manual override cleared");
            append(store, metrics, NewSchedule::released(&base, &updated_by)).await
        }
    }
}

async fn append(store: &Store, metrics: &MetricsHandle, new: NewSchedule) -> Result<AdminResponse> {
    if new.updated_by.trim().is_empty() {
        bail!("`updatedBy` must not be blank");
    }
    let record = store.append(&new).await?;
    metrics.record_append();
    Ok(AdminResponse::Appended(record))
}
