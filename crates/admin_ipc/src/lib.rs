use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use schedule::{MarketStatus, ScheduleInput, ScheduleRecord, StatusVerdict};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/market_hours.sock";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", content = "payload")]
pub enum AdminRequest {
    Status,
    Schedule,
    History { limit: u32 },
    Update(ScheduleInput),
    Override {
        status: MarketStatus,
        updated_by: String,
    },
    ClearOverride { updated_by: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", content = "payload")]
pub enum AdminResponse {
    Status(StatusVerdict),
    Schedule(Option<ScheduleRecord>),
    History(Vec<ScheduleRecord>),
    Appended(ScheduleRecord),
    Error(String),
}

/// Serves one JSON request line per connection. Handler failures are sent
/// back as [`AdminResponse::Error`].
pub async fn run_server<F, Fut>(socket_path: &str, handler: F) -> Result<()>
where
    F: Fn(AdminRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AdminResponse>> + Send + 'static,
{
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    let handler = Arc::new(handler);
    info!(socket = socket_path, "admin ipc listening");
    loop {
        let (stream, _) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(stream, handler).await {
                warn!(error = ?err, "admin ipc handler error");
            }
        });
    }
}

async fn handle_stream<F, Fut>(stream: UnixStream, handler: Arc<F>) -> Result<()>
where
    F: Fn(AdminRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AdminResponse>> + Send + 'static,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }
    let resp = match serde_json::from_str::<AdminRequest>(buf.trim()) {
        Ok(req) => handler(req)
            .await
            .unwrap_or_else(|err| AdminResponse::Error(format!("{err:#}"))),
        Err(err) => AdminResponse::Error(format!("invalid admin request: {err}")),
    };
    let line = serde_json::to_string(&resp)? + "\n";
    write_half.write_all(line.as_bytes()).await?;
    Ok(())
}

pub async fn send_request(socket_path: &str, req: &AdminRequest) -> Result<AdminResponse> {
    let mut stream = UnixStream::connect(socket_path).await?;
    let line = serde_json::to_string(req)? + "\n";
    stream.write_all(line.as_bytes()).await?;
    let (read_half, _) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let _ = reader.read_line(&mut buf).await?;
    let resp: AdminResponse = serde_json::from_str(buf.trim())?;
    Ok(resp)
}
