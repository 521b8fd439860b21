use admin_ipc::{send_request, AdminRequest, AdminResponse, DEFAULT_SOCKET_PATH};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use schedule::{MarketStatus, ScheduleInput};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "ADMIN_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Forced {
    Open,
    Closed,
}

impl From<Forced> for MarketStatus {
    fn from(value: Forced) -> Self {
        match value {
            Forced::Open => MarketStatus::Open,
            Forced::Closed => MarketStatus::Closed,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the market status right now.
    Status,
    /// Show the current schedule version.
    Schedule,
    /// List schedule versions, newest first.
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Append a new regular-hours schedule.
    Set {
        #[arg(long)]
        open: String,
        #[arg(long)]
        close: String,
        #[arg(long)]
        closed_today: bool,
        #[arg(long, env = "USER")]
        by: String,
    },
    /// Force the market open or closed regardless of the clock.
    Override {
        status: Forced,
        #[arg(long, env = "USER")]
        by: String,
    },
    /// Return to time-window control.
    ClearOverride {
        #[arg(long, env = "USER")]
        by: String,
    },
}

fn to_request(command: Command) -> AdminRequest {
    match command {
        Command::Status => AdminRequest::Status,
        Command::Schedule => AdminRequest::Schedule,
        Command::History { limit } => AdminRequest::History { limit },
        Command::Set {
            open,
            close,
            closed_today,
            by,
        } => AdminRequest::Update(ScheduleInput {
            market_open_time: Some(open),
            market_close_time: Some(close),
            is_open_today: Some(!closed_today),
            manual_override: Some(false),
            manual_status: None,
            updated_by: Some(by),
        }),
        Command::Override { status, by } => AdminRequest::Override {
            status: status.into(),
            updated_by: by,
        },
        Command::ClearOverride { by } => AdminRequest::ClearOverride { updated_by: by },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let req = to_request(cli.command);

    let resp = send_request(&cli.socket, &req).await?;
    println!("{}", serde_json::to_string(&resp)?);
    if let AdminResponse::Error(message) = resp {
        bail!("marketd rejected the request: {message}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AdminRequest {
        let mut argv = vec!["marketctl", "--socket", "/tmp/test.sock"];
        argv.extend_from_slice(args);
        to_request(Cli::parse_from(argv).command)
    }

    #[test]
    fn set_builds_a_regular_hours_update() {
        match parse(&["set", "--open", "09:30", "--close", "16:00", "--by", "alice"]) {
            AdminRequest::Update(input) => {
                assert_eq!(input.market_open_time.as_deref(), Some("09:30"));
                assert_eq!(input.market_close_time.as_deref(), Some("16:00"));
                assert_eq!(input.is_open_today, Some(true));
                assert_eq!(input.manual_override, Some(false));
                assert_eq!(input.updated_by.as_deref(), Some("alice"));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn closed_today_flag_clears_is_open_today() {
        match parse(&[
            "set",
            "--open",
            "09:30",
            "--close",
            "16:00",
            "--closed-today",
            "--by",
            "alice",
        ]) {
            AdminRequest::Update(input) => assert_eq!(input.is_open_today, Some(false)),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn override_parses_status() {
        match parse(&["override", "closed", "--by", "ops"]) {
            AdminRequest::Override { status, updated_by } => {
                assert_eq!(status, MarketStatus::Closed);
                assert_eq!(updated_by, "ops");
            }
            other => panic!("expected override, got {other:?}"),
        }
        assert!(Cli::try_parse_from(["marketctl", "override", "halted", "--by", "ops"]).is_err());
    }

    #[test]
    fn history_and_clear_override_map_through() {
        assert!(matches!(
            parse(&["history", "--limit", "5"]),
            AdminRequest::History { limit: 5 }
        ));
        assert!(matches!(
            parse(&["clear-override", "--by", "ops"]),
            AdminRequest::ClearOverride { ref updated_by } if updated_by == "ops"
        ));
        assert!(matches!(parse(&["status"]), AdminRequest::Status));
    }
}
