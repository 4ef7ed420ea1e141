//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgGroup, Args, Parser, Subcommand};

use snaprestore_lifecycle::{Destination, RestorationId, RestoreStatus, SnapshotStatus};

/// snaprestore - snapshot restore lifecycle
#[derive(Parser, Debug)]
#[command(name = "snaprestore")]
#[command(version)]
#[command(about = "Request, track and settle snapshot restores")]
pub struct Cli {
    /// Configuration file (default: ./snaprestore.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a snapshot so it can be restored
    SnapshotRegister {
        /// Snapshot id
        #[arg(long)]
        id: String,

        /// Human description
        #[arg(long)]
        description: Option<String>,

        /// Archive state (pending, archiving, snapshot-complete, failed)
        #[arg(long, default_value = "snapshot-complete")]
        status: SnapshotStatus,
    },

    /// Request a restore without starting it
    Request(RestoreArgs),

    /// Start a restore, advancing a pending request if there is one
    Start(RestoreArgs),

    /// Show a restoration
    #[command(group(ArgGroup::new("target").required(true).args(["restoration_id", "snapshot_id"])))]
    Show {
        /// Restoration id
        #[arg(long)]
        restoration_id: Option<RestorationId>,

        /// Show the latest restoration of this snapshot
        #[arg(long)]
        snapshot_id: Option<String>,
    },

    /// Move a restoration to a new non-terminal status
    ///
    /// Terminal statuses are settled with `outcome`, which also cleans up
    /// the working directory and notifies recipients.
    Transition {
        /// Restoration id
        #[arg(long)]
        restoration_id: RestorationId,

        /// Target status (e.g. transfer-in-progress)
        #[arg(long, value_parser = non_terminal_status)]
        status: RestoreStatus,

        /// Status text
        #[arg(long)]
        text: String,
    },

    /// Deliver a transfer job outcome
    #[command(group(ArgGroup::new("result").required(true).args(["succeeded", "failed"])))]
    Outcome {
        /// Restoration id
        #[arg(long)]
        restoration_id: RestorationId,

        /// The transfer succeeded
        #[arg(long)]
        succeeded: bool,

        /// The transfer failed
        #[arg(long)]
        failed: bool,

        /// Detail reported by the job
        #[arg(long, default_value = "")]
        detail: String,
    },
}

/// Snapshot, destination and requester of a restore.
#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    /// Snapshot to restore
    #[arg(long)]
    pub snapshot_id: String,

    /// Destination host
    #[arg(long)]
    pub host: String,

    /// Destination port
    #[arg(long, default_value_t = 443)]
    pub port: u16,

    /// Destination store id
    #[arg(long)]
    pub store_id: String,

    /// Destination space id
    #[arg(long)]
    pub space_id: String,

    /// Requesting user
    #[arg(long)]
    pub user_email: String,
}

impl RestoreArgs {
    /// Destination described by the arguments.
    #[must_use]
    pub fn destination(&self) -> Destination {
        Destination::new(&self.host, self.port, &self.store_id, &self.space_id)
    }
}

fn non_terminal_status(raw: &str) -> Result<RestoreStatus, String> {
    let status = RestoreStatus::from_str(raw).map_err(|e| e.to_string())?;
    if status.is_terminal() {
        return Err(format!(
            "{status} is terminal; report the job result with `outcome` instead"
        ));
    }
    Ok(status)
}
