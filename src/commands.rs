//! CLI command handlers.
//!
//! Every handler prints the resulting record as pretty JSON on stdout.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use snaprestore_lifecycle::{
    FsWorkspaceCleaner, JobOutcome, NotificationDispatcher, RestorationId,
    RestoreCompletionHandler, RestoreOrchestrator, RestoreStatus, Snapshot, SnapshotStatus,
    TracingTransport,
};
use snaprestore_store::SurrealStore;

use crate::cli::{Commands, RestoreArgs};
use crate::config::AppConfig;

/// Wired collaborators for one CLI invocation.
struct App {
    store: Arc<SurrealStore>,
    orchestrator: Arc<RestoreOrchestrator>,
    handler: RestoreCompletionHandler,
}

impl App {
    async fn open(config: &AppConfig) -> Result<Self> {
        let store = SurrealStore::connect(&config.store)
            .await
            .with_context(|| format!("Failed to connect to store at {}", config.store.url))?;
        store
            .initialize_schema()
            .await
            .context("Failed to initialize store schema")?;
        store
            .health_check()
            .await
            .context("Store health check failed")?;
        let store = Arc::new(store);

        let orchestrator = Arc::new(RestoreOrchestrator::new(
            store.clone(),
            store.clone(),
            &config.lifecycle,
        ));
        let handler = RestoreCompletionHandler::new(
            orchestrator.clone(),
            NotificationDispatcher::new(Arc::new(TracingTransport)),
            Arc::new(FsWorkspaceCleaner::new()),
            &config.lifecycle,
        );

        Ok(Self {
            store,
            orchestrator,
            handler,
        })
    }
}

/// Execute a CLI command.
///
/// This is the main command dispatcher that routes to the appropriate handler.
pub async fn execute_command(command: Commands, config: &AppConfig) -> Result<()> {
    let app = App::open(config).await?;

    match command {
        Commands::SnapshotRegister {
            id,
            description,
            status,
        } => cmd_snapshot_register(&app, id, description, status).await,

        Commands::Request(args) => cmd_request(&app, &args).await,

        Commands::Start(args) => cmd_start(&app, &args).await,

        Commands::Show {
            restoration_id,
            snapshot_id,
        } => cmd_show(&app, restoration_id, snapshot_id).await,

        Commands::Transition {
            restoration_id,
            status,
            text,
        } => cmd_transition(&app, &restoration_id, status, &text).await,

        Commands::Outcome {
            restoration_id,
            succeeded,
            failed: _,
            detail,
        } => cmd_outcome(&app, restoration_id, succeeded, detail).await,
    }
}

async fn cmd_snapshot_register(
    app: &App,
    id: String,
    description: Option<String>,
    status: SnapshotStatus,
) -> Result<()> {
    let snapshot = Snapshot::new(id, status);
    let snapshot = match description {
        Some(text) => snapshot.with_description(text),
        None => snapshot,
    };

    let saved = app
        .store
        .register_snapshot(&snapshot)
        .await
        .with_context(|| format!("Failed to register snapshot {}", snapshot.id))?;

    info!(snapshot_id = %saved.id, status = %saved.status, "Snapshot registered");
    print_json(&saved)
}

async fn cmd_request(app: &App, args: &RestoreArgs) -> Result<()> {
    let restoration = app
        .orchestrator
        .request_restore(&args.snapshot_id, args.destination(), &args.user_email)
        .await
        .with_context(|| format!("Restore request for snapshot {} failed", args.snapshot_id))?;

    print_json(&restoration)
}

async fn cmd_start(app: &App, args: &RestoreArgs) -> Result<()> {
    let restoration = app
        .orchestrator
        .start_restore(&args.snapshot_id, args.destination(), &args.user_email)
        .await
        .with_context(|| format!("Restore start for snapshot {} failed", args.snapshot_id))?;

    print_json(&restoration)
}

async fn cmd_show(
    app: &App,
    restoration_id: Option<RestorationId>,
    snapshot_id: Option<String>,
) -> Result<()> {
    let restoration = match (restoration_id, snapshot_id) {
        (Some(id), _) => app.orchestrator.get(&id).await?,
        (None, Some(snapshot_id)) => app.orchestrator.get_by_snapshot_id(&snapshot_id).await?,
        (None, None) => anyhow::bail!("either --restoration-id or --snapshot-id is required"),
    };

    print_json(&restoration)
}

async fn cmd_transition(
    app: &App,
    restoration_id: &RestorationId,
    status: RestoreStatus,
    text: &str,
) -> Result<()> {
    let restoration = app
        .orchestrator
        .apply_transition(restoration_id, status, text)
        .await
        .with_context(|| format!("Transition of {restoration_id} to {status} failed"))?;

    print_json(&restoration)
}

async fn cmd_outcome(
    app: &App,
    restoration_id: RestorationId,
    succeeded: bool,
    detail: String,
) -> Result<()> {
    let outcome = JobOutcome {
        restoration_id,
        succeeded,
        detail,
    };

    let disposition = app
        .handler
        .handle_job_outcome(&outcome)
        .await
        .with_context(|| format!("Job outcome for {} was not recorded", outcome.restoration_id))?;
    let restoration = app.orchestrator.get(&outcome.restoration_id).await?;

    print_json(&json!({
        "disposition": disposition,
        "restoration": restoration,
    }))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}
