//! Proofsheet CLI: batch uploads and derivative path lookups.
//!
//! Live uploads need RECORD_STORE_URL and RECORD_STORE_KEY, and PROOFSHEET_API_URL when the
//! API is not on localhost:4000. `--dry-run` runs the whole pipeline in memory.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use proofsheet_cli::pipeline::{api_url_from_env, live_orchestrator, DryRun};
use proofsheet_cli::render::{describe_item, progress_key, report_lines};
use proofsheet_cli::init_tracing;
use proofsheet_core::models::SourceFile;
use proofsheet_core::{Config, ImageKind, OwnedPrefix};
use proofsheet_upload::{
    BatchContext, BatchReport, OrchestratorSettings, UploadOrchestrator, VersionTarget,
};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "proofsheet", about = "Proofsheet upload client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload images as variations of a design version
    Upload {
        /// Project UUID
        #[arg(long)]
        project: Uuid,
        /// Design UUID
        #[arg(long)]
        design: Uuid,
        /// Existing version UUID
        #[arg(long, conflicts_with = "new_version", required_unless_present = "new_version")]
        version: Option<Uuid>,
        /// Create a new version for this batch
        #[arg(long)]
        new_version: bool,
        /// Index of the first variation letter (0 = A)
        #[arg(long, default_value = "0")]
        first_letter: usize,
        /// Transfers in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
        /// Run against in-memory storage and records
        #[arg(long)]
        dry_run: bool,
        /// Leave derivative generation to the storage-insert webhook
        #[arg(long)]
        no_trigger: bool,
        /// Image files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the processed-area paths derived from an original path
    DerivePath {
        /// Original object path
        path: String,
        /// Only this width
        #[arg(long)]
        width: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Upload {
            project,
            design,
            version,
            new_version: _,
            first_letter,
            concurrency,
            dry_run,
            no_trigger,
            files,
        } => {
            let mut settings = OrchestratorSettings::from_config(&config);
            if let Some(k) = concurrency {
                settings.concurrency = k;
            }

            let context = BatchContext {
                project_id: project,
                design_id: design,
                version: version.map_or(VersionTarget::NewVersion, VersionTarget::Existing),
                first_letter_index: first_letter,
            };

            let mut sources = Vec::with_capacity(files.len());
            for path in &files {
                let source = SourceFile::from_path(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                sources.push(source);
            }

            let report = if dry_run {
                let run = DryRun::new(&config, settings);
                let report = upload(&run.orchestrator, sources, context).await?;
                let prefix = OwnedPrefix::design(project, design)?;
                let derivatives = run
                    .storage
                    .list(config.processed_bucket(), prefix.as_list_prefix(), 10_000)
                    .await?;
                tracing::info!(
                    derivatives = derivatives.len(),
                    records = run.records.rows(proofsheet_upload::records::VARIATIONS_TABLE).len(),
                    "Dry run finished"
                );
                report
            } else {
                let orchestrator = live_orchestrator(&api_url_from_env(), settings, !no_trigger)?;
                upload(&orchestrator, sources, context).await?
            };

            for line in report_lines(&report) {
                println!("{}", line);
            }
            if !report.all_succeeded() {
                bail!(
                    "{} of {} files did not upload",
                    report.items.len() - report.succeeded(),
                    report.items.len()
                );
            }
        }
        Commands::DerivePath { path, width } => {
            let deriver = config.path_deriver();
            match (config.format_policy().classify(&path), width) {
                (ImageKind::Unsupported, _) => {
                    bail!("{} is not an allow-listed image; nothing is derived", path)
                }
                (ImageKind::Passthrough, _) => println!("{}", deriver.derive(&path, None)),
                (ImageKind::Resizable, Some(w)) => println!("{}", deriver.derive(&path, Some(w))),
                (ImageKind::Resizable, None) => {
                    for spec in config.derivative_specs() {
                        println!("{}", deriver.derive(&path, Some(spec.target_width)));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Submit the batch, log queue changes while it runs and wait for the report.
async fn upload(
    orchestrator: &UploadOrchestrator,
    files: Vec<SourceFile>,
    context: BatchContext,
) -> anyhow::Result<BatchReport> {
    let handle = orchestrator.submit_batch(files, context).await?;
    tracing::info!(version_id = %handle.version_id(), "Batch submitted");

    let mut rx = handle.subscribe();
    let progress = tokio::spawn(async move {
        let mut last = HashMap::new();
        loop {
            let items = rx.borrow_and_update().clone();
            for item in &items {
                let key = progress_key(item);
                if last.insert(item.id, key) != Some(key) {
                    tracing::info!("{}", describe_item(item));
                }
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    });

    let report = handle.wait().await;
    progress.abort();
    Ok(report?)
}
