use std::{
    path::Path,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use clap::Parser;
use opsweep::{
    AuditSink, BackoffConfig, DeletionPipeline, DynamoTable, FlushError, FlushOptions,
    FlushResult, PipelineResult, TableConfig, audit, store::StoreError,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Remove entries from the resources table where the soft-delete flag is
/// set.
///
/// Entries are marked as deleted and scheduled for removal, which can leave
/// a large number of records pending deletion. Inspect before flushing to
/// see how many entries match and how large a save file would be. Flush is
/// the only option that removes entries.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Remove matched entries from the table
    #[arg(long)]
    flush: bool,

    /// Save the row keys of matched entries to ./flush_resource_ids_<start_epoch>
    #[arg(long)]
    save: bool,

    /// Print the number of matched entries and the estimated save file
    /// size, without deleting anything (overrides --flush and --save)
    #[arg(long)]
    inspect: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Table to sweep
    #[arg(long, default_value = "panther-resources")]
    table: String,

    /// Attribute holding the row key
    #[arg(long, default_value = "id")]
    key_attribute: String,

    /// Boolean attribute marking a record as soft-deleted
    #[arg(long, default_value = "deleted")]
    deleted_attribute: String,

    /// AWS region (defaults to the ambient environment)
    #[arg(long)]
    region: Option<String>,

    /// Custom endpoint URL (useful for localstack testing)
    #[arg(long)]
    endpoint_url: Option<String>,
}

fn init_tracing(debug: bool) {
    let default_directives = if debug { "opsweep=debug,info" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.debug);
    let start = Instant::now();

    let outcome = run(args).await;
    let elapsed_secs = format!("{:.2}", start.elapsed().as_secs_f64());

    match outcome {
        Ok(result) => {
            tracing::info!(
                matched = result.matched,
                deleted = result.deleted,
                audited = result.audited,
                elapsed_secs = %elapsed_secs,
                "completed"
            );
        }
        Err(err) => {
            tracing::error!(error = %err, elapsed_secs = %elapsed_secs, "run failed");
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> FlushResult<PipelineResult> {
    let start_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let options = FlushOptions {
        flush: args.flush,
        save: args.save,
        inspect: args.inspect,
    }
    .normalized();
    if options.is_noop() {
        return Err(FlushError::NothingToDo);
    }
    tracing::debug!(
        flush = options.flush,
        save = options.save,
        inspect = options.inspect,
        start_epoch = start_epoch,
        "resolved run options"
    );

    let mut table = TableConfig::new(args.table)
        .with_key_attribute(args.key_attribute)
        .with_deleted_attribute(args.deleted_attribute);
    if let Some(region) = args.region {
        table = table.with_region(region);
    }
    if let Some(endpoint_url) = args.endpoint_url {
        table = table.with_endpoint_url(endpoint_url);
    }

    // Credentials resolve here, before the audit file exists, so a
    // credential failure leaves nothing behind.
    let store = DynamoTable::new(table).await.map_err(|err| match err {
        StoreError::Credentials(msg) => FlushError::Credentials(msg),
        other => FlushError::Store(other),
    })?;

    let (sink, audit_path) = if options.save {
        let dir = std::env::current_dir()?;
        let (sink, path) = AuditSink::create_file(&dir, start_epoch)?;
        tracing::debug!(path = %path.display(), "created audit file");
        (sink, Some(path))
    } else {
        (AuditSink::disabled(), None)
    };

    let pipeline = DeletionPipeline::new(&store, &store, sink, options, BackoffConfig::default());
    let outcome = pipeline.run().await;

    match &audit_path {
        Some(path) => finish_audit_file(path, outcome),
        None => outcome,
    }
}

/// Remove the audit file if nothing was ever written to it.
///
/// A cleanup failure must not mask a pipeline failure: when both go wrong,
/// the cleanup error is logged and the pipeline error is the one returned.
fn finish_audit_file(path: &Path, outcome: FlushResult<PipelineResult>) -> FlushResult<PipelineResult> {
    match audit::remove_if_empty(path) {
        Ok(removed) => {
            if removed {
                tracing::debug!(path = %path.display(), "removed empty audit file");
            }
            outcome
        }
        Err(err) => match outcome {
            Ok(_) => Err(FlushError::Audit(err)),
            Err(original) => {
                tracing::error!(
                    error = %err,
                    path = %path.display(),
                    "failed to clean up audit file"
                );
                Err(original)
            }
        },
    }
}
