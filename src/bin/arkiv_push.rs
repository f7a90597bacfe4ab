//! arkiv-push: continuous change-log archiving.
//!
//! Reads JSON-lines change records, groups them into contiguous batches and
//! persists each batch under the configured archive directory. On restart it
//! resumes from the last persisted batch.
//!
//! ## Architecture
//! ```text
//! [stdin | file] --(JSON lines)--> [archiving loop] --> {storage.path}/oplog_<start>_<end>.bin
//! ```
//!
//! ## Configuration
//! - `--config <path>`: YAML configuration file (optional)
//! - ARKIV_CONFIG: YAML configuration file (optional)
//! - ARKIV__*: overrides, e.g. ARKIV__ARCHIVE__FLUSH_TIMEOUT_SECS=30
//! - ARKIV_LOG: log filter (default: info)
//!
//! Stdin cannot be re-read, so with `source.path: "-"` the first failed
//! session ends the process; only a file source is restarted.

use std::sync::Arc;

use tracing::{error, info};

use arkiv::archive::FilesystemArchiveStore;
use arkiv::archiver::Archiver;
use arkiv::config::Config;
use arkiv::source::{JsonLinesSource, RecordSource};
use arkiv::supervisor::Supervisor;
use arkiv::utils::bootstrap::{init_tracing, shutdown_token};
use arkiv::validation::PayloadValidator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1);
    let config = Config::load(config_path.as_deref())?;

    let store = Arc::new(FilesystemArchiveStore::new(&config.storage.path).await?);
    info!(path = %store.base_path().display(), "ArchiveStore: filesystem");

    let source: Arc<dyn RecordSource> = if config.source.is_stdin() {
        info!("RecordSource: stdin");
        Arc::new(
            JsonLinesSource::new(|| Ok(tokio::io::stdin()))
                .with_capacity(config.source.channel_capacity)
                .one_shot(),
        )
    } else {
        let path = config.source.path.clone();
        info!(path = %path, "RecordSource: file");
        Arc::new(
            JsonLinesSource::new(move || std::fs::File::open(&path).map(tokio::fs::File::from_std))
                .with_capacity(config.source.channel_capacity),
        )
    };

    let validator = Arc::new(PayloadValidator::new(config.archive.max_record_bytes));
    let archiver = Archiver::new(store, source, validator, config.archive.clone());
    let supervisor = Supervisor::new(archiver, config.supervisor.clone());

    info!(
        size_threshold_bytes = config.archive.size_threshold_bytes,
        flush_timeout_secs = config.archive.flush_timeout_secs,
        "arkiv-push started"
    );

    match supervisor.run(shutdown_token()).await {
        Ok(summary) => {
            info!(
                reason = ?summary.reason,
                last_persisted = ?summary.last_persisted,
                "arkiv-push stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(kind = %e.kind(), error = %e, "arkiv-push failed");
            Err(e.into())
        }
    }
}
