//! Shared utilities for integration tests.
//!
//! Builds JSON-lines input files and wires an archiver over them.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arkiv::archive::{ArchiveStore, FilesystemArchiveStore};
use arkiv::archiver::Archiver;
use arkiv::config::{ArchiveConfig, RetryConfig};
use arkiv::position::Position;
use arkiv::source::{JsonLinesSource, Record, RecordSource, WireRecord};
use arkiv::validation::PayloadValidator;

/// Payload used for the record at `secs` in generated inputs.
pub fn payload_for(secs: u32) -> Vec<u8> {
    format!("r{secs:03}").into_bytes()
}

/// Append records at positions `secs.0` for each `secs` in `range` to `path`.
pub fn append_records(path: &Path, range: std::ops::RangeInclusive<u32>) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("Failed to open input file");
    for secs in range {
        let record = Record::new(Position::new(secs, 0), payload_for(secs));
        writeln!(file, "{}", WireRecord::encode(&record).expect("Failed to encode record"))
            .expect("Failed to write record");
    }
}

/// Source that reopens `path` for every session.
pub fn file_source(path: PathBuf) -> Arc<dyn RecordSource> {
    Arc::new(JsonLinesSource::new(move || {
        std::fs::File::open(&path).map(tokio::fs::File::from_std)
    }))
}

pub fn archive_config(size_threshold_bytes: usize) -> ArchiveConfig {
    ArchiveConfig {
        size_threshold_bytes,
        flush_timeout_secs: 60,
        max_record_bytes: 1024,
        persist_retry: RetryConfig::none(),
    }
}

pub fn archiver(
    store: &Arc<FilesystemArchiveStore>,
    input: &Path,
    size_threshold_bytes: usize,
) -> Archiver {
    Archiver::new(
        Arc::clone(store) as Arc<dyn ArchiveStore>,
        file_source(input.to_path_buf()),
        Arc::new(PayloadValidator::new(1024)),
        archive_config(size_threshold_bytes),
    )
}
