//! Archive building for multi-track jobs.
//!
//! Successful tracks become ZIP entries named by zero-padded original
//! index plus sanitized display label; if any track failed, one extra
//! `DOWNLOAD_ERRORS.txt` entry summarizes every failure. Entry order
//! always follows submission order, never completion order.

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::FileOptions;

use crate::error::Result;
use crate::types::TrackMetadata;
use crate::utils::sanitize_file_name;

/// Name of the failure manifest entry inside a partial archive
pub const ERROR_MANIFEST_NAME: &str = "DOWNLOAD_ERRORS.txt";

/// Per-item result record produced by the batch processor.
///
/// Failures are captured as data here, never thrown across task
/// boundaries, so no single item failure can abort a batch.
#[derive(Debug)]
pub(crate) struct ItemOutcome {
    /// Original submission index of the item
    pub(crate) index: usize,
    /// The track this outcome belongs to
    pub(crate) track: TrackMetadata,
    /// Fetched bytes, or the human-readable failure text
    pub(crate) result: std::result::Result<Vec<u8>, String>,
}

impl ItemOutcome {
    pub(crate) fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Build the archive for a finished multi-track batch.
///
/// `outcomes` may arrive in completion order; entries are written in
/// original index order. Callers must not pass an all-failed batch here
/// (that is a job-level failure, not an archive).
pub(crate) fn build_archive(mut outcomes: Vec<ItemOutcome>) -> Result<Vec<u8>> {
    outcomes.sort_by_key(|o| o.index);

    let total = outcomes.len();
    let pad_width = index_pad_width(total);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // Audio payloads are already compressed; store them as-is
    let audio_options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let text_options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut failures: Vec<&ItemOutcome> = Vec::new();

    for outcome in &outcomes {
        match &outcome.result {
            Ok(bytes) => {
                let name = entry_name(outcome.index, pad_width, &outcome.track);
                writer.start_file(name, audio_options)?;
                writer.write_all(bytes)?;
            }
            Err(_) => failures.push(outcome),
        }
    }

    if !failures.is_empty() {
        writer.start_file(ERROR_MANIFEST_NAME, text_options)?;
        let manifest = render_manifest(&failures, total, pad_width);
        writer.write_all(manifest.as_bytes())?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Archive entry name: zero-padded 1-based index plus sanitized label
fn entry_name(index: usize, pad_width: usize, track: &TrackMetadata) -> String {
    format!(
        "{:0pad_width$} - {}.mp3",
        index + 1,
        sanitize_file_name(&track.display_label()),
    )
}

/// Human-readable failure summary, one line per failed track
fn render_manifest(failures: &[&ItemOutcome], total: usize, pad_width: usize) -> String {
    let mut manifest = format!(
        "{} of {} track(s) could not be downloaded:\n\n",
        failures.len(),
        total
    );
    for outcome in failures {
        let error = outcome
            .result
            .as_ref()
            .err()
            .map(String::as_str)
            .unwrap_or("unknown error");
        manifest.push_str(&format!(
            "#{:0pad_width$} {} ({}): {}\n",
            outcome.index + 1,
            outcome.track.display_label(),
            outcome.track.album,
            error,
        ));
    }
    manifest
}

/// Width of the zero-padded index: at least two digits, more for large batches
fn index_pad_width(total: usize) -> usize {
    let digits = total.to_string().len();
    digits.max(2)
}
