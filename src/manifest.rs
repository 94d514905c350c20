use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::ResolutionCache;
use crate::domain::{SUBMITTER_ID_LEN, leading_chars};
use crate::error::PrepError;
use crate::fs_util;

/// Extension of whole-slide image files listed in a GDC manifest.
pub const SLIDE_EXTENSION: &str = ".svs";

/// Marker of diagnostic (FFPE) slides.
pub const DIAGNOSTIC_MARKER: &str = "DX";

/// Markers of frozen tissue slides (bottom / top section).
pub const FROZEN_MARKERS: [&str; 2] = ["BS", "TS"];

pub const MANIFEST_HEADER: &str = "id";

#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    pub input: String,
    pub output: String,
    pub cases_seen: usize,
    pub cases_kept: usize,
    pub rows_kept: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestReport {
    pub path: String,
    pub rows: usize,
    pub unresolved_rows: usize,
    pub omitted: usize,
}

/// `<dir>/<stem>_filtered.txt` next to `input`.
pub fn default_filtered_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manifest".to_string());
    input.with_file_name(format!("{stem}_filtered.txt"))
}

/// Keeps the `.svs` rows of cases that have both a diagnostic slide and a
/// frozen section slide. Rows are grouped by the first 12 characters of the
/// `filename` column (the second one); the header is copied unchanged.
pub fn filter_manifest(input: &Path, output: &Path) -> Result<FilterReport, PrepError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .map_err(|err| PrepError::Manifest(format!("{}: {err}", input.display())))?;
    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record.map_err(|err| PrepError::Manifest(err.to_string()))?,
        None => {
            return Err(PrepError::Manifest(format!(
                "{}: manifest has no header row",
                input.display()
            )));
        }
    };

    let mut cases: IndexMap<String, Vec<StringRecord>> = IndexMap::new();
    for record in records {
        let record = record.map_err(|err| PrepError::Manifest(err.to_string()))?;
        let Some(file_name) = record.get(1) else {
            continue;
        };
        if !file_name.to_ascii_lowercase().ends_with(SLIDE_EXTENSION) {
            continue;
        }
        let case = leading_chars(file_name, SUBMITTER_ID_LEN).to_string();
        cases.entry(case).or_default().push(record);
    }

    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(Vec::new());
    writer
        .write_record(&header)
        .map_err(|err| PrepError::Manifest(err.to_string()))?;
    let mut cases_kept = 0usize;
    let mut rows_kept = 0usize;
    for (case, rows) in &cases {
        if !has_paired_slides(rows) {
            debug!(case = %case, rows = rows.len(), "dropping case without paired slides");
            continue;
        }
        cases_kept += 1;
        for row in rows {
            writer
                .write_record(row)
                .map_err(|err| PrepError::Manifest(err.to_string()))?;
            rows_kept += 1;
        }
    }
    let content = writer
        .into_inner()
        .map_err(|err| PrepError::Manifest(err.to_string()))?;
    fs_util::write_atomic(output, &content)?;

    info!(
        input = %input.display(),
        output = %output.display(),
        rows_kept,
        "filtered manifest"
    );
    Ok(FilterReport {
        input: input.display().to_string(),
        output: output.display().to_string(),
        cases_seen: cases.len(),
        cases_kept,
        rows_kept,
    })
}

fn has_paired_slides(rows: &[StringRecord]) -> bool {
    let names = || rows.iter().filter_map(|row| row.get(1));
    let has_diagnostic = names().any(|name| name.contains(DIAGNOSTIC_MARKER));
    let has_frozen = names().any(|name| FROZEN_MARKERS.iter().any(|marker| name.contains(marker)));
    has_diagnostic && has_frozen
}

/// Renders the download manifest: header `id`, then one remote id per cache
/// entry in cache order. With `include_unresolved`, slides that never
/// resolved produce blank rows, which the download client will reject.
pub fn render_download_manifest(cache: &ResolutionCache, include_unresolved: bool) -> (String, ManifestReport) {
    let mut content = format!("{MANIFEST_HEADER}\n");
    let mut report = ManifestReport {
        path: String::new(),
        rows: 0,
        unresolved_rows: 0,
        omitted: 0,
    };
    for (_, entry) in cache.entries() {
        if !entry.is_resolved() {
            if !include_unresolved {
                report.omitted += 1;
                continue;
            }
            report.unresolved_rows += 1;
        }
        content.push_str(&entry.id);
        content.push('\n');
        report.rows += 1;
    }
    (content, report)
}

pub fn write_download_manifest(
    cache: &ResolutionCache,
    path: &Path,
    include_unresolved: bool,
) -> Result<ManifestReport, PrepError> {
    let (content, mut report) = render_download_manifest(cache, include_unresolved);
    fs_util::write_atomic(path, content.as_bytes())?;
    report.path = path.display().to_string();
    info!(
        path = %path.display(),
        rows = report.rows,
        unresolved = report.unresolved_rows,
        "wrote download manifest"
    );
    Ok(report)
}
