use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::domain::PatientKey;
use crate::error::PrepError;

/// Unique patient keys observed under one modality.
pub type CaseSet = BTreeSet<PatientKey>;

/// Expands `pattern` and returns the matches in natural (human) order, so that
/// `slide-2` sorts before `slide-10`.
pub fn glob_sorted(pattern: &str) -> Result<Vec<PathBuf>, PrepError> {
    let entries = glob::glob(pattern)
        .map_err(|err| PrepError::InvalidPattern(format!("{pattern}: {err}")))?;
    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(err) => warn!(
                path = %err.path().display(),
                error = %err.error(),
                "skipping unreadable path"
            ),
        }
    }
    paths.sort_by(|a, b| natord::compare(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(paths)
}

pub fn collect_case_ids(pattern: &str) -> Result<CaseSet, PrepError> {
    let paths = glob_sorted(pattern)?;
    let cases: CaseSet = paths.iter().map(|path| PatientKey::from_path(path)).collect();
    debug!(pattern, files = paths.len(), cases = cases.len(), "collected case ids");
    Ok(cases)
}

/// Keys present in both sets, in ascending lexicographic order.
///
/// The order is part of the contract: the partitioner buckets by position, so
/// a stable order here is what makes a split reproducible.
pub fn intersect(a: &CaseSet, b: &CaseSet) -> Vec<PatientKey> {
    a.intersection(b).cloned().collect()
}

pub fn intersect_patterns(a_pattern: &str, b_pattern: &str) -> Result<Vec<PatientKey>, PrepError> {
    let a = collect_case_ids(a_pattern)?;
    let b = collect_case_ids(b_pattern)?;
    Ok(intersect(&a, &b))
}
