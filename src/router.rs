use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cases::glob_sorted;
use crate::container::{ContainerReader, EmbeddedImage};
use crate::domain::{Modality, PatientKey, SplitLabel};
use crate::error::PrepError;
use crate::fs_util;
use crate::split::PartitionAssignment;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

impl SplitCounts {
    fn add(&mut self, label: SplitLabel, count: usize) {
        match label {
            SplitLabel::Train => self.train += count,
            SplitLabel::Validation => self.validation += count,
            SplitLabel::Test => self.test += count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub modality: Modality,
    pub files_seen: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub images_written: SplitCounts,
}

#[derive(Debug, Clone)]
pub struct SplitDirs {
    pub train: PathBuf,
    pub validation: PathBuf,
    pub test: PathBuf,
}

impl SplitDirs {
    /// Creates `<root>/{train,val,test}<suffix>` if absent.
    pub fn ensure(output_root: &Path, modality: Modality) -> Result<Self, PrepError> {
        let dirs = Self {
            train: output_root.join(modality.split_dir_name(SplitLabel::Train)),
            validation: output_root.join(modality.split_dir_name(SplitLabel::Validation)),
            test: output_root.join(modality.split_dir_name(SplitLabel::Test)),
        };
        for label in SplitLabel::ALL {
            fs_util::ensure_dir(dirs.get(label))?;
        }
        Ok(dirs)
    }

    pub fn get(&self, label: SplitLabel) -> &Path {
        match label {
            SplitLabel::Train => &self.train,
            SplitLabel::Validation => &self.validation,
            SplitLabel::Test => &self.test,
        }
    }
}

/// Copies the images of every container matching `pattern` into the split
/// directory of its patient, as `<file name>.<index>.<ext>`.
///
/// Files whose patient is in no partition are skipped. A container that
/// cannot be read is logged and counted, and images already written from it
/// stay on disk. Failing to write into the output tree aborts the run.
pub fn route_files<R: ContainerReader + ?Sized>(
    reader: &R,
    pattern: &str,
    assignment: &PartitionAssignment,
    output_root: &Path,
    modality: Modality,
) -> Result<RouteSummary, PrepError> {
    let dirs = SplitDirs::ensure(output_root, modality)?;
    let mut summary = RouteSummary {
        modality,
        files_seen: 0,
        files_skipped: 0,
        files_failed: 0,
        images_written: SplitCounts::default(),
    };

    for path in glob_sorted(pattern)? {
        summary.files_seen += 1;
        let key = PatientKey::from_path(&path);
        let Some(label) = assignment.label_for(&key) else {
            debug!(path = %path.display(), case = %key, "case not in any split");
            summary.files_skipped += 1;
            continue;
        };
        let dest = dirs.get(label);
        let raw_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut written = 0usize;
        let result = reader.visit_images(&path, &mut |image: EmbeddedImage| {
            let target = dest.join(format!("{raw_name}.{}.{}", image.index, image.extension));
            fs_util::write_atomic(&target, &image.bytes)?;
            written += 1;
            Ok(())
        });
        summary.images_written.add(label, written);

        match result {
            Ok(count) => info!(
                file = %raw_name,
                case = %key,
                split = %label,
                modality = %modality,
                images = count,
                "routed container"
            ),
            Err(PrepError::Container(message)) => {
                summary.files_failed += 1;
                warn!(
                    file = %raw_name,
                    written,
                    error = %message,
                    "failed to read container"
                );
            }
            Err(err) => return Err(err),
        }
    }

    Ok(summary)
}
