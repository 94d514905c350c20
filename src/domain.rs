use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PrepError;

/// Length of a TCGA case submitter id, e.g. `TCGA-43-3920`.
pub const SUBMITTER_ID_LEN: usize = 12;

/// Length of a slide barcode prefix, e.g. `TCGA-43-3920-01Z-00-DX1`.
pub const SLIDE_BARCODE_LEN: usize = 23;

/// Canonical patient identifier: the first three dash-separated segments of a
/// slide file name (`TCGA-AA-0001-01Z-00-DX1.h5` -> `TCGA-AA-0001`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientKey(String);

impl PatientKey {
    /// Derives the key from the trailing component of `path`.
    ///
    /// Names with fewer than three segments are not rejected; they produce a
    /// shorter key and callers are expected to feed well-formed names.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_file_name(&name)
    }

    pub fn from_file_name(name: &str) -> Self {
        Self(name.split('-').take(3).collect::<Vec<_>>().join("-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local slide identifier as listed in a slide list file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlideId(String);

impl SlideId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case submitter id used to query the catalog.
    pub fn submitter_id(&self) -> &str {
        leading_chars(&self.0, SUBMITTER_ID_LEN)
    }

    /// Barcode prefix a candidate file name must contain to match.
    pub fn barcode(&self) -> &str {
        leading_chars(&self.0, SLIDE_BARCODE_LEN)
    }
}

impl fmt::Display for SlideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SlideId {
    type Err = PrepError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PrepError::InvalidSlideId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Returns at most the first `count` characters of `value`.
pub fn leading_chars(value: &str, count: usize) -> &str {
    match value.char_indices().nth(count) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Dataset partition a patient is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitLabel {
    Train,
    Validation,
    Test,
}

impl SplitLabel {
    pub const ALL: [SplitLabel; 3] = [SplitLabel::Train, SplitLabel::Validation, SplitLabel::Test];

    /// Directory name prefix used in the output layout.
    pub fn dir_prefix(self) -> &'static str {
        match self {
            SplitLabel::Train => "train",
            SplitLabel::Validation => "val",
            SplitLabel::Test => "test",
        }
    }
}

impl fmt::Display for SplitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitLabel::Train => write!(f, "train"),
            SplitLabel::Validation => write!(f, "validation"),
            SplitLabel::Test => write!(f, "test"),
        }
    }
}

/// One of the two paired imaging sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Frozen,
    Ffpe,
}

impl Modality {
    /// Suffix appended to the split directories (`trainA`, `valB`, ...).
    pub fn suffix(self) -> &'static str {
        match self {
            Modality::Frozen => "A",
            Modality::Ffpe => "B",
        }
    }

    pub fn split_dir_name(self, label: SplitLabel) -> String {
        format!("{}{}", label.dir_prefix(), self.suffix())
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Frozen => write!(f, "frozen"),
            Modality::Ffpe => write!(f, "ffpe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn patient_key_from_nested_path() {
        let key = PatientKey::from_path(Path::new("data/frozen/TCGA-43-3920-01Z-00-DX1.h5"));
        assert_eq!(key.as_str(), "TCGA-43-3920");
    }

    #[test]
    fn leading_chars_handles_short_values() {
        assert_eq!(leading_chars("TCGA-43", 12), "TCGA-43");
        assert_eq!(leading_chars("TCGA-43-3920-01Z", 12), "TCGA-43-3920");
    }

    #[test]
    fn parse_slide_id_rejects_blank() {
        let err = "   ".parse::<SlideId>().unwrap_err();
        assert_matches!(err, PrepError::InvalidSlideId(_));
    }

    #[test]
    fn split_dir_names() {
        assert_eq!(Modality::Frozen.split_dir_name(SplitLabel::Validation), "valA");
        assert_eq!(Modality::Ffpe.split_dir_name(SplitLabel::Train), "trainB");
    }
}
