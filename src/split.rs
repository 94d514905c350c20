use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{PatientKey, SplitLabel};

/// Fractions of the shared cases that go to train and test; validation takes
/// whatever is left.
///
/// Values are not validated. Thresholds outside `[0, 1]` or summing above 1
/// simply shrink (or empty) the validation share.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitThresholds {
    pub train: f64,
    pub test: f64,
}

impl Default for SplitThresholds {
    fn default() -> Self {
        Self {
            train: 0.7,
            test: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionAssignment {
    pub train: Vec<PatientKey>,
    pub validation: Vec<PatientKey>,
    pub test: Vec<PatientKey>,
}

impl PartitionAssignment {
    pub fn keys(&self, label: SplitLabel) -> &[PatientKey] {
        match label {
            SplitLabel::Train => &self.train,
            SplitLabel::Validation => &self.validation,
            SplitLabel::Test => &self.test,
        }
    }

    pub fn label_for(&self, key: &PatientKey) -> Option<SplitLabel> {
        SplitLabel::ALL
            .into_iter()
            .find(|label| self.keys(*label).contains(key))
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, label: SplitLabel, key: PatientKey) {
        match label {
            SplitLabel::Train => self.train.push(key),
            SplitLabel::Validation => self.validation.push(key),
            SplitLabel::Test => self.test.push(key),
        }
    }
}

/// Buckets `keys` by position: position `i` goes to train while
/// `i <= N * train`, then to test while `i <= N * (train + test)`, and to
/// validation after that.
///
/// Both boundaries are inclusive, so train receives `floor(N * train) + 1`
/// keys (capped at `N`) rather than the nominal share. No shuffling happens:
/// the result depends only on the order of `keys` (see
/// [`crate::cases::intersect`]).
pub fn partition(keys: &[PatientKey], thresholds: SplitThresholds) -> PartitionAssignment {
    let total = keys.len() as f64;
    let n_train = total * thresholds.train;
    let n_test = total * thresholds.test;

    let mut assignment = PartitionAssignment::default();
    for (position, key) in keys.iter().enumerate() {
        assignment.push(bucket(position as f64, n_train, n_test), key.clone());
    }
    debug!(
        total = keys.len(),
        n_train,
        n_test,
        train = assignment.train.len(),
        validation = assignment.validation.len(),
        test = assignment.test.len(),
        "partitioned cases"
    );
    assignment
}

fn bucket(position: f64, n_train: f64, n_test: f64) -> SplitLabel {
    if position <= n_train {
        SplitLabel::Train
    } else if position <= n_train + n_test {
        SplitLabel::Test
    } else {
        SplitLabel::Validation
    }
}
