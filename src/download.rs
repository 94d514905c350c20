use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::PrepError;
use crate::fs_util;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Completed,
    Failed { code: Option<i32>, message: String },
    MissingClient { client: String },
}

impl DownloadOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DownloadOutcome::Completed)
    }
}

pub trait DownloadClient: Send + Sync {
    /// Downloads every file listed in `manifest` into `output_dir`.
    ///
    /// Client failures are reported through the outcome; only failing to
    /// create `output_dir` is an error.
    fn download(&self, manifest: &Path, output_dir: &Path) -> Result<DownloadOutcome, PrepError>;
}

/// Runs `<client> download -m <manifest> -d <output_dir>`.
#[derive(Debug, Clone)]
pub struct GdcDownloader {
    client: PathBuf,
}

impl GdcDownloader {
    pub fn new(client: impl Into<PathBuf>) -> Self {
        Self {
            client: client.into(),
        }
    }

    /// Resolves the configured client: paths are used as given, bare names
    /// are looked up on `PATH`.
    pub fn locate(&self) -> Option<PathBuf> {
        let is_path = self.client.is_absolute() || self.client.components().count() > 1;
        if is_path {
            return self.client.exists().then(|| self.client.clone());
        }
        let name = self.client.to_str()?;
        find_in_path(name)
    }

    pub fn command_args(manifest: &Path, output_dir: &Path) -> Vec<String> {
        vec![
            "download".to_string(),
            "-m".to_string(),
            manifest.to_string_lossy().to_string(),
            "-d".to_string(),
            output_dir.to_string_lossy().to_string(),
        ]
    }
}

impl DownloadClient for GdcDownloader {
    fn download(&self, manifest: &Path, output_dir: &Path) -> Result<DownloadOutcome, PrepError> {
        fs_util::ensure_dir(output_dir)?;

        let Some(program) = self.locate() else {
            warn!(client = %self.client.display(), "download client not found; skipping download");
            return Ok(DownloadOutcome::MissingClient {
                client: self.client.display().to_string(),
            });
        };

        info!(client = %program.display(), manifest = %manifest.display(), "starting download");
        let status = Command::new(&program)
            .args(Self::command_args(manifest, output_dir))
            .status();
        let outcome = match status {
            Ok(status) if status.success() => DownloadOutcome::Completed,
            Ok(status) => DownloadOutcome::Failed {
                code: status.code(),
                message: format!("{} exited with {status}", program.display()),
            },
            Err(err) => DownloadOutcome::Failed {
                code: None,
                message: format!("{}: {err}", program.display()),
            },
        };
        if let DownloadOutcome::Failed { message, .. } = &outcome {
            warn!(error = %message, "download failed");
        }
        Ok(outcome)
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}
