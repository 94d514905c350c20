use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cache::ResolutionCache;
use crate::cases::{collect_case_ids, intersect};
use crate::catalog::CatalogClient;
use crate::config::ResolvedConfig;
use crate::container::ContainerReader;
use crate::domain::Modality;
use crate::download::{DownloadClient, DownloadOutcome};
use crate::error::PrepError;
use crate::manifest::{self, FilterReport, ManifestReport};
use crate::resolver::{self, ResolveOptions, ResolveReport, Resolver};
use crate::router::{self, RouteSummary};
use crate::split::{PartitionAssignment, SplitThresholds, partition};

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub frozen_dir: PathBuf,
    pub ffpe_dir: PathBuf,
    pub output_dir: PathBuf,
    pub thresholds: SplitThresholds,
    /// File name pattern matched inside both modality directories.
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitResult {
    pub frozen_cases: usize,
    pub ffpe_cases: usize,
    pub shared_cases: usize,
    pub assignment: PartitionAssignment,
    pub routes: Vec<RouteSummary>,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub cache_path: String,
    pub cached_entries: usize,
    pub resolved_entries: usize,
    pub report: ResolveReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub manifest: String,
    pub output_dir: String,
    pub outcome: DownloadOutcome,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub ids: PathBuf,
    pub cache: PathBuf,
    pub manifest: PathBuf,
    pub output_dir: PathBuf,
    pub limit: Option<usize>,
    pub include_unresolved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub resolve: ResolveResult,
    pub manifest: ManifestReport,
    pub download: DownloadResult,
    pub finished_at: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: CatalogClient, X: ContainerReader, D: DownloadClient> {
    config: ResolvedConfig,
    catalog: C,
    containers: X,
    downloader: D,
}

impl<C: CatalogClient, X: ContainerReader, D: DownloadClient> App<C, X, D> {
    pub fn new(config: ResolvedConfig, catalog: C, containers: X, downloader: D) -> Self {
        Self {
            config,
            catalog,
            containers,
            downloader,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    /// Splits the patients present in both modality directories and copies
    /// each container's images into `{train,val,test}{A,B}`.
    pub fn split(&self, options: SplitOptions, sink: &dyn ProgressSink) -> Result<SplitResult, PrepError> {
        let frozen_pattern = pattern_in(&options.frozen_dir, &options.pattern);
        let ffpe_pattern = pattern_in(&options.ffpe_dir, &options.pattern);

        sink.event(ProgressEvent {
            message: "phase=Collect; scanning case ids".to_string(),
            elapsed: None,
        });
        let frozen = collect_case_ids(&frozen_pattern)?;
        let ffpe = collect_case_ids(&ffpe_pattern)?;
        let shared = intersect(&frozen, &ffpe);

        let assignment = partition(&shared, options.thresholds);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Split; shared={} train={} val={} test={}",
                shared.len(),
                assignment.train.len(),
                assignment.validation.len(),
                assignment.test.len()
            ),
            elapsed: None,
        });

        let mut routes = Vec::new();
        for (modality, pattern) in [(Modality::Ffpe, &ffpe_pattern), (Modality::Frozen, &frozen_pattern)] {
            sink.event(ProgressEvent {
                message: format!("phase=Route; processing {modality} data"),
                elapsed: None,
            });
            let start = Instant::now();
            let summary = router::route_files(
                &self.containers,
                pattern,
                &assignment,
                &options.output_dir,
                modality,
            )?;
            sink.event(ProgressEvent {
                message: format!(
                    "routed {modality}: files={} skipped={} failed={}",
                    summary.files_seen, summary.files_skipped, summary.files_failed
                ),
                elapsed: Some(start.elapsed()),
            });
            routes.push(summary);
        }

        Ok(SplitResult {
            frozen_cases: frozen.len(),
            ffpe_cases: ffpe.len(),
            shared_cases: shared.len(),
            assignment,
            routes,
            finished_at: iso_timestamp(),
        })
    }

    pub fn filter_manifest(
        &self,
        input: &Path,
        output: Option<&Path>,
        sink: &dyn ProgressSink,
    ) -> Result<FilterReport, PrepError> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| manifest::default_filtered_path(input));
        sink.event(ProgressEvent {
            message: format!("phase=Filter; {}", input.display()),
            elapsed: None,
        });
        manifest::filter_manifest(input, &output)
    }

    /// Resolves the slide ids listed in `ids` into the cache at `cache_path`.
    pub fn resolve(
        &self,
        ids: &Path,
        cache_path: &Path,
        limit: Option<usize>,
        sink: &dyn ProgressSink,
    ) -> Result<ResolveResult, PrepError> {
        let slides = resolver::load_slide_ids(ids)?;
        let mut cache = ResolutionCache::open(cache_path)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; slides={} cached={}",
                slides.len(),
                cache.len()
            ),
            elapsed: None,
        });

        let resolver = Resolver::new(
            &self.catalog,
            ResolveOptions::from_config(&self.config.catalog, limit),
        );
        let report = resolver.resolve_all(&slides, &mut cache, sink)?;

        Ok(ResolveResult {
            cache_path: cache_path.display().to_string(),
            cached_entries: cache.len(),
            resolved_entries: cache.resolved_count(),
            report,
        })
    }

    pub fn emit_manifest(
        &self,
        cache_path: &Path,
        manifest_path: &Path,
        include_unresolved: bool,
        sink: &dyn ProgressSink,
    ) -> Result<ManifestReport, PrepError> {
        let cache = ResolutionCache::open(cache_path)?;
        sink.event(ProgressEvent {
            message: format!("phase=Manifest; writing {}", manifest_path.display()),
            elapsed: None,
        });
        manifest::write_download_manifest(&cache, manifest_path, include_unresolved)
    }

    pub fn download(
        &self,
        manifest_path: &Path,
        output_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadResult, PrepError> {
        sink.event(ProgressEvent {
            message: "phase=Download; invoking download client".to_string(),
            elapsed: None,
        });
        let start = Instant::now();
        let outcome = self.downloader.download(manifest_path, output_dir)?;
        sink.event(ProgressEvent {
            message: format!("download finished: {outcome:?}"),
            elapsed: Some(start.elapsed()),
        });
        Ok(DownloadResult {
            manifest: manifest_path.display().to_string(),
            output_dir: output_dir.display().to_string(),
            outcome,
        })
    }

    /// Resolve, emit the manifest, then download, in that order.
    pub fn fetch(&self, options: FetchOptions, sink: &dyn ProgressSink) -> Result<FetchResult, PrepError> {
        let resolve = self.resolve(&options.ids, &options.cache, options.limit, sink)?;
        let manifest = self.emit_manifest(
            &options.cache,
            &options.manifest,
            options.include_unresolved,
            sink,
        )?;
        let download = self.download(&options.manifest, &options.output_dir, sink)?;
        Ok(FetchResult {
            resolve,
            manifest,
            download,
            finished_at: iso_timestamp(),
        })
    }
}

/// Joins `pattern` onto `dir`, escaping glob metacharacters in the directory.
pub fn pattern_in(dir: &Path, pattern: &str) -> String {
    let dir = glob::Pattern::escape(&dir.to_string_lossy());
    Path::new(&dir).join(pattern).to_string_lossy().into_owned()
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
