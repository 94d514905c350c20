use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::cache::{CacheEntry, ResolutionCache};
use crate::catalog::{CatalogClient, CatalogHit};
use crate::config::CatalogConfig;
use crate::domain::SlideId;
use crate::error::PrepError;

/// Result of handling one slide identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// A catalog file name contains the slide barcode.
    Resolved(CatalogHit),
    /// The query succeeded but nothing matched; cached as empty strings.
    Exhausted,
    /// Already cached; no query was made.
    Skipped,
    /// Non-200 status, network error or malformed body. Nothing is cached,
    /// so the slide is queried again on the next run.
    TransientFailure(String),
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Maximum number of catalog queries per run. Cached slides do not count
    /// and `Some(0)` means no limit.
    pub limit: Option<usize>,
    /// Pause after every query, whatever its outcome.
    pub request_delay: Duration,
    pub retry_exhausted: bool,
}

impl ResolveOptions {
    pub fn from_config(config: &CatalogConfig, limit: Option<usize>) -> Self {
        Self {
            limit,
            request_delay: config.request_delay,
            retry_exhausted: config.retry_exhausted,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolveReport {
    pub total: usize,
    pub queried: usize,
    pub resolved: usize,
    pub exhausted: usize,
    pub skipped: usize,
    /// Slides left for a later run because the limit was reached.
    pub deferred: usize,
    pub failed: Vec<String>,
}

pub struct Resolver<C: CatalogClient> {
    client: C,
    options: ResolveOptions,
}

impl<C: CatalogClient> Resolver<C> {
    pub fn new(client: C, options: ResolveOptions) -> Self {
        Self { client, options }
    }

    pub fn needs_query(&self, cache: &ResolutionCache, slide: &SlideId) -> bool {
        match cache.get(slide.as_str()) {
            None => true,
            Some(entry) => self.options.retry_exhausted && !entry.is_resolved(),
        }
    }

    /// Queries the catalog for one slide and picks the first hit whose file
    /// name contains the slide barcode.
    pub fn query(&self, slide: &SlideId) -> ResolveOutcome {
        match self.client.search_slides(slide.submitter_id()) {
            Ok(hits) => match match_hit(slide, &hits) {
                Some(hit) => ResolveOutcome::Resolved(hit.clone()),
                None => ResolveOutcome::Exhausted,
            },
            Err(err) => ResolveOutcome::TransientFailure(err.to_string()),
        }
    }

    /// Resolves one slide against `cache`, flushing the cache when the
    /// outcome is final. Only a failed flush is returned as an error.
    pub fn resolve_one(
        &self,
        slide: &SlideId,
        cache: &mut ResolutionCache,
    ) -> Result<ResolveOutcome, PrepError> {
        if !self.needs_query(cache, slide) {
            return Ok(ResolveOutcome::Skipped);
        }
        let outcome = self.query(slide);
        match &outcome {
            ResolveOutcome::Resolved(hit) => {
                cache.insert(
                    slide.as_str(),
                    CacheEntry::resolved(hit.id.clone(), hit.file_name.clone()),
                );
                cache.flush()?;
            }
            ResolveOutcome::Exhausted => {
                cache.insert(slide.as_str(), CacheEntry::unresolved());
                cache.flush()?;
            }
            ResolveOutcome::Skipped | ResolveOutcome::TransientFailure(_) => {}
        }
        Ok(outcome)
    }

    /// Walks `slides` in order, querying those not yet cached until the limit
    /// is reached. The cache file is rewritten after every final outcome, so an
    /// interrupted run loses at most the query in flight.
    pub fn resolve_all(
        &self,
        slides: &[SlideId],
        cache: &mut ResolutionCache,
        sink: &dyn ProgressSink,
    ) -> Result<ResolveReport, PrepError> {
        let mut report = ResolveReport {
            total: slides.len(),
            ..ResolveReport::default()
        };
        let limit = self.options.limit.filter(|limit| *limit > 0);

        for (position, slide) in slides.iter().enumerate() {
            if !self.needs_query(cache, slide) {
                report.skipped += 1;
                continue;
            }
            if limit.is_some_and(|limit| report.queried >= limit) {
                report.deferred += 1;
                continue;
            }

            sink.event(ProgressEvent {
                message: format!("phase=Resolve; query {position}: {slide}"),
                elapsed: None,
            });
            report.queried += 1;
            let start = Instant::now();
            let outcome = self.resolve_one(slide, cache)?;
            let elapsed = start.elapsed();

            match outcome {
                ResolveOutcome::Resolved(hit) => {
                    report.resolved += 1;
                    info!(slide = %slide, file_id = %hit.id, file_name = %hit.file_name, "resolved slide");
                    sink.event(ProgressEvent {
                        message: format!("resolved {slide} -> {}", hit.id),
                        elapsed: Some(elapsed),
                    });
                }
                ResolveOutcome::Exhausted => {
                    report.exhausted += 1;
                    info!(slide = %slide, "no catalog file matches slide");
                    sink.event(ProgressEvent {
                        message: format!("not found {slide}"),
                        elapsed: Some(elapsed),
                    });
                }
                ResolveOutcome::TransientFailure(reason) => {
                    warn!(slide = %slide, position, error = %reason, "catalog query failed");
                    sink.event(ProgressEvent {
                        message: format!("failed {slide}: {reason}"),
                        elapsed: Some(elapsed),
                    });
                    report.failed.push(slide.to_string());
                }
                ResolveOutcome::Skipped => {}
            }

            self.pause();
        }

        Ok(report)
    }

    fn pause(&self) {
        if !self.options.request_delay.is_zero() {
            thread::sleep(self.options.request_delay);
        }
    }
}

pub fn match_hit<'a>(slide: &SlideId, hits: &'a [CatalogHit]) -> Option<&'a CatalogHit> {
    let barcode = slide.barcode();
    hits.iter().find(|hit| hit.file_name.contains(barcode))
}

/// Reads one slide identifier per line, skipping blank lines.
pub fn load_slide_ids(path: &Path) -> Result<Vec<SlideId>, PrepError> {
    let content =
        fs::read_to_string(path).map_err(|_| PrepError::SlideListRead(path.to_path_buf()))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.parse::<SlideId>())
        .collect()
}
