use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use slideprep::app::{ProgressEvent, ProgressSink};
use slideprep::cache::{CacheEntry, ResolutionCache};
use slideprep::catalog::{CatalogClient, CatalogHit};
use slideprep::domain::SlideId;
use slideprep::error::PrepError;
use slideprep::resolver::{ResolveOptions, ResolveOutcome, Resolver, load_slide_ids};

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
struct MockCatalog {
    responses: HashMap<String, Result<Vec<CatalogHit>, u16>>,
    calls: Mutex<Vec<String>>,
    /// Cache file whose entry count is recorded at every call.
    watch: Option<PathBuf>,
    on_disk: Mutex<Vec<usize>>,
}

impl MockCatalog {
    fn with_hit(mut self, submitter_id: &str, id: &str, file_name: &str) -> Self {
        self.responses.insert(
            submitter_id.to_string(),
            Ok(vec![CatalogHit {
                id: id.to_string(),
                file_name: file_name.to_string(),
            }]),
        );
        self
    }

    fn with_status(mut self, submitter_id: &str, status: u16) -> Self {
        self.responses.insert(submitter_id.to_string(), Err(status));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CatalogClient for MockCatalog {
    fn search_slides(&self, submitter_id: &str) -> Result<Vec<CatalogHit>, PrepError> {
        self.calls.lock().unwrap().push(submitter_id.to_string());
        if let Some(path) = &self.watch {
            let count = ResolutionCache::open(path).unwrap().len();
            self.on_disk.lock().unwrap().push(count);
        }
        match self.responses.get(submitter_id) {
            Some(Ok(hits)) => Ok(hits.clone()),
            Some(Err(status)) => Err(PrepError::CatalogStatus {
                status: *status,
                message: "unavailable".to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

fn options(limit: Option<usize>) -> ResolveOptions {
    ResolveOptions {
        limit,
        request_delay: Duration::ZERO,
        retry_exhausted: false,
    }
}

fn slide(value: &str) -> SlideId {
    value.parse().unwrap()
}

#[test]
fn cached_slide_is_not_queried() {
    let temp = tempfile::tempdir().unwrap();
    let mut cache = ResolutionCache::open(temp.path().join("cache.json")).unwrap();
    cache.insert(
        "TCGA-AA-0001-01Z-00-DX1.svs",
        CacheEntry::resolved("uuid-1", "TCGA-AA-0001-01Z-00-DX1.X.svs"),
    );

    let catalog = MockCatalog::default();
    let resolver = Resolver::new(&catalog, options(None));
    let outcome = resolver
        .resolve_one(&slide("TCGA-AA-0001-01Z-00-DX1.svs"), &mut cache)
        .unwrap();
    assert_eq!(outcome, ResolveOutcome::Skipped);
    assert!(catalog.calls().is_empty());
}

#[test]
fn query_uses_case_prefix_and_caches_first_match() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cache.json");
    let mut cache = ResolutionCache::open(&path).unwrap();
    let catalog = MockCatalog::default().with_hit(
        "TCGA-43-3920",
        "uuid-3920",
        "TCGA-43-3920-01Z-00-DX1.8F7C.svs",
    );

    let resolver = Resolver::new(&catalog, options(None));
    let outcome = resolver
        .resolve_one(&slide("TCGA-43-3920-01Z-00-DX1.svs"), &mut cache)
        .unwrap();

    assert_matches!(outcome, ResolveOutcome::Resolved(hit) if hit.id == "uuid-3920");
    assert_eq!(catalog.calls(), vec!["TCGA-43-3920"]);
    let reloaded = ResolutionCache::open(&path).unwrap();
    assert_eq!(
        reloaded.get("TCGA-43-3920-01Z-00-DX1.svs"),
        Some(&CacheEntry::resolved("uuid-3920", "TCGA-43-3920-01Z-00-DX1.8F7C.svs"))
    );
}

#[test]
fn no_match_is_cached_as_empty_and_not_requeried() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cache.json");
    let mut cache = ResolutionCache::open(&path).unwrap();
    let catalog = MockCatalog::default().with_hit(
        "TCGA-43-3920",
        "uuid-ts",
        "TCGA-43-3920-01A-01-TS1.svs",
    );
    let resolver = Resolver::new(&catalog, options(None));
    let target = slide("TCGA-43-3920-01Z-00-DX1.svs");

    assert_eq!(resolver.resolve_one(&target, &mut cache).unwrap(), ResolveOutcome::Exhausted);
    assert_eq!(cache.get(target.as_str()), Some(&CacheEntry::unresolved()));
    assert_eq!(resolver.resolve_one(&target, &mut cache).unwrap(), ResolveOutcome::Skipped);
    assert_eq!(catalog.calls().len(), 1);

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"id\": \"\""));
}

#[test]
fn exhausted_slides_are_retried_when_enabled() {
    let temp = tempfile::tempdir().unwrap();
    let mut cache = ResolutionCache::open(temp.path().join("cache.json")).unwrap();
    cache.insert("TCGA-AA-0001-01Z-00-DX1.svs", CacheEntry::unresolved());
    let catalog = MockCatalog::default().with_hit(
        "TCGA-AA-0001",
        "uuid-1",
        "TCGA-AA-0001-01Z-00-DX1.Z.svs",
    );
    let resolver = Resolver::new(
        &catalog,
        ResolveOptions {
            retry_exhausted: true,
            ..options(None)
        },
    );

    let outcome = resolver
        .resolve_one(&slide("TCGA-AA-0001-01Z-00-DX1.svs"), &mut cache)
        .unwrap();
    assert_matches!(outcome, ResolveOutcome::Resolved(_));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.resolved_count(), 1);
}

#[test]
fn server_error_leaves_slide_uncached() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cache.json");
    let mut cache = ResolutionCache::open(&path).unwrap();
    let catalog = MockCatalog::default().with_status("TCGA-AA-0001", 500);
    let resolver = Resolver::new(&catalog, options(None));
    let slides = vec![slide("TCGA-AA-0001-01Z-00-DX1.svs")];

    let report = resolver.resolve_all(&slides, &mut cache, &NoopSink).unwrap();
    assert_eq!(report.failed, vec!["TCGA-AA-0001-01Z-00-DX1.svs"]);
    assert!(cache.get("TCGA-AA-0001-01Z-00-DX1.svs").is_none());
    assert!(!path.exists());

    let report = resolver.resolve_all(&slides, &mut cache, &NoopSink).unwrap();
    assert_eq!(report.queried, 1);
    assert_eq!(catalog.calls().len(), 2);
}

#[test]
fn limit_counts_only_new_queries() {
    let temp = tempfile::tempdir().unwrap();
    let mut cache = ResolutionCache::open(temp.path().join("cache.json")).unwrap();
    cache.insert("TCGA-AA-0001-01Z-00-DX1.svs", CacheEntry::unresolved());
    cache.insert("TCGA-AA-0002-01Z-00-DX1.svs", CacheEntry::resolved("u2", "f2"));
    let slides: Vec<_> = (1..=5)
        .map(|i| slide(&format!("TCGA-AA-000{i}-01Z-00-DX1.svs")))
        .collect();

    let catalog = MockCatalog::default();
    let resolver = Resolver::new(&catalog, options(Some(2)));
    let report = resolver.resolve_all(&slides, &mut cache, &NoopSink).unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.queried, 2);
    assert_eq!(report.deferred, 1);
    assert_eq!(catalog.calls(), vec!["TCGA-AA-0003", "TCGA-AA-0004"]);
}

#[test]
fn zero_limit_means_unbounded() {
    let temp = tempfile::tempdir().unwrap();
    let mut cache = ResolutionCache::open(temp.path().join("cache.json")).unwrap();
    let slides: Vec<_> = (1..=3)
        .map(|i| slide(&format!("TCGA-AA-000{i}-01Z-00-DX1.svs")))
        .collect();

    let catalog = MockCatalog::default();
    let resolver = Resolver::new(&catalog, options(Some(0)));
    let report = resolver.resolve_all(&slides, &mut cache, &NoopSink).unwrap();

    assert_eq!(report.queried, 3);
    assert_eq!(report.deferred, 0);
    assert_eq!(cache.len(), 3);
}

#[test]
fn cache_is_on_disk_before_the_next_query() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cache.json");
    let mut cache = ResolutionCache::open(&path).unwrap();
    let catalog = MockCatalog {
        watch: Some(path.clone()),
        ..MockCatalog::default()
    }
    .with_hit("TCGA-AA-0001", "u1", "TCGA-AA-0001-01Z-00-DX1.A.svs")
    .with_hit("TCGA-AA-0002", "u2", "TCGA-AA-0002-01Z-00-DX1.B.svs");
    let slides = vec![
        slide("TCGA-AA-0001-01Z-00-DX1.svs"),
        slide("TCGA-AA-0002-01Z-00-DX1.svs"),
        slide("TCGA-AA-0003-01Z-00-DX1.svs"),
    ];

    let resolver = Resolver::new(&catalog, options(None));
    let report = resolver.resolve_all(&slides, &mut cache, &NoopSink).unwrap();

    assert_eq!(report.resolved, 2);
    assert_eq!(report.exhausted, 1);
    assert_eq!(*catalog.on_disk.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(ResolutionCache::open(&path).unwrap().len(), 3);
}

#[test]
fn every_query_is_followed_by_the_delay() {
    let temp = tempfile::tempdir().unwrap();
    let mut cache = ResolutionCache::open(temp.path().join("cache.json")).unwrap();
    let catalog = MockCatalog::default().with_status("TCGA-AA-0002", 503);
    let slides = vec![
        slide("TCGA-AA-0001-01Z-00-DX1.svs"),
        slide("TCGA-AA-0002-01Z-00-DX1.svs"),
        slide("TCGA-AA-0003-01Z-00-DX1.svs"),
    ];
    let resolver = Resolver::new(
        &catalog,
        ResolveOptions {
            request_delay: Duration::from_millis(20),
            ..options(None)
        },
    );

    let start = Instant::now();
    resolver.resolve_all(&slides, &mut cache, &NoopSink).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(60));
}

#[test]
fn slide_list_skips_blank_lines() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("ids.txt");
    fs::write(&path, "TCGA-AA-0001-01Z-00-DX1.svs\n\n  \nTCGA-AA-0002-01Z-00-DX1.svs\n").unwrap();
    let slides = load_slide_ids(&path).unwrap();
    assert_eq!(slides.len(), 2);
    assert_eq!(slides[1].as_str(), "TCGA-AA-0002-01Z-00-DX1.svs");
}

#[test]
fn missing_slide_list_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let err = load_slide_ids(&temp.path().join("absent.txt")).unwrap_err();
    assert_matches!(err, PrepError::SlideListRead(_));
}

#[test]
fn corrupt_cache_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cache.json");
    fs::write(&path, "{ not json").unwrap();
    let err = ResolutionCache::open(&path).unwrap_err();
    assert_matches!(err, PrepError::CacheParse(_));
}
