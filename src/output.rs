use std::io::{self, Write};

use serde::Serialize;

use crate::app::{DownloadResult, FetchResult, ProgressEvent, ProgressSink, ResolveResult, SplitResult};
use crate::download::DownloadOutcome;
use crate::manifest::{FilterReport, ManifestReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_split(result: &SplitResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_filter(result: &FilterReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_resolve(result: &ResolveResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_manifest(result: &ManifestReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_download(result: &DownloadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable progress on stderr and summaries on stdout.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("  {} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("  {}", event.message),
        }
    }
}

impl ConsoleOutput {
    pub fn print_split(result: &SplitResult) {
        println!(
            "cases: frozen={} ffpe={} shared={}",
            result.frozen_cases, result.ffpe_cases, result.shared_cases
        );
        println!(
            "split: train={} val={} test={}",
            result.assignment.train.len(),
            result.assignment.validation.len(),
            result.assignment.test.len()
        );
        for route in &result.routes {
            println!(
                "{}: files={} skipped={} failed={} images train={} val={} test={}",
                route.modality,
                route.files_seen,
                route.files_skipped,
                route.files_failed,
                route.images_written.train,
                route.images_written.validation,
                route.images_written.test
            );
        }
    }

    pub fn print_filter(result: &FilterReport) {
        println!("filtered {} -> {}", result.input, result.output);
        println!(
            "cases kept: {}/{}  rows kept: {}",
            result.cases_kept, result.cases_seen, result.rows_kept
        );
    }

    pub fn print_resolve(result: &ResolveResult) {
        let report = &result.report;
        println!(
            "slides={} queried={} resolved={} not_found={} cached={} deferred={} failed={}",
            report.total,
            report.queried,
            report.resolved,
            report.exhausted,
            report.skipped,
            report.deferred,
            report.failed.len()
        );
        for slide in &report.failed {
            println!("  retry later: {slide}");
        }
        println!(
            "cache {}: {} entries, {} resolved",
            result.cache_path, result.cached_entries, result.resolved_entries
        );
    }

    pub fn print_manifest(result: &ManifestReport) {
        println!(
            "manifest {}: {} rows ({} blank, {} omitted)",
            result.path, result.rows, result.unresolved_rows, result.omitted
        );
    }

    pub fn print_download(result: &DownloadResult) {
        match &result.outcome {
            DownloadOutcome::Completed => println!("download complete: {}", result.output_dir),
            DownloadOutcome::Failed { message, .. } => println!("download failed: {message}"),
            DownloadOutcome::MissingClient { client } => {
                println!("download client not found: {client}")
            }
        }
    }

    pub fn print_fetch(result: &FetchResult) {
        Self::print_resolve(&result.resolve);
        Self::print_manifest(&result.manifest);
        Self::print_download(&result.download);
    }
}
