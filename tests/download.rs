#![cfg(unix)]

use std::fs;

use assert_matches::assert_matches;
use slideprep::download::{DownloadClient, DownloadOutcome, GdcDownloader};

#[test]
fn missing_client_is_reported_not_raised() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = temp.path().join("manifest.txt");
    fs::write(&manifest, "id\nuuid-1\n").unwrap();
    let output = temp.path().join("slides");

    let downloader = GdcDownloader::new("slideprep-no-such-client");
    let outcome = downloader.download(&manifest, &output).unwrap();
    assert_matches!(outcome, DownloadOutcome::MissingClient { .. });
    assert!(output.is_dir());
}

#[test]
fn successful_client_completes() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = temp.path().join("manifest.txt");
    fs::write(&manifest, "id\n").unwrap();

    let downloader = GdcDownloader::new("true");
    let outcome = downloader.download(&manifest, &temp.path().join("out")).unwrap();
    assert!(outcome.is_completed());
}

#[test]
fn failing_client_reports_exit_code() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = temp.path().join("manifest.txt");
    fs::write(&manifest, "id\n").unwrap();

    let downloader = GdcDownloader::new("false");
    let outcome = downloader.download(&manifest, &temp.path().join("out")).unwrap();
    assert_matches!(outcome, DownloadOutcome::Failed { code: Some(1), .. });
}

#[test]
fn explicit_client_path_must_exist() {
    let temp = tempfile::tempdir().unwrap();
    let downloader = GdcDownloader::new(temp.path().join("gdc-client"));
    assert!(downloader.locate().is_none());
}
