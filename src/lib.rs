//! Paired whole-slide dataset preparation.
//!
//! Two independent pipelines:
//!
//! * **split**: collect patient keys from two modality directories, keep the
//!   patients present in both, assign each one to train/val/test and copy the
//!   embedded images of every container into `{train,val,test}{A,B}`.
//! * **fetch**: resolve local slide ids to GDC file ids through the catalog
//!   API with a resumable on-disk cache, emit a download manifest and hand it
//!   to the GDC download client.

pub mod app;
pub mod cache;
pub mod cases;
pub mod catalog;
pub mod config;
pub mod container;
pub mod domain;
pub mod download;
pub mod error;
pub mod fs_util;
pub mod manifest;
pub mod output;
pub mod resolver;
pub mod router;
pub mod split;
