//! SectionScout: page-section detection and clipped screenshot capture.
//!
//! The workspace crates carry the moving parts: `cdp-page` drives the
//! browser, `perceiver-section` infers header/body/footer regions, and
//! `region-capture` writes the artifacts. This crate ties them together
//! into a crawl driver and the CLI.

pub mod crawler;

pub use crawler::{crawl, CrawlError, CrawlOptions, CrawlReport, ImageRef};
