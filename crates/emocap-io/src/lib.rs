//! emocap-io — Thin I/O shims around the core pipeline.
//!
//! Provides frame sources (batch directory, polled spool directory),
//! the subprocess bridge to the external face analyzer, and the
//! filesystem output router.

pub mod analyzer;
pub mod router;
pub mod source;

pub use analyzer::ExternalAnalyzer;
pub use router::OutputRouter;
pub use source::{DirectorySource, SpoolSource};
