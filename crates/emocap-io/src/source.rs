//! Frame sources: one-pass batch directory and long-running spool
//! directory.
//!
//! Per-file decode failures are logged and skipped so one bad image
//! never aborts the rest of a batch. Only structural failures
//! (unreadable directory) surface as `SourceError`.

use emocap_core::pipeline::{FrameSource, SourceError};
use emocap_core::types::Frame;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Frame file extensions the sources will pick up.
const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FRAME_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn list_frame_files(root: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries = std::fs::read_dir(root)
        .map_err(|e| SourceError::Read(format!("{}: {e}", root.display())))?;
    Ok(entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_frame_file(p))
        .collect())
}

/// One pass over the image files of a directory, in listing order.
#[derive(Debug)]
pub struct DirectorySource {
    files: std::vec::IntoIter<PathBuf>,
}

impl DirectorySource {
    pub fn open(root: &Path) -> Result<DirectorySource, SourceError> {
        if !root.is_dir() {
            return Err(SourceError::Unavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let files = list_frame_files(root)?;
        tracing::info!(root = %root.display(), frames = files.len(), "opened directory source");
        Ok(DirectorySource { files: files.into_iter() })
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        for path in self.files.by_ref() {
            match image::open(&path) {
                Ok(img) => return Ok(Some(Frame::now(img, Some(path)))),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "undecodable frame file, skipping");
                }
            }
        }
        Ok(None)
    }
}

/// Polls a spool directory for newly arriving frame files.
///
/// The camera itself is an external collaborator; whatever owns it
/// drops frames into the spool. Files present at open time are
/// processed first, then the source blocks (sleeping `poll` between
/// scans) until a new file appears or the stop flag is raised.
pub struct SpoolSource {
    root: PathBuf,
    seen: HashSet<PathBuf>,
    poll: Duration,
    stop: Arc<AtomicBool>,
}

impl SpoolSource {
    pub fn open(
        root: &Path,
        poll: Duration,
        stop: Arc<AtomicBool>,
    ) -> Result<SpoolSource, SourceError> {
        if !root.is_dir() {
            return Err(SourceError::Unavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        tracing::info!(root = %root.display(), poll_ms = poll.as_millis() as u64, "watching spool directory");
        Ok(SpoolSource {
            root: root.to_path_buf(),
            seen: HashSet::new(),
            poll,
            stop,
        })
    }
}

impl FrameSource for SpoolSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(None);
            }

            let mut fresh: Vec<PathBuf> = list_frame_files(&self.root)?
                .into_iter()
                .filter(|p| !self.seen.contains(p))
                .collect();
            fresh.sort();

            for path in fresh {
                self.seen.insert(path.clone());
                match image::open(&path) {
                    Ok(img) => return Ok(Some(Frame::now(img, Some(path)))),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "undecodable spool file, skipping");
                    }
                }
            }

            std::thread::sleep(self.poll);
        }
    }
}
