//! Filesystem output router: identity-partitioned, collision-safe
//! JPEG persistence.

use emocap_core::pipeline::{EventSink, SinkError};
use emocap_core::types::{CaptureEvent, RouteKey};
use std::path::{Path, PathBuf};

/// Timestamp granularity used in output filenames.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Routes capture events under an output root:
/// `output_root/<identity>/<ts>_<emotion>.jpg` for identity-keyed
/// events, `output_root/<ts>_<emotion>.jpg` for emotion-keyed ones.
pub struct OutputRouter {
    root: PathBuf,
}

impl OutputRouter {
    pub fn new(root: impl Into<PathBuf>) -> OutputRouter {
        OutputRouter { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EventSink for OutputRouter {
    fn persist(&mut self, event: CaptureEvent) -> Result<PathBuf, SinkError> {
        let ts = event.timestamp.format(TIMESTAMP_FORMAT);
        let (dir, stem) = match &event.key {
            RouteKey::Identity { name, label } => {
                (self.root.join(name), format!("{ts}_{label}"))
            }
            RouteKey::Emotion(label) => (self.root.clone(), format!("{ts}_{label}")),
        };

        // Idempotent: an already-existing partition directory is fine.
        std::fs::create_dir_all(&dir)?;

        let path = unique_path(&dir, &stem);
        event
            .image
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .map_err(|e| SinkError::Encode(e.to_string()))?;
        Ok(path)
    }
}

/// First free `<stem>.jpg`, `<stem>-2.jpg`, `<stem>-3.jpg`, ... so two
/// events within the same second never silently overwrite.
fn unique_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.jpg"));
    if !first.exists() {
        return first;
    }
    let mut n = 2u32;
    loop {
        let candidate = dir.join(format!("{stem}-{n}.jpg"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
