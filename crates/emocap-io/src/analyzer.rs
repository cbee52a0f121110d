//! Subprocess bridge to the external face analysis capability.
//!
//! The analyzer program is invoked once per frame with the image path
//! as its final argument and must print a JSON array of faces on
//! stdout:
//!
//! ```json
//! [{"region": {"x": 10, "y": 20, "w": 64, "h": 64},
//!   "dominant_emotion": "happy",
//!   "emotion": {"happy": 0.92, "neutral": 0.05},
//!   "embedding": [0.12, -0.03, ...]}]
//! ```
//!
//! Exit 0 with an empty array means "no face"; a non-zero exit is a
//! transient backend failure.

use emocap_core::analyzer::{Analysis, AnalyzerError, FaceAnalyzer};
use emocap_core::types::{FaceDetection, Frame};
use std::path::PathBuf;
use std::process::Command;

pub struct ExternalAnalyzer {
    program: String,
    args: Vec<String>,
    scratch_seq: u64,
}

impl ExternalAnalyzer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> ExternalAnalyzer {
        ExternalAnalyzer {
            program: program.into(),
            args,
            scratch_seq: 0,
        }
    }

    /// Scratch path for frames that did not come from disk.
    fn scratch_path(&mut self) -> PathBuf {
        self.scratch_seq += 1;
        std::env::temp_dir().join(format!(
            "emocap-{}-{}.jpg",
            std::process::id(),
            self.scratch_seq
        ))
    }
}

impl FaceAnalyzer for ExternalAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Analysis, AnalyzerError> {
        let (path, scratch) = match &frame.path {
            Some(p) => (p.clone(), None),
            None => {
                let p = self.scratch_path();
                frame
                    .image
                    .save_with_format(&p, image::ImageFormat::Jpeg)
                    .map_err(|e| AnalyzerError::Backend(format!("scratch frame write: {e}")))?;
                (p.clone(), Some(p))
            }
        };

        let output = Command::new(&self.program).args(&self.args).arg(&path).output();

        if let Some(p) = scratch {
            let _ = std::fs::remove_file(p);
        }

        let output = output?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::Backend(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_analysis(&output.stdout)
    }
}

/// Parse the analyzer wire format. An empty face list normalizes to
/// `NoFace`.
pub fn parse_analysis(stdout: &[u8]) -> Result<Analysis, AnalyzerError> {
    let faces: Vec<FaceDetection> =
        serde_json::from_slice(stdout).map_err(|e| AnalyzerError::Malformed(e.to_string()))?;
    Ok(Analysis::from_faces(faces))
}
