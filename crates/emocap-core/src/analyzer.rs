//! Seam between the pipeline and the external face analysis capability.
//!
//! The analyzer is a black box (image in, detected faces out). "No face
//! found" is an expected, frequent outcome and is modeled as a result
//! variant, not an error.

use crate::types::{FaceDetection, Frame};
use thiserror::Error;

/// Outcome of analyzing one frame.
#[derive(Debug)]
pub enum Analysis {
    /// One or more located faces, in analyzer order.
    Detected(Vec<FaceDetection>),
    /// The analyzer found no face in the frame.
    NoFace,
}

impl Analysis {
    /// Normalize an analyzer face list: an empty list is `NoFace`.
    pub fn from_faces(faces: Vec<FaceDetection>) -> Analysis {
        if faces.is_empty() {
            Analysis::NoFace
        } else {
            Analysis::Detected(faces)
        }
    }
}

/// Transient failure of the analysis backend. Callers treat this as a
/// per-frame condition, never as a reason to stop the run.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("analysis backend failed: {0}")]
    Backend(String),
    #[error("analyzer produced malformed output: {0}")]
    Malformed(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// External detection/embedding/emotion capability.
///
/// Implementations always return a face list (possibly via `NoFace`);
/// callers never have to shape-check the output.
pub trait FaceAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Analysis, AnalyzerError>;
}
