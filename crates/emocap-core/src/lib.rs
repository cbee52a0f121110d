//! emocap-core — Emotion-gated face capture pipeline.
//!
//! Holds the decision logic and state: interval throttling, emotion
//! gating, gallery matching with threshold and allowlist, and the
//! per-frame routing state machine. Frame acquisition, the face
//! analyzer itself, and persistence live behind traits and are
//! supplied by callers (see `emocap-io`).

pub mod analyzer;
pub mod gallery;
pub mod gate;
pub mod matcher;
pub mod pipeline;
pub mod scheduler;
pub mod types;

pub use analyzer::{Analysis, AnalyzerError, FaceAnalyzer};
pub use gallery::{DistanceMetric, GalleryEntry, GalleryIndex};
pub use gate::EmotionGate;
pub use matcher::{IdentityMatcher, MatchResult};
pub use pipeline::{CapturePipeline, EventSink, FrameOutcome, FrameSource, PipelineReport};
pub use scheduler::CaptureScheduler;
pub use types::{CaptureEvent, Embedding, FaceDetection, FaceRegion, Frame, RouteKey};
