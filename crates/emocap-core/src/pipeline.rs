//! Per-frame capture state machine: throttle → analyze → gate →
//! match → route.
//!
//! The pipeline consumes frames one at a time in arrival order. Only
//! source failures end the run; analyzer and sink failures are
//! per-frame conditions that are logged and skipped.

use crate::analyzer::{Analysis, FaceAnalyzer};
use crate::gate::EmotionGate;
use crate::matcher::IdentityMatcher;
use crate::scheduler::CaptureScheduler;
use crate::types::{CaptureEvent, Frame, RouteKey};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("frame source unavailable: {0}")]
    Unavailable(String),
    #[error("frame read failed: {0}")]
    Read(String),
}

/// Delivers one frame per call; `Ok(None)` on exhaustion.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encode failed: {0}")]
    Encode(String),
}

/// Persists qualifying capture events.
pub trait EventSink {
    fn persist(&mut self, event: CaptureEvent) -> Result<PathBuf, SinkError>;
}

/// What to persist for a qualifying frame: the whole frame, or the
/// qualifying face's bounding region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactMode {
    #[default]
    Frame,
    Crop,
}

/// Terminal state of one pipeline iteration. Every skip and failure
/// maps to a distinct variant so log lines can tell throttling,
/// "no face", "no match" and genuine faults apart.
#[derive(Debug)]
pub enum FrameOutcome {
    /// Ineligible under the capture interval; analysis never ran.
    Throttled,
    NoFace,
    /// Faces found, none with an accepted emotion.
    GatedOut,
    /// A face qualified but did not resolve to an accepted identity.
    NoMatch,
    Routed(PathBuf),
    /// Transient analyzer or sink failure, isolated to this frame.
    Failed,
}

/// Per-outcome counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub frames: u64,
    pub throttled: u64,
    pub no_face: u64,
    pub gated_out: u64,
    pub no_match: u64,
    pub routed: u64,
    pub failed: u64,
}

impl PipelineReport {
    fn record(&mut self, outcome: &FrameOutcome) {
        self.frames += 1;
        match outcome {
            FrameOutcome::Throttled => self.throttled += 1,
            FrameOutcome::NoFace => self.no_face += 1,
            FrameOutcome::GatedOut => self.gated_out += 1,
            FrameOutcome::NoMatch => self.no_match += 1,
            FrameOutcome::Routed(_) => self.routed += 1,
            FrameOutcome::Failed => self.failed += 1,
        }
    }
}

/// Orchestrates scheduler, analyzer, gate, matcher and sink for one
/// frame stream.
pub struct CapturePipeline<A: FaceAnalyzer, S: EventSink> {
    scheduler: CaptureScheduler,
    gate: EmotionGate,
    /// `None` runs the emotion-only variant (flat routing, no gallery).
    matcher: Option<IdentityMatcher>,
    artifact: ArtifactMode,
    analyzer: A,
    sink: S,
}

impl<A: FaceAnalyzer, S: EventSink> CapturePipeline<A, S> {
    pub fn new(
        scheduler: CaptureScheduler,
        gate: EmotionGate,
        matcher: Option<IdentityMatcher>,
        artifact: ArtifactMode,
        analyzer: A,
        sink: S,
    ) -> CapturePipeline<A, S> {
        CapturePipeline {
            scheduler,
            gate,
            matcher,
            artifact,
            analyzer,
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run to source exhaustion, source read failure, or the stop
    /// flag. Iteration boundaries are the only cancellation points.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        stop: &AtomicBool,
    ) -> Result<PipelineReport, SourceError> {
        let mut report = PipelineReport::default();

        while !stop.load(Ordering::Relaxed) {
            let Some(frame) = source.next_frame()? else {
                break;
            };
            let outcome = self.process_frame(frame);
            report.record(&outcome);
        }

        tracing::info!(
            frames = report.frames,
            throttled = report.throttled,
            no_face = report.no_face,
            gated_out = report.gated_out,
            no_match = report.no_match,
            routed = report.routed,
            failed = report.failed,
            "pipeline run finished"
        );
        Ok(report)
    }

    /// One iteration of the state machine.
    pub fn process_frame(&mut self, frame: Frame) -> FrameOutcome {
        if !self.scheduler.should_sample(frame.arrived) {
            tracing::trace!("frame throttled");
            return FrameOutcome::Throttled;
        }

        let origin = frame
            .path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<stream>".to_string());

        let faces = match self.analyzer.analyze(&frame) {
            Ok(Analysis::Detected(faces)) if !faces.is_empty() => faces,
            Ok(_) => {
                tracing::info!(frame = %origin, "no face detected, skipping");
                return FrameOutcome::NoFace;
            }
            Err(e) => {
                tracing::warn!(frame = %origin, error = %e, "analysis failed, skipping frame");
                return FrameOutcome::Failed;
            }
        };

        let Some(face) = self.gate.qualifies(&faces) else {
            tracing::info!(
                frame = %origin,
                faces = faces.len(),
                "no qualifying emotion"
            );
            return FrameOutcome::GatedOut;
        };
        let label = face.dominant_emotion.to_ascii_lowercase();

        let key = match &self.matcher {
            Some(matcher) => {
                let result = matcher.resolve(face);
                match result.identity {
                    Some(identity) if result.accepted => {
                        tracing::info!(
                            frame = %origin,
                            identity = %identity,
                            emotion = %label,
                            distance = result.distance,
                            "match accepted"
                        );
                        RouteKey::Identity { name: identity, label: label.clone() }
                    }
                    _ => {
                        tracing::info!(frame = %origin, "no identity match");
                        return FrameOutcome::NoMatch;
                    }
                }
            }
            None => RouteKey::Emotion(label.clone()),
        };

        // At most one event per eligible frame; the first qualifying
        // face decides both the crop and the route.
        let image = match self.artifact {
            ArtifactMode::Crop => {
                match face.region.clamped(frame.image.width(), frame.image.height()) {
                    Some(r) => frame.image.crop_imm(r.x, r.y, r.width, r.height),
                    None => {
                        tracing::warn!(
                            frame = %origin,
                            "face region outside frame, saving whole frame"
                        );
                        frame.image
                    }
                }
            }
            ArtifactMode::Frame => frame.image,
        };

        let event = CaptureEvent {
            image,
            timestamp: frame.wall_time,
            key,
        };

        match self.sink.persist(event) {
            Ok(path) => {
                tracing::info!(frame = %origin, path = %path.display(), "capture saved");
                FrameOutcome::Routed(path)
            }
            Err(e) => {
                tracing::warn!(frame = %origin, error = %e, "persist failed, skipping frame");
                FrameOutcome::Failed
            }
        }
    }
}
