use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

/// Bounding region of one detected face within a frame.
///
/// Serialized field names (`x`, `y`, `w`, `h`) follow the analyzer
/// wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
}

impl FaceRegion {
    /// Clamp the region to the given frame dimensions.
    ///
    /// Returns `None` when the region lies entirely outside the frame
    /// or has zero area after clamping.
    pub fn clamped(&self, frame_width: u32, frame_height: u32) -> Option<FaceRegion> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }
        let width = self.width.min(frame_width - self.x);
        let height = self.height.min(frame_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(FaceRegion {
            x: self.x,
            y: self.y,
            width,
            height,
        })
    }
}

/// Face embedding vector (dimensionality depends on the analyzer model).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "EmbeddingRepr")]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "facenet").
    pub model_version: Option<String>,
}

/// Wire form of an embedding: a bare vector, or the full struct.
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingRepr {
    Full {
        values: Vec<f32>,
        #[serde(default)]
        model_version: Option<String>,
    },
    Values(Vec<f32>),
}

impl From<EmbeddingRepr> for Embedding {
    fn from(repr: EmbeddingRepr) -> Embedding {
        match repr {
            EmbeddingRepr::Full { values, model_version } => Embedding { values, model_version },
            EmbeddingRepr::Values(values) => Embedding { values, model_version: None },
        }
    }
}

impl Embedding {
    /// Cosine similarity between two embeddings, in [-1, 1].
    ///
    /// Always processes all dimensions; zero-norm inputs yield 0.0.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One located face: region, embedding and classified emotion.
///
/// Produced by the external analyzer; read-only downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetection {
    pub region: FaceRegion,
    pub embedding: Embedding,
    pub dominant_emotion: String,
    /// Per-emotion confidence scores, when the analyzer reports them.
    #[serde(rename = "emotion", default)]
    pub emotion_scores: Option<HashMap<String, f32>>,
}

/// A timestamped raster image from the source, owned by the pipeline
/// for the duration of one iteration.
pub struct Frame {
    pub image: image::DynamicImage,
    /// Source path when the frame came from disk rather than a stream.
    pub path: Option<PathBuf>,
    /// Wall-clock time used for output naming.
    pub wall_time: DateTime<Local>,
    /// Monotonic arrival time used for interval throttling.
    pub arrived: Instant,
}

impl Frame {
    /// Wrap an image as a frame arriving now.
    pub fn now(image: image::DynamicImage, path: Option<PathBuf>) -> Frame {
        Frame {
            image,
            path,
            wall_time: Local::now(),
            arrived: Instant::now(),
        }
    }
}

/// Where a capture event is filed under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKey {
    /// Partitioned by matched identity; `label` is the gating emotion.
    Identity { name: String, label: String },
    /// Flat layout keyed by emotion label alone.
    Emotion(String),
}

/// A qualifying frame (or face crop) bound for storage. Terminal:
/// written once, never mutated.
pub struct CaptureEvent {
    pub image: image::DynamicImage,
    pub timestamp: DateTime<Local>,
    pub key: RouteKey,
}
