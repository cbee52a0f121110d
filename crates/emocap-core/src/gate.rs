//! Emotion gating: which analyzed frames qualify for capture.

use crate::types::FaceDetection;
use std::collections::HashSet;

/// Gate on a configurable accepted-emotion set.
///
/// Labels are compared case-insensitively. An empty accepted set
/// degenerates to "any successfully analyzed face qualifies".
pub struct EmotionGate {
    /// Accepted labels, stored case-folded. Empty = accept all.
    accepted: HashSet<String>,
}

impl EmotionGate {
    pub fn new<I, S>(accepted: I) -> EmotionGate
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        EmotionGate {
            accepted: accepted
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Accept every emotion (single-emotion-report variant).
    pub fn accept_all() -> EmotionGate {
        EmotionGate { accepted: HashSet::new() }
    }

    /// First detection whose dominant emotion is accepted, if any.
    ///
    /// An empty detection slice means "no face" and never qualifies;
    /// it is not an error.
    pub fn qualifies<'a>(&self, detections: &'a [FaceDetection]) -> Option<&'a FaceDetection> {
        detections.iter().find(|d| {
            self.accepted.is_empty()
                || self.accepted.contains(&d.dominant_emotion.to_ascii_lowercase())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Embedding, FaceRegion};

    fn det(emotion: &str) -> FaceDetection {
        FaceDetection {
            region: FaceRegion { x: 0, y: 0, width: 10, height: 10 },
            embedding: Embedding { values: vec![0.0], model_version: None },
            dominant_emotion: emotion.to_string(),
            emotion_scores: None,
        }
    }

    #[test]
    fn test_rejects_unaccepted_emotion() {
        let gate = EmotionGate::new(["happy", "neutral", "surprise"]);
        assert!(gate.qualifies(&[det("angry")]).is_none());
    }

    #[test]
    fn test_case_insensitive_match() {
        let gate = EmotionGate::new(["happy", "neutral", "surprise"]);
        let faces = [det("Happy")];
        let hit = gate.qualifies(&faces).unwrap();
        assert_eq!(hit.dominant_emotion, "Happy");
    }

    #[test]
    fn test_case_insensitive_configured_set() {
        let gate = EmotionGate::new(["HAPPY"]);
        assert!(gate.qualifies(&[det("happy")]).is_some());
    }

    #[test]
    fn test_first_qualifying_face_wins() {
        let gate = EmotionGate::new(["surprise"]);
        let faces = [det("angry"), det("surprise"), det("surprise")];
        let hit = gate.qualifies(&faces).unwrap();
        assert!(std::ptr::eq(hit, &faces[1]));
    }

    #[test]
    fn test_empty_accepted_set_accepts_any_face() {
        let gate = EmotionGate::accept_all();
        assert!(gate.qualifies(&[det("disgust")]).is_some());
    }

    #[test]
    fn test_empty_detections_never_qualify() {
        assert!(EmotionGate::accept_all().qualifies(&[]).is_none());
        assert!(EmotionGate::new(["happy"]).qualifies(&[]).is_none());
    }
}
