//! Identity acceptance policy over the gallery index.

use crate::gallery::GalleryIndex;
use crate::types::FaceDetection;
use std::collections::HashSet;

/// Outcome of resolving one detection against the gallery.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Nearest gallery identity, when a candidate existed at all.
    pub identity: Option<String>,
    /// Distance to that candidate under the index metric.
    pub distance: Option<f32>,
    /// True iff distance ≤ threshold AND identity is allowlisted.
    pub accepted: bool,
}

impl MatchResult {
    fn unmatched() -> MatchResult {
        MatchResult { identity: None, distance: None, accepted: false }
    }
}

/// Matches single detections against the gallery with threshold and
/// known-identity allowlist. Infallible by construction: empty
/// gallery, over-threshold and off-allowlist candidates all resolve
/// to an unmatched result.
pub struct IdentityMatcher {
    index: GalleryIndex,
    threshold: f32,
    allowlist: HashSet<String>,
}

impl IdentityMatcher {
    pub fn new<I, S>(index: GalleryIndex, threshold: f32, allowlist: I) -> IdentityMatcher
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IdentityMatcher {
            index,
            threshold,
            allowlist: allowlist.into_iter().map(Into::into).collect(),
        }
    }

    pub fn index(&self) -> &GalleryIndex {
        &self.index
    }

    /// Resolve a detection by querying the gallery with the embedding
    /// the analyzer already produced for it.
    pub fn resolve(&self, detection: &FaceDetection) -> MatchResult {
        let Some(hit) = self.index.nearest(&detection.embedding) else {
            tracing::debug!("no gallery candidate");
            return MatchResult::unmatched();
        };

        let within = hit.distance <= self.threshold;
        let known = self.allowlist.contains(hit.identity);
        let accepted = within && known;

        if !accepted {
            tracing::info!(
                identity = hit.identity,
                distance = hit.distance,
                threshold = self.threshold,
                known,
                "nearest candidate rejected"
            );
        }

        MatchResult {
            identity: Some(hit.identity.to_string()),
            distance: Some(hit.distance),
            accepted,
        }
    }
}
