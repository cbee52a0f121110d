//! Enrolled identity gallery: build-once nearest-neighbor index.
//!
//! The enrollment root holds one sub-directory per identity; every
//! usable image inside it becomes one reference embedding. The index
//! is immutable after build — rebuilding means constructing a fresh
//! `GalleryIndex`.

use crate::analyzer::{Analysis, AnalyzerError, FaceAnalyzer};
use crate::types::{Embedding, Frame};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reference image extensions recognized under an identity directory.
const REFERENCE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "heic"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("enrollment root not found: {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("no usable reference images for identity {identity:?} in {}", .dir.display())]
    EnrollmentMissing { identity: String, dir: PathBuf },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Distance metric over the analyzer's embedding space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// 1 − cosine similarity, in [0, 2].
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    pub fn distance(&self, a: &Embedding, b: &Embedding) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - a.similarity(b),
            DistanceMetric::Euclidean => a.euclidean_distance(b),
        }
    }

    /// Match cutoff compatible with Facenet-style embeddings.
    pub fn default_threshold(&self) -> f32 {
        match self {
            DistanceMetric::Cosine => 0.40,
            DistanceMetric::Euclidean => 10.0,
        }
    }
}

/// One enrolled reference embedding.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub identity: String,
    pub embedding: Embedding,
    pub reference_path: PathBuf,
}

/// Closest reference embedding for a probe, as a structured pair
/// (no path-segment parsing to recover the identity).
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub identity: &'a str,
    pub reference_path: &'a Path,
    pub distance: f32,
}

/// All enrolled reference embeddings plus the distance metric.
#[derive(Debug)]
pub struct GalleryIndex {
    entries: Vec<GalleryEntry>,
    metric: DistanceMetric,
}

impl GalleryIndex {
    pub fn from_entries(entries: Vec<GalleryEntry>, metric: DistanceMetric) -> GalleryIndex {
        GalleryIndex { entries, metric }
    }

    /// Enumerate `root/<identity>/` directories and embed every usable
    /// reference image via the analyzer.
    ///
    /// Unreadable or face-less reference images are logged and
    /// skipped; an identity ending up with zero references aborts the
    /// build with [`GalleryError::EnrollmentMissing`].
    pub fn build(
        root: &Path,
        analyzer: &mut dyn FaceAnalyzer,
        metric: DistanceMetric,
    ) -> Result<GalleryIndex, GalleryError> {
        if !root.is_dir() {
            return Err(GalleryError::RootNotFound(root.to_path_buf()));
        }

        let mut identity_dirs: Vec<PathBuf> = std::fs::read_dir(root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        identity_dirs.sort();

        let mut entries = Vec::new();

        for dir in identity_dirs {
            let Some(identity) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                tracing::warn!(dir = %dir.display(), "skipping identity directory with non-UTF8 name");
                continue;
            };

            let mut references = 0usize;
            for file in reference_files(&dir)? {
                match reference_embedding(&file, analyzer) {
                    Ok(Some(embedding)) => {
                        entries.push(GalleryEntry {
                            identity: identity.clone(),
                            embedding,
                            reference_path: file,
                        });
                        references += 1;
                    }
                    Ok(None) => {
                        tracing::warn!(path = %file.display(), "no face in reference image, skipping");
                    }
                    Err(e) => {
                        tracing::warn!(path = %file.display(), error = %e, "unusable reference image, skipping");
                    }
                }
            }

            if references == 0 {
                return Err(GalleryError::EnrollmentMissing { identity, dir });
            }
            tracing::info!(identity = %identity, references, "enrolled identity");
        }

        Ok(GalleryIndex { entries, metric })
    }

    /// Single closest reference embedding across all identities, or
    /// `None` for an empty gallery. Always traverses the full gallery.
    pub fn nearest(&self, probe: &Embedding) -> Option<Neighbor<'_>> {
        let mut best: Option<(usize, f32)> = None;

        for (i, entry) in self.entries.iter().enumerate() {
            let dist = self.metric.distance(probe, &entry.embedding);
            match best {
                Some((_, d)) if dist >= d => {}
                _ => best = Some((i, dist)),
            }
        }

        best.map(|(i, distance)| {
            let entry = &self.entries[i];
            Neighbor {
                identity: &entry.identity,
                reference_path: &entry.reference_path,
                distance,
            }
        })
    }

    /// Enrolled identity names with their reference counts, in
    /// deterministic order.
    pub fn identities(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.identity.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn reference_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| {
                        REFERENCE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x))
                    })
        })
        .collect();
    files.sort();
    Ok(files)
}

#[derive(Error, Debug)]
enum ReferenceError {
    #[error("{0}")]
    Image(#[from] image::ImageError),
    #[error("{0}")]
    Analyzer(#[from] AnalyzerError),
}

/// Embed one reference image: decode, analyze, keep the top detection.
fn reference_embedding(
    path: &Path,
    analyzer: &mut dyn FaceAnalyzer,
) -> Result<Option<Embedding>, ReferenceError> {
    let image = image::open(path)?;
    let frame = Frame::now(image, Some(path.to_path_buf()));
    match analyzer.analyze(&frame)? {
        Analysis::Detected(faces) => Ok(faces.into_iter().next().map(|f| f.embedding)),
        Analysis::NoFace => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    fn entry(identity: &str, values: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            identity: identity.to_string(),
            embedding: emb(values),
            reference_path: PathBuf::from(format!("refs/{identity}/a.jpg")),
        }
    }

    #[test]
    fn test_nearest_empty_gallery() {
        let index = GalleryIndex::from_entries(vec![], DistanceMetric::Cosine);
        assert!(index.nearest(&emb(vec![1.0, 0.0])).is_none());
    }

    #[test]
    fn test_nearest_picks_global_minimum() {
        // Best match deliberately last: the traversal must cover the
        // whole gallery.
        let index = GalleryIndex::from_entries(
            vec![
                entry("Person B", vec![0.0, 1.0]),
                entry("Person C", vec![-1.0, 0.0]),
                entry("Person A", vec![1.0, 0.0]),
            ],
            DistanceMetric::Cosine,
        );

        let hit = index.nearest(&emb(vec![1.0, 0.0])).unwrap();
        assert_eq!(hit.identity, "Person A");
        assert!(hit.distance.abs() < 1e-6);
    }

    #[test]
    fn test_nearest_euclidean() {
        let index = GalleryIndex::from_entries(
            vec![
                entry("far", vec![10.0, 0.0]),
                entry("near", vec![1.0, 1.0]),
            ],
            DistanceMetric::Euclidean,
        );

        let hit = index.nearest(&emb(vec![0.0, 0.0])).unwrap();
        assert_eq!(hit.identity, "near");
        assert!((hit.distance - 2.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_identities_counts() {
        let index = GalleryIndex::from_entries(
            vec![
                entry("B", vec![0.0]),
                entry("A", vec![0.0]),
                entry("A", vec![1.0]),
            ],
            DistanceMetric::Cosine,
        );
        let counts = index.identities();
        assert_eq!(counts.get("A"), Some(&2));
        assert_eq!(counts.get("B"), Some(&1));
    }

    #[test]
    fn test_default_thresholds() {
        assert!((DistanceMetric::Cosine.default_threshold() - 0.40).abs() < 1e-6);
        assert!(DistanceMetric::Euclidean.default_threshold() > 1.0);
    }

    /// Analyzer fake keyed on the reference file stem.
    struct StemAnalyzer {
        by_stem: HashMap<String, Vec<f32>>,
    }

    impl FaceAnalyzer for StemAnalyzer {
        fn analyze(&mut self, frame: &Frame) -> Result<Analysis, AnalyzerError> {
            let stem = frame
                .path
                .as_deref()
                .and_then(|p| p.file_stem())
                .and_then(|s| s.to_str())
                .unwrap_or("");
            if stem == "boom" {
                return Err(AnalyzerError::Backend("simulated".into()));
            }
            match self.by_stem.get(stem) {
                Some(values) => Ok(Analysis::Detected(vec![crate::types::FaceDetection {
                    region: crate::types::FaceRegion { x: 0, y: 0, width: 2, height: 2 },
                    embedding: emb(values.clone()),
                    dominant_emotion: "neutral".into(),
                    emotion_scores: None,
                }])),
                None => Ok(Analysis::NoFace),
            }
        }
    }

    fn write_png(path: &Path) {
        image::RgbImage::new(2, 2).save(path).unwrap();
    }

    #[test]
    fn test_build_from_enrollment_root() {
        let root = tempfile::tempdir().unwrap();
        let alice = root.path().join("Alice");
        let bob = root.path().join("Bob");
        std::fs::create_dir_all(&alice).unwrap();
        std::fs::create_dir_all(&bob).unwrap();
        write_png(&alice.join("a1.png"));
        write_png(&alice.join("a2.png"));
        write_png(&bob.join("b1.png"));
        // Not a reference extension: must be ignored.
        std::fs::write(alice.join("notes.txt"), b"x").unwrap();

        let mut analyzer = StemAnalyzer {
            by_stem: HashMap::from([
                ("a1".to_string(), vec![1.0, 0.0]),
                ("a2".to_string(), vec![0.9, 0.1]),
                ("b1".to_string(), vec![0.0, 1.0]),
            ]),
        };

        let index =
            GalleryIndex::build(root.path(), &mut analyzer, DistanceMetric::Cosine).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.identities().get("Alice"), Some(&2));

        let hit = index.nearest(&emb(vec![0.0, 1.0])).unwrap();
        assert_eq!(hit.identity, "Bob");
        assert!(hit.reference_path.ends_with("Bob/b1.png"));
    }

    #[test]
    fn test_build_skips_faceless_and_broken_references() {
        let root = tempfile::tempdir().unwrap();
        let alice = root.path().join("Alice");
        std::fs::create_dir_all(&alice).unwrap();
        write_png(&alice.join("good.png"));
        write_png(&alice.join("noface.png"));
        write_png(&alice.join("boom.png"));
        // Undecodable image bytes.
        std::fs::write(alice.join("corrupt.jpg"), b"not an image").unwrap();

        let mut analyzer = StemAnalyzer {
            by_stem: HashMap::from([("good".to_string(), vec![1.0])]),
        };

        let index =
            GalleryIndex::build(root.path(), &mut analyzer, DistanceMetric::Cosine).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_build_fails_on_identity_without_references() {
        let root = tempfile::tempdir().unwrap();
        let ghost = root.path().join("Ghost");
        std::fs::create_dir_all(&ghost).unwrap();
        write_png(&ghost.join("unreadable.png"));

        let mut analyzer = StemAnalyzer { by_stem: HashMap::new() };
        let err = GalleryIndex::build(root.path(), &mut analyzer, DistanceMetric::Cosine)
            .unwrap_err();
        match err {
            GalleryError::EnrollmentMissing { identity, .. } => assert_eq!(identity, "Ghost"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_missing_root() {
        let mut analyzer = StemAnalyzer { by_stem: HashMap::new() };
        let err = GalleryIndex::build(
            Path::new("/nonexistent/enrollment"),
            &mut analyzer,
            DistanceMetric::Cosine,
        )
        .unwrap_err();
        assert!(matches!(err, GalleryError::RootNotFound(_)));
    }
}
