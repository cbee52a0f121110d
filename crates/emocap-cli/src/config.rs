use anyhow::Context;
use emocap_core::gallery::DistanceMetric;
use emocap_core::pipeline::ArtifactMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pipeline configuration, loaded from a TOML file with per-field
/// defaults. Every option has a default so `emocap` runs with no
/// config file at all.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Minimum seconds between analyzed frames.
    pub interval_seconds: f64,
    /// Emotion labels that qualify a frame. Empty = accept all.
    pub accepted_emotions: Vec<String>,
    /// Identity allowlist. Unset = every enrolled identity; an
    /// explicitly empty list accepts nobody.
    pub known_identities: Option<Vec<String>>,
    /// Distance cutoff. Unset = the metric's default.
    pub match_threshold: Option<f32>,
    pub distance_metric: DistanceMetric,
    /// Enrolled gallery root. Unset runs the emotion-only variant.
    pub enrollment_root: Option<PathBuf>,
    pub output_root: PathBuf,
    /// Persist the whole frame or the qualifying face crop.
    pub artifact: ArtifactMode,
    /// External analyzer command; invoked with the frame path appended.
    pub analyzer_command: String,
    pub analyzer_args: Vec<String>,
    /// Spool poll interval in milliseconds (watch mode).
    pub poll_ms: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            interval_seconds: 2.0,
            accepted_emotions: Vec::new(),
            known_identities: None,
            match_threshold: None,
            distance_metric: DistanceMetric::Cosine,
            enrollment_root: None,
            output_root: PathBuf::from("captures"),
            artifact: ArtifactMode::Frame,
            analyzer_command: "emocap-analyze".to_string(),
            analyzer_args: Vec::new(),
            poll_ms: 200,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_seconds.max(0.0))
    }

    pub fn threshold(&self) -> f32 {
        self.match_threshold
            .unwrap_or_else(|| self.distance_metric.default_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.interval(), Duration::from_secs(2));
        assert!((config.threshold() - 0.40).abs() < 1e-6);
        assert!(config.enrollment_root.is_none());
        assert_eq!(config.output_root, PathBuf::from("captures"));
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            interval_seconds = 5.0
            accepted_emotions = ["happy", "neutral", "surprise"]
            known_identities = ["Person A"]
            match_threshold = 0.35
            distance_metric = "euclidean"
            enrollment_root = "training_data"
            output_root = "recognized_faces"
            artifact = "crop"
            analyzer_command = "deepface-bridge"
            analyzer_args = ["--model", "Facenet"]
            "#,
        )
        .unwrap();

        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.accepted_emotions.len(), 3);
        assert_eq!(config.known_identities.as_deref(), Some(&["Person A".to_string()][..]));
        assert!((config.threshold() - 0.35).abs() < 1e-6);
        assert_eq!(config.distance_metric, DistanceMetric::Euclidean);
        assert_eq!(config.artifact, ArtifactMode::Crop);
        assert_eq!(config.analyzer_args, vec!["--model", "Facenet"]);
    }

    #[test]
    fn test_threshold_follows_metric_default() {
        let config: Config = toml::from_str(r#"distance_metric = "euclidean""#).unwrap();
        assert!((config.threshold() - DistanceMetric::Euclidean.default_threshold()).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<Config>("capture_interval = 2").is_err());
    }

    #[test]
    fn test_negative_interval_clamped() {
        let config: Config = toml::from_str("interval_seconds = -1.0").unwrap();
        assert_eq!(config.interval(), Duration::ZERO);
    }
}
