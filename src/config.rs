use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::pipeline::streams;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub name: String,
    pub input_stream: String,
    /// Output streams the service observes. Anything not listed is never
    /// registered and never pulled.
    pub output_streams: Vec<String>,
    pub input_queue_capacity: usize,
    pub max_num_hands: usize,
    pub min_hand_confidence: f32,
    pub draw_rects: bool,
    pub model_dir: PathBuf,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name: "hand_tracking".to_string(),
            input_stream: streams::INPUT_VIDEO.to_string(),
            output_streams: streams::HAND_TRACKING_OUTPUTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            input_queue_capacity: 2,
            max_num_hands: 2,
            min_hand_confidence: 0.2,
            draw_rects: true,
            model_dir: PathBuf::from("models"),
        }
    }
}

impl GraphConfig {
    pub fn observes(&self, stream: &str) -> bool {
        self.output_streams.iter().any(|s| s == stream)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub graph: GraphConfig,
    pub pull_timeout_ms: u64,
    pub queue_timeout_ms: u64,
    pub request_queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            pull_timeout_ms: 2_000,
            queue_timeout_ms: 5_000,
            request_queue_capacity: 16,
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read service config {}", path.display()))?;
        let config: ServiceConfig = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse service config {}", path.display()))?;
        log::info!(
            "loaded config for graph `{}` from {}",
            config.graph.name,
            path.display()
        );
        Ok(config)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_observe_every_hand_stream() {
        let config = GraphConfig::default();
        for stream in streams::HAND_TRACKING_OUTPUTS {
            assert!(config.observes(stream), "{stream} not observed");
        }
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "pull_timeout_ms": 250, "graph": {{ "output_streams": ["hand_count", "landmarks"] }} }}"#
        )
        .unwrap();

        let config = ServiceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pull_timeout(), Duration::from_millis(250));
        assert_eq!(config.queue_timeout_ms, 5_000);
        assert!(config.graph.observes(streams::LANDMARKS));
        assert!(!config.graph.observes(streams::HANDEDNESS));
        assert_eq!(config.graph.max_num_hands, 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServiceConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read service config"));
    }
}
