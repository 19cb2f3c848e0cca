use std::path::PathBuf;

/// Recovery / checkpoint engine configuration (§6.5 `Recovery`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub checkpoint_dir: PathBuf,
    pub checkpoint_interval: u64,
    pub max_checkpoints: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./checkpoints"),
            checkpoint_interval: 100,
            max_checkpoints: 10,
        }
    }
}
