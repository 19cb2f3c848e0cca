/// Error taxonomy entries owned by the checkpoint engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint file is corrupt: {0}")]
    CheckpointCorrupt(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::CheckpointCorrupt(e.to_string())
    }
}
