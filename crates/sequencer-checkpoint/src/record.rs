use crate::state::SequencerState;

/// A single serialized checkpoint, written as `<id>.json` in the
/// checkpoint directory.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CheckpointRecord {
    pub id: String,
    pub timestamp: i64,
    #[serde(rename = "sequencerPublicKey")]
    pub sequencer_identity: String,
    pub state: SequencerState,
}
