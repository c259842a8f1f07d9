use serde::Deserialize;
use std::path::PathBuf;

/// Playable stream location for one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    pub playable_url: String,
}

/// Credentials decoded from the player page's `_aldata` variable.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EmbeddedPayload {
    #[serde(rename = "vid_token_1080")]
    pub encoded_token: String,
    /// Bare host and path, without a scheme
    #[serde(rename = "vid_url_1080")]
    pub remote_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VideoCandidate {
    #[serde(default)]
    pub resolution: String,
    pub url: String,
}

/// Candidate choice for a manifest with more than one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Index 0, in the order the remote service returned them
    #[default]
    First,
    /// First candidate whose resolution label matches, otherwise index 0
    PreferResolution(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTask {
    pub index: usize,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentResult {
    pub index: usize,
    pub local_path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFile {
    pub path: PathBuf,
    pub segments: usize,
    pub bytes: u64,
}
