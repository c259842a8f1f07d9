use crate::client::FetchError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the page -> player -> manifest chain. Each one ends the attempt.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Transport(#[from] FetchError),

    #[error("player url not found in episode page {0}")]
    PlayerUrlNotFound(String),

    #[error("embedded player data not found in {0}")]
    PayloadNotFound(String),

    #[error("embedded player data is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("embedded player data is not valid JSON: {0}")]
    PayloadParse(#[source] serde_json::Error),

    #[error("manifest at {url} is not a candidate list: {source}")]
    ManifestParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest at {0} lists no video candidates")]
    NoVideoCandidates(String),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Transport(#[from] FetchError),

    #[error("playlist at {0} contains no segments")]
    PlaylistEmpty(String),

    #[error("{} of {total} segments failed, indices {failed:?}", .failed.len())]
    PartialAssembly { failed: Vec<usize>, total: usize },

    #[error("failed to move {from} to {to}: {source}")]
    Promotion {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| DownloadError::Io { path, source }
    }
}
