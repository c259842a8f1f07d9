use super::error::ResolveError;
use super::types::{EmbeddedPayload, MediaReference, SelectionPolicy, VideoCandidate};
use crate::client::Fetch;
use base64::{engine::general_purpose, Engine as _};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

const PLAYER_PATH: &str = "/h/live?p=";

static PLAYER_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"\s]+/h/live\?p=[^"]+)""#).unwrap());

static ALDATA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"var\s+_aldata\s*=\s*'([^']*)'"#).unwrap());

/// Turns an episode page into a playable stream URL by following the
/// page -> player -> manifest chain.
pub struct StreamResolver {
    fetcher: Arc<dyn Fetch>,
    host: String,
    policy: SelectionPolicy,
}

impl StreamResolver {
    pub fn new(fetcher: Arc<dyn Fetch>, host: &str) -> Self {
        Self {
            fetcher,
            host: host.trim_end_matches('/').to_string(),
            policy: SelectionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn resolve(
        &self,
        episode_url: &str,
        page_referer: &str,
    ) -> Result<MediaReference, ResolveError> {
        let episode_html = self
            .fetcher
            .fetch_text(episode_url, Some(page_referer))
            .await?;
        let player_url = find_player_url(&episode_html, &self.host)
            .ok_or_else(|| ResolveError::PlayerUrlNotFound(episode_url.to_string()))?;
        debug!("Found player url: {}", player_url);

        let player_html = self
            .fetcher
            .fetch_text(&player_url, Some(page_referer))
            .await?;
        let encoded = find_embedded_payload(&player_html)
            .ok_or_else(|| ResolveError::PayloadNotFound(player_url.clone()))?;
        let payload = decode_payload(encoded)?;
        debug!("Decoded player token ({} chars)", payload.encoded_token.len());

        // The manifest endpoint checks the referer against the player page.
        let manifest_url = manifest_url(&payload.remote_url);
        debug!("Fetching manifest: {}", manifest_url);
        let manifest = self
            .fetcher
            .fetch(&manifest_url, Some(&player_url))
            .await?;
        let candidates: Vec<VideoCandidate> =
            serde_json::from_slice(&manifest).map_err(|source| ResolveError::ManifestParse {
                url: manifest_url.clone(),
                source,
            })?;

        let candidate = select_candidate(&candidates, &self.policy)
            .ok_or_else(|| ResolveError::NoVideoCandidates(manifest_url.clone()))?;
        info!(
            "Resolved stream {} ({} candidates, resolution {:?})",
            candidate.url,
            candidates.len(),
            candidate.resolution
        );

        Ok(MediaReference {
            playable_url: candidate.url.clone(),
        })
    }
}

/// First double-quoted player URL on `host` in the episode markup.
pub fn find_player_url(html: &str, host: &str) -> Option<String> {
    let prefix = format!("{}{}", host.trim_end_matches('/'), PLAYER_PATH);
    PLAYER_URL_REGEX
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .find(|url| url.starts_with(&prefix))
}

/// The base64 value assigned to `_aldata`, if present and non-empty.
pub fn find_embedded_payload(html: &str) -> Option<&str> {
    ALDATA_REGEX
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|encoded| !encoded.is_empty())
}

pub fn decode_payload(encoded: &str) -> Result<EmbeddedPayload, ResolveError> {
    let decoded = general_purpose::STANDARD.decode(encoded)?;
    serde_json::from_slice(&decoded).map_err(ResolveError::PayloadParse)
}

pub fn manifest_url(remote_url: &str) -> String {
    if remote_url.starts_with("https://") || remote_url.starts_with("http://") {
        remote_url.to_string()
    } else {
        format!("https://{}", remote_url)
    }
}

pub fn select_candidate<'a>(
    candidates: &'a [VideoCandidate],
    policy: &SelectionPolicy,
) -> Option<&'a VideoCandidate> {
    match policy {
        SelectionPolicy::First => candidates.first(),
        SelectionPolicy::PreferResolution(label) => candidates
            .iter()
            .find(|c| &c.resolution == label)
            .or_else(|| candidates.first()),
    }
}
