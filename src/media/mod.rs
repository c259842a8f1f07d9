mod downloader;
mod error;
mod playlist;
mod resolver;
mod types;

pub use downloader::DownloadOptions;
pub use types::{AssembledFile, SelectionPolicy};

use downloader::SegmentDownloader;
use resolver::StreamResolver;

use crate::client::Fetch;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Resolves an episode page to its stream and downloads it to a single file.
pub struct EpisodeDownloader {
    resolver: StreamResolver,
    segments: SegmentDownloader,
    host: String,
}

impl EpisodeDownloader {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        host: &str,
        policy: SelectionPolicy,
        options: DownloadOptions,
    ) -> Self {
        info!(
            "Episode downloader initialized - {} concurrent segment fetches",
            options.concurrency
        );

        Self {
            resolver: StreamResolver::new(fetcher.clone(), host).with_policy(policy),
            segments: SegmentDownloader::new(fetcher, options),
            host: host.trim_end_matches('/').to_string(),
        }
    }

    pub async fn download_episode(
        &self,
        episode_url: &str,
        page_referer: &str,
        destination: &Path,
    ) -> Result<AssembledFile> {
        info!("Resolving stream for {}", episode_url);
        let media = self
            .resolver
            .resolve(episode_url, page_referer)
            .await
            .with_context(|| format!("Failed to resolve stream for {}", episode_url))?;

        // Segment hosts only check that requests come from the site itself.
        let assembled = self
            .segments
            .download_and_assemble(&media.playable_url, destination, &self.host)
            .await
            .with_context(|| format!("Failed to download {}", media.playable_url))?;

        Ok(assembled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpFetcher;
    use base64::{engine::general_purpose, Engine as _};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_episode_end_to_end() {
        let server = MockServer::start().await;
        let host = server.uri();

        Mock::given(method("GET"))
            .and(path("/ani/episode/3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<script>const player = "{}/h/live?p=xyz";</script>"#,
                host
            )))
            .mount(&server)
            .await;

        let payload = general_purpose::STANDARD.encode(format!(
            r#"{{"vid_token_1080":"tok","vid_url_1080":"{}/manifest.json"}}"#,
            host
        ));
        Mock::given(method("GET"))
            .and(path("/h/live"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<script>var _aldata = '{}';</script>", payload)),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"[{{"resolution":"1080","url":"{}/hls/index.m3u8"}}]"#,
                host
            )))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/hls/index.m3u8"))
            .and(header("referer", host.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "#EXTM3U\r\n#EXTINF:5,\r\na.ts\r\n#EXTINF:5,\r\nb.ts\r\n#EXT-X-ENDLIST\r\n",
            ))
            .mount(&server)
            .await;
        for (name, body) in [("a.ts", "first-"), ("b.ts", "second")] {
            Mock::given(method("GET"))
                .and(path(format!("/hls/{}", name)))
                .and(header("referer", host.as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;
        }

        let fetcher = HttpFetcher::new("test-agent", &host, Duration::from_secs(5)).unwrap();
        let downloader = EpisodeDownloader::new(
            Arc::new(fetcher),
            &host,
            SelectionPolicy::First,
            DownloadOptions::default(),
        );

        let out_dir = tempfile::tempdir().unwrap();
        let destination = out_dir.path().join("03-episode.ts");
        let assembled = downloader
            .download_episode(
                &format!("{}/ani/episode/3", host),
                &format!("{}/detail/id/1", host),
                &destination,
            )
            .await
            .unwrap();

        assert_eq!(assembled.segments, 2);
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "first-second");
    }
}
