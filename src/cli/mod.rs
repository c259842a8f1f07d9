use crate::client::HttpFetcher;
use crate::config::Config;
use crate::media::{DownloadOptions, EpisodeDownloader, SelectionPolicy};
use crate::site::{EpisodeInfo, SiteClient};
use crate::utils::{episode_path, format_bytes};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search titles by name
    Search { query: String },
    /// List the episodes of a title
    Info { id: String },
    /// Download episodes of a title
    Download {
        id: String,
        /// Comma-separated zero-based episode indices (default: all)
        #[arg(short, long)]
        episodes: Option<String>,
        /// Directory that receives one folder per title
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

pub struct App {
    config: Config,
    site: SiteClient,
    downloader: EpisodeDownloader,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Arc::new(
            HttpFetcher::new(
                &config.site.user_agent,
                config.host(),
                config.request_timeout(),
            )
            .context("Failed to create HTTP client")?,
        );

        let policy = match &config.download.preferred_resolution {
            Some(label) => SelectionPolicy::PreferResolution(label.clone()),
            None => SelectionPolicy::First,
        };
        let options = DownloadOptions {
            concurrency: config.download.concurrency,
            work_root: config.download.work_dir.clone(),
            allow_partial: config.download.allow_partial,
        };

        Ok(Self {
            site: SiteClient::new(fetcher.clone(), config.host()),
            downloader: EpisodeDownloader::new(fetcher, config.host(), policy, options),
            config,
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Search { query } => self.search(&query).await,
            Command::Info { id } => self.info(&id).await,
            Command::Download {
                id,
                episodes,
                output_dir,
            } => {
                let output_dir =
                    output_dir.unwrap_or_else(|| self.config.download.output_dir.clone());
                self.download(&id, episodes.as_deref(), output_dir).await
            }
        }
    }

    async fn search(&self, query: &str) -> Result<()> {
        println!("Searching for: {}", query);
        for anime in self.site.search(query).await? {
            println!("{}", anime);
        }
        Ok(())
    }

    async fn info(&self, id: &str) -> Result<()> {
        let anime = self.site.get_anime(id).await?;
        println!("# {}", anime.info.title);
        for episode in &anime.episodes {
            println!("{}", episode);
        }
        Ok(())
    }

    async fn download(
        &self,
        id: &str,
        selectors: Option<&str>,
        output_dir: PathBuf,
    ) -> Result<()> {
        let anime = self.site.get_anime(id).await?;
        info!(
            "Downloading {} ({} episodes listed)",
            anime.info.title,
            anime.episodes.len()
        );

        let selected: Vec<&EpisodeInfo> = match selectors {
            Some(selectors) => {
                select_episodes(&anime.episodes, &parse_episode_selectors(selectors)?)
            }
            None => anime.episodes.iter().collect(),
        };

        for episode in selected {
            let destination =
                episode_path(&output_dir, &anime.info.title, &episode.num, &episode.title);
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            println!("Downloading {} {}", episode.num, episode.title);
            let assembled = self
                .downloader
                .download_episode(&episode.url, &anime.info.url, &destination)
                .await
                .with_context(|| format!("Episode {} failed", episode.num))?;
            println!(
                "Saved {} ({} segments, {})",
                assembled.path.display(),
                assembled.segments,
                format_bytes(assembled.bytes)
            );
        }

        Ok(())
    }
}

/// Parses `"0,3, 5"` into indices. Empty entries are ignored.
pub fn parse_episode_selectors(selectors: &str) -> Result<Vec<usize>> {
    selectors
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .with_context(|| format!("Invalid episode index {:?}", s))
        })
        .collect()
}

/// Episodes at the given indices, in selector order. Out-of-range indices are skipped.
pub fn select_episodes<'a>(
    episodes: &'a [EpisodeInfo],
    indices: &[usize],
) -> Vec<&'a EpisodeInfo> {
    indices
        .iter()
        .filter_map(|&index| {
            let episode = episodes.get(index);
            if episode.is_none() {
                warn!(
                    "Episode index {} is out of bounds ({} episodes)",
                    index,
                    episodes.len()
                );
            }
            episode
        })
        .collect()
}
