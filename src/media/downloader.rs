use super::error::DownloadError;
use super::playlist::{parse_playlist, segment_tasks};
use super::types::{AssembledFile, SegmentResult, SegmentTask};
use crate::client::Fetch;
use futures::stream::{self, StreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const ASSEMBLED_FILE_NAME: &str = "all.ts";

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Upper bound on segment fetches in flight
    pub concurrency: usize,
    /// Parent for working directories. `None` uses the destination's directory.
    pub work_root: Option<PathBuf>,
    /// Assemble around failed segments instead of failing the download
    pub allow_partial: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            work_root: None,
            allow_partial: false,
        }
    }
}

/// Fetches every segment of an HLS playlist and concatenates them, in playlist order,
/// into a single file.
pub struct SegmentDownloader {
    fetcher: Arc<dyn Fetch>,
    options: DownloadOptions,
}

impl SegmentDownloader {
    pub fn new(fetcher: Arc<dyn Fetch>, options: DownloadOptions) -> Self {
        Self { fetcher, options }
    }

    pub async fn download_and_assemble(
        &self,
        playlist_url: &str,
        destination: &Path,
        referer: &str,
    ) -> Result<AssembledFile, DownloadError> {
        let work_root = self.work_root(destination);
        tokio::fs::create_dir_all(&work_root)
            .await
            .map_err(DownloadError::io(&work_root))?;

        let work_dir = tempfile::Builder::new()
            .prefix("segments-")
            .tempdir_in(&work_root)
            .map_err(DownloadError::io(&work_root))?;
        debug!("Working directory: {}", work_dir.path().display());

        let result = self
            .download_into(playlist_url, destination, referer, work_dir.path())
            .await;

        let work_path = work_dir.path().to_path_buf();
        if let Err(e) = work_dir.close() {
            warn!(
                "Failed to remove working directory {}: {}",
                work_path.display(),
                e
            );
        }

        result
    }

    fn work_root(&self, destination: &Path) -> PathBuf {
        if let Some(root) = &self.options.work_root {
            return root.clone();
        }

        match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    async fn download_into(
        &self,
        playlist_url: &str,
        destination: &Path,
        referer: &str,
        work_dir: &Path,
    ) -> Result<AssembledFile, DownloadError> {
        let playlist = self.fetcher.fetch_text(playlist_url, Some(referer)).await?;
        let segment_urls = parse_playlist(&playlist);
        if segment_urls.is_empty() {
            return Err(DownloadError::PlaylistEmpty(playlist_url.to_string()));
        }

        let tasks = segment_tasks(playlist_url, segment_urls);
        let total = tasks.len();
        info!(
            "Downloading {} segments ({} at a time)",
            total, self.options.concurrency
        );

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<(usize, Result<SegmentResult, DownloadError>)> = stream::iter(tasks)
            .map(|task| {
                let completed = &completed;
                async move {
                    let index = task.index;
                    let outcome = self.fetch_segment(task, referer, work_dir).await;
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Ok(segment) = &outcome {
                        debug!(
                            "{} / {} (segment {}, {} bytes)",
                            done, total, index, segment.bytes
                        );
                    }
                    (index, outcome)
                }
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut slots: Vec<Option<SegmentResult>> = vec![None; total];
        let mut failed = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                Ok(segment) => slots[index] = Some(segment),
                Err(e) => {
                    warn!("Segment {} failed: {}", index, e);
                    failed.push(index);
                }
            }
        }
        failed.sort_unstable();

        if !failed.is_empty() {
            if !self.options.allow_partial {
                return Err(DownloadError::PartialAssembly { failed, total });
            }
            warn!(
                "Assembling without {} of {} segments: {:?}",
                failed.len(),
                total,
                failed
            );
        }

        let segments: Vec<SegmentResult> = slots.into_iter().flatten().collect();
        let assembled = work_dir.join(ASSEMBLED_FILE_NAME);
        let bytes = concat_segments(&segments, &assembled).await?;

        tokio::fs::rename(&assembled, destination)
            .await
            .map_err(|source| DownloadError::Promotion {
                from: assembled.clone(),
                to: destination.to_path_buf(),
                source,
            })?;

        info!(
            "Wrote {} segments ({} bytes) to {}",
            segments.len(),
            bytes,
            destination.display()
        );

        Ok(AssembledFile {
            path: destination.to_path_buf(),
            segments: segments.len(),
            bytes,
        })
    }

    async fn fetch_segment(
        &self,
        task: SegmentTask,
        referer: &str,
        work_dir: &Path,
    ) -> Result<SegmentResult, DownloadError> {
        let data = self.fetcher.fetch(&task.source_url, Some(referer)).await?;
        let local_path = work_dir.join(segment_file_name(task.index));
        tokio::fs::write(&local_path, &data)
            .await
            .map_err(DownloadError::io(&local_path))?;

        Ok(SegmentResult {
            index: task.index,
            local_path,
            bytes: data.len() as u64,
        })
    }
}

pub fn segment_file_name(index: usize) -> String {
    format!("seg{:04}.ts", index)
}

/// Writes `segments` back to back into a fresh `output`. Callers pass them in index order.
async fn concat_segments(
    segments: &[SegmentResult],
    output: &Path,
) -> Result<u64, DownloadError> {
    match tokio::fs::remove_file(output).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(DownloadError::io(output)(e)),
    }

    let mut out = tokio::fs::File::create(output)
        .await
        .map_err(DownloadError::io(output))?;

    let mut written = 0;
    for segment in segments {
        let mut input = tokio::fs::File::open(&segment.local_path)
            .await
            .map_err(DownloadError::io(&segment.local_path))?;
        written += tokio::io::copy(&mut input, &mut out)
            .await
            .map_err(DownloadError::io(output))?;
    }

    out.flush().await.map_err(DownloadError::io(output))?;
    Ok(written)
}
