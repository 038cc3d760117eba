//! Local video cache with a persisted JSON index.
//!
//! Each video id moves through `downloading -> completed` or
//! `downloading -> failed`; failed entries are overwritten by the next
//! attempt. The index file is the source of truth across restarts and
//! entries whose file has disappeared are purged when next looked up.

use crate::error::{MediaError, MediaResult};
use crate::ytdlp::YtDlp;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, Take};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tubesum_core::{short_id, CachedVideoEntry, DownloadStatus};

const INDEX_FILE: &str = "cache-index.json";

/// Byte stream of a remote video.
pub struct VideoStream {
    /// Total size, when the source knows it.
    pub content_length: Option<u64>,
    pub chunks: BoxStream<'static, MediaResult<Vec<u8>>>,
}

/// Where cached videos are downloaded from.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Open the best combined audio+video stream for a video.
    async fn open(&self, video_id: &str) -> MediaResult<VideoStream>;
}

/// Streams the best combined format yt-dlp reports.
#[derive(Debug, Clone)]
pub struct YtDlpVideoSource {
    ytdlp: YtDlp,
    http: reqwest::Client,
}

impl YtDlpVideoSource {
    pub fn new(ytdlp: YtDlp, http: reqwest::Client) -> Self {
        Self { ytdlp, http }
    }
}

#[async_trait]
impl VideoSource for YtDlpVideoSource {
    async fn open(&self, video_id: &str) -> MediaResult<VideoStream> {
        let info = self.ytdlp.video_info(video_id).await?;
        let format = info
            .best_combined_format()
            .ok_or_else(|| MediaError::NoSuitableFormat(video_id.to_string()))?;
        let url = format
            .url
            .as_deref()
            .ok_or_else(|| MediaError::NoSuitableFormat(video_id.to_string()))?;

        info!(
            "Downloading {} as format {} ({}p, {})",
            video_id,
            format.format_id,
            format.height.unwrap_or(0),
            format
                .size_hint()
                .map(|s| format!("{:.1} MB", s as f64 / 1024.0 / 1024.0))
                .unwrap_or_else(|| "unknown size".to_string())
        );

        let mut request = self.http.get(url);
        for (name, value) in &format.http_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MediaError::Download {
                video_id: video_id.to_string(),
                message: format!("stream request returned {}", response.status()),
            });
        }

        let content_length = response.content_length().or(format.size_hint());
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(MediaError::Http))
            .boxed();

        Ok(VideoStream {
            content_length,
            chunks,
        })
    }
}

/// Download progress callback: `(downloaded_bytes, total_bytes)`.
pub type DownloadProgress = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Aggregate cache figures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub count: usize,
    pub total_size_bytes: u64,
    pub completed: usize,
    pub failed: usize,
    pub downloading: usize,
}

/// Outcome of an eviction sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub freed_bytes: u64,
}

/// A parsed HTTP-style byte range (`bytes=start-end`, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-` or `bytes=start-end`
    From { start: u64, end: Option<u64> },
    /// `bytes=-n`: the last `n` bytes.
    Suffix(u64),
}

impl ByteRange {
    pub fn parse(header: &str) -> MediaResult<Self> {
        let invalid = || MediaError::InvalidRange(header.to_string());
        let body = header.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
        if body.contains(',') {
            return Err(invalid());
        }
        let (start, end) = body.split_once('-').ok_or_else(invalid)?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            let n: u64 = end.parse().map_err(|_| invalid())?;
            if n == 0 {
                return Err(invalid());
            }
            return Ok(ByteRange::Suffix(n));
        }

        let start: u64 = start.parse().map_err(|_| invalid())?;
        let end = if end.is_empty() {
            None
        } else {
            let end: u64 = end.parse().map_err(|_| invalid())?;
            if end < start {
                return Err(invalid());
            }
            Some(end)
        };
        Ok(ByteRange::From { start, end })
    }

    /// Inclusive `(start, end)` offsets within a file of `total` bytes.
    pub fn resolve(&self, total: u64) -> MediaResult<(u64, u64)> {
        if total == 0 {
            return Err(MediaError::InvalidRange("empty file".to_string()));
        }
        match *self {
            ByteRange::From { start, end } => {
                if start >= total {
                    return Err(MediaError::InvalidRange(format!(
                        "start {} beyond size {}",
                        start, total
                    )));
                }
                Ok((start, end.unwrap_or(total - 1).min(total - 1)))
            }
            ByteRange::Suffix(n) => Ok((total.saturating_sub(n), total - 1)),
        }
    }
}

/// An open, bounded view of a cached video. Bytes are read on demand, so a
/// slice of a multi-gigabyte file costs one file handle and no buffer.
#[derive(Debug)]
pub struct CachedSlice {
    pub reader: Take<tokio::fs::File>,
    pub start: u64,
    /// Inclusive; meaningless when `len` is zero.
    pub end: u64,
    pub len: u64,
    pub total_size: u64,
}

impl CachedSlice {
    /// Stream the slice into `dest`. Returns the number of bytes copied.
    pub async fn copy_to<W>(mut self, dest: &mut W) -> MediaResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let copied = tokio::io::copy(&mut self.reader, dest).await?;
        dest.flush().await?;
        if copied != self.len {
            return Err(MediaError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, copied {}", self.len, copied),
            )));
        }
        Ok(copied)
    }
}

/// Idempotent per-video download cache.
pub struct VideoCache {
    dir: PathBuf,
    index_path: PathBuf,
    entries: Mutex<HashMap<String, CachedVideoEntry>>,
    source: Arc<dyn VideoSource>,
}

impl VideoCache {
    /// Open (or create) a cache directory and load its index.
    pub fn open(dir: impl Into<PathBuf>, source: Arc<dyn VideoSource>) -> MediaResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let index_path = dir.join(INDEX_FILE);
        let entries = load_index(&index_path);

        info!("Loaded {} cached videos from {}", entries.len(), dir.display());

        let cache = Self {
            dir,
            index_path,
            entries: Mutex::new(entries),
            source,
        };
        cache.persist(&*cache.lock()?)?;
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> MediaResult<MutexGuard<'_, HashMap<String, CachedVideoEntry>>> {
        self.entries
            .lock()
            .map_err(|_| MediaError::Parse("video cache index lock poisoned".to_string()))
    }

    /// Write the index atomically (temp file + rename).
    fn persist(&self, entries: &HashMap<String, CachedVideoEntry>) -> MediaResult<()> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| MediaError::Parse(format!("Failed to serialize cache index: {}", e)))?;
        let tmp = self.index_path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.index_path)?;
        Ok(())
    }

    /// Persist, logging instead of failing; the in-memory state stays authoritative.
    fn persist_quietly(&self, entries: &HashMap<String, CachedVideoEntry>) {
        if let Err(e) = self.persist(entries) {
            error!("Failed to save cache index: {}", e);
        }
    }

    /// Drop an entry whose backing file is gone. Returns true if purged.
    fn purge_if_missing(entries: &mut HashMap<String, CachedVideoEntry>, video_id: &str) -> bool {
        let missing = matches!(
            entries.get(video_id),
            Some(e) if e.download_status == DownloadStatus::Completed && !e.local_path.exists()
        );
        if missing {
            warn!("Cached file for {} disappeared; dropping entry", video_id);
            entries.remove(video_id);
        }
        missing
    }

    /// Current entry for a video, without touching its access time.
    pub fn entry(&self, video_id: &str) -> MediaResult<Option<CachedVideoEntry>> {
        let mut entries = self.lock()?;
        if Self::purge_if_missing(&mut entries, video_id) {
            self.persist_quietly(&entries);
        }
        Ok(entries.get(video_id).cloned())
    }

    /// Completed entry for a video, marking it as accessed.
    pub fn lookup(&self, video_id: &str) -> MediaResult<Option<CachedVideoEntry>> {
        let mut entries = self.lock()?;
        let purged = Self::purge_if_missing(&mut entries, video_id);

        let hit = match entries.get_mut(video_id) {
            Some(entry) if entry.download_status == DownloadStatus::Completed => {
                entry.last_accessed_at = Utc::now();
                Some(entry.clone())
            }
            _ => None,
        };

        if purged || hit.is_some() {
            self.persist_quietly(&entries);
        }
        Ok(hit)
    }

    /// All entries, most recently accessed first.
    pub fn entries(&self) -> MediaResult<Vec<CachedVideoEntry>> {
        let entries = self.lock()?;
        let mut all: Vec<CachedVideoEntry> = entries.values().cloned().collect();
        all.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        Ok(all)
    }

    pub fn stats(&self) -> MediaResult<CacheStats> {
        let entries = self.lock()?;
        let mut stats = CacheStats {
            count: entries.len(),
            ..Default::default()
        };
        for entry in entries.values() {
            stats.total_size_bytes += entry.file_size;
            match entry.download_status {
                DownloadStatus::Completed => stats.completed += 1,
                DownloadStatus::Failed => stats.failed += 1,
                DownloadStatus::Downloading => stats.downloading += 1,
                DownloadStatus::Pending => {}
            }
        }
        Ok(stats)
    }

    /// Make sure a local copy exists, downloading it at most once.
    ///
    /// A concurrent call for a video that is already downloading fails with
    /// `AlreadyDownloading` instead of waiting.
    pub async fn ensure_downloaded(
        &self,
        video_id: &str,
        title: &str,
        progress: Option<DownloadProgress>,
    ) -> MediaResult<CachedVideoEntry> {
        let entry = {
            let mut entries = self.lock()?;
            Self::purge_if_missing(&mut entries, video_id);

            match entries.get_mut(video_id) {
                Some(existing) if existing.download_status == DownloadStatus::Completed => {
                    existing.last_accessed_at = Utc::now();
                    let hit = existing.clone();
                    self.persist_quietly(&entries);
                    debug!("Cache hit for {}", video_id);
                    return Ok(hit);
                }
                Some(existing) if existing.download_status == DownloadStatus::Downloading => {
                    return Err(MediaError::AlreadyDownloading(video_id.to_string()));
                }
                _ => {}
            }

            let file_name = format!("{}_{}.mp4", video_id, short_id());
            let entry = CachedVideoEntry::downloading(
                video_id,
                title,
                self.dir.join(&file_name),
                file_name,
            );
            entries.insert(video_id.to_string(), entry.clone());
            self.persist(&entries)?;
            entry
        };

        info!("Downloading video {} ({})", video_id, title);

        match self.download(&entry, progress).await {
            Ok(size) => {
                let mut entries = self.lock()?;
                let mut done = entry;
                done.file_size = size;
                done.download_status = DownloadStatus::Completed;
                done.downloaded_at = Utc::now();
                done.last_accessed_at = done.downloaded_at;
                entries.insert(video_id.to_string(), done.clone());
                self.persist(&entries)?;
                info!("Cached {} ({} bytes)", done.file_name, size);
                Ok(done)
            }
            Err(e) => {
                warn!("Download of {} failed: {}", video_id, e);
                if entry.local_path.exists() {
                    if let Err(rm) = std::fs::remove_file(&entry.local_path) {
                        error!("Failed to remove partial file {}: {}", entry.local_path.display(), rm);
                    }
                }
                let mut entries = self.lock()?;
                let mut failed = entry;
                failed.download_status = DownloadStatus::Failed;
                failed.file_size = 0;
                entries.insert(video_id.to_string(), failed);
                self.persist_quietly(&entries);

                Err(match e {
                    err @ MediaError::Download { .. } => err,
                    other => MediaError::Download {
                        video_id: video_id.to_string(),
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    async fn download(
        &self,
        entry: &CachedVideoEntry,
        progress: Option<DownloadProgress>,
    ) -> MediaResult<u64> {
        let mut stream = self.source.open(&entry.video_id).await?;
        let mut file = tokio::fs::File::create(&entry.local_path).await?;

        let total = stream.content_length;
        let mut downloaded: u64 = 0;
        let mut last_reported_pct: u64 = 0;

        while let Some(chunk) = stream.chunks.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if let Some(report) = &progress {
                // Report in 5% steps when the size is known.
                match total {
                    Some(t) if t > 0 => {
                        let pct = downloaded * 100 / t;
                        if pct >= last_reported_pct + 5 {
                            last_reported_pct = pct - pct % 5;
                            report(downloaded, total);
                        }
                    }
                    _ => report(downloaded, total),
                }
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let size = tokio::fs::metadata(&entry.local_path).await?.len();
        if size == 0 {
            return Err(MediaError::Download {
                video_id: entry.video_id.clone(),
                message: "stream was empty".to_string(),
            });
        }
        Ok(size)
    }

    /// Remove a cached video and its file. Returns false if unknown.
    pub fn delete(&self, video_id: &str) -> MediaResult<bool> {
        let mut entries = self.lock()?;
        let Some(entry) = entries.get(video_id) else {
            return Ok(false);
        };
        if entry.download_status == DownloadStatus::Downloading {
            return Err(MediaError::AlreadyDownloading(video_id.to_string()));
        }

        if entry.local_path.exists() {
            std::fs::remove_file(&entry.local_path)?;
        }
        info!("Deleted cached video {}", entry.file_name);
        entries.remove(video_id);
        self.persist(&entries)?;
        Ok(true)
    }

    /// Evict completed entries older than `max_age`, then the oldest-accessed
    /// ones while the total exceeds `max_size_bytes`.
    pub fn cleanup(&self, max_age: Duration, max_size_bytes: u64) -> MediaResult<CleanupReport> {
        let mut entries = self.lock()?;
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::days(36500));

        let mut total: u64 = entries.values().map(|e| e.file_size).sum();
        let mut candidates: Vec<CachedVideoEntry> = entries
            .values()
            .filter(|e| e.download_status == DownloadStatus::Completed)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.last_accessed_at.cmp(&b.last_accessed_at));

        let mut report = CleanupReport::default();
        for entry in candidates {
            if entry.last_accessed_at >= cutoff && total <= max_size_bytes {
                continue;
            }
            if entry.local_path.exists() {
                if let Err(e) = std::fs::remove_file(&entry.local_path) {
                    error!("Failed to delete cached video {}: {}", entry.file_name, e);
                    continue;
                }
            }
            debug!("Evicted cached video {}", entry.file_name);
            entries.remove(&entry.video_id);
            total = total.saturating_sub(entry.file_size);
            report.freed_bytes += entry.file_size;
            report.removed.push(entry.video_id);
        }

        if !report.removed.is_empty() {
            self.persist(&entries)?;
            info!(
                "Cache cleanup removed {} videos, freed {:.1} MB",
                report.removed.len(),
                report.freed_bytes as f64 / 1024.0 / 1024.0
            );
        } else {
            debug!("Cache cleanup: nothing to evict");
        }
        Ok(report)
    }

    /// Run `cleanup` every `interval` until the task is aborted.
    pub fn spawn_eviction_task(
        self: Arc<Self>,
        interval: Duration,
        max_age: Duration,
        max_size_bytes: u64,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.cleanup(max_age, max_size_bytes) {
                    error!("Cache cleanup failed: {}", e);
                }
            }
        })
    }

    /// Open part (or all) of a cached video for reading.
    pub async fn read_range(
        &self,
        video_id: &str,
        range: Option<ByteRange>,
    ) -> MediaResult<CachedSlice> {
        let entry = self
            .lookup(video_id)?
            .ok_or_else(|| MediaError::NotCached(video_id.to_string()))?;

        let mut file = tokio::fs::File::open(&entry.local_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::NotCached(video_id.to_string())
            } else {
                MediaError::Io(e)
            }
        })?;
        let total_size = file.metadata().await?.len();

        let (start, end, len) = match range {
            Some(r) => {
                let (start, end) = r.resolve(total_size)?;
                (start, end, end - start + 1)
            }
            None if total_size == 0 => (0, 0, 0),
            None => (0, total_size - 1, total_size),
        };

        file.seek(std::io::SeekFrom::Start(start)).await?;
        Ok(CachedSlice {
            reader: file.take(len),
            start,
            end,
            len,
            total_size,
        })
    }

    /// Copy a cached video to `dest`. Returns the number of bytes written.
    pub async fn export(&self, video_id: &str, dest: &Path) -> MediaResult<u64> {
        let entry = self
            .lookup(video_id)?
            .ok_or_else(|| MediaError::NotCached(video_id.to_string()))?;
        Ok(tokio::fs::copy(&entry.local_path, dest).await?)
    }
}

/// Load the index, keeping only completed entries whose file still exists.
fn load_index(path: &Path) -> HashMap<String, CachedVideoEntry> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!("Could not read cache index {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    let parsed: HashMap<String, CachedVideoEntry> = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Ignoring corrupt cache index {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    parsed
        .into_iter()
        .filter(|(_, entry)| {
            // A download interrupted by a restart left a partial file behind.
            if entry.download_status == DownloadStatus::Downloading && entry.local_path.exists() {
                let _ = std::fs::remove_file(&entry.local_path);
            }
            entry.is_available()
        })
        .collect()
}
