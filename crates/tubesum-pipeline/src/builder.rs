//! Wiring concrete backends from configuration.

use crate::error::PipelineResult;
use crate::orchestrator::Pipeline;
use crate::progress::ProgressBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tubesum_config::{AppPaths, Config, StorageBackend};
use tubesum_core::{AnalysisStore, MemoryStore};
use tubesum_db::Database;
use tubesum_media::{
    cleanup_old_screenshots, CaptionExtractor, FfmpegFrameExtractor, ScreenshotGenerator,
    VideoCache, YtDlp, YtDlpMetadataResolver, YtDlpVideoSource,
};

const USER_AGENT: &str = concat!("tubesum/", env!("CARGO_PKG_VERSION"));

/// Builds the pipeline and its services from a loaded configuration.
pub struct PipelineBuilder {
    config: Config,
    paths: AppPaths,
}

/// A fully wired pipeline plus the services it shares.
pub struct Services {
    pub pipeline: Pipeline,
    pub cache: Arc<VideoCache>,
}

impl PipelineBuilder {
    pub fn new(config: Config, paths: AppPaths) -> Self {
        Self { config, paths }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    fn http_client(&self) -> PipelineResult<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(tubesum_media::MediaError::Http)?)
    }

    /// Open the configured job store.
    pub fn open_store(&self) -> PipelineResult<Arc<dyn AnalysisStore>> {
        let store: Arc<dyn AnalysisStore> = match self.config.general.storage {
            StorageBackend::Sqlite => {
                info!("Using job database {}", self.paths.database_file.display());
                Arc::new(Database::open(&self.paths.database_file)?)
            }
            StorageBackend::Memory => {
                info!("Using in-memory job store");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(store)
    }

    /// Open the video cache backed by yt-dlp streams.
    pub fn open_cache(&self) -> PipelineResult<Arc<VideoCache>> {
        let source = YtDlpVideoSource::new(YtDlp::new(&self.config.tools.ytdlp), self.http_client()?);
        Ok(Arc::new(VideoCache::open(
            &self.paths.video_cache_dir,
            Arc::new(source),
        )?))
    }

    /// Assemble every backend into a pipeline.
    pub fn build(&self) -> PipelineResult<Services> {
        self.paths.ensure_dirs()?;

        let http = self.http_client()?;
        let ytdlp = YtDlp::new(&self.config.tools.ytdlp);
        let cache = self.open_cache()?;

        let shots = &self.config.screenshots;
        let extractor = FfmpegFrameExtractor::new(
            &self.config.tools.ffmpeg,
            shots.width,
            shots.height,
            shots.jpeg_quality,
        );
        let screenshots = ScreenshotGenerator::new(
            cache.clone(),
            Arc::new(extractor),
            &self.paths.screenshots_dir,
            &shots.url_prefix,
        );

        let captions = CaptionExtractor::new(
            ytdlp.clone(),
            http,
            self.config.subtitles.primary_languages.clone(),
            self.config.subtitles.secondary_languages.clone(),
        );

        let pipeline = Pipeline::new(
            self.open_store()?,
            Arc::new(ProgressBus::new()),
            Arc::new(YtDlpMetadataResolver::new(ytdlp)),
            Arc::new(captions),
            Arc::new(tubesum_llm::Summarizer::from_config(&self.config.llm)?),
            Arc::new(screenshots),
        )
        .with_stale_after(Duration::from_secs(
            self.config.general.stale_job_minutes.saturating_mul(60),
        ));

        Ok(Services { pipeline, cache })
    }

    /// Start the periodic cache eviction and screenshot cleanup tasks.
    pub fn spawn_maintenance(&self, services: &Services) -> Vec<JoinHandle<()>> {
        let cache_cfg = &self.config.cache;
        let interval = Duration::from_secs(cache_cfg.cleanup_interval_minutes.max(1) * 60);
        let max_age = Duration::from_secs(cache_cfg.max_age_hours * 3600);

        let eviction = services
            .cache
            .clone()
            .spawn_eviction_task(interval, max_age, cache_cfg.max_size_bytes());

        let dir = self.paths.screenshots_dir.clone();
        let screenshot_age = Duration::from_secs(self.config.screenshots.max_age_minutes * 60);
        let screenshot_cleanup = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                if let Err(e) = cleanup_old_screenshots(&dir, screenshot_age) {
                    error!("Screenshot cleanup failed: {}", e);
                }
            }
        });

        info!(
            "Maintenance every {} minutes (videos older than {}h, cap {:.1} GB)",
            interval.as_secs() / 60,
            cache_cfg.max_age_hours,
            cache_cfg.max_size_gb
        );
        vec![eviction, screenshot_cleanup]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(storage: StorageBackend) -> (tempfile::TempDir, PipelineBuilder) {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.storage = storage;
        let paths = AppPaths::from_root(temp.path());
        (temp, PipelineBuilder::new(config, paths))
    }

    #[test]
    fn test_memory_store() {
        let (_temp, builder) = builder(StorageBackend::Memory);
        let store = builder.open_store().unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_store() {
        let (temp, builder) = builder(StorageBackend::Sqlite);
        builder.paths().ensure_dirs().unwrap();
        let store = builder.open_store().unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(builder.paths().database_file.starts_with(temp.path()));
        assert!(builder.paths().database_file.exists());
    }

    #[tokio::test]
    async fn test_build_and_maintenance() {
        let (_temp, builder) = builder(StorageBackend::Memory);
        let services = builder.build().unwrap();
        assert!(services.pipeline.list().unwrap().is_empty());
        assert_eq!(services.cache.stats().unwrap().count, 0);

        let handles = builder.spawn_maintenance(&services);
        assert_eq!(handles.len(), 2);
        for handle in handles {
            handle.abort();
        }
    }
}
