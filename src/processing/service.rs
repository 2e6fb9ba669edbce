//! Pipeline service coordinating type detection, extraction, summarization and the store.

use crate::{
    config::Config,
    metrics::{MetricsSnapshot, PipelineMetrics},
    model::build_model_client,
    processing::{
        detect::detect,
        extract::Extractor,
        summarize::{SummarizationEngine, model_calls_for, structured_key_points},
        types::{DetectedType, ExtractionError, PipelineError},
    },
    store::{KeyPoints, LifecycleStore, StoredFile, SummaryRecord, sha256_hex},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;

/// Runs the per-file unit of work: detect, extract, summarize, then commit.
///
/// A unit of work either ends with the file `PROCESSED` and its summary stored, or fails and
/// leaves the file exactly as it was. Units for different files share nothing but the store
/// and may run in parallel. Construct once near process start and share through an `Arc`.
pub struct PipelineService {
    store: Arc<dyn LifecycleStore>,
    extractor: Arc<Extractor>,
    engine: SummarizationEngine,
    metrics: Arc<PipelineMetrics>,
    storage_root: Option<PathBuf>,
}

/// Request to register a file that already exists on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileRegistration {
    /// Location of the stored bytes.
    pub path: PathBuf,
    /// Display name; defaults to the path's file name.
    #[serde(default)]
    pub filename: Option<String>,
    /// Untrusted media type supplied by the uploader.
    #[serde(default)]
    pub declared_media_type: Option<String>,
    /// Upload batch; a fresh identifier is generated when absent.
    #[serde(default)]
    pub upload_id: Option<String>,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Hash and register a stored file as `PENDING`.
    async fn register_file(&self, registration: FileRegistration)
    -> Result<StoredFile, PipelineError>;

    /// Run the unit of work for a registered file at an explicit path.
    async fn process(
        &self,
        file_id: &str,
        path: &Path,
        declared_media_type: Option<&str>,
    ) -> Result<SummaryRecord, PipelineError>;

    /// Run the unit of work using the path and media type recorded at registration.
    async fn process_stored(&self, file_id: &str) -> Result<SummaryRecord, PipelineError>;

    /// Look up a file and its status.
    fn get_file(&self, file_id: &str) -> Result<StoredFile, PipelineError>;

    /// Look up the summary of a `PROCESSED` file.
    fn get_summary_by_file(&self, file_id: &str) -> Result<SummaryRecord, PipelineError>;

    /// Look up a summary by its own identifier.
    fn get_summary(&self, summary_id: &str) -> Result<SummaryRecord, PipelineError>;

    /// List the files of one upload.
    fn list_files_by_upload(&self, upload_id: &str) -> Vec<StoredFile>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl PipelineService {
    /// Build a service over `store` with the default decoders.
    pub fn new(store: Arc<dyn LifecycleStore>, engine: SummarizationEngine) -> Self {
        Self {
            store,
            extractor: Arc::new(Extractor::new()),
            engine,
            metrics: Arc::new(PipelineMetrics::new()),
            storage_root: None,
        }
    }

    /// Build a service with the model client and engine settings described by `config`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn LifecycleStore>,
    ) -> Result<Self, PipelineError> {
        let client = build_model_client(config)
            .map_err(|error| PipelineError::Configuration(error.to_string()))?;
        tracing::info!(
            model = %config.summary_model,
            chunk_max_chars = config.chunk_max_chars,
            map_concurrency = config.map_concurrency,
            "Pipeline configured"
        );
        let service = Self::new(store, SummarizationEngine::from_config(client, config));
        match &config.storage_root {
            Some(root) => service.with_storage_root(root),
            None => Ok(service),
        }
    }

    /// Only accept files under `root`. Relative registration paths are resolved against it.
    pub fn with_storage_root(mut self, root: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|error| {
            PipelineError::Configuration(format!("storage root {}: {error}", root.display()))
        })?;
        tracing::info!(
            storage_root = %canonical.display(),
            "Registrations limited to storage root"
        );
        self.storage_root = Some(canonical);
        Ok(self)
    }

    /// Replace the extractor, e.g. to swap in a different decoder for one format.
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Store backing this service.
    pub fn store(&self) -> &Arc<dyn LifecycleStore> {
        &self.store
    }

    /// Hash and register a stored file as `PENDING`.
    pub async fn register_file(
        &self,
        registration: FileRegistration,
    ) -> Result<StoredFile, PipelineError> {
        let FileRegistration {
            path,
            filename,
            declared_media_type,
            upload_id,
        } = registration;
        let path = self.resolve_path(&path).await?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|error| PipelineError::Extraction(ExtractionError::Io(error)))?;
        let filename = filename.unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unnamed".to_string())
        });
        let upload_id = upload_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let file = StoredFile::new(
            upload_id,
            filename,
            declared_media_type,
            sha256_hex(&bytes),
            path,
        );
        self.store.add_file(file.clone());
        tracing::info!(
            file_id = %file.id,
            upload_id = %file.upload_id,
            filename = %file.filename,
            bytes = bytes.len(),
            "File registered"
        );
        Ok(file)
    }

    /// Detect, extract and summarize one file, then commit the summary.
    ///
    /// On success the file is `PROCESSED` and the returned record is queryable. On any error
    /// the store is left untouched and the error is returned to the caller.
    pub async fn process(
        &self,
        file_id: &str,
        path: &Path,
        declared_media_type: Option<&str>,
    ) -> Result<SummaryRecord, PipelineError> {
        tracing::info!(file_id, path = %path.display(), "Processing file");
        match self.run(file_id, path, declared_media_type).await {
            Ok(record) => {
                let chunk_count = record.key_points.chunks.len();
                self.metrics
                    .record_processed(chunk_count as u64, model_calls_for(chunk_count) as u64);
                tracing::info!(
                    file_id,
                    summary_id = %record.id,
                    chunks = chunk_count,
                    "File processed"
                );
                Ok(record)
            }
            Err(error) => {
                self.metrics.record_failure();
                tracing::error!(file_id, error = %error, "Processing failed; file left unchanged");
                Err(error)
            }
        }
    }

    /// Run [`PipelineService::process`] with the path and media type recorded at registration.
    pub async fn process_stored(&self, file_id: &str) -> Result<SummaryRecord, PipelineError> {
        let file = self.get_file(file_id)?;
        self.process(
            &file.id,
            &file.storage_path,
            file.declared_media_type.as_deref(),
        )
        .await
    }

    async fn run(
        &self,
        file_id: &str,
        path: &Path,
        declared_media_type: Option<&str>,
    ) -> Result<SummaryRecord, PipelineError> {
        if self.store.get_file(file_id).is_none() {
            return Err(PipelineError::NotFound(format!("file {file_id}")));
        }

        let extractor = Arc::clone(&self.extractor);
        let owned_path = self.resolve_path(path).await?;
        let declared = declared_media_type.map(str::to_owned);
        let (kind, text) = tokio::task::spawn_blocking(move || {
            let kind = detect(&owned_path, declared.as_deref());
            extractor.extract(&owned_path, kind).map(|text| (kind, text))
        })
        .await
        .map_err(|error| {
            PipelineError::Extraction(ExtractionError::decode(
                DetectedType::Unknown,
                format!("extraction task failed: {error}"),
            ))
        })??;
        tracing::debug!(file_id, kind = %kind, chars = text.chars().count(), "Text extracted");

        let outcome = self.engine.summarize(&text).await?;
        let structured = structured_key_points(&outcome.final_summary);
        let record = SummaryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            summary_text: outcome.final_summary,
            key_points: KeyPoints {
                chunks: outcome.chunk_summaries,
                structured,
            },
            model: outcome.model,
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.add_summary(record.clone())?;
        Ok(record)
    }

    // Symlinks and `..` are resolved before the prefix check.
    async fn resolve_path(&self, path: &Path) -> Result<PathBuf, PipelineError> {
        let Some(root) = &self.storage_root else {
            return Ok(path.to_path_buf());
        };
        let joined = root.join(path);
        match tokio::fs::canonicalize(&joined).await {
            Ok(canonical) if canonical.starts_with(root) => Ok(canonical),
            Ok(_) => Err(PipelineError::OutsideStorageRoot(path.to_path_buf())),
            Err(_) if !joined.starts_with(root) => {
                Err(PipelineError::OutsideStorageRoot(path.to_path_buf()))
            }
            Err(error) => Err(PipelineError::Extraction(ExtractionError::Io(error))),
        }
    }

    /// Look up a file and its status.
    pub fn get_file(&self, file_id: &str) -> Result<StoredFile, PipelineError> {
        self.store
            .get_file(file_id)
            .ok_or_else(|| PipelineError::NotFound(format!("file {file_id}")))
    }

    /// Look up the summary of a `PROCESSED` file.
    pub fn get_summary_by_file(&self, file_id: &str) -> Result<SummaryRecord, PipelineError> {
        self.store
            .get_summary_by_file(file_id)
            .ok_or_else(|| PipelineError::NotFound(format!("summary for file {file_id}")))
    }

    /// Look up a summary by its own identifier.
    pub fn get_summary(&self, summary_id: &str) -> Result<SummaryRecord, PipelineError> {
        Ok(self.store.get_summary(summary_id)?)
    }

    /// List the files of one upload.
    pub fn list_files_by_upload(&self, upload_id: &str) -> Vec<StoredFile> {
        self.store.list_files_by_upload(upload_id)
    }

    /// Retrieve the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn register_file(
        &self,
        registration: FileRegistration,
    ) -> Result<StoredFile, PipelineError> {
        PipelineService::register_file(self, registration).await
    }

    async fn process(
        &self,
        file_id: &str,
        path: &Path,
        declared_media_type: Option<&str>,
    ) -> Result<SummaryRecord, PipelineError> {
        PipelineService::process(self, file_id, path, declared_media_type).await
    }

    async fn process_stored(&self, file_id: &str) -> Result<SummaryRecord, PipelineError> {
        PipelineService::process_stored(self, file_id).await
    }

    fn get_file(&self, file_id: &str) -> Result<StoredFile, PipelineError> {
        PipelineService::get_file(self, file_id)
    }

    fn get_summary_by_file(&self, file_id: &str) -> Result<SummaryRecord, PipelineError> {
        PipelineService::get_summary_by_file(self, file_id)
    }

    fn get_summary(&self, summary_id: &str) -> Result<SummaryRecord, PipelineError> {
        PipelineService::get_summary(self, summary_id)
    }

    fn list_files_by_upload(&self, upload_id: &str) -> Vec<StoredFile> {
        PipelineService::list_files_by_upload(self, upload_id)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        PipelineService::metrics_snapshot(self)
    }
}
