//! Request pipeline: validate, admit, stage, prepare, recognize, finalize.
//!
//! Validation and admission happen before any file I/O. From admission on,
//! the gate permit and every staged file are owned by guards, so they are
//! released on success, error, timeout and panic alike.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use ocrgate_config::Settings;
use ocrgate_core::{GatewayError, ImageScaler, LanguageSet, RecognitionResult};
use ocrgate_logging::{EventLogger, RequestEvent};
use ocrgate_media::is_allowed_upload;
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::gate::{GatePermit, SingleFlightGate};
use crate::lifecycle::EngineLifecycle;
use crate::staging::StagedFile;
use crate::stats::StatsCollector;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub staging_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub max_dimension: u32,
    /// Lowercase, dot-prefixed extensions.
    pub allowed_extensions: Vec<String>,
    pub default_languages: LanguageSet,
    pub request_timeout: Duration,
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            staging_dir: settings.staging_dir.clone(),
            max_upload_bytes: settings.max_upload_bytes,
            max_dimension: settings.max_dimension,
            allowed_extensions: settings.allowed_extensions.clone(),
            default_languages: LanguageSet::parse(&settings.default_languages),
            request_timeout: settings.request_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One submission as received from the transport.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file: Option<UploadedFile>,
    /// Comma separated language spec; the configured default when absent or blank.
    pub languages: Option<String>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>, languages: Option<String>) -> Self {
        Self {
            file: Some(UploadedFile {
                filename: filename.into(),
                bytes,
            }),
            languages,
        }
    }
}

#[derive(Clone)]
pub struct RequestPipeline {
    config: Arc<PipelineConfig>,
    gate: SingleFlightGate,
    lifecycle: Arc<EngineLifecycle>,
    scaler: Arc<dyn ImageScaler>,
    stats: Arc<StatsCollector>,
    closed: Arc<AtomicBool>,
}

impl RequestPipeline {
    pub fn new(
        config: PipelineConfig,
        gate: SingleFlightGate,
        lifecycle: Arc<EngineLifecycle>,
        scaler: Arc<dyn ImageScaler>,
        stats: Arc<StatsCollector>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            gate,
            lifecycle,
            scaler,
            stats,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stops admitting new work; in-flight jobs finish normally.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Runs one submission end to end and records its outcome.
    ///
    /// Engine construction and recognition failures come back as `Ok` with
    /// the result's `error` field set; `Err` is reserved for rejections,
    /// oversize uploads, timeouts and unexpected faults.
    ///
    /// The work runs on its own task. A caller that stops waiting (a client
    /// disconnect) only discards the result; the outcome is still recorded.
    pub async fn submit(&self, upload: Upload) -> Result<RecognitionResult, GatewayError> {
        let pipeline = self.clone();
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("ocr_request", request_id = %request_id);
        let task = tokio::spawn(
            async move {
                let started = Instant::now();
                let outcome = pipeline.run(upload).await;
                pipeline.finalize(&request_id, started.elapsed(), &outcome);
                outcome
            }
            .instrument(span),
        );
        match task.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(GatewayError::Other(anyhow!(
                "request task failed: {join_err}"
            ))),
        }
    }

    async fn run(&self, upload: Upload) -> Result<RecognitionResult, GatewayError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::ShuttingDown);
        }
        let (file, languages) = self.validate(upload)?;
        let permit = self.admit()?;

        let staged =
            StagedFile::create(&self.config.staging_dir, &file.filename, &file.bytes).await?;
        drop(file);
        let size = staged.size().await?;
        if size > self.config.max_upload_bytes {
            return Err(GatewayError::Oversize {
                size,
                limit: self.config.max_upload_bytes,
            });
        }

        let job = RecognitionJob {
            permit,
            staged,
            languages,
            lifecycle: Arc::clone(&self.lifecycle),
            scaler: Arc::clone(&self.scaler),
            max_dimension: self.config.max_dimension,
        };
        let span = tracing::Span::current();
        let handle = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            job.run()
        });

        match tokio::time::timeout(self.config.request_timeout, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => Err(GatewayError::Other(anyhow!(
                "recognition task failed: {join_err}"
            ))),
            Err(_) => {
                // The engine call cannot be interrupted. The job keeps the
                // permit and its files until the call returns, so no second
                // request can reach the engine in the meantime.
                warn!(
                    timeout_secs = self.config.request_timeout.as_secs_f64(),
                    "Recognition exceeded deadline; gate stays held until the engine returns"
                );
                Err(GatewayError::Timeout(self.config.request_timeout))
            }
        }
    }

    /// Takes the gate, then re-checks for shutdown: a close that lands between
    /// the first check and admission must not let this request build an
    /// engine nothing will tear down.
    fn admit(&self) -> Result<GatePermit, GatewayError> {
        let permit = self.gate.try_enter().ok_or(GatewayError::Busy)?;
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::ShuttingDown);
        }
        Ok(permit)
    }

    fn validate(&self, upload: Upload) -> Result<(UploadedFile, LanguageSet), GatewayError> {
        let file = upload
            .file
            .filter(|f| !(f.filename.is_empty() && f.bytes.is_empty()))
            .ok_or_else(|| GatewayError::Validation("No file uploaded".into()))?;
        if !is_allowed_upload(&file.filename, &self.config.allowed_extensions) {
            return Err(GatewayError::Validation("Invalid file type".into()));
        }
        let languages = upload
            .languages
            .as_deref()
            .map(LanguageSet::parse)
            .filter(|set| !set.is_empty())
            .unwrap_or_else(|| self.config.default_languages.clone());
        Ok((file, languages))
    }

    fn finalize(
        &self,
        request_id: &str,
        elapsed: Duration,
        outcome: &Result<RecognitionResult, GatewayError>,
    ) {
        let event = match outcome {
            Ok(result) if result.is_success() => {
                self.stats.record(true, elapsed);
                RequestEvent::Completed {
                    languages: result.languages.to_string(),
                    regions: result.details.len(),
                    init_ms: (result.init_seconds * 1000.0) as u64,
                    ocr_ms: (result.ocr_seconds * 1000.0) as u64,
                }
            }
            Ok(result) => {
                self.stats.record(false, elapsed);
                RequestEvent::Failed {
                    kind: "engine".into(),
                    message: result.error.clone(),
                }
            }
            Err(err) if err.is_rejection() => {
                if matches!(err, GatewayError::Busy) {
                    self.stats.record_busy();
                }
                RequestEvent::Rejected {
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                self.stats.record(false, elapsed);
                RequestEvent::Failed {
                    kind: err.kind().into(),
                    message: err.to_string(),
                }
            }
        };
        EventLogger::log_event(request_id, elapsed, event);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Everything the blocking half of a request owns. Dropping it releases the
/// staged files and then the gate.
struct RecognitionJob {
    permit: GatePermit,
    staged: StagedFile,
    languages: LanguageSet,
    lifecycle: Arc<EngineLifecycle>,
    scaler: Arc<dyn ImageScaler>,
    max_dimension: u32,
}

impl RecognitionJob {
    fn run(self) -> Result<RecognitionResult, GatewayError> {
        let mut init_seconds = 0.0;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.prepare_and_recognize(&mut init_seconds)
        }));
        let RecognitionJob {
            permit,
            staged,
            languages,
            lifecycle,
            ..
        } = self;

        let result = match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err @ (GatewayError::Construction(_) | GatewayError::Recognition(_)))) => {
                Ok(RecognitionResult::failed(languages, init_seconds, err.to_string()))
            }
            Ok(Err(err)) => Err(err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(languages = %languages, panic = %message, "Engine panicked; discarding it");
                // A faulted engine may be corrupt; the next request rebuilds it.
                let teardown = panic::catch_unwind(AssertUnwindSafe(|| lifecycle.invalidate(&permit)));
                if teardown.is_err() {
                    error!("Engine teardown panicked after a fault");
                }
                Err(GatewayError::Other(anyhow!("engine panicked: {message}")))
            }
        };
        drop(staged);
        drop(permit);
        result
    }

    fn prepare_and_recognize(
        &self,
        init_seconds: &mut f64,
    ) -> Result<RecognitionResult, GatewayError> {
        let (width, height) = self.scaler.dimensions(self.staged.path())?;

        // Deleted when this function returns, whatever the outcome.
        let resized = if width > self.max_dimension || height > self.max_dimension {
            let path = self
                .scaler
                .scale_to_fit(self.staged.path(), self.max_dimension)?;
            debug!(
                width,
                height,
                max = self.max_dimension,
                path = %path.display(),
                "Recognizing against scaled copy"
            );
            Some(StagedFile::adopt(path))
        } else {
            None
        };
        let target = resized
            .as_ref()
            .map_or(self.staged.path(), StagedFile::path);

        let mut lease = self.lifecycle.ensure(&self.permit, &self.languages)?;
        *init_seconds = lease.construction_time().as_secs_f64();

        let started = Instant::now();
        let regions = lease.recognize(target)?;
        let ocr_seconds = started.elapsed().as_secs_f64();

        Ok(RecognitionResult::from_regions(
            self.languages.clone(),
            *init_seconds,
            ocr_seconds,
            regions,
        ))
    }
}
