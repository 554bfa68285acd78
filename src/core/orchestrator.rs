use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::camera::{CaptureDevice, VideoStream};
use crate::common::config::ScanConfig;
use crate::common::{FaceScanError, Result};
use crate::core::state::{transition, ScanEvent, ScanStep};
use crate::core::types::{Frame, ScanResult, SAMPLE_COUNT, SAMPLE_INTERVAL_MS};
use crate::engine::FaceMatchingEngine;

/// Snapshot published to subscribers on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanStatus {
    pub step: ScanStep,
    pub message: String,
    pub error: Option<String>,
}

impl ScanStatus {
    fn for_step(step: ScanStep) -> Self {
        Self {
            step,
            message: step.status_message().to_string(),
            error: None,
        }
    }
}

/// Frames collected by one `start_scan` call.
struct ScanSession {
    samples: Vec<Frame>,
}

impl ScanSession {
    fn new() -> Self {
        Self { samples: Vec::with_capacity(SAMPLE_COUNT) }
    }

    fn push(&mut self, frame: Frame) {
        if self.samples.len() < SAMPLE_COUNT {
            self.samples.push(frame);
        }
    }
}

struct Inner {
    step: ScanStep,
    result: Option<ScanResult>,
    error: Option<(&'static str, String)>,
    samples: Vec<Frame>,
    init_attempted: bool,
    engine_ready: bool,
    device_bound: bool,
}

impl Inner {
    fn resources_ready(&self) -> bool {
        self.engine_ready && self.device_bound
    }
}

/// Drives the camera and matching engine through one face scan at a time.
pub struct ScanOrchestrator {
    engine: Arc<dyn FaceMatchingEngine>,
    device: Arc<dyn CaptureDevice>,
    config: ScanConfig,
    inner: Mutex<Inner>,
    // Only locked by the single in-flight scan, so never contended across awaits.
    stream: tokio::sync::Mutex<Option<Box<dyn VideoStream>>>,
    status_tx: watch::Sender<ScanStatus>,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("step", &self.step())
            .field("config", &self.config)
            .finish()
    }
}

impl ScanOrchestrator {
    /// Create an orchestrator in `idle` without touching the engine or device.
    pub fn new(
        engine: Arc<dyn FaceMatchingEngine>,
        device: Arc<dyn CaptureDevice>,
        config: ScanConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(ScanStatus::for_step(ScanStep::Idle));
        Self {
            engine,
            device,
            config,
            inner: Mutex::new(Inner {
                step: ScanStep::Idle,
                result: None,
                error: None,
                samples: Vec::new(),
                init_attempted: false,
                engine_ready: false,
                device_bound: false,
            }),
            stream: tokio::sync::Mutex::new(None),
            status_tx,
        }
    }

    /// Create an orchestrator and run initialization. Initialization failures are
    /// recorded in the returned instance's state rather than returned.
    pub async fn start(
        engine: Arc<dyn FaceMatchingEngine>,
        device: Arc<dyn CaptureDevice>,
        config: ScanConfig,
    ) -> Arc<Self> {
        let orchestrator = Arc::new(Self::new(engine, device, config));
        if let Err(e) = orchestrator.initialize().await {
            tracing::warn!("Face scan initialization failed: {}", e);
        }
        orchestrator
    }

    /// Load the engine, then acquire the camera. Runs at most once per instance.
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut inner = self.lock();
            if inner.init_attempted {
                tracing::debug!("Initialization already attempted, skipping");
                return Ok(());
            }
            inner.init_attempted = true;
            self.apply(&mut inner, ScanEvent::Initialize, None);
        }

        tracing::info!("Loading face recognition model...");
        let init = self.engine.initialize();
        let loaded = match with_timeout(self.config.init_timeout(), init).await {
            Some(Ok(true)) => Ok(()),
            Some(Ok(false)) => Err(FaceScanError::ModelLoad(
                "Face recognition model failed to initialize".into(),
            )),
            Some(Err(e)) => Err(FaceScanError::ModelLoad(e.to_string())),
            None => Err(FaceScanError::ModelLoad(
                "Timed out loading face recognition model".into(),
            )),
        };
        if let Err(e) = loaded {
            return Err(self.fail_init(e));
        }

        {
            let mut inner = self.lock();
            inner.engine_ready = true;
            self.publish(&inner, Some("Requesting camera access...".into()));
        }

        let stream = match with_timeout(self.config.device_timeout(), self.device.open()).await {
            Some(Ok(stream)) => stream,
            Some(Err(FaceScanError::DeviceAccess(msg))) => {
                return Err(self.fail_init(FaceScanError::DeviceAccess(msg)));
            }
            Some(Err(e)) => {
                return Err(self.fail_init(FaceScanError::DeviceAccess(e.to_string())));
            }
            None => {
                return Err(self.fail_init(FaceScanError::DeviceAccess(
                    "Timed out waiting for camera".into(),
                )));
            }
        };
        *self.stream.lock().await = Some(stream);

        let mut inner = self.lock();
        inner.device_bound = true;
        self.apply(&mut inner, ScanEvent::DeviceBound, None);
        tracing::info!("Camera ready");
        Ok(())
    }

    /// Capture samples and submit them to the engine.
    ///
    /// Rejected with `ScanInProgress` while another scan is running, and with
    /// `DeviceNotReady` unless the orchestrator is `ready` or `complete`.
    pub async fn start_scan(&self) -> Result<ScanResult> {
        {
            let mut inner = self.lock();
            if inner.step == ScanStep::Started {
                tracing::debug!("Scan already in progress, rejecting start");
                return Err(FaceScanError::ScanInProgress);
            }
            if !inner.resources_ready() || !inner.step.accepts_scan() {
                tracing::debug!("Scan requested in step {}", inner.step);
                return Err(FaceScanError::DeviceNotReady);
            }

            inner.result = None;
            inner.error = None;
            inner.samples.clear();
            self.apply(&mut inner, ScanEvent::StartScan, None);
        }
        let _cancel = CancelGuard { orchestrator: self };

        let session = self.capture_samples().await;
        tracing::debug!("Captured {}/{} samples", session.samples.len(), SAMPLE_COUNT);
        if session.samples.len() < SAMPLE_COUNT {
            tracing::warn!(
                "Only {} of {} samples captured, submitting anyway",
                session.samples.len(),
                SAMPLE_COUNT
            );
        }

        match self.submit(&session.samples).await {
            Ok(result) => {
                let mut inner = self.lock();
                inner.result = Some(result.clone());
                inner.samples = session.samples;
                self.apply(&mut inner, ScanEvent::ScanSucceeded, None);
                if let Some(hash) = &result.fuzzy_hash {
                    tracing::info!("Face scan complete (template {})", hash.fingerprint());
                }
                Ok(result)
            }
            Err(e) => {
                tracing::warn!("Face scan failed: {}", e);
                let mut inner = self.lock();
                inner.error = Some((e.code(), e.to_string()));
                inner.samples.clear();
                self.apply(&mut inner, ScanEvent::ScanFailed, None);
                Err(e)
            }
        }
    }

    /// Clear result, error and samples without re-running initialization.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.lock();
        let event = ScanEvent::Reset { resources_ready: inner.resources_ready() };
        match transition(inner.step, event) {
            Some(next) if next == inner.step => Ok(()),
            Some(_) => {
                inner.result = None;
                inner.error = None;
                inner.samples.clear();
                self.apply(&mut inner, event, None);
                Ok(())
            }
            None if inner.step == ScanStep::Started => Err(FaceScanError::ScanInProgress),
            None => Ok(()),
        }
    }

    pub fn step(&self) -> ScanStep {
        self.lock().step
    }

    pub fn status(&self) -> ScanStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.status_tx.subscribe()
    }

    pub fn result(&self) -> Option<ScanResult> {
        self.lock().result.clone()
    }

    /// Human-readable error of the last failure, distinct from the status line.
    pub fn error(&self) -> Option<String> {
        self.lock().error.as_ref().map(|(_, msg)| msg.clone())
    }

    pub fn error_code(&self) -> Option<&'static str> {
        self.lock().error.as_ref().map(|(code, _)| *code)
    }

    pub fn sample_count(&self) -> usize {
        self.lock().samples.len()
    }

    async fn capture_samples(&self) -> ScanSession {
        let mut session = ScanSession::new();
        let mut stream = self.stream.lock().await;

        for attempt in 0..SAMPLE_COUNT {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(SAMPLE_INTERVAL_MS)).await;
            }

            let Some(stream) = stream.as_mut().filter(|s| s.is_active()) else {
                tracing::warn!("Sample {} skipped: camera stream not active", attempt + 1);
                continue;
            };

            match with_timeout(self.config.capture_timeout(), stream.capture_frame()).await {
                Some(Ok(frame)) => session.push(frame),
                Some(Err(e)) => tracing::warn!("Sample {} capture failed: {}", attempt + 1, e),
                None => tracing::warn!("Sample {} capture timed out", attempt + 1),
            }

            let inner = self.lock();
            self.publish(
                &inner,
                Some(format!("Scanning face, hold still... ({}/{})", attempt + 1, SAMPLE_COUNT)),
            );
        }

        session
    }

    async fn submit(&self, samples: &[Frame]) -> Result<ScanResult> {
        let scan = self.engine.scan_face(samples);
        let result = match with_timeout(self.config.engine_timeout(), scan).await {
            Some(Ok(result)) => result,
            Some(Err(e)) => return Err(FaceScanError::ScanCapture(e.to_string())),
            None => return Err(FaceScanError::ScanCapture("Matching engine timed out".into())),
        };

        if !result.success {
            let message = result
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Face scan was rejected".to_string());
            return Err(FaceScanError::EngineReject(message));
        }

        match &result.fuzzy_hash {
            Some(hash) if !hash.is_empty() => Ok(result),
            _ => Err(FaceScanError::EngineReject("Face scan returned no template".into())),
        }
    }

    /// Fail a scan whose future was dropped while still `started`.
    fn cancel_scan(&self) {
        let mut inner = self.lock();
        if inner.step != ScanStep::Started {
            return;
        }
        tracing::warn!("Face scan cancelled before completion");
        let error = FaceScanError::ScanCapture("Scan cancelled".into());
        inner.error = Some((error.code(), error.to_string()));
        inner.samples.clear();
        self.apply(&mut inner, ScanEvent::ScanFailed, None);
    }

    fn fail_init(&self, error: FaceScanError) -> FaceScanError {
        tracing::error!("{}", error);
        let mut inner = self.lock();
        inner.error = Some((error.code(), error.to_string()));
        self.apply(&mut inner, ScanEvent::InitFailed, None);
        error
    }

    fn apply(&self, inner: &mut Inner, event: ScanEvent, message: Option<String>) {
        match transition(inner.step, event) {
            Some(next) => {
                tracing::debug!("Scan step {} -> {} on {:?}", inner.step, next, event);
                inner.step = next;
                self.publish(inner, message);
            }
            None => tracing::warn!("Ignoring {:?} in step {}", event, inner.step),
        }
    }

    fn publish(&self, inner: &Inner, message: Option<String>) {
        let status = ScanStatus {
            step: inner.step,
            message: message.unwrap_or_else(|| inner.step.status_message().to_string()),
            error: inner.error.as_ref().map(|(_, msg)| msg.clone()),
        };
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Moves an abandoned scan out of `started` so `reset` and the next
/// `start_scan` are not blocked forever.
struct CancelGuard<'a> {
    orchestrator: &'a ScanOrchestrator,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.cancel_scan();
    }
}

/// Await `fut`, giving up after `limit` if one is set.
async fn with_timeout<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}
