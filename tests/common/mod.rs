#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use facescan::common::config::ScanConfig;
use facescan::{
    CaptureDevice, FaceMatchingEngine, FaceScanError, Frame, Result, ScanOrchestrator, ScanResult,
    Template, TemplateRecord, TemplateSource, VerifyResult, VideoStream,
};

pub struct FakeEngine {
    init_result: std::result::Result<bool, String>,
    scan_result: Mutex<std::result::Result<ScanResult, String>>,
    verify_result: Mutex<std::result::Result<VerifyResult, String>>,
    scan_delay: Option<Duration>,
    pub init_calls: AtomicUsize,
    pub scan_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub last_samples: Mutex<Vec<Frame>>,
    pub last_verify: Mutex<Option<(Template, Template)>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            init_result: Ok(true),
            scan_result: Mutex::new(Ok(ScanResult::accepted("abc123"))),
            verify_result: Mutex::new(Ok(VerifyResult::matched())),
            scan_delay: None,
            init_calls: AtomicUsize::new(0),
            scan_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            last_samples: Mutex::new(Vec::new()),
            last_verify: Mutex::new(None),
        }
    }

    pub fn with_init(mut self, result: std::result::Result<bool, String>) -> Self {
        self.init_result = result;
        self
    }

    pub fn with_scan(self, result: std::result::Result<ScanResult, String>) -> Self {
        self.set_scan(result);
        self
    }

    pub fn with_verify(self, result: std::result::Result<VerifyResult, String>) -> Self {
        *self.verify_result.lock().unwrap() = result;
        self
    }

    pub fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = Some(delay);
        self
    }

    pub fn set_scan(&self, result: std::result::Result<ScanResult, String>) {
        *self.scan_result.lock().unwrap() = result;
    }

    pub fn scans(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn verifies(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceMatchingEngine for FakeEngine {
    async fn initialize(&self) -> Result<bool> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.init_result.clone().map_err(FaceScanError::Engine)
    }

    async fn scan_face(&self, samples: &[Frame]) -> Result<ScanResult> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_samples.lock().unwrap() = samples.to_vec();
        if let Some(delay) = self.scan_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.scan_result.lock().unwrap().clone();
        result.map_err(FaceScanError::Engine)
    }

    async fn verify_face_scan(
        &self,
        candidate: &Template,
        stored: &Template,
    ) -> Result<VerifyResult> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_verify.lock().unwrap() = Some((candidate.clone(), stored.clone()));
        let result = self.verify_result.lock().unwrap().clone();
        result.map_err(FaceScanError::Engine)
    }
}

/// Shared observations from a [`FakeDevice`] and its streams.
#[derive(Default)]
pub struct DeviceLog {
    pub opens: AtomicUsize,
    pub capture_times: Mutex<Vec<Instant>>,
}

pub struct FakeDevice {
    deny: bool,
    failing_captures: HashSet<usize>,
    pub log: Arc<DeviceLog>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self { deny: false, failing_captures: HashSet::new(), log: Arc::new(DeviceLog::default()) }
    }

    pub fn denied() -> Self {
        Self { deny: true, ..Self::new() }
    }

    /// Fail the captures at these zero-based positions.
    pub fn failing_at(positions: &[usize]) -> Self {
        Self { failing_captures: positions.iter().copied().collect(), ..Self::new() }
    }

    pub fn opens(&self) -> usize {
        self.log.opens.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> Vec<Instant> {
        self.log.capture_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn open(&self) -> Result<Box<dyn VideoStream>> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(FaceScanError::DeviceAccess("Permission denied".into()));
        }
        Ok(Box::new(FakeStream {
            failing_captures: self.failing_captures.clone(),
            log: self.log.clone(),
            captured: 0,
        }))
    }
}

struct FakeStream {
    failing_captures: HashSet<usize>,
    log: Arc<DeviceLog>,
    captured: usize,
}

#[async_trait]
impl VideoStream for FakeStream {
    fn is_active(&self) -> bool {
        true
    }

    async fn capture_frame(&mut self) -> Result<Frame> {
        let position = self.captured;
        self.captured += 1;
        self.log.capture_times.lock().unwrap().push(Instant::now());

        if self.failing_captures.contains(&position) {
            return Err(FaceScanError::ScanCapture("Frame not ready".into()));
        }
        Ok(Frame::new(2, 2, "GREY", vec![position as u8; 4]))
    }
}

pub struct FakeTemplates {
    result: std::result::Result<TemplateRecord, String>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeTemplates {
    pub fn stored(template: &str) -> Self {
        Self::from_result(Ok(TemplateRecord { face_scan: Some(Template::from(template)) }))
    }

    pub fn absent() -> Self {
        Self::from_result(Ok(TemplateRecord { face_scan: None }))
    }

    pub fn failing(message: &str) -> Self {
        Self::from_result(Err(message.to_string()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn from_result(result: std::result::Result<TemplateRecord, String>) -> Self {
        Self { result, delay: None, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl TemplateSource for FakeTemplates {
    async fn fetch_template(&self, _user_id: &str) -> Result<TemplateRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone().map_err(FaceScanError::Storage)
    }
}

/// Orchestrator with timeout guards disabled, already initialized.
pub async fn ready_orchestrator(
    engine: Arc<FakeEngine>,
    device: Arc<FakeDevice>,
) -> Arc<ScanOrchestrator> {
    ScanOrchestrator::start(engine, device, ScanConfig::unguarded()).await
}
