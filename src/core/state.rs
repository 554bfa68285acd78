//! Scan lifecycle as a pure state machine.
//!
//! `transition` has no side effects. [`ScanOrchestrator`](super::orchestrator::ScanOrchestrator)
//! performs the device and engine calls and feeds their outcomes back in as events.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStep {
    /// No device acquired yet.
    Idle,
    /// Model load or device acquisition in progress.
    Initializing,
    /// Device bound and engine initialized.
    Ready,
    /// Capture in progress.
    Started,
    Complete,
    Failed,
}

impl ScanStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStep::Idle => "idle",
            ScanStep::Initializing => "initializing",
            ScanStep::Ready => "ready",
            ScanStep::Started => "started",
            ScanStep::Complete => "complete",
            ScanStep::Failed => "failed",
        }
    }

    pub fn accepts_scan(&self) -> bool {
        matches!(self, ScanStep::Ready | ScanStep::Complete)
    }

    /// Default status line shown to the user for this step.
    pub fn status_message(&self) -> &'static str {
        match self {
            ScanStep::Idle => "Camera not started",
            ScanStep::Initializing => "Loading face recognition model...",
            ScanStep::Ready => "Camera ready. Position your face in the frame.",
            ScanStep::Started => "Scanning face, hold still...",
            ScanStep::Complete => "Face scan complete",
            ScanStep::Failed => "Face scan failed",
        }
    }
}

impl fmt::Display for ScanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    Initialize,
    /// Engine loaded and device stream metadata is available.
    DeviceBound,
    InitFailed,
    StartScan,
    ScanSucceeded,
    ScanFailed,
    /// `resources_ready` is true while the engine is initialized and the stream is bound.
    Reset { resources_ready: bool },
}

/// Next step for `event` in `step`, or `None` if the event is not allowed there.
pub fn transition(step: ScanStep, event: ScanEvent) -> Option<ScanStep> {
    use ScanEvent::*;
    use ScanStep::*;

    match (step, event) {
        (Idle, Initialize) => Some(Initializing),
        (Initializing, DeviceBound) => Some(Ready),
        (Initializing, InitFailed) => Some(Failed),

        (Ready | Complete, StartScan) => Some(Started),
        (Started, ScanSucceeded) => Some(Complete),
        (Started, ScanFailed) => Some(Failed),

        (Complete | Failed, Reset { resources_ready: true }) => Some(Ready),
        (Complete | Failed, Reset { resources_ready: false }) => Some(Idle),
        (Idle | Ready, Reset { .. }) => Some(step),

        _ => None,
    }
}
