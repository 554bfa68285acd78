//! Face matching engine capability.
//!
//! Feature extraction and template comparison live outside this crate. The
//! orchestrator and coordinator only depend on [`FaceMatchingEngine`]; the
//! [`ServiceEngine`] implementation forwards calls to an engine service over a
//! Unix socket.

pub mod client;
pub mod protocol;

use async_trait::async_trait;

use crate::common::Result;
use crate::core::types::{Frame, ScanResult, Template, VerifyResult};

pub use client::ServiceEngine;

#[async_trait]
pub trait FaceMatchingEngine: Send + Sync {
    /// Load models. `Ok(false)` means the engine could not initialize.
    async fn initialize(&self) -> Result<bool>;

    /// Derive a template from the captured samples.
    async fn scan_face(&self, samples: &[Frame]) -> Result<ScanResult>;

    /// Compare a fresh template against a stored one.
    async fn verify_face_scan(
        &self,
        candidate: &Template,
        stored: &Template,
    ) -> Result<VerifyResult>;
}
