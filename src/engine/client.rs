use async_trait::async_trait;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;

use crate::common::config::EngineConfig;
use crate::common::{FaceScanError, Result};
use crate::core::types::{Frame, ScanResult, Template, VerifyResult};
use crate::engine::protocol::{
    read_message, write_message, EngineRequest, EngineResponse, RequestEnvelope, ResponseEnvelope,
};
use crate::engine::FaceMatchingEngine;

const CONNECT_RETRY_DELAY_MS: u64 = 500;

/// Forwards engine calls to an external matching service over a Unix socket.
///
/// The distance threshold is fixed for the lifetime of the instance and sent
/// with every verify request.
#[derive(Debug, Clone)]
pub struct ServiceEngine {
    socket_path: PathBuf,
    distance_threshold: f32,
    connect_retries: u32,
    request_timeout: Duration,
}

impl ServiceEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            distance_threshold: config.distance_threshold,
            connect_retries: config.connect_retries.max(1),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn distance_threshold(&self) -> f32 {
        self.distance_threshold
    }

    async fn connect_with_retry(&self) -> Result<UnixStream> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match UnixStream::connect(&self.socket_path).await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < self.connect_retries => {
                    tracing::warn!("Failed to connect to engine (attempt {}): {}", attempt, e);
                    tokio::time::sleep(Duration::from_millis(CONNECT_RETRY_DELAY_MS)).await;
                }
                Err(e) => {
                    return Err(FaceScanError::Engine(format!(
                        "Failed to connect to engine at {}: {}",
                        self.socket_path.display(),
                        e
                    )));
                }
            }
        }
    }

    async fn call(&self, request: EngineRequest) -> Result<EngineResponse> {
        let request_id: u64 = rand::thread_rng().gen();
        let exchange = async {
            let mut stream = self.connect_with_retry().await?;
            write_message(&mut stream, &RequestEnvelope { request_id, request }).await?;
            read_message::<_, ResponseEnvelope>(&mut stream).await
        };

        let envelope = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| FaceScanError::Engine("Engine request timed out".into()))??;

        if envelope.request_id != request_id {
            return Err(FaceScanError::Engine(format!(
                "Response id {} does not match request id {}",
                envelope.request_id, request_id
            )));
        }

        match envelope.response {
            EngineResponse::Error(msg) => Err(FaceScanError::Engine(msg)),
            response => Ok(response),
        }
    }
}

#[async_trait]
impl FaceMatchingEngine for ServiceEngine {
    async fn initialize(&self) -> Result<bool> {
        match self.call(EngineRequest::Initialize).await? {
            EngineResponse::Initialized(ready) => Ok(ready),
            other => Err(unexpected(&other)),
        }
    }

    async fn scan_face(&self, samples: &[Frame]) -> Result<ScanResult> {
        let request = EngineRequest::ScanFace { samples: samples.to_vec() };
        match self.call(request).await? {
            EngineResponse::Scan(result) => Ok(result),
            other => Err(unexpected(&other)),
        }
    }

    async fn verify_face_scan(
        &self,
        candidate: &Template,
        stored: &Template,
    ) -> Result<VerifyResult> {
        let request = EngineRequest::VerifyFaceScan {
            candidate: candidate.clone(),
            stored: stored.clone(),
            distance_threshold: self.distance_threshold,
        };
        match self.call(request).await? {
            EngineResponse::Verify(result) => Ok(result),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &EngineResponse) -> FaceScanError {
    let kind = match response {
        EngineResponse::Initialized(_) => "Initialized",
        EngineResponse::Scan(_) => "Scan",
        EngineResponse::Verify(_) => "Verify",
        EngineResponse::Error(_) => "Error",
    };
    FaceScanError::Engine(format!("Unexpected response type: {}", kind))
}
