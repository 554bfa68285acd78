//! Wire format between [`ServiceEngine`](super::ServiceEngine) and an engine service.
//!
//! Every message is a little-endian `u32` length followed by a bincode body.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::{FaceScanError, Result};
use crate::core::types::{Frame, ScanResult, Template, VerifyResult};

/// Three uncompressed frames fit comfortably under this.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum EngineRequest {
    Initialize,
    ScanFace {
        samples: Vec<Frame>,
    },
    VerifyFaceScan {
        candidate: Template,
        stored: Template,
        distance_threshold: f32,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum EngineResponse {
    Initialized(bool),
    Scan(ScanResult),
    Verify(VerifyResult),
    Error(String),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RequestEnvelope {
    pub request_id: u64,
    pub request: EngineRequest,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResponseEnvelope {
    pub request_id: u64,
    pub response: EngineResponse,
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = bincode::serialize(message)
        .map_err(|e| FaceScanError::Engine(format!("Failed to serialize message: {}", e)))?;
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(FaceScanError::Engine(format!("Message too large: {} bytes", data.len())));
    }

    writer.write_all(&(data.len() as u32).to_le_bytes()).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(FaceScanError::Engine(format!("Message too large: {} bytes", len)));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;

    bincode::deserialize(&buf)
        .map_err(|e| FaceScanError::Engine(format!("Failed to deserialize message: {}", e)))
}
