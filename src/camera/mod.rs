pub mod v4l2;

use async_trait::async_trait;

use crate::common::Result;
use crate::core::types::Frame;

pub use v4l2::{CameraInfo, V4l2Device, V4l2Stream};

/// A video source that can be acquired for exclusive use.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire the device. Resolves once the stream format is known, or fails with
    /// `DeviceAccess` if permission is denied or no device is present.
    async fn open(&self) -> Result<Box<dyn VideoStream>>;
}

/// An acquired, bound video stream.
#[async_trait]
pub trait VideoStream: Send {
    fn is_active(&self) -> bool;

    async fn capture_frame(&mut self) -> Result<Frame>;
}
