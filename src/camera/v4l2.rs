use async_trait::async_trait;
use std::fs;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::camera::{CaptureDevice, VideoStream};
use crate::common::config::CameraConfig;
use crate::common::{FaceScanError, Result};
use crate::core::types::Frame;

const STREAM_BUFFERS: u32 = 4;

#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
    pub formats: Vec<String>,
}

/// A V4L2 camera at `/dev/video{device_index}`.
#[derive(Debug, Clone)]
pub struct V4l2Device {
    config: CameraConfig,
}

impl V4l2Device {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    /// List capture-capable `/dev/video*` devices.
    pub fn list_cameras() -> Result<Vec<CameraInfo>> {
        let mut cameras = Vec::new();

        for entry in fs::read_dir("/dev")? {
            let path = entry?.path();
            let Some(index) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("video"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            let Ok(device) = Device::new(index as usize) else { continue };
            let Ok(caps) = device.query_caps() else { continue };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }

            let formats = device
                .enum_formats()
                .unwrap_or_default()
                .iter()
                .map(|fmt| fmt.fourcc.str().unwrap_or("UNKNOWN").to_string())
                .collect();

            cameras.push(CameraInfo { index, name: caps.card.clone(), formats });
        }

        cameras.sort_by_key(|c| c.index);
        Ok(cameras)
    }

    fn open_blocking(config: &CameraConfig) -> Result<V4l2Stream> {
        let index = config.device_index;
        tracing::debug!("Opening camera device {}...", index);

        let device = Device::new(index as usize)
            .map_err(|e| {
                FaceScanError::DeviceAccess(format!("Failed to open camera {}: {}", index, e))
            })?;

        let mut fmt = device
            .format()
            .map_err(|e| FaceScanError::DeviceAccess(format!("Failed to get format: {}", e)))?;

        fmt.width = config.width;
        fmt.height = config.height;
        // Keep GREY for IR cameras, otherwise ask for MJPG
        if fmt.fourcc.repr != *b"GREY" {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        let actual = device
            .format()
            .map_err(|e| {
                FaceScanError::DeviceAccess(format!("Failed to get final format: {}", e))
            })?;
        let fourcc = actual.fourcc.str().unwrap_or("UNKNOWN").to_string();

        if actual.width != config.width || actual.height != config.height {
            tracing::warn!(
                "Camera resolution {}x{} differs from requested {}x{}",
                actual.width, actual.height, config.width, config.height
            );
        }
        tracing::info!("Camera {} bound at {}x{} {}", index, actual.width, actual.height, fourcc);

        let mmap = MmapStream::with_buffers(&device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| FaceScanError::DeviceAccess(format!("Failed to create stream: {}", e)))?;

        let session = CaptureSession::start(
            mmap,
            actual.width,
            actual.height,
            fourcc,
            config.warmup_frames,
            Duration::from_millis(config.warmup_delay_ms),
        )?;

        Ok(V4l2Stream {
            session: Arc::new(Mutex::new(session)),
            active: true,
        })
    }
}

#[async_trait]
impl CaptureDevice for V4l2Device {
    async fn open(&self) -> Result<Box<dyn VideoStream>> {
        let config = self.config.clone();
        let stream = tokio::task::spawn_blocking(move || Self::open_blocking(&config))
            .await
            .map_err(|e| FaceScanError::DeviceAccess(format!("Camera task failed: {}", e)))??;
        Ok(Box::new(stream))
    }
}

/// Owns the mmap stream for as long as the camera is bound, so warmup frames
/// and samples are read from the same stream.
struct CaptureSession<S> {
    stream: S,
    width: u32,
    height: u32,
    fourcc: String,
}

impl<S> CaptureSession<S>
where
    S: for<'b> CaptureStream<'b, Item = [u8]>,
{
    fn start(
        mut stream: S,
        width: u32,
        height: u32,
        fourcc: String,
        warmup_frames: u32,
        warmup_delay: Duration,
    ) -> Result<Self> {
        // IR emitters need a few frames before the image settles
        for i in 0..warmup_frames {
            stream.next().map_err(|e| {
                FaceScanError::DeviceAccess(format!("Failed to capture warmup frame {}: {}", i, e))
            })?;
            if !warmup_delay.is_zero() {
                std::thread::sleep(warmup_delay);
            }
        }
        if warmup_frames > 0 {
            tracing::debug!("Camera warmed up with {} frames", warmup_frames);
        }

        Ok(Self { stream, width, height, fourcc })
    }

    fn capture(&mut self) -> Result<Frame> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| FaceScanError::ScanCapture(format!("Failed to capture: {}", e)))?;

        // MJPG buffers are only partially filled
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        Ok(Frame::new(self.width, self.height, self.fourcc.clone(), buf[..used].to_vec()))
    }
}

pub struct V4l2Stream {
    session: Arc<Mutex<CaptureSession<MmapStream<'static>>>>,
    active: bool,
}

#[async_trait]
impl VideoStream for V4l2Stream {
    fn is_active(&self) -> bool {
        self.active
    }

    async fn capture_frame(&mut self) -> Result<Frame> {
        let session = self.session.clone();

        let frame = tokio::task::spawn_blocking(move || {
            let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
            session.capture()
        })
        .await
        .map_err(|e| FaceScanError::ScanCapture(format!("Camera task failed: {}", e)))?;

        if let Err(FaceScanError::ScanCapture(msg)) = &frame {
            if msg.contains("No such device") {
                tracing::error!("Camera disconnected");
                self.active = false;
            }
        }
        frame
    }
}
