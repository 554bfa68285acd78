// Core modules
pub mod camera;
pub mod common;
pub mod core;
pub mod engine;
pub mod storage;

// Re-export commonly used types
pub use camera::{CaptureDevice, V4l2Device, VideoStream};
pub use common::{Config, FaceScanError, Result};
pub use crate::core::{
    authenticate_user, enroll_user, Frame, ScanOrchestrator, ScanResult, ScanStatus, ScanStep,
    Template, VerificationCoordinator, VerifyFailure, VerifyOutcome, VerifyResult,
};
pub use engine::{FaceMatchingEngine, ServiceEngine};
pub use storage::{
    CachedTemplateSource, EnrollRequest, TemplateLookup, TemplateRecord, TemplateSink,
    TemplateSource, UserStore,
};
