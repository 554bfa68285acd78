use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceScanError {
    #[error("Failed to load face recognition model: {0}")]
    ModelLoad(String),

    #[error("Camera access denied or unavailable: {0}")]
    DeviceAccess(String),

    #[error("Camera or face model not ready")]
    DeviceNotReady,

    #[error("A face scan is already in progress")]
    ScanInProgress,

    #[error("Face scan failed: {0}")]
    ScanCapture(String),

    #[error("{0}")]
    EngineReject(String),

    #[error("Matching engine error: {0}")]
    Engine(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl FaceScanError {
    /// Stable machine-readable code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            FaceScanError::ModelLoad(_) => "model-load-error",
            FaceScanError::DeviceAccess(_) => "device-access-error",
            FaceScanError::DeviceNotReady => "device-not-ready",
            FaceScanError::ScanInProgress => "scan-in-progress",
            FaceScanError::ScanCapture(_) => "scan-capture-error",
            FaceScanError::EngineReject(_) => "engine-reject-error",
            FaceScanError::Engine(_) => "engine-error",
            FaceScanError::Storage(_) => "storage-error",
            FaceScanError::UserNotFound(_) => "user-not-found",
            FaceScanError::Config(_) => "config-error",
            FaceScanError::Io(_) => "io-error",
            FaceScanError::Other(_) => "other-error",
        }
    }

    /// Errors that leave the orchestrator unusable until it is recreated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FaceScanError::ModelLoad(_) | FaceScanError::DeviceAccess(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FaceScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(FaceScanError::ModelLoad("x".into()).code(), "model-load-error");
        assert_eq!(FaceScanError::DeviceAccess("x".into()).code(), "device-access-error");
        assert_eq!(FaceScanError::ScanCapture("x".into()).code(), "scan-capture-error");
        assert_eq!(FaceScanError::EngineReject("x".into()).code(), "engine-reject-error");
    }

    #[test]
    fn only_init_failures_are_fatal() {
        assert!(FaceScanError::ModelLoad("x".into()).is_fatal());
        assert!(FaceScanError::DeviceAccess("x".into()).is_fatal());
        assert!(!FaceScanError::ScanCapture("x".into()).is_fatal());
        assert!(!FaceScanError::EngineReject("no face".into()).is_fatal());
    }

    #[test]
    fn engine_reject_displays_engine_message() {
        let err = FaceScanError::EngineReject("No face detected in samples".into());
        assert_eq!(err.to_string(), "No face detected in samples");
    }
}
