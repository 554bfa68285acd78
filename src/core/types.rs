use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of samples captured per scan.
pub const SAMPLE_COUNT: usize = 3;

/// Delay before every sample after the first.
pub const SAMPLE_INTERVAL_MS: u64 = 1000;

/// One captured camera frame. The pixel encoding is the engine's concern.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub fourcc: String,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, fourcc: impl Into<String>, data: Vec<u8>) -> Self {
        Self { width, height, fourcc: fourcc.into(), data }
    }
}

/// Opaque biometric template (fuzzy hash) produced by the matching engine.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Template(String);

impl Template {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short digest safe to log in place of the template itself.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl From<&str> for Template {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Template {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// Templates are biometric data; keep them out of debug output.
impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Template({})", self.fingerprint())
    }
}

/// Output of the engine's `scan_face`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub success: bool,
    #[serde(default)]
    pub fuzzy_hash: Option<Template>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ScanResult {
    pub fn accepted(fuzzy_hash: impl Into<Template>) -> Self {
        Self {
            success: true,
            fuzzy_hash: Some(fuzzy_hash.into()),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            fuzzy_hash: None,
            message: Some(message.into()),
        }
    }
}

/// Output of the engine's `verify_face_scan`.
///
/// `success == false` means the comparison could not be performed at all;
/// `success == true && !is_match` is a legitimate non-match.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub success: bool,
    pub is_match: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl VerifyResult {
    pub fn matched() -> Self {
        Self { success: true, is_match: true, message: None }
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        Self { success: true, is_match: false, message: Some(message.into()) }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, is_match: false, message: Some(message.into()) }
    }
}
