pub mod enroll;
pub mod orchestrator;
pub mod state;
pub mod types;
pub mod verify;

pub use enroll::{authenticate_user, enroll_user};
pub use orchestrator::{ScanOrchestrator, ScanStatus};
pub use state::{transition, ScanEvent, ScanStep};
pub use types::{Frame, ScanResult, Template, VerifyResult, SAMPLE_COUNT, SAMPLE_INTERVAL_MS};
pub use verify::{decide, VerificationCoordinator, VerifyFailure, VerifyOutcome};
