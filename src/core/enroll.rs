use crate::common::{FaceScanError, Result};
use crate::core::orchestrator::ScanOrchestrator;
use crate::core::types::{ScanResult, Template};
use crate::core::verify::{VerificationCoordinator, VerifyOutcome};
use crate::storage::{validate_user_id, EnrollRequest, TemplateSink};

/// Scan a face and store the template for `user_id`. Nothing is stored unless the scan succeeds.
pub async fn enroll_user(
    orchestrator: &ScanOrchestrator,
    sink: &dyn TemplateSink,
    user_id: &str,
) -> Result<Template> {
    validate_user_id(user_id)?;

    let result = orchestrator.start_scan().await?;
    let template = result
        .fuzzy_hash
        .ok_or_else(|| FaceScanError::EngineReject("Face scan returned no template".into()))?;

    sink.store_template(EnrollRequest {
        user_id: user_id.to_string(),
        face_scan: template.clone(),
    })
    .await?;

    tracing::info!("Enrolled user {} with template {}", user_id, template.fingerprint());
    Ok(template)
}

/// Scan a face and check it against `user_id`'s stored template.
pub async fn authenticate_user(
    orchestrator: &ScanOrchestrator,
    coordinator: &VerificationCoordinator,
    user_id: &str,
) -> VerifyOutcome {
    let scan = match orchestrator.start_scan().await {
        Ok(scan) => scan,
        Err(e) => ScanResult::rejected(e.to_string()),
    };
    coordinator.verify_face(&scan, user_id).await
}
