use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::types::{ScanResult, VerifyResult};
use crate::engine::FaceMatchingEngine;
use crate::storage::{TemplateLookup, TemplateSource};

pub const NO_TEMPLATE_MESSAGE: &str = "No registered user found with this ID";
pub const MISMATCH_MESSAGE: &str = "Face does not match the registered user";
pub const VERIFICATION_FAILED_MESSAGE: &str = "Face verification failed";

/// Why a verification did not authenticate the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyFailure {
    TemplateFetchError,
    ScanFailed,
    NoRegisteredTemplate,
    /// Comparison ran and the templates are too far apart.
    VerificationMismatch,
    /// Comparison could not be performed, or the engine call itself failed.
    VerificationFailed,
}

impl VerifyFailure {
    pub fn code(&self) -> &'static str {
        match self {
            VerifyFailure::TemplateFetchError => "template-fetch-error",
            VerifyFailure::ScanFailed => "scan-failed",
            VerifyFailure::NoRegisteredTemplate => "no-registered-template",
            VerifyFailure::VerificationMismatch => "verification-mismatch",
            VerifyFailure::VerificationFailed => "verification-failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum VerifyOutcome {
    Authenticated,
    Rejected { reason: VerifyFailure, message: String },
}

impl VerifyOutcome {
    fn rejected(reason: VerifyFailure, message: impl Into<String>) -> Self {
        VerifyOutcome::Rejected { reason, message: message.into() }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, VerifyOutcome::Authenticated)
    }

    pub fn reason(&self) -> Option<VerifyFailure> {
        match self {
            VerifyOutcome::Authenticated => None,
            VerifyOutcome::Rejected { reason, .. } => Some(*reason),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            VerifyOutcome::Authenticated => None,
            VerifyOutcome::Rejected { message, .. } => Some(message),
        }
    }
}

/// Turns a fresh scan plus a user id into an authentication decision.
///
/// Never returns an error: every failure is reduced to a rejected outcome.
pub struct VerificationCoordinator {
    engine: Arc<dyn FaceMatchingEngine>,
    templates: Arc<dyn TemplateSource>,
    engine_timeout: Option<Duration>,
    in_flight: AtomicUsize,
}

impl VerificationCoordinator {
    pub fn new(engine: Arc<dyn FaceMatchingEngine>, templates: Arc<dyn TemplateSource>) -> Self {
        Self {
            engine,
            templates,
            engine_timeout: None,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_engine_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.engine_timeout = timeout;
        self
    }

    /// True while at least one `verify_face` call is pending.
    pub fn is_verifying(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn verify_face(&self, scan: &ScanResult, user_id: &str) -> VerifyOutcome {
        let _in_flight = InFlight::enter(&self.in_flight);
        let lookup = match self.templates.fetch_template(user_id).await {
            Ok(record) => TemplateLookup::Ready(record),
            Err(e) => TemplateLookup::Failed(e.to_string()),
        };
        let outcome = self.verify_with_lookup(scan, &lookup).await;

        match &outcome {
            VerifyOutcome::Authenticated => tracing::info!("User {} authenticated", user_id),
            VerifyOutcome::Rejected { reason, message } => {
                tracing::info!("User {} rejected ({}): {}", user_id, reason.code(), message)
            }
        }
        outcome
    }

    /// Decide from an already-resolved template lookup.
    ///
    /// Checks run in order and stop at the first failure: lookup state, scan
    /// success, then template presence. The engine is only called when all pass.
    pub async fn verify_with_lookup(
        &self,
        scan: &ScanResult,
        lookup: &TemplateLookup,
    ) -> VerifyOutcome {
        let record = match lookup {
            TemplateLookup::Ready(record) => record,
            TemplateLookup::Failed(err) => {
                return VerifyOutcome::rejected(
                    VerifyFailure::TemplateFetchError,
                    format!("Failed to fetch face template: {}", err),
                );
            }
            TemplateLookup::Loading => {
                return VerifyOutcome::rejected(
                    VerifyFailure::TemplateFetchError,
                    "Face template is still loading",
                );
            }
        };

        let candidate = match (scan.success, &scan.fuzzy_hash) {
            (true, Some(candidate)) => candidate,
            _ => {
                let message = scan
                    .message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Face scan failed".to_string());
                return VerifyOutcome::rejected(VerifyFailure::ScanFailed, message);
            }
        };

        let Some(stored) = &record.face_scan else {
            return VerifyOutcome::rejected(
                VerifyFailure::NoRegisteredTemplate,
                NO_TEMPLATE_MESSAGE,
            );
        };

        tracing::debug!(
            "Comparing template {} against stored {}",
            candidate.fingerprint(),
            stored.fingerprint()
        );

        let call = self.engine.verify_face_scan(candidate, stored);
        let result = match self.engine_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.ok(),
            None => Some(call.await),
        };

        match result {
            Some(Ok(result)) => decide(result),
            Some(Err(e)) => {
                tracing::error!("Face verification error: {}", e);
                VerifyOutcome::rejected(
                    VerifyFailure::VerificationFailed,
                    VERIFICATION_FAILED_MESSAGE,
                )
            }
            None => {
                tracing::error!("Face verification timed out");
                VerifyOutcome::rejected(
                    VerifyFailure::VerificationFailed,
                    VERIFICATION_FAILED_MESSAGE,
                )
            }
        }
    }
}

/// Counts a pending `verify_face` call until its future completes or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Authenticated iff the comparison ran and matched. Without an engine message
/// both rejections read as a generic mismatch; the reason code tells them apart.
pub fn decide(result: VerifyResult) -> VerifyOutcome {
    let message = result.message.filter(|m| !m.is_empty());
    match (result.success, result.is_match) {
        (true, true) => VerifyOutcome::Authenticated,
        (true, false) => VerifyOutcome::rejected(
            VerifyFailure::VerificationMismatch,
            message.unwrap_or_else(|| MISMATCH_MESSAGE.to_string()),
        ),
        (false, _) => VerifyOutcome::rejected(
            VerifyFailure::VerificationFailed,
            message.unwrap_or_else(|| MISMATCH_MESSAGE.to_string()),
        ),
    }
}
