pub mod cache;
pub mod user_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::core::types::Template;

pub use cache::CachedTemplateSource;
pub use user_store::{validate_user_id, UserRecord, UserStore};

/// Stored template lookup result. `face_scan` is `None` when the user never enrolled.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TemplateRecord {
    pub face_scan: Option<Template>,
}

/// Request to persist a freshly captured template for a user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EnrollRequest {
    pub user_id: String,
    pub face_scan: Template,
}

/// State of a template lookup as seen by the verification coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateLookup {
    Loading,
    Failed(String),
    Ready(TemplateRecord),
}

#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch_template(&self, user_id: &str) -> Result<TemplateRecord>;
}

#[async_trait]
pub trait TemplateSink: Send + Sync {
    async fn store_template(&self, request: EnrollRequest) -> Result<()>;
}
