use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::common::{default_data_dir, FaceScanError, Result};
use crate::core::types::Template;
use crate::storage::{EnrollRequest, TemplateRecord, TemplateSink, TemplateSource};

const STORAGE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserRecord {
    pub version: u32,
    pub user_id: String,
    pub face_scan: Option<Template>,
    pub enrolled_at: Option<DateTime<Utc>>,
}

/// One bincode file per user under `data_dir`.
#[derive(Debug, Clone)]
pub struct UserStore {
    data_dir: PathBuf,
}

impl UserStore {
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        std::fs::create_dir_all(&data_dir)?;
        tracing::debug!("UserStore using directory: {:?}", data_dir);
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn user_file(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.data_dir.join(format!("{}.bincode", user_id)))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserRecord> {
        let user_file = self.user_file(user_id)?;

        let data = match tokio::fs::read(&user_file).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FaceScanError::UserNotFound(user_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut record: UserRecord = bincode::deserialize(&data)
            .map_err(|e| FaceScanError::Storage(format!("Failed to deserialize: {}", e)))?;

        if record.version < STORAGE_VERSION {
            record.version = STORAGE_VERSION;
        }

        Ok(record)
    }

    pub async fn save_user(&self, record: &UserRecord) -> Result<()> {
        let user_file = self.user_file(&record.user_id)?;
        let encoded = bincode::serialize(record)
            .map_err(|e| FaceScanError::Storage(format!("Failed to serialize: {}", e)))?;

        // Write then rename so a crash never leaves a truncated record
        let tmp_file = user_file.with_extension("bincode.tmp");
        tokio::fs::write(&tmp_file, encoded).await?;
        tokio::fs::rename(&tmp_file, &user_file).await?;
        Ok(())
    }

    pub async fn remove_user(&self, user_id: &str) -> Result<bool> {
        let user_file = self.user_file(user_id)?;
        match tokio::fs::remove_file(user_file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TemplateSource for UserStore {
    async fn fetch_template(&self, user_id: &str) -> Result<TemplateRecord> {
        match self.get_user(user_id).await {
            Ok(record) => Ok(TemplateRecord { face_scan: record.face_scan }),
            Err(FaceScanError::UserNotFound(_)) => Ok(TemplateRecord::default()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TemplateSink for UserStore {
    async fn store_template(&self, request: EnrollRequest) -> Result<()> {
        let record = UserRecord {
            version: STORAGE_VERSION,
            user_id: request.user_id,
            face_scan: Some(request.face_scan),
            enrolled_at: Some(Utc::now()),
        };
        self.save_user(&record).await?;
        tracing::info!(
            "Stored face template {} for user {}",
            record.face_scan.as_ref().map(|t| t.fingerprint()).unwrap_or_default(),
            record.user_id
        );
        Ok(())
    }
}

/// User ids become file names, so only allow a conservative character set.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() || user_id.len() > 128 {
        return Err(FaceScanError::Storage(format!(
            "User id must be 1-128 characters, got {}", user_id.len()
        )));
    }
    if user_id.starts_with('.') {
        return Err(FaceScanError::Storage("User id must not start with '.'".into()));
    }
    if !user_id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@')) {
        return Err(FaceScanError::Storage(format!("Invalid user id: {:?}", user_id)));
    }
    Ok(())
}
