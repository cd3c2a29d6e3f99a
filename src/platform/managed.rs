use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{LimiterError, Result};
use crate::schedule::MonitoringSchedule;
use crate::selection::Selection;
use crate::services::{
    ActivityMonitorService, PermissionOutcome, PermissionService, PermissionStatus, ShieldService,
};

const SHIELD_FILE: &str = "shield.json";
const MONITORING_FILE: &str = "monitoring.json";
const PROBE_FILE: &str = ".write-probe";

/// Shield document consumed by the host enforcement agent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShieldDocument {
    pub applications: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

/// Monitoring document consumed by the host enforcement agent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitoringDocument {
    /// Schedules keyed by activity name
    pub activities: BTreeMap<String, MonitoringSchedule>,
    pub updated_at: DateTime<Utc>,
}

/// Managed-settings directory backend.
///
/// Shield and monitoring directives are dropped as JSON documents into a
/// directory watched by the host's enforcement agent. Permission means the
/// current process may write to that directory.
#[derive(Debug, Clone)]
pub struct ManagedSettings {
    dir: PathBuf,
}

impl ManagedSettings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn shield_path(&self) -> PathBuf {
        self.dir.join(SHIELD_FILE)
    }

    pub fn monitoring_path(&self) -> PathBuf {
        self.dir.join(MONITORING_FILE)
    }

    /// Read the shield document currently in effect
    pub async fn read_shield(&self) -> Result<Option<ShieldDocument>> {
        read_document(&self.shield_path())
            .await
            .map_err(LimiterError::shield)
    }

    /// Read the monitoring document currently in effect
    pub async fn read_monitoring(&self) -> Result<Option<MonitoringDocument>> {
        read_document(&self.monitoring_path())
            .await
            .map_err(LimiterError::monitor)
    }

    async fn can_write(&self) -> bool {
        let probe = self.dir.join(PROBE_FILE);
        match tokio::fs::write(&probe, b"").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&probe).await;
                true
            }
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ShieldService for ManagedSettings {
    async fn apply_shield(&self, directive: Option<&Selection>) -> Result<()> {
        let path = self.shield_path();
        match directive {
            Some(selection) => {
                let document = ShieldDocument {
                    applications: selection.application_ids.clone(),
                    categories: selection.category_ids.clone(),
                    updated_at: Utc::now(),
                };
                write_document(&path, &document)
                    .await
                    .map_err(LimiterError::shield)?;
                tracing::debug!("Wrote shield document: {}", path.display());
            }
            None => {
                remove_document(&path).await.map_err(LimiterError::shield)?;
                tracing::debug!("Removed shield document: {}", path.display());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityMonitorService for ManagedSettings {
    async fn start_monitoring(&self, schedule: &MonitoringSchedule) -> Result<()> {
        let path = self.monitoring_path();
        let mut activities = self
            .read_monitoring()
            .await?
            .map(|doc| doc.activities)
            .unwrap_or_default();
        activities.insert(schedule.activity.clone(), schedule.clone());

        let document = MonitoringDocument {
            activities,
            updated_at: Utc::now(),
        };
        write_document(&path, &document)
            .await
            .map_err(LimiterError::monitor)?;
        tracing::debug!("Started monitoring '{}': {}", schedule.activity, path.display());
        Ok(())
    }

    async fn stop_monitoring(&self) -> Result<()> {
        remove_document(&self.monitoring_path())
            .await
            .map_err(LimiterError::monitor)
    }
}

#[async_trait]
impl PermissionService for ManagedSettings {
    async fn check(&self) -> Result<PermissionStatus> {
        if tokio::fs::metadata(&self.dir).await.is_ok() && self.can_write().await {
            Ok(PermissionStatus::Approved)
        } else {
            Ok(PermissionStatus::Denied)
        }
    }

    async fn request(&self) -> Result<PermissionOutcome> {
        match tokio::fs::create_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                tracing::warn!("Cannot create {}: {}", self.dir.display(), e);
                return Ok(PermissionOutcome::Denied);
            }
            Err(e) => {
                return Err(LimiterError::PermissionDenied(format!(
                    "Failed to prepare {}: {}",
                    self.dir.display(),
                    e
                )));
            }
        }

        if self.can_write().await {
            Ok(PermissionOutcome::Approved)
        } else {
            Ok(PermissionOutcome::Denied)
        }
    }
}

async fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> std::io::Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

async fn write_document<T: Serialize>(path: &Path, document: &T) -> std::io::Result<()> {
    let content = serde_json::to_vec_pretty(document)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Write then rename so the agent never sees a partial document
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, &content).await?;
    tokio::fs::rename(&temp_path, path).await
}

async fn remove_document(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleTemplate;

    #[tokio::test]
    async fn shield_document_written_and_removed() {
        let temp = tempfile::tempdir().unwrap();
        let managed = ManagedSettings::new(temp.path());
        let selection = Selection::from_ids(["com.x"], ["games"]);

        managed.apply_shield(Some(&selection)).await.unwrap();
        let document = managed.read_shield().await.unwrap().unwrap();
        assert_eq!(document.applications, selection.application_ids);
        assert_eq!(document.categories, selection.category_ids);

        managed.apply_shield(None).await.unwrap();
        assert!(managed.read_shield().await.unwrap().is_none());
        assert!(!managed.shield_path().exists());
    }

    #[tokio::test]
    async fn removing_absent_shield_is_ok() {
        let temp = tempfile::tempdir().unwrap();
        let managed = ManagedSettings::new(temp.path());
        managed.apply_shield(None).await.unwrap();
    }

    #[tokio::test]
    async fn monitoring_start_and_stop() {
        let temp = tempfile::tempdir().unwrap();
        let managed = ManagedSettings::new(temp.path().join("managed"));
        let schedule = ScheduleTemplate::default().schedule_for(&Selection::from_ids(["com.y"], Vec::<String>::new()));

        managed.stop_monitoring().await.unwrap();
        managed.start_monitoring(&schedule).await.unwrap();

        let document = managed.read_monitoring().await.unwrap().unwrap();
        assert_eq!(document.activities.get("daily"), Some(&schedule));

        managed.stop_monitoring().await.unwrap();
        assert!(managed.read_monitoring().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_shield_document_is_service_error() {
        let temp = tempfile::tempdir().unwrap();
        let managed = ManagedSettings::new(temp.path());
        std::fs::write(managed.shield_path(), "not json").unwrap();

        let err = managed.read_shield().await.unwrap_err();
        assert!(matches!(err, LimiterError::ServiceUnavailable { service: "shield", .. }));
    }

    #[tokio::test]
    async fn permission_denied_until_directory_exists() {
        let temp = tempfile::tempdir().unwrap();
        let managed = ManagedSettings::new(temp.path().join("managed"));

        assert_eq!(managed.check().await.unwrap(), PermissionStatus::Denied);
        assert_eq!(managed.request().await.unwrap(), PermissionOutcome::Approved);
        assert_eq!(managed.check().await.unwrap(), PermissionStatus::Approved);
        // Probe file is cleaned up
        assert!(!managed.dir().join(PROBE_FILE).exists());
    }
}
