//! Collaborator interfaces for the OS facilities the policy core drives
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::schedule::MonitoringSchedule;
use crate::selection::Selection;

/// Applies or removes a shield over apps and categories
#[async_trait]
pub trait ShieldService: Send + Sync {
    /// `Some` shields exactly the given selection, `None` removes the shield
    async fn apply_shield(&self, directive: Option<&Selection>) -> Result<()>;
}

/// Time-windowed usage monitoring
#[async_trait]
pub trait ActivityMonitorService: Send + Sync {
    async fn start_monitoring(&self, schedule: &MonitoringSchedule) -> Result<()>;

    /// Stop every monitored activity; a no-op when nothing is monitored
    async fn stop_monitoring(&self) -> Result<()>;
}

/// Result of a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Approved,
    Denied,
}

/// Result of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionOutcome {
    Approved,
    Denied,
    /// System settings were opened; the final answer arrives out of band
    SettingsOpened,
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

impl fmt::Display for PermissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Denied => write!(f, "denied"),
            Self::SettingsOpened => write!(f, "settingsOpened"),
        }
    }
}

/// Capability gate in front of shielding and monitoring
#[async_trait]
pub trait PermissionService: Send + Sync {
    async fn check(&self) -> Result<PermissionStatus>;

    /// Ask for the capability; may not resolve synchronously
    async fn request(&self) -> Result<PermissionOutcome>;
}
