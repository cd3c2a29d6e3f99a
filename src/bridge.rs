//! Boundary surface exposed to the embedding application
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::LimiterConfig;
use crate::error::{LimiterError, Result};
use crate::platform::{self, Capability, HostInfo, ManagedSettings};
use crate::schedule::MonitoringSchedule;
use crate::selection::{RestrictionState, Selection, ShieldDirective};
use crate::services::{PermissionOutcome, PermissionService, PermissionStatus};
use crate::storage::FileStore;
use crate::store::{Applied, RestrictionPolicyStore};

/// Services available once the host capability check has passed
pub struct LimiterServices {
    pub store: Arc<RestrictionPolicyStore>,
    pub permissions: Arc<dyn PermissionService>,
}

impl LimiterServices {
    /// Wire the file store and managed-settings backend from configuration
    pub fn managed(config: &LimiterConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(FileStore::new(config.storage_dir()?));
        let managed = Arc::new(ManagedSettings::new(config.managed_dir()?));
        let store = RestrictionPolicyStore::new(
            storage,
            managed.clone(),
            managed.clone(),
            config.store_settings()?,
        );

        Ok(Self {
            store: Arc::new(store),
            permissions: managed,
        })
    }
}

/// App limiter handle owned by the embedding application
pub struct AppLimiter {
    host: HostInfo,
    capability: Capability<LimiterServices>,
}

impl AppLimiter {
    pub fn new(host: HostInfo, capability: Capability<LimiterServices>) -> Self {
        Self { host, capability }
    }

    /// Resolve the host capability and build the backend from configuration
    pub fn from_config(config: &LimiterConfig) -> anyhow::Result<Self> {
        let host = HostInfo::current(config.platform.os_version);

        let capability = match platform::resolve_capability(&host, config.platform.minimum_version, || ()) {
            Capability::Supported(()) => Capability::Supported(LimiterServices::managed(config)?),
            Capability::Unsupported(reason) => {
                warn!("App limiting unavailable: {}", reason);
                Capability::Unsupported(reason)
            }
        };

        Ok(Self::new(host, capability))
    }

    /// Load persisted state and re-apply the shield
    pub async fn start(&self) -> Result<RestrictionState> {
        let services = self.services()?;
        let state = services.store.load_state().await?;
        info!("App limiter ready on {}", self.host.platform_version());
        Ok(state)
    }

    pub fn platform_version(&self) -> String {
        self.host.platform_version()
    }

    pub fn is_supported(&self) -> bool {
        self.capability.is_supported()
    }

    pub async fn check_permissions(&self) -> Result<PermissionStatus> {
        self.services()?.permissions.check().await
    }

    pub async fn request_permissions(&self) -> Result<PermissionOutcome> {
        let outcome = self.services()?.permissions.request().await?;
        info!("Permission request: {}", outcome);
        Ok(outcome)
    }

    /// Shield a selection once permission is granted, requesting it if needed
    pub async fn block_apps(&self, selection: Selection) -> Result<Applied<ShieldDirective>> {
        let services = self.services()?;

        if services.permissions.check().await? != PermissionStatus::Approved {
            match services.permissions.request().await? {
                PermissionOutcome::Approved => {}
                PermissionOutcome::Denied => {
                    return Err(LimiterError::PermissionDenied(
                        "User denied permission".to_string(),
                    ));
                }
                PermissionOutcome::SettingsOpened => {
                    return Err(LimiterError::PermissionDenied(
                        "Permission pending in system settings".to_string(),
                    ));
                }
            }
        }

        services.store.set_discourage_selection(selection).await
    }

    pub async fn set_discourage_selection(&self, selection: Selection) -> Result<Applied<ShieldDirective>> {
        self.services()?.store.set_discourage_selection(selection).await
    }

    pub async fn set_encourage_selection(
        &self,
        selection: Selection,
    ) -> Result<Applied<Option<MonitoringSchedule>>> {
        self.services()?.store.set_encourage_selection(selection).await
    }

    pub async fn clear_restrictions(&self) -> Result<Applied<()>> {
        self.services()?.store.clear_restrictions().await
    }

    pub async fn state(&self) -> Result<RestrictionState> {
        self.services()?.store.state().await
    }

    fn services(&self) -> Result<&LimiterServices> {
        match &self.capability {
            Capability::Supported(services) => Ok(services),
            Capability::Unsupported(reason) => Err(LimiterError::UnsupportedPlatform(reason.clone())),
        }
    }
}
