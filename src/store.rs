use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{LimiterError, Result};
use crate::schedule::{MonitoringSchedule, ScheduleTemplate};
use crate::selection::{RestrictionState, Selection, ShieldDirective};
use crate::services::{ActivityMonitorService, ShieldService};
use crate::storage::{self, BLOCKING_KEY, DISCOURAGE_KEY, ENCOURAGE_KEY, KeyValueStore};

/// Tunables for the policy store
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub template: ScheduleTemplate,
    /// Upper bound for every shield/monitor call
    pub service_timeout: Duration,
    /// Start monitoring even when the encourage selection is empty
    pub monitor_empty_selection: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            template: ScheduleTemplate::default(),
            service_timeout: Duration::from_secs(10),
            monitor_empty_selection: false,
        }
    }
}

/// Result of a mutation that was applied to the OS services.
///
/// A failed write does not fail the operation: the in-memory state stays
/// authoritative and the error is handed back for the caller to report.
#[derive(Debug)]
pub struct Applied<T> {
    pub value: T,
    pub persistence_error: Option<LimiterError>,
}

impl<T> Applied<T> {
    pub fn persisted(&self) -> bool {
        self.persistence_error.is_none()
    }
}

enum Lifecycle {
    Uninitialized,
    Ready(RestrictionState),
}

impl Lifecycle {
    fn ready_mut(&mut self) -> Result<&mut RestrictionState> {
        match self {
            Lifecycle::Ready(state) => Ok(state),
            Lifecycle::Uninitialized => Err(LimiterError::NotReady),
        }
    }
}

/// Owns the discourage/encourage selections and pushes the derived
/// shield and monitoring directives to the OS services
pub struct RestrictionPolicyStore {
    storage: Arc<dyn KeyValueStore>,
    shield: Arc<dyn ShieldService>,
    monitor: Arc<dyn ActivityMonitorService>,
    settings: StoreSettings,
    lifecycle: Mutex<Lifecycle>,
}

impl RestrictionPolicyStore {
    /// Create an uninitialized store; call [`load_state`](Self::load_state) before mutating
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        shield: Arc<dyn ShieldService>,
        monitor: Arc<dyn ActivityMonitorService>,
        settings: StoreSettings,
    ) -> Self {
        Self {
            storage,
            shield,
            monitor,
            settings,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Load persisted selections and re-apply the shield.
    ///
    /// Each record degrades to its default independently when missing or
    /// corrupt. Calling this again on a ready store returns the current state.
    pub async fn load_state(&self) -> Result<RestrictionState> {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Lifecycle::Ready(state) = &*lifecycle {
            debug!("Restriction state already loaded");
            return Ok(state.clone());
        }

        let state = RestrictionState {
            discourage_selection: load_or_default(self.storage.as_ref(), DISCOURAGE_KEY),
            encourage_selection: load_or_default(self.storage.as_ref(), ENCOURAGE_KEY),
            blocking: load_or_default(self.storage.as_ref(), BLOCKING_KEY),
        };

        info!(
            "Loaded restriction state: {} discouraged, {} encouraged",
            state.discourage_selection.len(),
            state.encourage_selection.len()
        );

        // The OS shield does not survive the host app's lifecycle
        if let Some(selection) = state.shield_directive() {
            match self.apply_shield(Some(&selection)).await {
                Ok(()) => info!("Re-applied shield to {} targets", selection.len()),
                Err(e) => warn!("Failed to re-apply shield after load: {}", e),
            }
        }

        *lifecycle = Lifecycle::Ready(state.clone());
        Ok(state)
    }

    /// Current state snapshot
    pub async fn state(&self) -> Result<RestrictionState> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Ready(state) => Ok(state.clone()),
            Lifecycle::Uninitialized => Err(LimiterError::NotReady),
        }
    }

    pub async fn is_ready(&self) -> bool {
        matches!(&*self.lifecycle.lock().await, Lifecycle::Ready(_))
    }

    /// Replace the discourage selection, persist it and shield it
    pub async fn set_discourage_selection(&self, selection: Selection) -> Result<Applied<ShieldDirective>> {
        let mut lifecycle = self.lifecycle.lock().await;
        let state = lifecycle.ready_mut()?;

        state.discourage_selection = selection;
        state.blocking = true;
        let persistence_error = self.persist(state);

        let directive = state.shield_directive();
        self.apply_shield(directive.as_ref()).await?;

        match &directive {
            Some(selection) => info!("Shield applied to {} targets", selection.len()),
            None => info!("Shield removed (empty discourage selection)"),
        }

        Ok(Applied {
            value: directive,
            persistence_error,
        })
    }

    /// Replace the encourage selection, persist it and restart monitoring.
    ///
    /// Returns the submitted schedule, or `None` when monitoring was only
    /// stopped because the selection is empty.
    pub async fn set_encourage_selection(
        &self,
        selection: Selection,
    ) -> Result<Applied<Option<MonitoringSchedule>>> {
        let mut lifecycle = self.lifecycle.lock().await;
        let state = lifecycle.ready_mut()?;

        state.encourage_selection = selection;
        let persistence_error = self.persist(state);

        let schedule = self.settings.template.schedule_for(&state.encourage_selection);

        self.bounded("stop monitoring", self.monitor.stop_monitoring())
            .await?;

        if schedule.is_empty() && !self.settings.monitor_empty_selection {
            info!("Encourage selection is empty, monitoring stopped");
            return Ok(Applied {
                value: None,
                persistence_error,
            });
        }

        self.bounded("start monitoring", self.monitor.start_monitoring(&schedule))
            .await?;

        info!(
            "Monitoring '{}' from {} to {}",
            schedule.activity,
            schedule.window.start.format("%H:%M"),
            schedule.window.end.format("%H:%M")
        );

        Ok(Applied {
            value: Some(schedule),
            persistence_error,
        })
    }

    /// Remove the shield and forget the discourage selection.
    ///
    /// Monitoring is left untouched.
    pub async fn clear_restrictions(&self) -> Result<Applied<()>> {
        let mut lifecycle = self.lifecycle.lock().await;
        let state = lifecycle.ready_mut()?;

        state.discourage_selection = Selection::new();
        state.blocking = false;
        let persistence_error = self.persist(state);

        self.apply_shield(None).await?;
        info!("Restrictions cleared");

        Ok(Applied {
            value: (),
            persistence_error,
        })
    }

    async fn apply_shield(&self, directive: Option<&Selection>) -> Result<()> {
        self.bounded("apply shield", self.shield.apply_shield(directive))
            .await
    }

    /// Run a service call under the configured timeout
    async fn bounded<F, T>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let after = self.settings.service_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => Err(LimiterError::Timeout { operation, after }),
        }
    }

    /// Write every record so a previously failed write is retried
    fn persist(&self, state: &RestrictionState) -> Option<LimiterError> {
        let storage = self.storage.as_ref();
        let results = [
            storage::write_record(storage, DISCOURAGE_KEY, &state.discourage_selection),
            storage::write_record(storage, ENCOURAGE_KEY, &state.encourage_selection),
            storage::write_record(storage, BLOCKING_KEY, &state.blocking),
        ];

        let mut first_error = None;
        for err in results.into_iter().filter_map(|r| r.err()) {
            warn!("{}", err);
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
        first_error
    }
}

fn load_or_default<T: DeserializeOwned + Default>(storage: &dyn KeyValueStore, key: &str) -> T {
    match storage::read_record(storage, key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!("No persisted record for {}, using default", key);
            T::default()
        }
        Err(e) => {
            warn!("Ignoring unreadable record: {}", e);
            T::default()
        }
    }
}
