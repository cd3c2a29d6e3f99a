//! App limiter: app shielding and usage monitoring selections
//!
//! The [`RestrictionPolicyStore`] owns which apps and categories are
//! discouraged (shielded) and encouraged (monitored), persists them and
//! pushes the derived directives to the host's shield and activity monitor
//! services. [`AppLimiter`] is the boundary surface for embedding
//! applications, gated on the host capability resolved at startup.

pub mod bridge;
pub mod config;
pub mod error;
pub mod platform;
pub mod schedule;
pub mod selection;
pub mod services;
pub mod storage;
pub mod store;

pub use bridge::{AppLimiter, LimiterServices};
pub use config::LimiterConfig;
pub use error::{LimiterError, Result};
pub use schedule::{ActivityEvent, DailyWindow, MonitoringSchedule, ScheduleTemplate};
pub use selection::{RestrictionState, Selection, ShieldDirective, derive_shield_directive};
pub use services::{
    ActivityMonitorService, PermissionOutcome, PermissionService, PermissionStatus, ShieldService,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::{Applied, RestrictionPolicyStore, StoreSettings};
