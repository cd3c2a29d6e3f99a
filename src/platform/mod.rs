//! Platform capability detection and the host service backends
pub mod managed;

pub use managed::ManagedSettings;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Operating systems with a managed-settings backend
const SUPPORTED_OS: &[&str] = &["linux", "macos", "windows"];

/// Whether shielding and monitoring are available on this host
#[derive(Debug)]
pub enum Capability<H> {
    Supported(H),
    Unsupported(String),
}

impl<H> Capability<H> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported(_))
    }

    pub fn map<T>(self, f: impl FnOnce(H) -> T) -> Capability<T> {
        match self {
            Capability::Supported(handle) => Capability::Supported(f(handle)),
            Capability::Unsupported(reason) => Capability::Unsupported(reason),
        }
    }
}

/// Host OS version as `major[.minor]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
}

impl OsVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl FromStr for OsVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| format!("Invalid version: '{}'", s))?
            .parse::<u32>()
            .map_err(|_| format!("Invalid major version in '{}'", s))?;
        let minor = match parts.next() {
            Some(p) => p
                .parse::<u32>()
                .map_err(|_| format!("Invalid minor version in '{}'", s))?,
            None => 0,
        };
        // Patch level is ignored
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for OsVersion {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OsVersion> for String {
    fn from(version: OsVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Description of the running host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
    pub version: Option<OsVersion>,
}

impl HostInfo {
    /// The current host; the OS version is only known when configured
    pub fn current(version: Option<OsVersion>) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version,
        }
    }

    /// Human readable platform string, e.g. "linux x86_64"
    pub fn platform_version(&self) -> String {
        match self.version {
            Some(version) => format!("{} {} ({})", self.os, version, self.arch),
            None => format!("{} {}", self.os, self.arch),
        }
    }
}

/// Decide once whether this host can shield and monitor apps
pub fn resolve_capability<H>(
    host: &HostInfo,
    minimum: Option<OsVersion>,
    handle: impl FnOnce() -> H,
) -> Capability<H> {
    if !SUPPORTED_OS.contains(&host.os.as_str()) {
        return Capability::Unsupported(format!("No app shielding backend for {}", host.os));
    }

    if let Some(minimum) = minimum {
        match host.version {
            None => {
                return Capability::Unsupported(format!(
                    "{} {}+ required but the host version is unknown",
                    host.os, minimum
                ));
            }
            Some(version) if version < minimum => {
                return Capability::Unsupported(format!(
                    "{} {}+ required (found {})",
                    host.os, minimum, version
                ));
            }
            Some(_) => {}
        }
    }

    Capability::Supported(handle())
}

/// Get the platform-specific managed settings directory
pub fn default_managed_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/etc/app-limiter/managed"))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from(
            "/Library/Application Support/app-limiter/managed",
        ))
    }

    #[cfg(target_os = "windows")]
    {
        let mut path = PathBuf::from(
            std::env::var("ProgramData")
                .unwrap_or_else(|_| "C:\\ProgramData".to_string()),
        );
        path.push("app-limiter");
        path.push("managed");
        Ok(path)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}

/// Get the directory holding the persisted selection records
pub fn default_storage_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        // Try system location first, fall back to user location
        let system_path = PathBuf::from("/var/lib/app-limiter");
        if system_path.exists() {
            return Ok(system_path);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "app-limiter") {
            return Ok(dirs.data_local_dir().to_path_buf());
        }

        anyhow::bail!("Could not determine storage location");
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from("/Library/Application Support/app-limiter/state"))
    }

    #[cfg(target_os = "windows")]
    {
        let mut path = PathBuf::from(
            std::env::var("ProgramData")
                .unwrap_or_else(|_| "C:\\ProgramData".to_string()),
        );
        path.push("app-limiter");
        path.push("state");
        Ok(path)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}
