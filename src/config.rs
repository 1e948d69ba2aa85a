//! Environment-driven service configuration.
//!
//! All settings come from environment variables, read once at startup.
//! An empty or unset `GCS_BUCKET` selects the local-file backend, with
//! `GCS_OBJECT_NAME` doubling as the file path.

use crate::error::{Result, RotaError};
use crate::schedule::Schedule;
use std::path::PathBuf;

/// Default persisted object name / local file path.
const DEFAULT_OBJECT_NAME: &str = "data.json";

/// Which blob store backend to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Single local file at `path`.
    LocalFile {
        path: PathBuf,
    },
    /// Google Cloud Storage object via the JSON API.
    Gcs {
        bucket: String,
        object: String,
        /// Static OAuth token; when `None` the GCE metadata server is used.
        access_token: Option<String>,
    },
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub schedule: Schedule,
    /// HTTP bind address.
    pub host: String,
    /// HTTP bind port.
    pub port: u16,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an environment lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let object = lookup("GCS_OBJECT_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OBJECT_NAME.to_owned());

        let storage = match lookup("GCS_BUCKET").filter(|v| !v.trim().is_empty()) {
            Some(bucket) => StorageConfig::Gcs {
                bucket: bucket.trim().to_owned(),
                object,
                access_token: lookup("GCS_ACCESS_TOKEN").filter(|v| !v.trim().is_empty()),
            },
            None => StorageConfig::LocalFile {
                path: PathBuf::from(object),
            },
        };

        let weekday_start: u8 = parse_var(&lookup, "ASSIGNMENT_WEEKDAY_START", 0)?;
        if weekday_start > 6 {
            return Err(RotaError::Config(format!(
                "ASSIGNMENT_WEEKDAY_START must be 0-6 (Monday-Sunday), got {weekday_start}"
            )));
        }
        let interval_days: u32 = parse_var(&lookup, "ASSIGNMENT_INTERVAL_DAYS", 7)?;
        if interval_days == 0 {
            return Err(RotaError::Config(
                "ASSIGNMENT_INTERVAL_DAYS must be at least 1".to_owned(),
            ));
        }
        let allow_start_today = parse_bool(&lookup, "ALLOW_ASSIGNMENT_TO_START_TODAY", false)?;

        let host = lookup("HOST")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "0.0.0.0".to_owned());
        let port: u16 = parse_var(&lookup, "PORT", 8080)?;

        Ok(Self {
            storage,
            schedule: Schedule {
                interval_days,
                weekday_start,
                allow_start_today,
            },
            host,
            port,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| RotaError::Config(format!("{name} has invalid value {raw:?}"))),
        _ => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(RotaError::Config(format!(
                "{name} has invalid value {raw:?} (expected true or false)"
            ))),
        },
        _ => Ok(default),
    }
}
