//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Portal configuration, read from `PORTAL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// HTTP listen port.
    pub port: u16,
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Email suffix that marks an account as administrator.
    pub admin_domain: String,
    /// Version string recorded when a user accepts the agreements.
    pub agreement_version: String,
    /// Largest accepted document upload, in bytes.
    pub max_upload_bytes: u64,
    /// CORS origin for the view layer. `None` allows any origin.
    pub allowed_origin: Option<String>,
    /// Sessions without a live WebSocket are pruned after this much inactivity.
    pub session_idle_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/portal.db"),
            admin_domain: "@admin.com".to_string(),
            agreement_version: "1.0".to_string(),
            max_upload_bytes: 5 * 1024 * 1024, // 5 MiB
            allowed_origin: None,
            session_idle_timeout: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl PortalConfig {
    /// Load from the process environment. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORTAL_PORT") {
            Some(raw) => parse_number("PORTAL_PORT", &raw)?,
            None => defaults.port,
        };

        let max_upload_bytes = match get("PORTAL_MAX_UPLOAD_BYTES") {
            Some(raw) => {
                let bytes: u64 = parse_number("PORTAL_MAX_UPLOAD_BYTES", &raw)?;
                if bytes == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "PORTAL_MAX_UPLOAD_BYTES".into(),
                        message: "must be greater than zero".into(),
                    });
                }
                bytes
            }
            None => defaults.max_upload_bytes,
        };

        let session_idle_timeout = match get("PORTAL_SESSION_IDLE_SECS") {
            Some(raw) => {
                let secs: u64 = parse_number("PORTAL_SESSION_IDLE_SECS", &raw)?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "PORTAL_SESSION_IDLE_SECS".into(),
                        message: "must be greater than zero".into(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => defaults.session_idle_timeout,
        };

        let admin_domain = get("PORTAL_ADMIN_DOMAIN").unwrap_or(defaults.admin_domain);
        if !admin_domain.starts_with('@') {
            return Err(ConfigError::InvalidValue {
                key: "PORTAL_ADMIN_DOMAIN".into(),
                message: format!("expected an email suffix like @example.com, got {admin_domain}"),
            });
        }

        Ok(Self {
            port,
            db_path: get("PORTAL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            admin_domain: admin_domain.to_lowercase(),
            agreement_version: get("PORTAL_AGREEMENT_VERSION")
                .unwrap_or(defaults.agreement_version),
            max_upload_bytes,
            allowed_origin: get("PORTAL_ALLOWED_ORIGIN"),
            session_idle_timeout,
        })
    }

    /// Whether `email` belongs to an administrator.
    pub fn is_admin_email(&self, email: &str) -> bool {
        email.trim().to_lowercase().ends_with(&self.admin_domain)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}
