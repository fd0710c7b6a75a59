//! Environment configuration.
//!
//! Values come from the process environment, after `.env` has been loaded
//! with `dotenvy`. CLI flags override whatever is read here.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `RECONCILE_STORE_PATH` | `.reconcile/records.json` |
//! | `RECONCILE_REGISTRY_DIR` | `.reconcile/mappings` |
//! | `RECONCILE_PORT` | `3000` |
//! | `RECONCILE_DEFAULT_GROUP` | unset |

use std::env;
use std::path::PathBuf;

use crate::cache::DEFAULT_REGISTRY_DIR;
use crate::store::json_file::DEFAULT_STORE_PATH;

pub const DEFAULT_PORT: u16 = 3000;

/// Runtime configuration shared by the CLI and the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub registry_dir: PathBuf,
    pub port: u16,
    /// `associatedGroup` used by imports that do not name one.
    pub default_group: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            port: DEFAULT_PORT,
            default_group: None,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable or blank values fall back to
    /// the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            store_path: read("RECONCILE_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            registry_dir: read("RECONCILE_REGISTRY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_dir),
            port: read("RECONCILE_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            default_group: read("RECONCILE_DEFAULT_GROUP"),
        }
    }

    /// Group for an import: the explicit one, else the configured default.
    pub fn group_or_default(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_group.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.port, 3000);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("RECONCILE_STORE_PATH", "/tmp/contacts.json"),
            ("RECONCILE_PORT", "8080"),
            ("RECONCILE_DEFAULT_GROUP", "Mohan Coaching"),
        ]);
        assert_eq!(cfg.store_path, PathBuf::from("/tmp/contacts.json"));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.default_group.as_deref(), Some("Mohan Coaching"));
    }

    #[test]
    fn test_bad_port_falls_back() {
        assert_eq!(config(&[("RECONCILE_PORT", "eighty")]).port, DEFAULT_PORT);
        assert_eq!(config(&[("RECONCILE_DEFAULT_GROUP", "  ")]).default_group, None);
    }

    #[test]
    fn test_group_or_default() {
        let cfg = config(&[("RECONCILE_DEFAULT_GROUP", "Mohan Coaching")]);
        assert_eq!(cfg.group_or_default(Some("Acme")).as_deref(), Some("Acme"));
        assert_eq!(cfg.group_or_default(Some(" ")).as_deref(), Some("Mohan Coaching"));
        assert_eq!(AppConfig::default().group_or_default(None), None);
    }
}
