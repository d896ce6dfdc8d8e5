//! Measurement configuration (strict YAML parsing).

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// Options read by the measurement engine and by the measuring middleware.
///
/// ```yaml
/// service: billing
/// grouped_status: true
/// ignored_paths: ["/healthz", "/readyz"]
/// use_route_pattern: true
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Service label attached to every observation.
    pub service: String,

    /// Report status classes (`2xx`, `4xx`) instead of exact codes.
    pub grouped_status: bool,

    pub disable_measure_size: bool,
    pub disable_measure_inflight: bool,

    /// Handler ids (or paths, when no id is given) that are never measured.
    pub ignored_paths: HashSet<String>,

    /// Label requests with the router's matched template (`/users/{id}`)
    /// instead of the raw request path.
    pub use_route_pattern: bool,
}

impl Config {
    pub fn from_yaml_str(s: &str) -> Result<Self, Error> {
        let cfg: Config = serde_yaml::from_str(s)
            .map_err(|e| Error::Config(format!("invalid yaml: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {} failed: {e}", path.display())))?;
        Self::from_yaml_str(&s)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.ignored_paths.iter().any(String::is_empty) {
            return Err(Error::Config("ignored_paths must not contain empty entries".into()));
        }
        Ok(())
    }
}
