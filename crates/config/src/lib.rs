#![forbid(unsafe_code)]

mod cache_policy;
mod error;
mod pacing;
mod prefetch;
mod priority;

pub use cache_policy::CachePolicy;
pub use error::Error;
pub use pacing::Pacing;
pub use prefetch::{MAX_PREFETCH_COUNT, PrefetchPolicy};
pub use priority::Priority;

use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub prefetch: PrefetchPolicy,
    pub cache: CachePolicy,
}

impl Config {
    /// Default configuration, no file involved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file. Missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InvalidPath(path.to_path_buf()));
        }
        let config: Self = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()?;
        Ok(config)
    }

    /// Render the configuration as a TOML document.
    pub fn to_toml(&self) -> Result<String, Error> {
        Ok(toml_edit::ser::to_string_pretty(self)?)
    }

    /// Write the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
