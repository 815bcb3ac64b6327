//! Runtime configuration for the allocation service.
//!
//! Values come from the environment:
//! - `STOCKLINE_NOTIFY_ADDRESS`: recipient of out-of-stock notices
//!   (default `stock@made.com`)
//! - `STOCKLINE_MAX_CASCADE_DEPTH`: optional guard on event cascades
//!   (unset means unbounded)

use thiserror::Error;

pub const NOTIFY_ADDRESS_VAR: &str = "STOCKLINE_NOTIFY_ADDRESS";
pub const MAX_CASCADE_DEPTH_VAR: &str = "STOCKLINE_MAX_CASCADE_DEPTH";
pub const DEFAULT_NOTIFY_ADDRESS: &str = "stock@made.com";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationConfig {
    pub notify_address: String,
    pub max_cascade_depth: Option<usize>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            notify_address: DEFAULT_NOTIFY_ADDRESS.to_string(),
            max_cascade_depth: None,
        }
    }
}

impl AllocationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let notify_address = read(NOTIFY_ADDRESS_VAR)
            .unwrap_or_else(|| DEFAULT_NOTIFY_ADDRESS.to_string());

        let max_cascade_depth = match read(MAX_CASCADE_DEPTH_VAR) {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| ConfigError::Invalid {
                var: MAX_CASCADE_DEPTH_VAR,
                value: raw.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            notify_address,
            max_cascade_depth,
        })
    }

    pub fn with_notify_address(mut self, address: impl Into<String>) -> Self {
        self.notify_address = address.into();
        self
    }

    pub fn with_max_cascade_depth(mut self, limit: Option<usize>) -> Self {
        self.max_cascade_depth = limit;
        self
    }
}
