//! Renewal configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::error::AutocertError;

/// Settings shared by every renewal record of a manager
///
/// ```json
/// { "renew_before_days": 30, "renew_timeout_secs": 600 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RenewalConfig {
    /// How long before expiry renewal should trigger
    #[serde(default = "default_renew_before_days")]
    #[validate(range(min = 1, max = 365))]
    pub renew_before_days: u32,

    /// Ceiling for a single renewal attempt (issuance included)
    #[serde(default = "default_renew_timeout_secs")]
    #[validate(range(min = 1))]
    pub renew_timeout_secs: u64,
}

fn default_renew_before_days() -> u32 {
    30
}

fn default_renew_timeout_secs() -> u64 {
    600
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            renew_before_days: default_renew_before_days(),
            renew_timeout_secs: default_renew_timeout_secs(),
        }
    }
}

impl RenewalConfig {
    /// Lead time before expiry
    pub fn renew_before(&self) -> Duration {
        Duration::from_secs(u64::from(self.renew_before_days) * 24 * 3600)
    }

    /// Bound on one renewal attempt
    pub fn renew_timeout(&self) -> Duration {
        Duration::from_secs(self.renew_timeout_secs)
    }

    /// Check value ranges
    pub fn check(&self) -> Result<(), AutocertError> {
        self.validate()
            .map_err(|e| AutocertError::Config(e.to_string()))
    }
}
