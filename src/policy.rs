//! Refresh rate policy: the default config plus the allowed fps window.

use crate::catalog::ConfigCatalog;
use crate::error::RefreshRateError;
use crate::refresh_rate::{fps_equal, ConfigId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Snapshot of the active policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub default_config_id: ConfigId,
    pub min_refresh_rate: f32,
    pub max_refresh_rate: f32,
}

impl Policy {
    /// Unrestricted policy used before the first update: every config is allowed.
    pub fn unrestricted(default_config_id: ConfigId) -> Self {
        Self {
            default_config_id,
            min_refresh_rate: 0.0,
            max_refresh_rate: f32::MAX,
        }
    }

    /// Check the policy against the catalog.
    ///
    /// The default config must exist and its fps must fall inside the window,
    /// which guarantees a non-empty candidate list.
    pub fn validate(&self, catalog: &ConfigCatalog) -> Result<(), RefreshRateError> {
        let default = catalog.get(self.default_config_id).ok_or_else(|| {
            RefreshRateError::InvalidArgument(format!(
                "default config {} is not a supported display config",
                self.default_config_id
            ))
        })?;

        if self.min_refresh_rate.is_nan() || self.max_refresh_rate.is_nan() {
            return Err(RefreshRateError::InvalidArgument(
                "refresh rate bounds must be numbers".to_string(),
            ));
        }

        if self.min_refresh_rate > self.max_refresh_rate {
            return Err(RefreshRateError::InvalidArgument(format!(
                "min refresh rate ({}) cannot be greater than max refresh rate ({})",
                self.min_refresh_rate, self.max_refresh_rate
            )));
        }

        if !default.in_policy(self.min_refresh_rate, self.max_refresh_rate) {
            return Err(RefreshRateError::InvalidArgument(format!(
                "default config {} ({}) is outside [{}, {}]",
                self.default_config_id, default.name, self.min_refresh_rate, self.max_refresh_rate
            )));
        }

        Ok(())
    }

    /// Whether `other` differs from this policy in any field, fps compared under tolerance.
    pub fn differs_from(&self, other: &Policy) -> bool {
        self.default_config_id != other.default_config_id
            || !fps_equal(self.min_refresh_rate, other.min_refresh_rate)
            || !fps_equal(self.max_refresh_rate, other.max_refresh_rate)
    }

    /// Config ids allowed by this policy, lowest fps first, ties by config id.
    pub fn candidate_ids(&self, catalog: &ConfigCatalog) -> Vec<ConfigId> {
        let mut candidates: Vec<_> = catalog
            .all_refresh_rates()
            .values()
            .filter(|rate| rate.in_policy(self.min_refresh_rate, self.max_refresh_rate))
            .collect();
        candidates.sort_by(|a, b| {
            a.fps
                .partial_cmp(&b.fps)
                .unwrap_or(Ordering::Equal)
                .then(a.config_id.cmp(&b.config_id))
        });
        candidates.into_iter().map(|rate| rate.config_id).collect()
    }
}
