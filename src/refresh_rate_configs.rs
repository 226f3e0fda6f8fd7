//! Thread-shared refresh rate engine.
//!
//! The catalog and the device-wide bounds are fixed at construction and read
//! without locking. The policy, the candidate list derived from it and the
//! active config live behind a single `RwLock`; every accessor holds it only
//! long enough to copy or replace that state, and never calls out while
//! holding it.

use crate::catalog::{AllRefreshRates, ConfigCatalog};
use crate::error::RefreshRateError;
use crate::policy::Policy;
use crate::refresh_rate::{ConfigId, InputConfig, RefreshRate};
use crate::selector::{self, LayerRequirement};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, trace, warn};

/// State guarded by the engine lock.
#[derive(Debug)]
struct LockedState {
    policy: Policy,
    /// Config ids allowed by `policy`, lowest fps first. Never empty.
    available: Arc<[ConfigId]>,
    current_config_id: ConfigId,
}

/// Everything a per-frame query needs, copied out of the lock.
struct Snapshot {
    available: Arc<[ConfigId]>,
    default_config_id: ConfigId,
    current_config_id: ConfigId,
}

#[derive(Debug)]
pub struct RefreshRateConfigs {
    catalog: ConfigCatalog,
    state: RwLock<LockedState>,
}

impl RefreshRateConfigs {
    /// Build the engine from the hardware-supplied configs and the active one.
    ///
    /// The initial policy defaults to the active config and allows every rate.
    pub fn new(
        configs: &[InputConfig],
        current_config_id: ConfigId,
    ) -> Result<Self, RefreshRateError> {
        let catalog = ConfigCatalog::new(configs)?;
        if !catalog.contains(current_config_id) {
            return Err(RefreshRateError::NotFound(current_config_id));
        }

        let policy = Policy::unrestricted(current_config_id);
        let available: Arc<[ConfigId]> = policy.candidate_ids(&catalog).into();

        info!(
            "Refresh rate configs initialized: {} configs, {:.2}-{:.2}fps, current config {}",
            catalog.len(),
            catalog.min_refresh_rate().fps,
            catalog.max_refresh_rate().fps,
            current_config_id
        );

        Ok(Self {
            catalog,
            state: RwLock::new(LockedState {
                policy,
                available,
                current_config_id,
            }),
        })
    }

    // Every write replaces whole fields, so a poisoned lock still holds consistent state.
    fn read_state(&self) -> RwLockReadGuard<'_, LockedState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LockedState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Snapshot {
        let state = self.read_state();
        Snapshot {
            available: Arc::clone(&state.available),
            default_config_id: state.policy.default_config_id,
            current_config_id: state.current_config_id,
        }
    }

    /// Resolve an id that was validated when it entered the engine state.
    fn resolve(&self, config_id: ConfigId) -> &RefreshRate {
        match self.catalog.get(config_id) {
            Some(rate) => rate,
            None => unreachable!("config {config_id} entered engine state without validation"),
        }
    }

    fn resolve_all(&self, ids: &[ConfigId]) -> Vec<&RefreshRate> {
        ids.iter().map(|id| self.resolve(*id)).collect()
    }

    /// Replace the policy.
    ///
    /// Returns whether the policy differs from the previous one. On error the
    /// previous policy stays in effect.
    pub fn set_policy(
        &self,
        default_config_id: ConfigId,
        min_refresh_rate: f32,
        max_refresh_rate: f32,
    ) -> Result<bool, RefreshRateError> {
        let policy = Policy {
            default_config_id,
            min_refresh_rate,
            max_refresh_rate,
        };
        if let Err(e) = policy.validate(&self.catalog) {
            warn!("Rejected refresh rate policy: {}", e);
            return Err(e);
        }
        let available: Arc<[ConfigId]> = policy.candidate_ids(&self.catalog).into();

        let changed = {
            let mut state = self.write_state();
            let changed = policy.differs_from(&state.policy);
            state.policy = policy;
            state.available = available;
            changed
        };

        if changed {
            info!(
                "Refresh rate policy changed: default config {}, {:.2}-{:.2}fps",
                default_config_id, min_refresh_rate, max_refresh_rate
            );
        }
        Ok(changed)
    }

    pub fn get_policy(&self) -> Policy {
        self.read_state().policy
    }

    /// Whether the config's fps satisfies the current policy window.
    pub fn is_config_allowed(&self, config_id: ConfigId) -> bool {
        let Some(rate) = self.catalog.get(config_id) else {
            return false;
        };
        let policy = self.get_policy();
        rate.in_policy(policy.min_refresh_rate, policy.max_refresh_rate)
    }

    /// Best refresh rate for the frame's layer votes.
    pub fn get_refresh_rate_for_content(&self, layers: &[LayerRequirement]) -> &RefreshRate {
        let snapshot = self.snapshot();
        let candidates = self.resolve_all(&snapshot.available);
        let default = self.resolve(snapshot.default_config_id);
        let chosen = selector::select(&candidates, layers, default);
        trace!("Selected {} for {} layers", chosen.name, layers.len());
        chosen
    }

    /// Best refresh rate for the frame's layer votes, favoring configs in the
    /// same group as the active one.
    pub fn get_refresh_rate_for_content_v2(&self, layers: &[LayerRequirement]) -> &RefreshRate {
        let snapshot = self.snapshot();
        let candidates = self.resolve_all(&snapshot.available);
        let default = self.resolve(snapshot.default_config_id);
        let current_group = self.resolve(snapshot.current_config_id).config_group;
        let chosen = selector::select_group_aware(&candidates, layers, default, current_group);
        trace!(
            "Selected {} for {} layers (current group {})",
            chosen.name,
            layers.len(),
            current_group
        );
        chosen
    }

    /// Every refresh rate supported by the device. Never changes at runtime.
    pub fn get_all_refresh_rates(&self) -> &AllRefreshRates {
        self.catalog.all_refresh_rates()
    }

    pub fn get_refresh_rate_from_config_id(
        &self,
        config_id: ConfigId,
    ) -> Result<&RefreshRate, RefreshRateError> {
        self.catalog.refresh_rate_from_config_id(config_id)
    }

    /// Lowest refresh rate supported by the device.
    pub fn get_min_refresh_rate(&self) -> &RefreshRate {
        self.catalog.min_refresh_rate()
    }

    /// Highest refresh rate supported by the device.
    pub fn get_max_refresh_rate(&self) -> &RefreshRate {
        self.catalog.max_refresh_rate()
    }

    /// Lowest refresh rate allowed by the current policy.
    pub fn get_min_refresh_rate_by_policy(&self) -> &RefreshRate {
        let available = Arc::clone(&self.read_state().available);
        match available.first() {
            Some(id) => self.resolve(*id),
            None => self.get_min_refresh_rate(),
        }
    }

    /// Highest refresh rate allowed by the current policy.
    pub fn get_max_refresh_rate_by_policy(&self) -> &RefreshRate {
        let available = Arc::clone(&self.read_state().available);
        match available.last() {
            Some(id) => self.resolve(*id),
            None => self.get_max_refresh_rate(),
        }
    }

    /// Refresh rates allowed by the current policy, lowest fps first.
    pub fn get_available_refresh_rates(&self) -> Vec<&RefreshRate> {
        let available = Arc::clone(&self.read_state().available);
        self.resolve_all(&available)
    }

    /// The configuration the hardware is running, which may lie outside the policy.
    pub fn get_current_refresh_rate(&self) -> &RefreshRate {
        let current = self.read_state().current_config_id;
        self.resolve(current)
    }

    /// Record the configuration the hardware switched to and return the one it replaced.
    ///
    /// Out-of-policy configs are accepted; only ids missing from the catalog fail.
    pub fn set_current_config_id(
        &self,
        config_id: ConfigId,
    ) -> Result<&RefreshRate, RefreshRateError> {
        if !self.catalog.contains(config_id) {
            warn!("Ignoring unknown current display config {}", config_id);
            return Err(RefreshRateError::NotFound(config_id));
        }
        let previous = {
            let mut state = self.write_state();
            std::mem::replace(&mut state.current_config_id, config_id)
        };
        debug!("Current display config {} -> {}", previous, config_id);
        Ok(self.resolve(previous))
    }
}
