//! Immutable catalog of every display configuration the device supports.
//!
//! Built once at construction; the device-wide lowest and highest rates are
//! resolved at the same time and never change afterwards.

use crate::error::RefreshRateError;
use crate::refresh_rate::{ConfigId, InputConfig, RefreshRate};
use std::collections::BTreeMap;
use tracing::debug;

/// All refresh rates keyed by config id.
pub type AllRefreshRates = BTreeMap<ConfigId, RefreshRate>;

#[derive(Debug)]
pub struct ConfigCatalog {
    refresh_rates: AllRefreshRates,
    min_supported: ConfigId,
    max_supported: ConfigId,
}

impl ConfigCatalog {
    /// Build the catalog from the hardware-supplied configs.
    ///
    /// Rejects an empty list, a duplicated config id, and any entry whose vsync
    /// period does not produce a finite frame rate.
    pub fn new(configs: &[InputConfig]) -> Result<Self, RefreshRateError> {
        let mut refresh_rates = AllRefreshRates::new();
        for input in configs {
            let rate =
                RefreshRate::from_input(input).ok_or(RefreshRateError::InvalidConfig {
                    config_id: input.config_id,
                    vsync_period: input.vsync_period,
                })?;
            if refresh_rates.insert(input.config_id, rate).is_some() {
                return Err(RefreshRateError::DuplicateConfigId(input.config_id));
            }
        }

        let min_supported = Self::extreme(&refresh_rates, |candidate, best| candidate < best)
            .ok_or(RefreshRateError::EmptyCatalog)?;
        let max_supported = Self::extreme(&refresh_rates, |candidate, best| candidate > best)
            .ok_or(RefreshRateError::EmptyCatalog)?;

        debug!(
            "Display config catalog built with {} entries (min {}, max {})",
            refresh_rates.len(),
            min_supported,
            max_supported
        );

        Ok(Self {
            refresh_rates,
            min_supported,
            max_supported,
        })
    }

    /// First config id (in id order) whose fps beats every other under `better`.
    fn extreme(rates: &AllRefreshRates, better: impl Fn(f32, f32) -> bool) -> Option<ConfigId> {
        let mut best: Option<&RefreshRate> = None;
        for rate in rates.values() {
            match best {
                Some(current) if !better(rate.fps, current.fps) => {}
                _ => best = Some(rate),
            }
        }
        best.map(|rate| rate.config_id)
    }

    /// Every refresh rate supported by the device. Never changes at runtime.
    pub fn all_refresh_rates(&self) -> &AllRefreshRates {
        &self.refresh_rates
    }

    pub fn get(&self, config_id: ConfigId) -> Option<&RefreshRate> {
        self.refresh_rates.get(&config_id)
    }

    pub fn contains(&self, config_id: ConfigId) -> bool {
        self.refresh_rates.contains_key(&config_id)
    }

    /// Look up a config id the caller has already validated.
    pub fn refresh_rate_from_config_id(
        &self,
        config_id: ConfigId,
    ) -> Result<&RefreshRate, RefreshRateError> {
        self.get(config_id)
            .ok_or(RefreshRateError::NotFound(config_id))
    }

    /// Lowest refresh rate supported by the device.
    pub fn min_refresh_rate(&self) -> &RefreshRate {
        &self.refresh_rates[&self.min_supported]
    }

    /// Highest refresh rate supported by the device.
    pub fn max_refresh_rate(&self) -> &RefreshRate {
        &self.refresh_rates[&self.max_supported]
    }

    pub fn len(&self) -> usize {
        self.refresh_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refresh_rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn panel() -> Vec<InputConfig> {
        vec![
            InputConfig::new(0, 0, 16_666_667),
            InputConfig::new(1, 0, 11_111_111),
            InputConfig::new(2, 1, 8_333_333),
        ]
    }

    #[test]
    fn test_catalog_bounds() {
        let catalog = ConfigCatalog::new(&panel()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.min_refresh_rate().config_id, ConfigId::new(0));
        assert_eq!(catalog.max_refresh_rate().config_id, ConfigId::new(2));
    }

    #[test]
    fn test_lookup_unknown_config_is_not_found() {
        let catalog = ConfigCatalog::new(&panel()).unwrap();
        assert_eq!(
            catalog.refresh_rate_from_config_id(ConfigId::new(9)),
            Err(RefreshRateError::NotFound(ConfigId::new(9)))
        );
        let rate = catalog.refresh_rate_from_config_id(ConfigId::new(1)).unwrap();
        assert!((rate.fps - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_zero_vsync_period_rejected() {
        let mut configs = panel();
        configs.push(InputConfig::new(3, 0, 0));
        let err = ConfigCatalog::new(&configs).unwrap_err();
        assert_eq!(
            err,
            RefreshRateError::InvalidConfig {
                config_id: ConfigId::new(3),
                vsync_period: 0,
            }
        );
    }

    #[test]
    fn test_duplicate_config_id_rejected() {
        let mut configs = panel();
        configs.push(InputConfig::new(1, 2, 20_000_000));
        assert_eq!(
            ConfigCatalog::new(&configs).unwrap_err(),
            RefreshRateError::DuplicateConfigId(ConfigId::new(1))
        );
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert_eq!(
            ConfigCatalog::new(&[]).unwrap_err(),
            RefreshRateError::EmptyCatalog
        );
    }

    #[test]
    fn test_equal_fps_bounds_resolve_to_lowest_id() {
        let configs = vec![
            InputConfig::new(5, 1, 16_666_667),
            InputConfig::new(2, 0, 16_666_667),
        ];
        let catalog = ConfigCatalog::new(&configs).unwrap();
        assert_eq!(catalog.min_refresh_rate().config_id, ConfigId::new(2));
        assert_eq!(catalog.max_refresh_rate().config_id, ConfigId::new(2));
    }

    fn configs_strategy() -> impl Strategy<Value = Vec<InputConfig>> {
        prop::collection::vec((0u32..4, 4_000_000i64..=50_000_000i64), 1..12).prop_map(
            |entries| {
                entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, (group, period))| InputConfig::new(i as u32, group, period))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_every_rate_within_device_bounds(configs in configs_strategy()) {
            let catalog = ConfigCatalog::new(&configs).unwrap();
            let min = catalog.min_refresh_rate().fps;
            let max = catalog.max_refresh_rate().fps;
            for rate in catalog.all_refresh_rates().values() {
                prop_assert!(min <= rate.fps && rate.fps <= max);
            }
            prop_assert_eq!(catalog.len(), configs.len());
        }
    }
}
