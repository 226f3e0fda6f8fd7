//! Policy-constrained display refresh rate selection.
//!
//! [`RefreshRateConfigs`] owns the immutable catalog of supported display
//! configurations, the operator policy restricting them, and the active
//! configuration, and answers the per-frame question of which refresh rate
//! best serves the current layer votes.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ipc_server;
pub mod logging;
pub mod metrics;
pub mod policy;
pub mod refresh_rate;
pub mod refresh_rate_configs;
pub mod selector;

pub use catalog::{AllRefreshRates, ConfigCatalog};
pub use error::RefreshRateError;
pub use policy::Policy;
pub use refresh_rate::{in_policy, ConfigGroup, ConfigId, InputConfig, RefreshRate, FPS_EPSILON};
pub use refresh_rate_configs::RefreshRateConfigs;
pub use selector::{closeness, select, select_group_aware, LayerRequirement, LayerVoteType};
