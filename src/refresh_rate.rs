//! Display timing modes and their strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance within which two frame rates are considered equal.
pub const FPS_EPSILON: f32 = 0.001;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Opaque handle of a hardware display configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(u32);

impl ConfigId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group of configurations that can be switched between without a visible seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigGroup(u32);

impl ConfigGroup {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConfigGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A display configuration as reported by the hardware description layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    pub config_id: ConfigId,
    pub config_group: ConfigGroup,
    /// Nanoseconds between vsync ticks.
    pub vsync_period: i64,
}

impl InputConfig {
    pub fn new(config_id: u32, config_group: u32, vsync_period: i64) -> Self {
        Self {
            config_id: ConfigId::new(config_id),
            config_group: ConfigGroup::new(config_group),
            vsync_period,
        }
    }
}

/// One hardware-supported display timing mode.
///
/// Equality covers `config_id`, `vsync_period` and `config_group` only;
/// `name` and `fps` are derived from them.
#[derive(Debug, Clone)]
pub struct RefreshRate {
    pub config_id: ConfigId,
    pub vsync_period: i64,
    pub config_group: ConfigGroup,
    pub name: String,
    pub fps: f32,
}

impl RefreshRate {
    /// Derive a refresh rate from its input config.
    ///
    /// Returns `None` when the vsync period cannot yield a finite, positive frame rate.
    pub fn from_input(input: &InputConfig) -> Option<Self> {
        if input.vsync_period <= 0 {
            return None;
        }
        let fps = (NANOS_PER_SECOND / input.vsync_period as f64) as f32;
        if !fps.is_finite() || fps <= 0.0 {
            return None;
        }
        Some(Self {
            config_id: input.config_id,
            vsync_period: input.vsync_period,
            config_group: input.config_group,
            name: format!("{:.0}fps", fps),
            fps,
        })
    }

    /// Whether this rate lies inside `[min, max]`, widened by [`FPS_EPSILON`] on both ends.
    pub fn in_policy(&self, min_refresh_rate: f32, max_refresh_rate: f32) -> bool {
        in_policy(self.fps, min_refresh_rate, max_refresh_rate)
    }
}

impl PartialEq for RefreshRate {
    fn eq(&self, other: &Self) -> bool {
        self.config_id == other.config_id
            && self.vsync_period == other.vsync_period
            && self.config_group == other.config_group
    }
}

impl Eq for RefreshRate {}

/// Policy membership test shared by every caller.
pub fn in_policy(fps: f32, min_refresh_rate: f32, max_refresh_rate: f32) -> bool {
    fps >= min_refresh_rate - FPS_EPSILON && fps <= max_refresh_rate + FPS_EPSILON
}

/// Approximate frame rate equality under [`FPS_EPSILON`].
pub fn fps_equal(a: f32, b: f32) -> bool {
    a == b || (a - b).abs() <= FPS_EPSILON
}
