//! Metrics collection for the refresh rate daemon.
//!
//! Tracks policy updates, selections and committed mode changes.

use crate::error::RefreshRateError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

const HOUR: Duration = Duration::from_secs(3600);

/// Metrics data exposed via IPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Accepted policy updates
    pub policy_updates: u64,
    /// Accepted policy updates that changed the policy
    pub policy_changes: u64,
    /// Rejected policy updates
    pub policy_rejections: u64,
    /// Per-frame refresh rate selections served
    pub selections: u64,
    /// Committed mode changes since daemon start
    pub mode_changes: u64,
    /// Committed mode changes in the last hour
    pub mode_changes_per_hour: u64,
    /// Mode changes to a lower refresh rate
    pub drop_count: u64,
    /// Mode changes to a higher refresh rate
    pub increase_count: u64,
    /// Uptime in seconds
    pub uptime_sec: u64,
}

/// Metrics collector for the daemon
pub struct MetricsCollector {
    start_time: Instant,
    policy_updates: AtomicU64,
    policy_changes: AtomicU64,
    policy_rejections: AtomicU64,
    selections: AtomicU64,
    mode_changes: AtomicU64,
    drop_count: AtomicU64,
    increase_count: AtomicU64,
    /// Mode change timestamps within the last hour
    recent_mode_changes: RwLock<Vec<Instant>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            policy_updates: AtomicU64::new(0),
            policy_changes: AtomicU64::new(0),
            policy_rejections: AtomicU64::new(0),
            selections: AtomicU64::new(0),
            mode_changes: AtomicU64::new(0),
            drop_count: AtomicU64::new(0),
            increase_count: AtomicU64::new(0),
            recent_mode_changes: RwLock::new(Vec::new()),
        }
    }

    /// Record the outcome of a policy update
    pub fn record_policy_update(&self, outcome: &Result<bool, RefreshRateError>) {
        match outcome {
            Ok(changed) => {
                self.policy_updates.fetch_add(1, Ordering::Relaxed);
                if *changed {
                    self.policy_changes.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(_) => {
                self.policy_rejections.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_selection(&self) {
        self.selections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed mode change
    pub fn record_mode_change(&self, old_fps: f32, new_fps: f32) {
        self.record_mode_change_at(old_fps, new_fps, Instant::now());
    }

    fn record_mode_change_at(&self, old_fps: f32, new_fps: f32, now: Instant) {
        self.mode_changes.fetch_add(1, Ordering::Relaxed);

        if new_fps < old_fps {
            self.drop_count.fetch_add(1, Ordering::Relaxed);
        } else if new_fps > old_fps {
            self.increase_count.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut changes) = self.recent_mode_changes.write() {
            changes.push(now);
            changes.retain(|t| now.saturating_duration_since(*t) < HOUR);
        }
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> MetricsResponse {
        let now = Instant::now();

        let mode_changes_per_hour = self
            .recent_mode_changes
            .read()
            .map(|changes| {
                changes
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < HOUR)
                    .count() as u64
            })
            .unwrap_or(0);

        MetricsResponse {
            policy_updates: self.policy_updates.load(Ordering::Relaxed),
            policy_changes: self.policy_changes.load(Ordering::Relaxed),
            policy_rejections: self.policy_rejections.load(Ordering::Relaxed),
            selections: self.selections.load(Ordering::Relaxed),
            mode_changes: self.mode_changes.load(Ordering::Relaxed),
            mode_changes_per_hour,
            drop_count: self.drop_count.load(Ordering::Relaxed),
            increase_count: self.increase_count.load(Ordering::Relaxed),
            uptime_sec: now.duration_since(self.start_time).as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_update_counters() {
        let metrics = MetricsCollector::new();
        metrics.record_policy_update(&Ok(true));
        metrics.record_policy_update(&Ok(false));
        metrics.record_policy_update(&Err(RefreshRateError::InvalidArgument(
            "min > max".to_string(),
        )));

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.policy_updates, 2);
        assert_eq!(snapshot.policy_changes, 1);
        assert_eq!(snapshot.policy_rejections, 1);
    }

    #[test]
    fn test_mode_change_direction() {
        let metrics = MetricsCollector::new();
        metrics.record_mode_change(90.0, 60.0);
        metrics.record_mode_change(60.0, 120.0);
        metrics.record_mode_change(60.0, 60.0);

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.mode_changes, 3);
        assert_eq!(snapshot.drop_count, 1);
        assert_eq!(snapshot.increase_count, 1);
        assert_eq!(snapshot.mode_changes_per_hour, 3);
    }

    #[test]
    fn test_mode_changes_expire_from_hourly_window() {
        let metrics = MetricsCollector::new();
        let Some(long_ago) = Instant::now().checked_sub(HOUR + Duration::from_secs(60)) else {
            // Monotonic clock started less than an hour ago.
            return;
        };
        metrics.record_mode_change_at(60.0, 120.0, long_ago);
        assert_eq!(metrics.get_metrics().mode_changes_per_hour, 0);

        metrics.record_mode_change(120.0, 60.0);
        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.mode_changes, 2);
        assert_eq!(snapshot.mode_changes_per_hour, 1);
        assert_eq!(metrics.recent_mode_changes.read().unwrap().len(), 1);
    }

    #[test]
    fn test_selection_counter() {
        let metrics = MetricsCollector::new();
        for _ in 0..5 {
            metrics.record_selection();
        }
        assert_eq!(metrics.get_metrics().selections, 5);
    }
}
