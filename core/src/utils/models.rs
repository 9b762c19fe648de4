// core/src/utils/models.rs
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

use super::{DEFAULT_MEM_THRESHOLD_MB, DEFAULT_UTIL_THRESHOLD_PCT};

/// One GPU as seen by a single sampling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuRecord {
    pub index: u32,
    pub utilization_pct: u32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub is_idle: bool,
}

impl GpuRecord {
    /// `util=3% mem=120/8192 MB`, shared by console output and alert emails.
    pub fn usage_summary(&self) -> String {
        format!(
            "util={}% mem={}/{} MB",
            self.utilization_pct, self.memory_used_mb, self.memory_total_mb
        )
    }
}

/// Idle rule: a GPU is idle iff both readings are at or below their threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub utilization_threshold_pct: u32,
    pub memory_threshold_mb: u64,
}

impl ThresholdConfig {
    pub fn new(utilization_threshold_pct: u32, memory_threshold_mb: u64) -> Result<Self, ConfigError> {
        if utilization_threshold_pct > 100 {
            return Err(ConfigError::UtilizationThreshold(utilization_threshold_pct));
        }
        Ok(Self {
            utilization_threshold_pct,
            memory_threshold_mb,
        })
    }

    pub fn is_idle(&self, utilization_pct: u32, memory_used_mb: u64) -> bool {
        utilization_pct <= self.utilization_threshold_pct && memory_used_mb <= self.memory_threshold_mb
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            utilization_threshold_pct: DEFAULT_UTIL_THRESHOLD_PCT,
            memory_threshold_mb: DEFAULT_MEM_THRESHOLD_MB,
        }
    }
}

/// Structured result of one cycle, emitted as a single JSON line in `--json` mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub timestamp: String,
    pub gpus: Vec<GpuRecord>,
    pub idle: Vec<u32>,
}

impl CycleReport {
    pub fn new(gpus: Vec<GpuRecord>) -> Self {
        let idle = gpus.iter().filter(|g| g.is_idle).map(|g| g.index).collect();
        CycleReport {
            timestamp: chrono::Local::now().to_rfc3339(),
            gpus,
            idle,
        }
    }

    pub fn has_idle(&self) -> bool {
        !self.idle.is_empty()
    }

    /// Comma-joined idle indices, e.g. `0,2`.
    pub fn idle_ids(&self) -> String {
        join_ids(self.idle.iter().copied())
    }
}

pub(crate) fn join_ids(ids: impl Iterator<Item = u32>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: u32, utilization_pct: u32, memory_used_mb: u64, is_idle: bool) -> GpuRecord {
        GpuRecord {
            index,
            utilization_pct,
            memory_used_mb,
            memory_total_mb: 8192,
            is_idle,
        }
    }

    #[test]
    fn idle_rule_is_inclusive_at_both_thresholds() {
        let th = ThresholdConfig::new(5, 500).unwrap();
        assert!(th.is_idle(5, 500));
        assert!(th.is_idle(0, 0));
        assert!(!th.is_idle(6, 500));
        assert!(!th.is_idle(5, 501));
    }

    #[test]
    fn idle_rule_requires_both_conditions() {
        let th = ThresholdConfig::new(5, 500).unwrap();
        for u in 0..=100u32 {
            for m in [0u64, 250, 499, 500, 501, 4096] {
                assert_eq!(th.is_idle(u, m), u <= 5 && m <= 500, "u={} m={}", u, m);
            }
        }
    }

    #[test]
    fn zero_thresholds_only_match_fully_unused_gpus() {
        let th = ThresholdConfig::new(0, 0).unwrap();
        assert!(th.is_idle(0, 0));
        assert!(!th.is_idle(1, 0));
        assert!(!th.is_idle(0, 1));
    }

    #[test]
    fn utilization_threshold_above_100_is_rejected() {
        assert!(matches!(
            ThresholdConfig::new(101, 500),
            Err(ConfigError::UtilizationThreshold(101))
        ));
        assert!(ThresholdConfig::new(100, 0).is_ok());
    }

    #[test]
    fn report_collects_idle_indices_in_order() {
        let report = CycleReport::new(vec![
            record(0, 3, 120, true),
            record(1, 10, 50, false),
            record(2, 0, 0, true),
        ]);
        assert_eq!(report.idle, vec![0, 2]);
        assert_eq!(report.idle_ids(), "0,2");
        assert!(report.has_idle());
    }

    #[test]
    fn usage_summary_format() {
        assert_eq!(record(0, 3, 120, true).usage_summary(), "util=3% mem=120/8192 MB");
    }
}
