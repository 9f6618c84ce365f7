//! CPU and memory figures derived from runtime resource samples.
//!
//! The runtime reports CPU usage as cumulative nanosecond counters for the
//! container (`cpu_total_usage`) and for the whole host (`system_cpu_usage`),
//! each together with the value from the previous sample. The CPU percentage is
//! the container's share of the host's CPU time between both samples, scaled by
//! the number of online CPUs, so a container saturating two cores reports
//! `200.0`.
//!
//! # Examples
//!
//! ```rust
//! use dockmon::monitor::cpu::cpu_percent;
//! use dockmon::runtime::RawStats;
//!
//! let stats = RawStats {
//!     cpu_total_usage: Some(300),
//!     precpu_total_usage: Some(100),
//!     system_cpu_usage: Some(2_000),
//!     presystem_cpu_usage: Some(1_000),
//!     online_cpus: Some(4),
//!     ..RawStats::default()
//! };
//! assert_eq!(cpu_percent(&stats), Some(80.0));
//! ```

use super::ResourceUsage;
use crate::runtime::RawStats;

/// Computes the CPU usage percentage between the two samples in `stats`.
///
/// # Returns
///
/// * `None` if either sample is missing, i.e. there is no previous sample yet.
/// * `Some(0.0)` if no CPU or system time elapsed between the samples.
pub fn cpu_percent(stats: &RawStats) -> Option<f64> {
    let total = stats.cpu_total_usage?;
    let pre_total = stats.precpu_total_usage?;
    let system = stats.system_cpu_usage?;
    let pre_system = stats.presystem_cpu_usage?;
    if pre_system == 0 {
        return None;
    }

    let cpu_delta = total.saturating_sub(pre_total);
    let system_delta = system.saturating_sub(pre_system);
    if cpu_delta == 0 || system_delta == 0 {
        return Some(0.0);
    }

    let online_cpus = stats.online_cpus.filter(|n| *n > 0).unwrap_or(1);
    Some(cpu_delta as f64 / system_delta as f64 * online_cpus as f64 * 100.0)
}

impl ResourceUsage {
    /// Builds the resource usage reported for a sampled container.
    pub fn from_stats(stats: &RawStats) -> Self {
        Self {
            cpu_percent: cpu_percent(stats),
            memory_bytes: stats.memory_usage,
            memory_limit_bytes: stats.memory_limit,
        }
    }
}
