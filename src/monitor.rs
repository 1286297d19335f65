//! Resource monitor: on-demand sampling of memory and processor utilization.
//!
//! The extractor consults a [`ResourceMonitor`] at fixed row intervals and
//! halts the run when either threshold is exceeded. Monitoring outages fail
//! open: a monitor that cannot produce a sample reports "resources OK".

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Utilization thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_memory_percent: f32,
    pub max_cpu_percent: f32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_percent: 85.0,
            max_cpu_percent: 95.0,
        }
    }
}

/// One utilization reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub memory_percent: f32,
    pub cpu_percent: f32,
}

impl ResourceSample {
    /// Whether this sample stays within both thresholds.
    pub fn within(&self, limits: &ResourceLimits) -> bool {
        self.memory_percent <= limits.max_memory_percent && self.cpu_percent <= limits.max_cpu_percent
    }
}

impl std::fmt::Display for ResourceSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RAM: {:.1}% | CPU: {:.1}%", self.memory_percent, self.cpu_percent)
    }
}

/// Source of utilization samples.
pub trait ResourceMonitor {
    /// Take a fresh sample, or `None` when the platform query is unavailable.
    fn sample(&mut self) -> Option<ResourceSample>;

    /// Sample and compare against `limits`. Returns `false` only when a sample
    /// was taken and it exceeds a threshold.
    fn check(&mut self, limits: &ResourceLimits) -> bool {
        match self.sample() {
            Some(sample) => {
                tracing::info!(
                    memory_percent = sample.memory_percent,
                    cpu_percent = sample.cpu_percent,
                    "resource sample"
                );
                sample.within(limits)
            }
            None => {
                tracing::warn!("resource monitoring unavailable, continuing");
                true
            }
        }
    }
}

/// Monitor backed by the host's process table via `sysinfo`.
pub struct SystemMonitor {
    system: System,
    cpu_window: Duration,
}

impl SystemMonitor {
    /// Create a monitor whose CPU reading averages over `cpu_window`.
    ///
    /// The window is raised to `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` when shorter.
    pub fn new(cpu_window: Duration) -> Self {
        Self {
            system: System::new(),
            cpu_window: cpu_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn cpu_window(&self) -> Duration {
        self.cpu_window
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl ResourceMonitor for SystemMonitor {
    fn sample(&mut self) -> Option<ResourceSample> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return None;
        }
        let memory_percent = (self.system.used_memory() as f64 / total as f64 * 100.0) as f32;

        // CPU usage is a delta between two refreshes.
        self.system.refresh_cpu_usage();
        std::thread::sleep(self.cpu_window);
        self.system.refresh_cpu_usage();
        let cpu_percent = self.system.global_cpu_usage();

        Some(ResourceSample {
            memory_percent,
            cpu_percent,
        })
    }
}

/// Monitor that never samples; every check passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnmonitoredResources;

impl ResourceMonitor for UnmonitoredResources {
    fn sample(&mut self) -> Option<ResourceSample> {
        None
    }
}
