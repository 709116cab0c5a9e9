//! Resource probes.
//!
//! `SystemProbe` reads system memory through sysinfo, disk busy time from
//! `/proc/diskstats` for the device backing the watched path, and GPU
//! memory through NVML when the `gpu` feature is enabled. Every reading
//! is optional; a probe that cannot resolve its device simply reports no
//! disk data.

use std::path::Path;
use std::time::Duration;

use sysinfo::{Disks, System};
use tracing::warn;

use crate::monitor::state::ResourceSample;

/// Source of resource samples, injected into the monitor thread
pub trait ResourceProbe: Send {
    /// Take one sample covering the last `dt`
    fn sample(&mut self, dt: Duration) -> ResourceSample;
}

/// Live system probe
pub struct SystemProbe {
    system: System,
    device: Option<String>,
    prev_io_ticks: Option<u64>,
    #[cfg(feature = "gpu")]
    nvml: Option<nvml_wrapper::Nvml>,
}

impl SystemProbe {
    /// Watch the disk backing `watch_path` (typically the model weights
    /// directory).
    pub fn new(watch_path: &Path) -> Self {
        let device = device_for_path(watch_path);
        if device.is_none() {
            warn!(
                path = %watch_path.display(),
                "no block device resolved, disk monitoring disabled"
            );
        }

        Self {
            system: System::new(),
            device,
            prev_io_ticks: None,
            #[cfg(feature = "gpu")]
            nvml: nvml_wrapper::Nvml::init().ok(),
        }
    }

    fn disk_busy(&mut self, dt: Duration) -> Option<f64> {
        let device = self.device.as_deref()?;
        let diskstats = std::fs::read_to_string("/proc/diskstats").ok()?;
        let ticks = parse_io_ticks(&diskstats, device)?;
        let prev = self.prev_io_ticks.replace(ticks);

        let elapsed_ms = dt.as_millis() as u64;
        match prev {
            Some(prev) if elapsed_ms > 0 => {
                Some(ticks.saturating_sub(prev) as f64 / elapsed_ms as f64)
            }
            _ => None,
        }
    }

    fn memory_used(&mut self) -> Option<f64> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return None;
        }
        Some(self.system.used_memory() as f64 / total as f64)
    }

    #[cfg(feature = "gpu")]
    fn gpu_used(&self) -> Option<f64> {
        let nvml = self.nvml.as_ref()?;
        let device = nvml.device_by_index(0).ok()?;
        let memory = device.memory_info().ok()?;
        if memory.total == 0 {
            return None;
        }
        Some(memory.used as f64 / memory.total as f64)
    }

    #[cfg(not(feature = "gpu"))]
    fn gpu_used(&self) -> Option<f64> {
        None
    }
}

impl ResourceProbe for SystemProbe {
    fn sample(&mut self, dt: Duration) -> ResourceSample {
        ResourceSample {
            disk_busy: self.disk_busy(dt),
            memory_used: self.memory_used(),
            gpu_used: self.gpu_used(),
        }
    }
}

/// Resolve the device of the longest mount point containing `path`
fn device_for_path(path: &Path) -> Option<String> {
    let disks = Disks::new_with_refreshed_list();
    let target = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());

    let mut best: Option<(usize, String)> = None;
    for disk in &disks {
        let mount = disk.mount_point();
        if !target.starts_with(mount) {
            continue;
        }
        let name = disk.name().to_string_lossy();
        let device = name.strip_prefix("/dev/").unwrap_or(&name).to_string();
        let depth = mount.as_os_str().len();
        if best.as_ref().is_none_or(|(prev, _)| depth > *prev) {
            best = Some((depth, device));
        }
    }
    best.map(|(_, device)| device)
}

/// Milliseconds spent doing I/O for one device in `/proc/diskstats`
fn parse_io_ticks(diskstats: &str, device: &str) -> Option<u64> {
    for line in diskstats.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.get(2) == Some(&device) {
            return fields.get(12)?.parse().ok();
        }
    }
    None
}
