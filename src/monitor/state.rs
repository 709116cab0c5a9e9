//! Warning policy for resource sampling.
//!
//! Pure state machine over observed samples: disk pressure must be
//! sustained before it warns, memory and GPU pressure warn immediately,
//! and every warning re-arms after the rolling reset interval. Each
//! bottleneck warns at most once per interval.

use std::time::Duration;

pub const DISK_BUSY_THRESHOLD: f64 = 0.9;
pub const DISK_SUSTAIN: Duration = Duration::from_secs(5);
pub const MEMORY_THRESHOLD: f64 = 0.9;
pub const GPU_THRESHOLD: f64 = 0.95;
pub const RESET_INTERVAL: Duration = Duration::from_secs(60);

/// Resource under pressure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bottleneck {
    DiskIo,
    Memory,
    Gpu,
}

/// One probe reading; `None` means the reading is unavailable
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceSample {
    /// Fraction of the interval the disk spent busy
    pub disk_busy: Option<f64>,
    /// Fraction of system memory in use
    pub memory_used: Option<f64>,
    /// Fraction of GPU memory in use
    pub gpu_used: Option<f64>,
}

/// Per-run warning state
#[derive(Debug, Default)]
pub struct WarningPolicy {
    disk_over: Duration,
    since_reset: Duration,
    warned_disk: bool,
    warned_memory: bool,
    warned_gpu: bool,
}

impl WarningPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample taken `dt` after the previous one and return the
    /// bottlenecks to warn about now.
    pub fn observe(&mut self, sample: &ResourceSample, dt: Duration) -> Vec<Bottleneck> {
        let mut warnings = Vec::new();

        match sample.disk_busy {
            Some(busy) if busy > DISK_BUSY_THRESHOLD => {
                self.disk_over += dt;
                if self.disk_over >= DISK_SUSTAIN && !self.warned_disk {
                    warnings.push(Bottleneck::DiskIo);
                    self.warned_disk = true;
                }
            }
            _ => self.disk_over = Duration::ZERO,
        }

        if let Some(used) = sample.memory_used {
            if used > MEMORY_THRESHOLD && !self.warned_memory {
                warnings.push(Bottleneck::Memory);
                self.warned_memory = true;
            }
        }

        if let Some(used) = sample.gpu_used {
            if used > GPU_THRESHOLD && !self.warned_gpu {
                warnings.push(Bottleneck::Gpu);
                self.warned_gpu = true;
            }
        }

        self.since_reset += dt;
        if self.since_reset >= RESET_INTERVAL {
            self.warned_disk = false;
            self.warned_memory = false;
            self.warned_gpu = false;
            self.since_reset = Duration::ZERO;
        }

        warnings
    }
}
