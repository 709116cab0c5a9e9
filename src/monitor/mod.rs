//! Background resource monitor.
//!
//! A sampler thread wakes on a fixed interval, probes disk, memory and
//! GPU pressure and logs bottleneck warnings per the warning policy.
//! Probe failures stay inside the thread. The returned guard stops the
//! thread on drop, so a diagnosis run monitors exactly its own span.

pub mod probe;
pub mod state;

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::warn;

pub use probe::{ResourceProbe, SystemProbe};
pub use state::{Bottleneck, ResourceSample, WarningPolicy};

/// Monitor settings
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Path whose backing disk is watched, typically the model weights
    pub watch_path: PathBuf,
}

pub struct ResourceMonitor;

impl ResourceMonitor {
    /// Start monitoring with the live system probe
    pub fn start(config: &MonitorConfig) -> MonitorGuard {
        let probe = SystemProbe::new(&config.watch_path);
        Self::start_with_probe(config.interval, Box::new(probe))
    }

    /// Run `op` under monitoring; the sampler stops when `op` returns,
    /// errors or panics.
    pub fn watch<T>(config: &MonitorConfig, op: impl FnOnce() -> T) -> T {
        let _guard = Self::start(config);
        op()
    }

    pub fn start_with_probe(interval: Duration, mut probe: Box<dyn ResourceProbe>) -> MonitorGuard {
        let (stop, stopped) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || {
            let mut policy = WarningPolicy::new();
            loop {
                match stopped.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let sample = probe.sample(interval);
                for bottleneck in policy.observe(&sample, interval) {
                    log_bottleneck(bottleneck, &sample);
                }
            }
        });

        MonitorGuard {
            stop: Some(stop),
            handle: Some(handle),
        }
    }
}

fn log_bottleneck(bottleneck: Bottleneck, sample: &ResourceSample) {
    match bottleneck {
        Bottleneck::DiskIo => {
            warn!("performance bottleneck: sustained disk IO, completions may stall");
        }
        Bottleneck::Memory => {
            let used = sample.memory_used.unwrap_or_default() * 100.0;
            warn!(used_percent = format!("{used:.1}"), "performance bottleneck: system memory");
        }
        Bottleneck::Gpu => {
            let used = sample.gpu_used.unwrap_or_default() * 100.0;
            warn!(used_percent = format!("{used:.1}"), "performance bottleneck: GPU memory");
        }
    }
}

/// Stops the sampler thread when dropped
pub struct MonitorGuard {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProbe {
        samples: Arc<AtomicUsize>,
    }

    impl ResourceProbe for CountingProbe {
        fn sample(&mut self, _dt: Duration) -> ResourceSample {
            self.samples.fetch_add(1, Ordering::SeqCst);
            ResourceSample::default()
        }
    }

    #[test]
    fn test_guard_stops_sampler_thread() {
        let samples = Arc::new(AtomicUsize::new(0));
        let guard = ResourceMonitor::start_with_probe(
            Duration::from_millis(5),
            Box::new(CountingProbe {
                samples: Arc::clone(&samples),
            }),
        );

        std::thread::sleep(Duration::from_millis(40));
        drop(guard);

        let stopped_at = samples.load(Ordering::SeqCst);
        assert!(stopped_at > 0);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(samples.load(Ordering::SeqCst), stopped_at);
    }

    #[test]
    fn test_watch_returns_operation_result() {
        let config = MonitorConfig {
            interval: Duration::from_millis(50),
            watch_path: std::env::temp_dir(),
        };
        let value = ResourceMonitor::watch(&config, || 41 + 1);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_guard_drop_joins_immediately_on_long_interval() {
        let samples = Arc::new(AtomicUsize::new(0));
        let guard = ResourceMonitor::start_with_probe(
            Duration::from_secs(3600),
            Box::new(CountingProbe { samples }),
        );
        // The stop signal interrupts the interval wait, drop must not
        // block for the full hour.
        drop(guard);
    }
}
