use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock used to bound device waits.
pub trait Timer: Clone + Send + Sync {
    /// Nanoseconds since the timer was created.
    fn now(&self) -> u64;
    fn elapsed(&self, since: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(since))
    }
    fn sleep(&self, d: Duration);
}

/// Point in time after which a wait is abandoned.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: u64,
    timeout: Duration,
}

impl Deadline {
    pub fn after<T: Timer>(timer: &T, timeout: Duration) -> Self {
        Self {
            started: timer.now(),
            timeout,
        }
    }

    pub fn expired<T: Timer>(&self, timer: &T) -> bool {
        timer.elapsed(self.started) >= self.timeout
    }

    pub fn waited<T: Timer>(&self, timer: &T) -> Duration {
        timer.elapsed(self.started)
    }
}

/// Summary of recorded round-trip durations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyStats {
    pub samples: usize,
    pub mean_ns: f64,
    pub jitter_ns: f64,
    pub min_ns: f64,
    pub max_ns: f64,
}

impl LatencyStats {
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let times: Vec<f64> = samples.iter().map(|d| d.as_nanos() as f64).collect();
        let mean = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            samples: times.len(),
            mean_ns: mean,
            jitter_ns: var.sqrt(),
            min_ns: min,
            max_ns: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Virtual clock: `sleep` advances time instantly. Clones share the same clock.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTimer {
    now_ns: Arc<AtomicU64>,
}

impl SimulatedTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Timer for SimulatedTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_sleep_advances_clock() {
        let timer = SimulatedTimer::new();
        let shared = timer.clone();
        timer.sleep(Duration::from_millis(5));
        assert_eq!(shared.now(), 5_000_000);
        assert_eq!(shared.elapsed(1_000_000), Duration::from_millis(4));
    }

    #[test]
    fn test_deadline_expires() {
        let timer = SimulatedTimer::new();
        let deadline = Deadline::after(&timer, Duration::from_millis(10));
        assert!(!deadline.expired(&timer));
        timer.advance(Duration::from_millis(9));
        assert!(!deadline.expired(&timer));
        timer.advance(Duration::from_millis(1));
        assert!(deadline.expired(&timer));
        assert_eq!(deadline.waited(&timer), Duration::from_millis(10));
    }

    #[test]
    fn test_latency_stats() {
        let stats = LatencyStats::from_samples(&[
            Duration::from_nanos(100),
            Duration::from_nanos(300),
        ]);
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.mean_ns, 200.0);
        assert_eq!(stats.jitter_ns, 100.0);
        assert_eq!(stats.min_ns, 100.0);
        assert_eq!(stats.max_ns, 300.0);
        assert_eq!(LatencyStats::from_samples(&[]), LatencyStats::default());
    }

    #[test]
    fn test_high_precision_timer_is_monotonic() {
        let timer = HighPrecisionTimer::new();
        let a = timer.now();
        timer.sleep(Duration::from_micros(200));
        assert!(timer.now() >= a + 200_000);
    }
}
