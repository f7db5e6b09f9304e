pub mod timer;

pub use timer::{Deadline, HighPrecisionTimer, LatencyStats, SimulatedTimer, Timer};
