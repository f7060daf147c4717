use std::time::{Duration, Instant};

use tracing::info;

/// Wall-clock timer around one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationTimer {
    started: Instant,
}

impl GenerationTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop the timer and log the measurement in milliseconds.
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!("js generation time (hot, ms): {}", elapsed.as_millis());
        elapsed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_covers_the_timed_work() {
        let timer = GenerationTimer::start();
        std::thread::sleep(Duration::from_millis(20));
        assert!(timer.finish() >= Duration::from_millis(20));
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let timer = GenerationTimer::start();
        let first = timer.elapsed();
        assert!(timer.elapsed() >= first);
    }
}
