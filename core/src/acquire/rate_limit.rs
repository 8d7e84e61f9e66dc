use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Per-provider minimum inter-request delay, enforced before every outbound
/// request regardless of cache state.
pub struct RateLimiter {
    min_delay: Duration,
    last_request: BTreeMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(delay_secs: f64) -> Self {
        Self {
            min_delay: Duration::from_secs_f64(delay_secs.max(0.0)),
            last_request: BTreeMap::new(),
        }
    }

    pub fn wait(&mut self, provider: &str) {
        if self.min_delay.is_zero() {
            return;
        }
        if let Some(last) = self.last_request.get(provider) {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                std::thread::sleep(self.min_delay - elapsed);
            }
        }
        self.last_request.insert(provider.to_string(), Instant::now());
    }
}
