use std::time::Duration;

use tokio::time::Instant;

/// A cached value and the instant it was computed. Replaced wholesale, never
/// mutated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub computed_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Wraps `value`, stamped with the current instant.
    pub fn new(value: T) -> Self {
        Self {
            value,
            computed_at: Instant::now(),
        }
    }

    /// Valid while strictly less than `ttl` has elapsed since computation.
    #[must_use]
    pub fn is_valid(&self, ttl: Duration) -> bool {
        self.computed_at.elapsed() < ttl
    }
}
