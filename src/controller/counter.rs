use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Wrapping 8-bit timer stamped into every outbound report.
///
/// The counter task is the only writer; report builders only read.
#[derive(Clone, Debug, Default)]
pub struct SequenceCounter {
    value: Arc<AtomicU8>,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances by one, wrapping at 256, and returns the new value.
    pub fn tick(&self) -> u8 {
        self.value.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn get(&self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_after_256_ticks() {
        let counter = SequenceCounter::new();
        counter.tick();
        counter.tick();
        let start = counter.get();
        for _ in 0..256 {
            counter.tick();
        }
        assert_eq!(counter.get(), start);
    }

    #[test]
    fn tick_returns_new_value_and_wraps() {
        let counter = SequenceCounter::new();
        for _ in 0..255 {
            counter.tick();
        }
        assert_eq!(counter.get(), 255);
        assert_eq!(counter.tick(), 0);
    }

    #[test]
    fn clones_share_the_value() {
        let counter = SequenceCounter::new();
        let reader = counter.clone();
        counter.tick();
        assert_eq!(reader.get(), 1);
        reader.reset();
        assert_eq!(counter.get(), 0);
    }
}
