//! Monotonic-clock-driven sample pacing and snapshot cadence (§4.10, §5).
//!
//! Pure helpers so the pacing arithmetic is unit-testable without a real
//! clock or a full `ChainRunner`.

/// Caps how many samples a single tick may produce (§4.10, §5): bounds the
/// work done after a scheduling stall rather than trying to catch up fully.
pub const MAX_SAMPLES_PER_TICK: u64 = 2000;

/// `⌊elapsed_secs · sample_rate⌋`, capped at `MAX_SAMPLES_PER_TICK`. Negative
/// or zero elapsed time (a backward clock jump) yields zero.
#[inline]
pub fn samples_due(elapsed_secs: f64, sample_rate: f64) -> u64 {
    let due = (elapsed_secs * sample_rate).floor().max(0.0) as u64;
    due.min(MAX_SAMPLES_PER_TICK)
}

/// True once at least `1000 / snapshot_rate_hz` milliseconds have elapsed
/// since the last publish (§4.10 "Snapshot cadence").
#[inline]
pub fn should_publish(elapsed_secs_since_publish: f64, snapshot_rate_hz: f64) -> bool {
    elapsed_secs_since_publish >= 1.0 / snapshot_rate_hz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_due_floors_and_caps() {
        assert_eq!(samples_due(0.02, 50_000.0), 1000);
        assert_eq!(samples_due(1.0, 50_000.0), MAX_SAMPLES_PER_TICK);
        assert_eq!(samples_due(-1.0, 50_000.0), 0);
        assert_eq!(samples_due(0.0, 50_000.0), 0);
    }

    #[test]
    fn should_publish_at_snapshot_rate() {
        // 30 Hz -> publish every 1/30 s ~= 33.3ms.
        assert!(!should_publish(0.02, 30.0));
        assert!(should_publish(0.034, 30.0));
        assert!(should_publish(1.0 / 30.0, 30.0));
    }
}
