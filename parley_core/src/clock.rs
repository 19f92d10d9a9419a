//! Creation timestamps for persisted records.

use std::sync::atomic::{AtomicI64, Ordering};

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Epoch milliseconds, strictly increasing within the process.
///
/// Two records stamped one after the other never share a timestamp, so the
/// creation order of an IN record and its OUT reply agrees with their
/// timestamps even when generation finishes within the same millisecond or
/// the wall clock steps backwards.
#[must_use]
pub fn monotonic_millis() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_strictly_increase() {
        let mut previous = monotonic_millis();
        for _ in 0..1_000 {
            let next = monotonic_millis();
            assert!(next > previous);
            previous = next;
        }
    }
}
