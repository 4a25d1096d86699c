//! Unique identifiers for generated records.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies a fresh, globally unique identifier per emitted record.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> i64;
}

const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_WORKER: u16 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u16 = (1 << SEQUENCE_BITS) - 1;

/// 2020-01-01T00:00:00Z in milliseconds.
const EPOCH_MS: i64 = 1_577_836_800_000;

/// Snowflake-style ids: 41 bits of milliseconds, 10 bits of worker, 12 bits of sequence.
///
/// Ids from one generator are strictly increasing. Distinct workers never collide.
pub struct Snowflake {
    worker: i64,
    state: Mutex<(i64, u16)>,
}

impl Snowflake {
    pub fn new(worker: u16) -> Self {
        assert!(worker <= MAX_WORKER, "worker id must fit in {WORKER_BITS} bits");
        Self {
            worker: worker as i64,
            state: Mutex::new((0, 0)),
        }
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(EPOCH_MS)
            - EPOCH_MS
    }
}

impl IdGenerator for Snowflake {
    fn next_id(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (last_ms, sequence) = *state;
        let mut now = Self::now_ms().max(last_ms);

        let sequence = if now == last_ms {
            let next = (sequence + 1) & SEQUENCE_MASK;
            if next == 0 {
                // Sequence exhausted for this millisecond, borrow the next one.
                now += 1;
            }
            next
        } else {
            0
        };

        *state = (now, sequence);
        (now << (WORKER_BITS + SEQUENCE_BITS)) | (self.worker << SEQUENCE_BITS) | sequence as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_strictly_increasing() {
        let ids = Snowflake::new(1);
        let mut last = ids.next_id();
        for _ in 0..10_000 {
            let next = ids.next_id();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_workers_do_not_collide() {
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            assert!(seen.insert(a.next_id()));
            assert!(seen.insert(b.next_id()));
        }
    }

    #[test]
    #[should_panic(expected = "worker id")]
    fn test_worker_out_of_range() {
        Snowflake::new(MAX_WORKER + 1);
    }
}
