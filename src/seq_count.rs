//! Optional providers for the 14 bit packet sequence count of CCSDS space packets.
//!
//! The codecs in [crate::sp] and [crate::csp] are stateless and never use these providers. They
//! are helpers for packet producers which have to keep a packet sequence count per APID. The
//! count wraps around to 0 after [MAX_SEQ_COUNT], and the provided value is passed to the header
//! explicitly, for example via [crate::sp::SpHeader::tm].
//!
//! ```rust
//! use spacecodecs::seq_count::{CcsdsSimpleSeqCountProvider, SequenceCountProvider};
//! use spacecodecs::sp::{CcsdsPacket, SpHeader};
//!
//! let seq_counter = CcsdsSimpleSeqCountProvider::default();
//! let first = SpHeader::tm(0x42, seq_counter.get_and_increment(), 0).unwrap();
//! let second = SpHeader::tm(0x42, seq_counter.get_and_increment(), 0).unwrap();
//! assert_eq!(first.seq_count(), 0);
//! assert_eq!(second.seq_count(), 1);
//! ```
use crate::sp::MAX_SEQ_COUNT;
use core::cell::Cell;
#[cfg(feature = "std")]
pub use stdmod::*;

/// Core trait for objects which can provide a sequence count.
///
/// The core functions are not mutable on purpose to allow easier usage with
/// static structs when using the interior mutability pattern. This can be achieved by using
/// [Cell], [core::cell::RefCell] or atomic types.
pub trait SequenceCountProvider {
    fn get(&self) -> u16;

    fn increment(&self);

    fn get_and_increment(&self) -> u16 {
        let val = self.get();
        self.increment();
        val
    }
}

#[inline]
const fn next_seq_count(seq_count: u16) -> u16 {
    if seq_count >= MAX_SEQ_COUNT {
        0
    } else {
        seq_count + 1
    }
}

/// Single threaded sequence count provider which wraps around at [MAX_SEQ_COUNT].
#[derive(Debug, Default, Clone)]
pub struct CcsdsSimpleSeqCountProvider {
    seq_count: Cell<u16>,
}

impl CcsdsSimpleSeqCountProvider {
    /// Start counting at the given value. Values above [MAX_SEQ_COUNT] are truncated to 14 bits.
    pub fn new_with_start_val(start_val: u16) -> Self {
        Self {
            seq_count: Cell::new(start_val & MAX_SEQ_COUNT),
        }
    }
}

impl SequenceCountProvider for CcsdsSimpleSeqCountProvider {
    fn get(&self) -> u16 {
        self.seq_count.get()
    }

    fn increment(&self) {
        self.seq_count.set(next_seq_count(self.seq_count.get()));
    }
}

#[cfg(feature = "std")]
pub mod stdmod {
    use super::*;
    use crate::sp::MAX_APID;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::{Arc, Mutex};

    /// Thread-safe sequence count provider which wraps around at [MAX_SEQ_COUNT]. Clones share
    /// the same counter.
    #[derive(Debug, Default, Clone)]
    pub struct CcsdsSyncSeqCountProvider {
        seq_count: Arc<AtomicU16>,
    }

    impl CcsdsSyncSeqCountProvider {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl SequenceCountProvider for CcsdsSyncSeqCountProvider {
        fn get(&self) -> u16 {
            self.seq_count.load(Ordering::Relaxed)
        }

        fn increment(&self) {
            self.get_and_increment();
        }

        fn get_and_increment(&self) -> u16 {
            // The closure always returns Some, so both variants hold the previous value.
            match self
                .seq_count
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                    Some(next_seq_count(count))
                }) {
                Ok(prev) | Err(prev) => prev,
            }
        }
    }

    /// Keeps one wrapping sequence count per APID. Clones share the same counters.
    ///
    /// Please note that the API provided by this class will not panic on [Mutex] lock errors,
    /// but it will yield [None].
    #[derive(Debug, Default, Clone)]
    pub struct ApidSeqCounters {
        counters: Arc<Mutex<HashMap<u16, u16>>>,
    }

    impl ApidSeqCounters {
        pub fn new() -> Self {
            Self::default()
        }

        /// Current sequence count for the given APID without incrementing it. Returns [None] if
        /// the APID exceeds [MAX_APID].
        pub fn get(&self, apid: u16) -> Option<u16> {
            if apid > MAX_APID {
                return None;
            }
            let counters = self.counters.lock().ok()?;
            Some(counters.get(&apid).copied().unwrap_or(0))
        }

        /// Retrieve the sequence count to use for the next packet of the given APID and
        /// increment the stored count. Returns [None] if the APID exceeds [MAX_APID].
        pub fn next(&self, apid: u16) -> Option<u16> {
            if apid > MAX_APID {
                return None;
            }
            let mut counters = self.counters.lock().ok()?;
            let count = counters.entry(apid).or_insert(0);
            let current = *count;
            *count = next_seq_count(current);
            Some(current)
        }

        /// Reset the sequence count of all APIDs to 0.
        pub fn reset(&self) {
            if let Ok(mut counters) = self.counters.lock() {
                counters.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ccsds_counter() {
        let ccsds_counter = CcsdsSimpleSeqCountProvider::default();
        assert_eq!(ccsds_counter.get(), 0);
        assert_eq!(ccsds_counter.get_and_increment(), 0);
        assert_eq!(ccsds_counter.get_and_increment(), 1);
        assert_eq!(ccsds_counter.get(), 2);
    }

    #[test]
    fn test_ccsds_counter_overflow() {
        let ccsds_counter = CcsdsSimpleSeqCountProvider::default();
        for _ in 0..MAX_SEQ_COUNT + 1 {
            ccsds_counter.increment();
        }
        assert_eq!(ccsds_counter.get(), 0);
    }

    #[test]
    fn test_ccsds_counter_start_val() {
        let ccsds_counter = CcsdsSimpleSeqCountProvider::new_with_start_val(MAX_SEQ_COUNT);
        assert_eq!(ccsds_counter.get_and_increment(), MAX_SEQ_COUNT);
        assert_eq!(ccsds_counter.get(), 0);
        let ccsds_counter = CcsdsSimpleSeqCountProvider::new_with_start_val(0xFFFF);
        assert_eq!(ccsds_counter.get(), MAX_SEQ_COUNT);
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_sync_counter() {
        let sync_counter = CcsdsSyncSeqCountProvider::new();
        let shared = sync_counter.clone();
        assert_eq!(sync_counter.get(), 0);
        assert_eq!(sync_counter.get_and_increment(), 0);
        assert_eq!(shared.get_and_increment(), 1);
        assert_eq!(sync_counter.get(), 2);
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_sync_counter_overflow() {
        let sync_counter = CcsdsSyncSeqCountProvider::new();
        for _ in 0..MAX_SEQ_COUNT + 1 {
            sync_counter.increment();
        }
        assert_eq!(sync_counter.get(), 0);
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_sync_counter_threads() {
        let sync_counter = CcsdsSyncSeqCountProvider::new();
        let handles: std::vec::Vec<_> = (0..4)
            .map(|_| {
                let counter = sync_counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        counter.increment();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sync_counter.get(), 400);
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_apid_counters() {
        let counters = ApidSeqCounters::new();
        assert_eq!(counters.get(0x42), Some(0));
        assert_eq!(counters.next(0x42), Some(0));
        assert_eq!(counters.next(0x42), Some(1));
        assert_eq!(counters.next(0x01), Some(0));
        assert_eq!(counters.get(0x42), Some(2));
        assert_eq!(counters.next(0x800), None);
        assert_eq!(counters.get(0x800), None);
        counters.reset();
        assert_eq!(counters.get(0x42), Some(0));
    }

    #[test]
    fn test_counter_feeds_header_until_wrap() {
        use crate::sp::{CcsdsPacket, SpHeader};

        let ccsds_counter = CcsdsSimpleSeqCountProvider::new_with_start_val(MAX_SEQ_COUNT - 1);
        let mut seq_counts = [0; 3];
        for seq_count in seq_counts.iter_mut() {
            let sp_header = SpHeader::tc(0x42, ccsds_counter.get_and_increment(), 0)
                .expect("sequence count out of range");
            let sp_header_parsed = SpHeader::from_bytes(&sp_header.to_bytes()).unwrap();
            *seq_count = sp_header_parsed.seq_count();
        }
        assert_eq!(seq_counts, [MAX_SEQ_COUNT - 1, MAX_SEQ_COUNT, 0]);
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_apid_counters_wrap() {
        let counters = ApidSeqCounters::new();
        for _ in 0..MAX_SEQ_COUNT {
            counters.next(0x7FF);
        }
        assert_eq!(counters.next(0x7FF), Some(MAX_SEQ_COUNT));
        assert_eq!(counters.next(0x7FF), Some(0));
    }
}
