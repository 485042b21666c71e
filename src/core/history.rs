// Bounded, deduplicated, time-ordered reading history

use crate::core::constants::SEEN_IDS_PER_SLOT;
use crate::core::reading::{Reading, ReadingId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: VecDeque<Reading>,
    // id -> append generation it was last seen in. Outlives eviction, so a
    // source that keeps serving evicted readings does not re-insert them.
    seen: HashMap<ReadingId, u64>,
    generation: u64,
    capacity: usize,
    received_total: u64,
}

impl HistoryStore {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            seen: HashMap::with_capacity(capacity),
            generation: 0,
            capacity,
            received_total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Readings ever inserted, duplicates excluded. Survives eviction and reset.
    pub fn received_total(&self) -> u64 {
        self.received_total
    }

    /// Merges a batch, returning how many readings were actually inserted.
    pub fn append(&mut self, batch: Vec<Reading>) -> usize {
        self.generation += 1;
        let mut inserted = 0;
        for reading in batch {
            if let Some(id) = &reading.id {
                if self.seen.insert(id.clone(), self.generation).is_some() {
                    continue;
                }
            }
            let at = self.insert_position(&reading);
            self.entries.insert(at, reading);
            inserted += 1;
        }
        self.received_total += inserted as u64;

        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            if self.entries.pop_front().is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!("History evicted {} oldest readings", evicted);
        }
        self.forget_stale_ids();
        inserted
    }

    // Keeps the id memory within SEEN_IDS_PER_SLOT * capacity. Ids that are
    // retained or were part of the latest batch are never forgotten.
    fn forget_stale_ids(&mut self) {
        let limit = self.capacity.saturating_mul(SEEN_IDS_PER_SLOT);
        if self.seen.len() <= limit {
            return;
        }
        let current = self.generation;
        let retained: HashSet<&ReadingId> =
            self.entries.iter().filter_map(|r| r.id.as_ref()).collect();
        let mut stale: Vec<(u64, ReadingId)> = self
            .seen
            .iter()
            .filter(|(id, generation)| **generation < current && !retained.contains(id))
            .map(|(id, generation)| (*generation, id.clone()))
            .collect();
        stale.sort_by_key(|(generation, _)| *generation);

        let excess = self.seen.len() - limit;
        for (_, id) in stale.into_iter().take(excess) {
            self.seen.remove(&id);
        }
    }

    // Walk back past strictly-newer epochs. Entries without an epoch hold the
    // slot they arrived in, so they stop the walk.
    fn insert_position(&self, reading: &Reading) -> usize {
        if reading.timestamp.epoch().is_none() {
            return self.entries.len();
        }
        let mut at = self.entries.len();
        while at > 0 {
            match self.entries[at - 1].timestamp.cmp_epoch(&reading.timestamp) {
                Some(Ordering::Greater) => at -= 1,
                _ => break,
            }
        }
        at
    }

    pub fn all(&self) -> impl DoubleEndedIterator<Item = &Reading> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Newest reading in store order, or `None` before any data arrived.
    pub fn latest(&self) -> Option<&Reading> {
        self.entries.back()
    }

    /// Clears entries and the id memory, so a re-fetch repopulates the store.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }
}
