//! Latest-value table and bounded per-parameter history.
//!
//! Written by the draining task, read by any number of observers. Each read
//! takes the lock once and returns an owned copy, so observers never hold
//! the lock across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

use crate::types::ParameterSample;

/// Default number of samples retained per parameter.
pub const DEFAULT_HISTORY_LEN: usize = 50;

#[derive(Debug, Default)]
struct Slot {
    latest: Option<ParameterSample>,
    history: VecDeque<ParameterSample>,
}

/// Shared store of decoded parameter samples.
#[derive(Debug)]
pub struct ParameterStore {
    slots: RwLock<HashMap<u32, Slot>>,
    history_len: usize,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl ParameterStore {
    /// Create a store keeping at most `history_len` samples per tag (at least 1).
    pub fn new(history_len: usize) -> Self {
        Self { slots: RwLock::new(HashMap::new()), history_len: history_len.max(1) }
    }

    /// Record a sample: overwrite the latest slot and append to history,
    /// evicting the oldest entry when full.
    pub fn record(&self, sample: &ParameterSample) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(sample.tag).or_default();
        if slot.history.len() >= self.history_len {
            slot.history.pop_front();
        }
        slot.history.push_back(sample.clone());
        slot.latest = Some(sample.clone());
    }

    /// Most recent sample for `tag`.
    pub fn latest(&self, tag: u32) -> Option<ParameterSample> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(&tag).and_then(|slot| slot.latest.clone())
    }

    /// Latest sample of every parameter seen so far, ordered by tag.
    pub fn latest_all(&self) -> Vec<ParameterSample> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = slots.values().filter_map(|slot| slot.latest.clone()).collect();
        all.sort_by_key(|sample| sample.tag);
        all
    }

    /// History for `tag`, oldest first.
    pub fn history(&self, tag: u32) -> Vec<ParameterSample> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(&tag).map(|slot| slot.history.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }
}
