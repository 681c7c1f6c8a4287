use std::collections::{HashMap, VecDeque};

use crate::types::{AddressKey, DerivedAddress};

/// Default number of derived addresses a session keeps.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Bounded cache of derived addresses, oldest entry evicted first.
///
/// Holds public data only; keys never contain the phrase or seed.
#[derive(Debug, Clone)]
pub struct DerivationCache {
    entries: HashMap<AddressKey, DerivedAddress>,
    /// Insertion order, front = oldest.
    order: VecDeque<AddressKey>,
    capacity: usize,
}

impl Default for DerivationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl DerivationCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &AddressKey) -> Option<&DerivedAddress> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: AddressKey, address: DerivedAddress) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, address).is_some() {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
