use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Address;

/// Shared set of pinned addresses
///
/// Clones share the same set. Insert and remove are idempotent.
#[derive(Debug, Clone, Default)]
pub struct Pins(Arc<Mutex<HashSet<Address>>>);

impl Pins {
    /// Create a new empty pin set
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin an address, returning whether it was newly pinned
    pub fn insert(&self, address: Address) -> bool {
        self.0.lock().insert(address)
    }

    /// Unpin an address, returning whether it was pinned
    pub fn remove(&self, address: &Address) -> bool {
        self.0.lock().remove(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.lock().contains(address)
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Snapshot of the pinned addresses, in string order
    pub fn to_vec(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.0.lock().iter().copied().collect();
        addresses.sort_by_key(|address| address.to_string());
        addresses
    }
}
