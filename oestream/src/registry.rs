//! Handoff of externally authored sync codes to running interfaces.
//!
//! In external sync mode an upstream source (for instance a host variable
//! observer) sets the digital output itself and reports the value it wrote.
//! Each interface owns one handoff slot keyed by an id; the processing loop
//! takes the slot at the top of every iteration, so the sync engine is only
//! ever touched from its own thread.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::HostTime;

/// A code written upstream and the host time it was written at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalSync {
    pub value: i64,
    pub time: HostTime,
}

pub(crate) type Slot = Arc<Mutex<Option<ExternalSync>>>;

#[derive(Debug, Default)]
struct Slots {
    next_id: u64,
    slots: HashMap<u64, Slot>,
}

/// Process-wide map from interface ids to handoff slots. Clones share the map.
#[derive(Debug, Clone, Default)]
pub struct NotifierRegistry {
    inner: Arc<Mutex<Slots>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self) -> (u64, Slot) {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let slot = Slot::default();
        inner.slots.insert(id, slot.clone());
        (id, slot)
    }

    pub(crate) fn deregister(&self, id: u64) {
        self.inner.lock().slots.remove(&id);
    }

    /// Handle for reporting codes to interface `id`
    pub fn notifier(&self, id: u64) -> SyncNotifier {
        SyncNotifier {
            id,
            registry: self.clone(),
        }
    }

    /// Number of registered interfaces
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reports externally written codes. Outlives its interface harmlessly.
#[derive(Debug, Clone)]
pub struct SyncNotifier {
    id: u64,
    registry: NotifierRegistry,
}

impl SyncNotifier {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Hand a code to the interface. A newer value replaces one not yet taken.
    /// Returns false when the interface is no longer registered.
    pub fn notify(&self, value: i64, time: HostTime) -> bool {
        let slot = match self.registry.inner.lock().slots.get(&self.id) {
            Some(s) => s.clone(),
            None => return false,
        };
        *slot.lock() = Some(ExternalSync { value, time });
        true
    }
}
