use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use maple_audit_types::ReceiptId;

use crate::evidence::EvidenceCapsule;

/// Bounded in-memory cache of verified capsules, oldest evicted first.
///
/// Purely an optimisation: a poisoned lock behaves as an empty cache.
#[derive(Clone, Debug)]
pub struct MaterializationCache {
    inner: Arc<Mutex<CacheInner>>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<ReceiptId, EvidenceCapsule>,
    order: VecDeque<ReceiptId>,
}

impl MaterializationCache {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            capacity,
        }
    }

    pub fn get(&self, receipt_id: &ReceiptId) -> Option<EvidenceCapsule> {
        let guard = self.inner.lock().ok()?;
        guard.entries.get(receipt_id).cloned()
    }

    pub fn insert(&self, capsule: EvidenceCapsule) {
        if self.capacity == 0 {
            return;
        }
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        let id = capsule.receipt_id.clone();
        if guard.entries.insert(id.clone(), capsule).is_none() {
            guard.order.push_back(id);
        }
        while guard.entries.len() > self.capacity {
            match guard.order.pop_front() {
                Some(oldest) => {
                    guard.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MaterializationCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
