//! Temporary storage for delta objects while their base object is still
//! being decoded, keyed by either the base's pack offset (`ofs-delta`) or
//! its fingerprint (`ref-delta`).

use dashmap::DashMap;

use crate::hash::Fingerprint;

/// A delta entry parked until its base object is available, along with the
/// raw delta instruction bytes it still needs applied.
#[derive(Debug, Clone)]
pub struct PendingDelta {
    pub offset: usize,
    pub base_type: crate::internal::object::types::ObjectType,
    pub delta_data: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct Waitlist {
    pub map_offset: DashMap<usize, Vec<PendingDelta>>,
    pub map_ref: DashMap<Fingerprint, Vec<PendingDelta>>,
}

impl Waitlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_offset(&self, offset: usize, pending: PendingDelta) {
        self.map_offset.entry(offset).or_default().push(pending);
    }

    pub fn insert_ref(&self, hash: Fingerprint, pending: PendingDelta) {
        self.map_ref.entry(hash).or_default().push(pending);
    }

    /// Remove and return every delta waiting on either key. Once a base
    /// object at `offset`/`hash` resolves, its waiters can be retried.
    pub fn take(&self, offset: usize, hash: Fingerprint) -> Vec<PendingDelta> {
        let mut res = Vec::new();
        if let Some((_, vec)) = self.map_offset.remove(&offset) {
            res.extend(vec);
        }
        if let Some((_, vec)) = self.map_ref.remove(&hash) {
            res.extend(vec);
        }
        res
    }
}
