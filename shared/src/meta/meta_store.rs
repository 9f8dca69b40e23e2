use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use super::meta_value::{MetaKey, MetaValue};

/// Keys changed since the last transmitted snapshot. `None` marks a removal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetaDelta {
    changes: BTreeMap<MetaKey, Option<Arc<MetaValue>>>,
}

impl MetaDelta {
    pub fn new() -> Self {
        Self {
            changes: BTreeMap::new(),
        }
    }

    pub fn set(mut self, key: MetaKey, value: impl Into<MetaValue>) -> Self {
        self.changes.insert(key, Some(Arc::new(value.into())));
        self
    }

    pub fn remove(mut self, key: MetaKey) -> Self {
        self.changes.insert(key, None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, key: &MetaKey) -> Option<Option<&MetaValue>> {
        self.changes.get(key).map(|value| value.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetaKey, Option<&MetaValue>)> {
        self.changes
            .iter()
            .map(|(key, value)| (key, value.as_deref()))
    }

    /// Folds a newer delta into this one; newer changes win per key.
    pub fn merge(&mut self, newer: MetaDelta) {
        self.changes.extend(newer.changes);
    }
}

/// Per-interaction property bag passed between steps.
///
/// Values sit behind `Arc`, so [`MetaStore::duplicate`] shares them with the
/// source store until either side overwrites a key.
#[derive(Clone, Debug, Default)]
pub struct MetaStore {
    values: HashMap<MetaKey, Arc<MetaValue>>,
    dirty: BTreeSet<MetaKey>,
}

impl MetaStore {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Returns the previous value, if any.
    pub fn set(&mut self, key: MetaKey, value: impl Into<MetaValue>) -> Option<Arc<MetaValue>> {
        let value = value.into();
        if let Some(existing) = self.values.get(&key) {
            if **existing == value {
                return Some(existing.clone());
            }
        }
        self.dirty.insert(key.clone());
        self.values.insert(key, Arc::new(value))
    }

    pub fn get(&self, key: &MetaKey) -> Option<&MetaValue> {
        self.values.get(key).map(|value| value.as_ref())
    }

    pub fn get_shared(&self, key: &MetaKey) -> Option<Arc<MetaValue>> {
        self.values.get(key).cloned()
    }

    pub fn remove(&mut self, key: &MetaKey) -> Option<Arc<MetaValue>> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.dirty.insert(key.clone());
        }
        removed
    }

    pub fn contains(&self, key: &MetaKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_pending_delta(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Collects every key touched since the previous call and resets tracking.
    pub fn take_delta(&mut self) -> MetaDelta {
        let mut delta = MetaDelta::new();
        for key in std::mem::take(&mut self.dirty) {
            let value = self.values.get(&key).cloned();
            delta.changes.insert(key, value);
        }
        delta
    }

    /// Replays a remote delta. Applied keys are not marked dirty, so they are
    /// never echoed back to the peer they came from.
    pub fn apply_delta(&mut self, delta: &MetaDelta) {
        for (key, value) in delta.changes.iter() {
            match value {
                Some(value) => {
                    self.values.insert(key.clone(), value.clone());
                }
                None => {
                    self.values.remove(key);
                }
            }
            self.dirty.remove(key);
        }
    }

    /// A store holding the same values, by reference, with no pending delta.
    pub fn duplicate(&self) -> Self {
        Self {
            values: self.values.clone(),
            dirty: BTreeSet::new(),
        }
    }
}
