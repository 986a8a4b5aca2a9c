use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use super::{StateEntry, StateItem, StateMutation};
use crate::codec::MapCodec;
use crate::error::Result;

#[derive(Debug, Clone)]
enum Update<V> {
    Put(V),
    Delete,
}

/// A key/value table: an immutable loaded baseline plus an overlay of edits.
///
/// `size` is maintained incrementally and always equals the number of
/// entries yielded by [`MapState::all`].
pub struct MapState<K, V, C> {
    name: String,
    original: HashMap<K, V>,
    updates: HashMap<K, Update<V>>,
    size: usize,
    codec: C,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, C> MapState<K, V, C>
where
    K: Eq + Hash + Clone,
    C: MapCodec<K, V>,
{
    pub fn new(name: impl Into<String>, codec: C) -> Self {
        Self {
            name: name.into(),
            original: HashMap::new(),
            updates: HashMap::new(),
            size: 0,
            codec,
            _marker: PhantomData,
        }
    }

    /// Look up a key, preferring the overlay over the baseline.
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.updates.get(key) {
            Some(Update::Put(value)) => Some(value),
            Some(Update::Delete) => None,
            None => self.original.get(key),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: K, value: V) {
        if !self.contains_key(&key) {
            self.size += 1;
        }
        self.updates.insert(key, Update::Put(value));
    }

    /// Delete a key. Deleting a key that is not visible is a no-op.
    pub fn delete(&mut self, key: &K) {
        if !self.contains_key(key) {
            return;
        }
        self.updates.insert(key.clone(), Update::Delete);
        self.size -= 1;
    }

    /// Iterate every visible entry without duplicates.
    ///
    /// Baseline keys come first (with their overlay value if overridden),
    /// followed by keys that only exist in the overlay.
    pub fn all(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        let baseline = self
            .original
            .iter()
            .filter_map(|(key, value)| match self.updates.get(key) {
                Some(Update::Put(updated)) => Some((key, updated)),
                Some(Update::Delete) => None,
                None => Some((key, value)),
            });
        let added = self
            .updates
            .iter()
            .filter_map(|(key, update)| match update {
                Update::Put(value) if !self.original.contains_key(key) => Some((key, value)),
                _ => None,
            });
        baseline.chain(added)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl<K, V, C> StateItem for MapState<K, V, C>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
    C: MapCodec<K, V>,
{
    fn name(&self) -> &str {
        &self.name
    }

    /// Replace the baseline. Pending edits stay in the overlay and keep
    /// taking precedence, so `size` is recounted against the new baseline.
    fn load(&mut self, entries: &[StateEntry]) -> Result<()> {
        let mut original = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = self.codec.decode_key(&entry.key)?;
            let value = self.codec.decode_value(&entry.value)?;
            original.insert(key, value);
        }
        self.original = original;
        self.size = self.all().count();
        Ok(())
    }

    fn mutations(&self) -> Result<Vec<StateMutation>> {
        let mut mutations = Vec::with_capacity(self.updates.len());
        for (key, update) in &self.updates {
            let key = self.codec.encode_key(key)?;
            let mutation = match update {
                Update::Put(value) => StateMutation::Put {
                    key,
                    value: self.codec.encode_value(value)?,
                },
                Update::Delete => StateMutation::Delete { key },
            };
            mutations.push(mutation);
        }
        Ok(mutations)
    }
}

impl<K, V, C> fmt::Debug for MapState<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapState")
            .field("name", &self.name)
            .field("original", &self.original.len())
            .field("updates", &self.updates.len())
            .field("size", &self.size)
            .finish()
    }
}
