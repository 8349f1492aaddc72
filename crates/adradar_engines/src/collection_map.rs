#![forbid(unsafe_code)]

//! Keyed stores whose lookups on unseen keys yield an empty collection.
//!
//! There is no removal: callers only ever grow or rewrite a
//! key's collection.

use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

/// Collection strategy backing a [`MapWithCollection`].
pub trait Collection<V>: Default {
    type Iter<'a>: Iterator<Item = &'a V>
    where
        Self: 'a,
        V: 'a;

    fn insert_value(&mut self, value: V);
    fn from_values<I: IntoIterator<Item = V>>(values: I) -> Self;
    fn iter_values(&self) -> Self::Iter<'_>;
    fn size(&self) -> usize;
}

/// Unique elements, insertion-ordered. Re-adding an equal value is a no-op.
impl<V: Hash + Eq> Collection<V> for IndexSet<V> {
    type Iter<'a> = indexmap::set::Iter<'a, V> where V: 'a;

    fn insert_value(&mut self, value: V) {
        self.insert(value);
    }

    fn from_values<I: IntoIterator<Item = V>>(values: I) -> Self {
        values.into_iter().collect()
    }

    fn iter_values(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn size(&self) -> usize {
        self.len()
    }
}

/// Ordered with duplicates. Adding always appends.
impl<V> Collection<V> for Vec<V> {
    type Iter<'a> = std::slice::Iter<'a, V> where V: 'a;

    fn insert_value(&mut self, value: V) {
        self.push(value);
    }

    fn from_values<I: IntoIterator<Item = V>>(values: I) -> Self {
        values.into_iter().collect()
    }

    fn iter_values(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn size(&self) -> usize {
        self.len()
    }
}

#[derive(Debug, Clone)]
pub struct MapWithCollection<K, V, C> {
    map: IndexMap<K, C>,
    empty: C,
    _values: std::marker::PhantomData<V>,
}

pub type MapWithSetValues<K, V> = MapWithCollection<K, V, IndexSet<V>>;
pub type MapWithListValues<K, V> = MapWithCollection<K, V, Vec<V>>;

impl<K, V, C> Default for MapWithCollection<K, V, C>
where
    K: Hash + Eq,
    C: Collection<V>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> MapWithCollection<K, V, C>
where
    K: Hash + Eq,
    C: Collection<V>,
{
    pub fn new() -> Self {
        Self {
            map: IndexMap::new(),
            empty: C::default(),
            _values: std::marker::PhantomData,
        }
    }

    /// Never fails; unseen keys share one canonical empty collection.
    pub fn get(&self, key: &K) -> &C {
        self.map.get(key).unwrap_or(&self.empty)
    }

    pub fn add(&mut self, key: K, value: V) {
        self.map.entry(key).or_default().insert_value(value);
    }

    pub fn set(&mut self, key: K, values: C) {
        self.map.insert(key, values);
    }

    /// Replaces the collection at `key` with its element-wise image under `f`.
    /// Unseen keys stay unseen.
    pub fn map_values<F>(&mut self, key: &K, f: F)
    where
        F: FnMut(&V) -> V,
    {
        if let Some(existing) = self.map.get_mut(key) {
            let rewritten = C::from_values(existing.iter_values().map(f));
            *existing = rewritten;
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Keys in order of first use.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&K, &C)> {
        self.map.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &C> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_collection_01_missing_key_yields_empty() {
        let sets: MapWithSetValues<&str, u32> = MapWithCollection::new();
        let lists: MapWithListValues<&str, u32> = MapWithCollection::new();
        assert_eq!(sets.get(&"nope").size(), 0);
        assert!(lists.get(&"nope").is_empty());
        assert!(sets.is_empty());
    }

    #[test]
    fn at_collection_02_set_add_is_idempotent() {
        let mut m: MapWithSetValues<&str, &str> = MapWithCollection::new();
        m.add("x", "u1");
        m.add("x", "u1");
        m.add("x", "x");
        assert_eq!(m.get(&"x").iter().copied().collect::<Vec<_>>(), vec!["u1", "x"]);
    }

    #[test]
    fn at_collection_03_list_add_keeps_duplicates() {
        let mut m: MapWithListValues<&str, u32> = MapWithCollection::new();
        m.add("u", 1);
        m.add("u", 1);
        assert_eq!(m.get(&"u"), &vec![1, 1]);
    }

    #[test]
    fn at_collection_04_keys_follow_first_use() {
        let mut m: MapWithListValues<&str, u32> = MapWithCollection::new();
        m.add("b", 1);
        m.add("a", 2);
        m.add("b", 3);
        m.set("c", vec![]);
        assert_eq!(m.keys().copied().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(m.entries().count(), 3);
    }

    #[test]
    fn at_collection_05_map_values_rewrites_in_place_order() {
        let mut m: MapWithListValues<&str, u32> = MapWithCollection::new();
        m.add("u", 1);
        m.add("u", 2);
        m.map_values(&"u", |v| v * 10);
        m.map_values(&"missing", |v| v * 10);
        assert_eq!(m.get(&"u"), &vec![10, 20]);
        assert!(!m.contains_key(&"missing"));
    }

    #[test]
    fn at_collection_06_map_values_on_set_collapses_duplicates() {
        let mut m: MapWithSetValues<&str, u32> = MapWithCollection::new();
        m.add("x", 1);
        m.add("x", 2);
        m.map_values(&"x", |_| 7);
        assert_eq!(m.get(&"x").size(), 1);
    }
}
