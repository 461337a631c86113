//! Generational arena.
//!
//! Traces and groups refer to each other by index instead of by pointer. A
//! slot freed by `remove` is reused with a bumped generation, so a stale index
//! never resolves to the newer occupant.

use std::marker::PhantomData;

/// Raw slot + generation pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index {
    slot: u32,
    generation: u32,
}

impl Index {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Typed handle over an [`Index`].
pub trait ArenaKey: Copy {
    fn from_index(index: Index) -> Self;
    fn index(self) -> Index;
}

enum Entry<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32 },
}

/// Storage addressed by generational keys.
pub struct Arena<K, T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
    len: usize,
    _key: PhantomData<fn(K) -> K>,
}

impl<K: ArenaKey, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
            _key: PhantomData,
        }
    }
}

impl<K: ArenaKey, T> Arena<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> K {
        self.insert_with(|_| value)
    }

    /// Insert a value that needs to know its own key.
    pub fn insert_with(&mut self, make: impl FnOnce(K) -> T) -> K {
        let (slot, generation) = match self.free.pop() {
            Some(slot) => {
                let generation = match &self.entries[slot as usize] {
                    Entry::Vacant { generation } => generation.wrapping_add(1),
                    Entry::Occupied { generation, .. } => generation.wrapping_add(1),
                };
                (slot, generation)
            }
            None => {
                self.entries.push(Entry::Vacant { generation: 0 });
                ((self.entries.len() - 1) as u32, 0)
            }
        };
        let key = K::from_index(Index { slot, generation });
        let value = make(key);
        self.entries[slot as usize] = Entry::Occupied { generation, value };
        self.len += 1;
        key
    }

    pub fn get(&self, key: K) -> Option<&T> {
        let index = key.index();
        match self.entries.get(index.slot as usize) {
            Some(Entry::Occupied { generation, value }) if *generation == index.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        let index = key.index();
        match self.entries.get_mut(index.slot as usize) {
            Some(Entry::Occupied { generation, value }) if *generation == index.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        let index = key.index();
        let entry = self.entries.get_mut(index.slot as usize)?;
        let live = matches!(
            &*entry,
            Entry::Occupied { generation, .. } if *generation == index.generation
        );
        if !live {
            return None;
        }
        let vacant = Entry::Vacant {
            generation: index.generation,
        };
        match std::mem::replace(entry, vacant) {
            Entry::Occupied { value, .. } => {
                self.free.push(index.slot);
                self.len -= 1;
                Some(value)
            }
            Entry::Vacant { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Occupied entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| match entry {
                Entry::Occupied { generation, value } => Some((
                    K::from_index(Index {
                        slot: slot as u32,
                        generation: *generation,
                    }),
                    value,
                )),
                Entry::Vacant { .. } => None,
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> + '_ {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, entry)| match entry {
                Entry::Occupied { generation, value } => Some((
                    K::from_index(Index {
                        slot: slot as u32,
                        generation: *generation,
                    }),
                    value,
                )),
                Entry::Vacant { .. } => None,
            })
    }

    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(key, _)| key).collect()
    }
}

impl<K: ArenaKey + std::fmt::Debug, T: std::fmt::Debug> std::fmt::Debug for Arena<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Declare a typed arena key with a `prefix#slot.generation` display form.
#[macro_export]
macro_rules! arena_key {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name($crate::arena::Index);

        impl $crate::arena::ArenaKey for $name {
            fn from_index(index: $crate::arena::Index) -> Self {
                Self(index)
            }

            fn index(self) -> $crate::arena::Index {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}.{}", $prefix, self.0.slot(), self.0.generation())
            }
        }
    };
}
