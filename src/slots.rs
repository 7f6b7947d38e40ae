use core::{fmt, marker::PhantomData};

use thiserror::Error;

/// the raw position and generation of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// a typed key into a [`Slots`] table
pub trait SlotKey: Copy {
    fn from_slot(id: SlotId) -> Self;
    fn slot(self) -> SlotId;
}

macro_rules! slot_key {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(SlotId);

            impl SlotKey for $name {
                fn from_slot(id: SlotId) -> Self {
                    Self(id)
                }

                fn slot(self) -> SlotId {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

slot_key!(
    /// identifies one connection in the bot's connection table
    ConnectionId,
    /// identifies one loaded module in the bot's module table
    ModuleId,
);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("slot table is full ({capacity} entries)")]
pub struct SlotsFull {
    pub capacity: usize,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// a slot map with generation checked keys. removing an entry bumps the generation of its slot,
/// so keys handed out for the old entry stop resolving even after the slot is reused.
#[derive(Debug)]
pub struct Slots<K, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    capacity: Option<usize>,
    _key: PhantomData<K>,
}

impl<K: SlotKey, T> Default for Slots<K, T> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<K: SlotKey, T> Slots<K, T> {
    /// creates an empty table. with a capacity, inserts past that many live entries fail.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            capacity,
            _key: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> Result<K, SlotsFull> {
        self.insert_with(|_| value)
    }

    /// inserts the value built by `f`, which is given the key the value will live under
    pub fn insert_with(&mut self, f: impl FnOnce(K) -> T) -> Result<K, SlotsFull> {
        if let Some(capacity) = self.capacity {
            if self.len >= capacity {
                return Err(SlotsFull { capacity });
            }
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let Ok(index) = u32::try_from(self.slots.len()) else {
                    return Err(SlotsFull {
                        capacity: self.slots.len(),
                    });
                };
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        let key = K::from_slot(SlotId {
            index,
            generation: slot.generation,
        });
        slot.value = Some(f(key));
        self.len += 1;
        Ok(key)
    }

    pub fn get(&self, key: K) -> Option<&T> {
        let id = key.slot();
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        let id = key.slot();
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        let id = key.slot();
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            let key = K::from_slot(SlotId {
                // NOTE: slots are only ever pushed while their index fits in a u32
                index: index as u32,
                generation: slot.generation,
            });
            Some((key, value))
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }
}
