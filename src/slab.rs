/// Fixed-capacity slot pool with generation-checked handles.
///
/// Entities live in slots addressed by a small index; a [`Key`] pairs that
/// index with the slot's generation at insert time. Releasing a slot bumps its
/// generation, so a key held by someone else after the release resolves to
/// nothing instead of to whatever reuses the slot.
use heapless::Vec;

use crate::list::Store;

/// Slot index inside a pool.
pub type SlotIdx = u16;

/// A generation-checked reference into a [`Slab`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    index: SlotIdx,
    generation: u32,
}

impl Key {
    pub const fn index(&self) -> SlotIdx {
        self.index
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Pool of up to `N` values of `T`.
#[derive(Debug)]
pub struct Slab<T, const N: usize> {
    slots: Vec<Slot<T>, N>,
    free: Vec<SlotIdx, N>,
    len: usize,
}

impl<T, const N: usize> Slab<T, N> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Insert a value built from its own key. Hands the builder back when
    /// every slot is taken.
    pub fn insert_with<F>(&mut self, build: F) -> Result<Key, F>
    where
        F: FnOnce(Key) -> T,
    {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.is_full() {
                    return Err(build);
                }
                let index = self.slots.len() as SlotIdx;
                // Capacity checked above.
                let _ = self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                index
            }
        };
        let slot = &mut self.slots[index as usize];
        let key = Key {
            index,
            generation: slot.generation,
        };
        slot.value = Some(build(key));
        self.len += 1;
        Ok(key)
    }

    /// Release the slot a key points at, returning its value.
    pub fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        // A slot is only ever freed once per generation, so this never overflows.
        let _ = self.free.push(key.index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, key: Key) -> Option<&T> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Current key of an occupied slot.
    pub fn key_at(&self, index: SlotIdx) -> Option<Key> {
        let slot = self.slots.get(index as usize)?;
        slot.value.as_ref().map(|_| Key {
            index,
            generation: slot.generation,
        })
    }

    pub fn get_at(&self, index: SlotIdx) -> Option<&T> {
        self.slots.get(index as usize)?.value.as_ref()
    }

    pub fn get_at_mut(&mut self, index: SlotIdx) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.value.as_mut()
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIdx, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_ref().map(|v| (i as SlotIdx, v)))
    }

    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                let _ = self.free.push(i as SlotIdx);
            }
        }
        self.len = 0;
    }
}

impl<T, const N: usize> Default for Slab<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// List links address pool entries by slot index. A vacant slot reached
/// through a link means a list was corrupted, which is fatal.
impl<T, const N: usize> Store<T> for Slab<T, N> {
    fn item(&self, index: SlotIdx) -> &T {
        match self.get_at(index) {
            Some(value) => value,
            None => panic!("list link points at vacant slot {index}"),
        }
    }

    fn item_mut(&mut self, index: SlotIdx) -> &mut T {
        match self.get_at_mut(index) {
            Some(value) => value,
            None => panic!("list link points at vacant slot {index}"),
        }
    }
}
