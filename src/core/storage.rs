use crate::error::PhysicsError;
use crate::Result;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A generation-checked index into an [`Arena`].
///
/// A handle stays valid until the slot it names is removed. Reusing the slot
/// bumps its generation, so stale handles resolve to `None` instead of to the
/// new occupant.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Returns the slot index of this handle
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the generation of this handle
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

enum Slot<T> {
    Occupied { generation: u32, item: T },
    Free { generation: u32, next_free: Option<u32> },
}

/// Slot storage with generation-checked handles
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    first_free: Option<u32>,
    len: usize,
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.len)
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates a new empty arena
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            first_free: None,
            len: 0,
        }
    }

    /// Adds an item to the arena and returns its handle
    pub fn insert(&mut self, item: T) -> Handle<T> {
        self.len += 1;
        match self.first_free {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let (generation, next_free) = match slot {
                    Slot::Free { generation, next_free } => (*generation, *next_free),
                    Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
                };
                *slot = Slot::Occupied { generation, item };
                self.first_free = next_free;
                Handle::new(index, generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot::Occupied { generation: 0, item });
                Handle::new(index, 0)
            }
        }
    }

    /// Gets a reference to an item by its handle
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        match self.slots.get(handle.index as usize)? {
            Slot::Occupied { generation, item } if *generation == handle.generation => Some(item),
            _ => None,
        }
    }

    /// Gets a mutable reference to an item by its handle
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        match self.slots.get_mut(handle.index as usize)? {
            Slot::Occupied { generation, item } if *generation == handle.generation => Some(item),
            _ => None,
        }
    }

    /// Gets mutable references to two distinct items at once
    pub fn get2_mut(&mut self, a: Handle<T>, b: Handle<T>) -> Option<(&mut T, &mut T)> {
        if a.index == b.index || !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (low, high, swapped) = if a.index < b.index {
            (a, b, false)
        } else {
            (b, a, true)
        };
        let (head, tail) = self.slots.split_at_mut(high.index as usize);
        let first = match &mut head[low.index as usize] {
            Slot::Occupied { item, .. } => item,
            Slot::Free { .. } => return None,
        };
        let second = match &mut tail[0] {
            Slot::Occupied { item, .. } => item,
            Slot::Free { .. } => return None,
        };
        if swapped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }

    /// Removes an item from the arena, invalidating its handle
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        let slot = &mut self.slots[handle.index as usize];
        let next_generation = handle.generation.wrapping_add(1);
        let old = std::mem::replace(
            slot,
            Slot::Free {
                generation: next_generation,
                next_free: self.first_free,
            },
        );
        self.first_free = Some(handle.index);
        self.len -= 1;
        match old {
            Slot::Occupied { item, .. } => Some(item),
            Slot::Free { .. } => None,
        }
    }

    /// Returns whether the handle refers to a live item
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Returns the number of items in the arena
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the handles of all live items
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Returns an iterator over all items
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied { generation, item } => Some((Handle::new(index as u32, *generation), item)),
            Slot::Free { .. } => None,
        })
    }

    /// Returns a mutable iterator over all items
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied { generation, item } => Some((Handle::new(index as u32, *generation), item)),
            Slot::Free { .. } => None,
        })
    }

    /// Gets an item by its handle, returning an error if not found
    pub fn get_checked(&self, handle: Handle<T>, what: &str) -> Result<&T> {
        self.get(handle)
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("{} with handle {:?} not found", what, handle)))
    }

    /// Gets a mutable reference to an item by its handle, returning an error if not found
    pub fn get_checked_mut(&mut self, handle: Handle<T>, what: &str) -> Result<&mut T> {
        self.get_mut(handle)
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("{} with handle {:?} not found", what, handle)))
    }
}
