use crate::math::{Aabb, Vec3};
use std::fmt::Debug;

/// Spatial acceleration structure used by the broad phase.
///
/// Objects are organized in groups; objects of the same group never collide
/// with each other and may be rebalanced as one unit. No ordering is
/// guaranteed on enumerated pairs.
pub trait BoundsTree<T: Copy + Eq + Debug>: Send + Sync + Debug {
    /// Adds an object in a new group of its own
    fn add(&mut self, object: T, bounds: Aabb);

    /// Adds an object to the group of `representative`; returns false if the representative is absent
    fn add_to_group(&mut self, object: T, bounds: Aabb, representative: T) -> bool;

    /// Removes an object; returns false if it was absent
    fn remove(&mut self, object: T) -> bool;

    /// Returns whether the object is in the tree
    fn contains(&self, object: T) -> bool;

    /// Returns the number of objects in the tree
    fn len(&self) -> usize;

    /// Returns whether the tree is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the stored bounds of an object
    fn update_object_bounds(&mut self, object: T, bounds: Aabb) -> bool;

    /// Puts `new` in the place of `old`, keeping its group
    fn find_and_replace_object(&mut self, old: T, new: T, bounds: Aabb) -> bool;

    /// Joins the groups of two objects into one
    fn merge_groups(&mut self, first: T, second: T) -> bool;

    /// Moves an object into a new group of its own
    fn move_out_of_group(&mut self, object: T) -> bool;

    /// Returns whether both objects are present and share a group
    fn in_same_group(&self, first: T, second: T) -> bool;

    /// Calls `f` for every object with its stored bounds
    fn for_each_object(&self, f: &mut dyn FnMut(T, &Aabb));

    /// Calls `f` for every object whose bounds overlap `bounds`
    fn for_each_overlapping(&self, bounds: &Aabb, f: &mut dyn FnMut(T));

    /// Calls `f` for every overlapping pair inside the tree, skipping pairs of one group
    fn for_each_colission(&self, f: &mut dyn FnMut(T, T));

    /// Calls `f` for every overlapping pair with the first object from this tree
    /// and the second from `other`
    fn for_each_colission_with(&self, other: &dyn BoundsTree<T>, f: &mut dyn FnMut(T, T)) {
        self.for_each_object(&mut |object, bounds| {
            other.for_each_overlapping(bounds, &mut |found| f(object, found));
        });
    }

    /// Recomputes every stored bounds from the objects' current state
    fn recalculate_bounds(&mut self, bounds_of: &mut dyn FnMut(T) -> Aabb);

    /// Reorganizes the structure after objects moved
    fn improve_structure(&mut self);
}

#[derive(Debug, Clone, Copy)]
struct Entry<T> {
    object: T,
    bounds: Aabb,
    group: u64,
}

/// Simple brute-force tree; every query scans all objects
#[derive(Debug, Clone)]
pub struct BruteForceTree<T> {
    /// The objects in the tree with their bounds and group
    entries: Vec<Entry<T>>,

    /// The next unused group id
    next_group: u64,
}

impl<T> Default for BruteForceTree<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_group: 0,
        }
    }
}

impl<T: Copy + Eq + Debug> BruteForceTree<T> {
    /// Creates a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, object: T) -> Option<usize> {
        self.entries.iter().position(|e| e.object == object)
    }

    fn new_group(&mut self) -> u64 {
        let group = self.next_group;
        self.next_group += 1;
        group
    }

    /// Returns the number of distinct groups in the tree
    pub fn group_count(&self) -> usize {
        let mut groups: Vec<u64> = self.entries.iter().map(|e| e.group).collect();
        groups.sort_unstable();
        groups.dedup();
        groups.len()
    }
}

impl<T: Copy + Eq + Debug + Send + Sync> BoundsTree<T> for BruteForceTree<T> {
    fn add(&mut self, object: T, bounds: Aabb) {
        let group = self.new_group();
        self.entries.push(Entry { object, bounds, group });
    }

    fn add_to_group(&mut self, object: T, bounds: Aabb, representative: T) -> bool {
        match self.position(representative) {
            Some(index) => {
                let group = self.entries[index].group;
                self.entries.push(Entry { object, bounds, group });
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, object: T) -> bool {
        match self.position(object) {
            Some(index) => {
                self.entries.swap_remove(index);
                true
            }
            None => false,
        }
    }

    fn contains(&self, object: T) -> bool {
        self.position(object).is_some()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn update_object_bounds(&mut self, object: T, bounds: Aabb) -> bool {
        match self.position(object) {
            Some(index) => {
                self.entries[index].bounds = bounds;
                true
            }
            None => false,
        }
    }

    fn find_and_replace_object(&mut self, old: T, new: T, bounds: Aabb) -> bool {
        match self.position(old) {
            Some(index) => {
                self.entries[index].object = new;
                self.entries[index].bounds = bounds;
                true
            }
            None => false,
        }
    }

    fn merge_groups(&mut self, first: T, second: T) -> bool {
        let (Some(a), Some(b)) = (self.position(first), self.position(second)) else {
            return false;
        };
        let keep = self.entries[a].group;
        let absorbed = self.entries[b].group;
        for entry in &mut self.entries {
            if entry.group == absorbed {
                entry.group = keep;
            }
        }
        true
    }

    fn move_out_of_group(&mut self, object: T) -> bool {
        match self.position(object) {
            Some(index) => {
                let group = self.new_group();
                self.entries[index].group = group;
                true
            }
            None => false,
        }
    }

    fn in_same_group(&self, first: T, second: T) -> bool {
        match (self.position(first), self.position(second)) {
            (Some(a), Some(b)) => self.entries[a].group == self.entries[b].group,
            _ => false,
        }
    }

    fn for_each_object(&self, f: &mut dyn FnMut(T, &Aabb)) {
        for entry in &self.entries {
            f(entry.object, &entry.bounds);
        }
    }

    fn for_each_overlapping(&self, bounds: &Aabb, f: &mut dyn FnMut(T)) {
        for entry in &self.entries {
            if entry.bounds.intersects(bounds) {
                f(entry.object);
            }
        }
    }

    fn for_each_colission(&self, f: &mut dyn FnMut(T, T)) {
        for i in 0..self.entries.len() {
            let a = &self.entries[i];
            for b in &self.entries[(i + 1)..] {
                if a.group != b.group && a.bounds.intersects(&b.bounds) {
                    f(a.object, b.object);
                }
            }
        }
    }

    fn recalculate_bounds(&mut self, bounds_of: &mut dyn FnMut(T) -> Aabb) {
        for entry in &mut self.entries {
            entry.bounds = bounds_of(entry.object);
        }
    }

    fn improve_structure(&mut self) {
        // Keep groups contiguous, sorted along X inside each group
        self.entries.sort_by(|a, b| {
            a.group
                .cmp(&b.group)
                .then(a.bounds.min.x.total_cmp(&b.bounds.min.x))
        });
    }
}

/// Bounds used for objects that can no longer be resolved
pub(crate) fn empty_bounds() -> Aabb {
    Aabb::new(Vec3::zeros(), Vec3::zeros())
}
