use crate::bodies::Part;
use crate::collision::bounds_tree::empty_bounds;
use crate::collision::{BoundsTree, BruteForceTree};
use crate::core::{Arena, PartId};
use crate::error::PhysicsError;
use crate::Result;
use std::collections::BTreeSet;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// The two halves of a collision layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SubLayer {
    /// Parts of movable physicals
    Free = 0,

    /// Anchored parts; these never collide with each other
    Terrain = 1,
}

impl SubLayer {
    /// Index of the sublayer inside its collision layer
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Names one world layer: a collision layer index and one of its two sublayers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct LayerId {
    /// Index of the collision layer in the world
    pub layer: usize,

    /// Free or terrain half of the layer
    pub sub: SubLayer,
}

impl LayerId {
    /// Creates a new layer id
    pub fn new(layer: usize, sub: SubLayer) -> Self {
        Self { layer, sub }
    }
}

/// A spatial tree of parts; keeps every hosted part's `layer` pointing back at it
#[derive(Debug)]
pub struct WorldLayer {
    id: LayerId,
    tree: Box<dyn BoundsTree<PartId>>,
}

impl WorldLayer {
    /// Creates a world layer backed by a brute-force tree
    pub fn new(id: LayerId) -> Self {
        Self::with_tree(id, Box::new(BruteForceTree::new()))
    }

    /// Creates a world layer backed by the given tree
    pub fn with_tree(id: LayerId, tree: Box<dyn BoundsTree<PartId>>) -> Self {
        Self { id, tree }
    }

    /// Returns the id of this layer
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Returns the spatial tree
    pub fn tree(&self) -> &dyn BoundsTree<PartId> {
        self.tree.as_ref()
    }

    /// Returns the number of hosted parts
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns whether no parts are hosted
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns whether the part is hosted here
    pub fn contains(&self, part: PartId) -> bool {
        self.tree.contains(part)
    }

    /// Returns every hosted part
    pub fn parts(&self) -> Vec<PartId> {
        let mut out = Vec::with_capacity(self.tree.len());
        self.tree.for_each_object(&mut |part, _| out.push(part));
        out
    }

    fn claim(&self, parts: &mut Arena<Part>, part: PartId) -> Result<()> {
        let entry = parts.get_checked_mut(part, "Part")?;
        if let Some(existing) = entry.layer {
            return Err(PhysicsError::LayerMismatch(format!(
                "part {:?} is already in layer {:?}",
                part, existing
            )));
        }
        entry.layer = Some(self.id);
        Ok(())
    }

    fn check_hosted(&self, parts: &Arena<Part>, part: PartId) -> Result<()> {
        let entry = parts.get_checked(part, "Part")?;
        if entry.layer != Some(self.id) || !self.tree.contains(part) {
            return Err(PhysicsError::LayerMismatch(format!(
                "part {:?} is not in layer {:?}",
                part, self.id
            )));
        }
        Ok(())
    }

    /// Adds a part in a group of its own
    pub fn add_part(&mut self, parts: &mut Arena<Part>, part: PartId) -> Result<()> {
        self.claim(parts, part)?;
        let bounds = parts.get_checked(part, "Part")?.bounds();
        self.tree.add(part, bounds);
        Ok(())
    }

    /// Adds a part to the group of `representative`, which must already be hosted here
    pub fn add_into_group(&mut self, parts: &mut Arena<Part>, part: PartId, representative: PartId) -> Result<()> {
        self.check_hosted(parts, representative)?;
        self.claim(parts, part)?;
        let bounds = parts.get_checked(part, "Part")?.bounds();
        if !self.tree.add_to_group(part, bounds, representative) {
            if let Some(entry) = parts.get_mut(part) {
                entry.layer = None;
            }
            return Err(PhysicsError::LayerMismatch(format!(
                "group representative {:?} vanished from layer {:?}",
                representative, self.id
            )));
        }
        Ok(())
    }

    /// Removes a part; its `layer` is cleared
    pub fn remove_part(&mut self, parts: &mut Arena<Part>, part: PartId) -> Result<()> {
        self.check_hosted(parts, part)?;
        self.tree.remove(part);
        if let Some(entry) = parts.get_mut(part) {
            entry.layer = None;
        }
        Ok(())
    }

    /// Moves a part into a group of its own
    pub fn move_out_of_group(&mut self, parts: &Arena<Part>, part: PartId) -> Result<()> {
        self.check_hosted(parts, part)?;
        self.tree.move_out_of_group(part);
        Ok(())
    }

    /// Joins the groups of two hosted parts
    pub fn merge_groups(&mut self, parts: &Arena<Part>, first: PartId, second: PartId) -> Result<()> {
        self.check_hosted(parts, first)?;
        self.check_hosted(parts, second)?;
        self.tree.merge_groups(first, second);
        Ok(())
    }

    /// Returns whether two hosted parts share a group
    pub fn in_same_group(&self, first: PartId, second: PartId) -> bool {
        self.tree.in_same_group(first, second)
    }

    /// Updates the stored bounds of a part after it moved
    pub fn notify_part_moved(&mut self, parts: &Arena<Part>, part: PartId) -> Result<()> {
        self.check_hosted(parts, part)?;
        let bounds = parts.get_checked(part, "Part")?.bounds();
        self.tree.update_object_bounds(part, bounds);
        Ok(())
    }

    /// Puts `new` in the place and group of `old`; `old` leaves the layer
    pub fn find_and_replace(&mut self, parts: &mut Arena<Part>, old: PartId, new: PartId) -> Result<()> {
        self.check_hosted(parts, old)?;
        self.claim(parts, new)?;
        let bounds = parts.get_checked(new, "Part")?.bounds();
        self.tree.find_and_replace_object(old, new, bounds);
        if let Some(entry) = parts.get_mut(old) {
            entry.layer = None;
        }
        Ok(())
    }

    /// Recomputes all bounds from the parts' current frames, then rebalances
    pub fn refresh(&mut self, parts: &Arena<Part>) {
        self.tree.recalculate_bounds(&mut |part| {
            parts.get(part).map(Part::bounds).unwrap_or_else(empty_bounds)
        });
        self.tree.improve_structure();
    }

    /// Calls `f` for every broad-phase pair inside this layer
    pub fn for_each_internal_colission(&self, f: &mut dyn FnMut(PartId, PartId)) {
        self.tree.for_each_colission(f);
    }

    /// Calls `f` for every broad-phase pair between this layer and `other`
    pub fn for_each_colission_with(&self, other: &WorldLayer, f: &mut dyn FnMut(PartId, PartId)) {
        self.tree.for_each_colission_with(other.tree.as_ref(), f);
    }
}

/// A logical layer: a free and a terrain world layer
#[derive(Debug)]
pub struct ColissionLayer {
    subs: [WorldLayer; 2],
    collides_internally: bool,
}

impl ColissionLayer {
    /// Creates an empty collision layer at `index`
    pub fn new(index: usize, collides_internally: bool) -> Self {
        Self {
            subs: [
                WorldLayer::new(LayerId::new(index, SubLayer::Free)),
                WorldLayer::new(LayerId::new(index, SubLayer::Terrain)),
            ],
            collides_internally,
        }
    }

    /// Returns the free world layer
    pub fn free(&self) -> &WorldLayer {
        &self.subs[SubLayer::Free.index()]
    }

    /// Returns the terrain world layer
    pub fn terrain(&self) -> &WorldLayer {
        &self.subs[SubLayer::Terrain.index()]
    }

    /// Returns one of the world layers
    pub fn sub(&self, sub: SubLayer) -> &WorldLayer {
        &self.subs[sub.index()]
    }

    /// Returns one of the world layers mutably
    pub fn sub_mut(&mut self, sub: SubLayer) -> &mut WorldLayer {
        &mut self.subs[sub.index()]
    }

    /// Returns whether parts of this layer collide with each other
    pub fn collides_internally(&self) -> bool {
        self.collides_internally
    }

    /// Sets whether parts of this layer collide with each other
    pub fn set_collides_internally(&mut self, collides: bool) {
        self.collides_internally = collides;
    }

    /// Recomputes bounds of the free sublayer; terrain does not move during ticks
    pub fn refresh_free(&mut self, parts: &Arena<Part>) {
        self.subs[SubLayer::Free.index()].refresh(parts);
    }

    /// Recomputes bounds of both sublayers
    pub fn refresh(&mut self, parts: &Arena<Part>) {
        for sub in &mut self.subs {
            sub.refresh(parts);
        }
    }
}

/// Sparse symmetric set of collision layer pairs that collide with each other
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ColissionMask {
    pairs: BTreeSet<(usize, usize)>,
}

impl ColissionMask {
    /// Creates an empty mask
    pub fn new() -> Self {
        Self::default()
    }

    fn key(i: usize, j: usize) -> (usize, usize) {
        (i.min(j), i.max(j))
    }

    /// Marks or unmarks two distinct layers as colliding; same-layer entries are ignored
    pub fn set(&mut self, i: usize, j: usize, collides: bool) {
        if i == j {
            return;
        }
        if collides {
            self.pairs.insert(Self::key(i, j));
        } else {
            self.pairs.remove(&Self::key(i, j));
        }
    }

    /// Returns whether two distinct layers collide
    pub fn collides(&self, i: usize, j: usize) -> bool {
        self.pairs.contains(&Self::key(i, j))
    }

    /// Returns every marked pair as `(low, high)`
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.iter().copied()
    }

    /// Returns the number of marked pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns whether no pairs are marked
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
