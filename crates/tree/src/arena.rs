//! Generational node arena.

use alloc::vec::Vec;
use core::fmt;

/// Node identifier in the arena.
///
/// The generation makes ids of freed nodes stale instead of letting them
/// alias whichever node reuses the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Returns the slot index.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the slot generation.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<N> {
    generation: u32,
    value: Option<N>,
}

/// Arena of nodes addressed by `NodeId`.
#[derive(Debug)]
pub struct NodeArena<N> {
    slots: Vec<Slot<N>>,
    /// Indices of vacant slots, reused last-freed first
    free: Vec<u32>,
    len: usize,
}

impl<N> Default for NodeArena<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> NodeArena<N> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores a node and returns its id.
    pub fn alloc(&mut self, node: N) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Removes a node, returning it. Stale ids return `None`.
    pub fn free(&mut self, id: NodeId) -> Option<N> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(node)
    }

    /// Returns the node for `id`, if it is still live.
    pub fn get(&self, id: NodeId) -> Option<&N> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Returns the node for `id` mutably, if it is still live.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut N> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Returns true if `id` refers to a live node.
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the arena holds no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
