use std::sync::Arc;

use crate::{
    rbt::node::{Node, NodeId, ANCHOR, NIL},
    util::{spinlock, Spinlock},
};

/// Shared handle to a latched node. A thread holding a `Ref` keeps the
/// node alive even after the tree has freed its slot.
pub type Ref<K, V> = Arc<Spinlock<Node<K, V>>>;

struct Slots<K, V> {
    nodes: Vec<Option<Ref<K, V>>>,
    free: Vec<NodeId>,
}

/// Index addressed slab of tree nodes. Slot [NIL] and slot [ANCHOR] are
/// reserved and live as long as the arena.
///
/// The slot table is guarded by its own latch, which is always the last
/// latch acquired and is never held while waiting on any other latch.
pub struct Arena<K, V> {
    spin: bool,
    slots: Arc<Spinlock<Slots<K, V>>>,
}

impl<K, V> Arena<K, V> {
    pub fn new(spin: bool) -> Arena<K, V> {
        let nodes = vec![
            Some(Arc::new(Spinlock::with_spin(Node::new_reserved(), spin))),
            Some(Arc::new(Spinlock::with_spin(Node::new_reserved(), spin))),
        ];
        let slots = Slots { nodes, free: vec![] };
        Arena {
            spin,
            slots: Arc::new(Spinlock::with_spin(slots, spin)),
        }
    }

    /// Resolve handle to node. Panics on a vacant slot, callers shall only
    /// resolve handles read from a live link.
    pub fn get(&self, id: NodeId) -> Ref<K, V> {
        let slots = self.slots.read();
        match slots.nodes.get(id) {
            Some(Some(node)) => Arc::clone(node),
            _ => panic!("dangling node handle {}, call the programmer", id),
        }
    }

    /// Park `node` in a slot, recycle a freed slot if any.
    pub fn alloc(&self, node: Node<K, V>) -> NodeId {
        let node = Arc::new(Spinlock::with_spin(node, self.spin));

        let mut slots = self.slots.write();
        match slots.free.pop() {
            Some(id) => {
                slots.nodes[id] = Some(node);
                id
            }
            None => {
                slots.nodes.push(Some(node));
                slots.nodes.len() - 1
            }
        }
    }

    /// Release the slot for `id`, caller must have unlinked the node.
    pub fn free(&self, id: NodeId) -> Ref<K, V> {
        if id == NIL || id == ANCHOR {
            panic!("freeing reserved node {}, call the programmer", id)
        }

        let mut slots = self.slots.write();
        match slots.nodes.get_mut(id).and_then(|slot| slot.take()) {
            Some(node) => {
                slots.free.push(id);
                node
            }
            None => panic!("double free on node {}, call the programmer", id),
        }
    }

    /// Return number of live nodes, excluding the reserved ones.
    pub fn len(&self) -> usize {
        let slots = self.slots.read();
        slots.nodes.len() - slots.free.len() - 2
    }

    /// Return number of slots ever allocated, excluding the reserved ones.
    pub fn to_capacity(&self) -> usize {
        self.slots.read().nodes.len() - 2
    }

    #[inline]
    pub fn is_spin(&self) -> bool {
        self.spin
    }

    pub fn to_spin_stats(&self) -> crate::Result<spinlock::Stats> {
        self.slots.to_stats()
    }
}

#[cfg(test)]
#[path = "arena_test.rs"]
mod arena_test;
