//! Module `lockset` acquire latches on several nodes without deadlock.
//!
//! Every latch carries a rank fixed at construction. A thread that needs
//! more than one latch acquires them in ascending rank order, so two
//! threads can never wait on each other in a cycle.

use std::sync::Arc;

use crate::{
    rbt::{
        arena::{Arena, Ref},
        node::{Node, NodeId, NIL},
    },
    util::spinlock::{ReadGuard, UpgradeGuard, WriteGuard},
};

/// Set of write-latched nodes, released together when dropped.
pub struct LockSet<K, V> {
    guards: Vec<(NodeId, WriteGuard<Node<K, V>>)>,
}

impl<K, V> LockSet<K, V> {
    /// Write latch all nodes in `ids`, in rank order. NIL is skipped and
    /// duplicates are latched once. If caller holds an upgradable latch on
    /// one of the nodes, it is upgraded in its rank position.
    pub fn exclusive(
        arena: &Arena<K, V>,
        ids: &[NodeId],
        held: Option<(NodeId, UpgradeGuard<Node<K, V>>)>,
    ) -> LockSet<K, V> {
        let mut ids: Vec<NodeId> = ids.iter().copied().filter(|id| *id != NIL).collect();
        ids.sort_unstable();
        ids.dedup();

        let (held_id, mut held) = match held {
            Some((id, guard)) => (id, Some(guard)),
            None => (NIL, None),
        };

        let mut items: Vec<(u64, NodeId, Option<Ref<K, V>>)> = ids
            .into_iter()
            .map(|id| match &held {
                Some(guard) if id == held_id => (guard.to_rank(), id, None),
                _ => {
                    let node = arena.get(id);
                    (node.to_rank(), id, Some(node))
                }
            })
            .collect();
        items.sort_unstable_by_key(|item| item.0);

        let mut guards = Vec::with_capacity(items.len());
        for (_, id, node) in items.into_iter() {
            let guard = match node {
                Some(node) => node.write(),
                None => match held.take() {
                    Some(guard) => guard.upgrade(),
                    None => unreachable!(),
                },
            };
            guards.push((id, guard));
        }

        if held.is_some() {
            panic!("held node {} missing in lock-set, call the programmer", held_id)
        }

        LockSet { guards }
    }

    pub fn get(&self, id: NodeId) -> &Node<K, V> {
        match self.guards.iter().find(|(x, _)| *x == id) {
            Some((_, guard)) => &**guard,
            None => panic!("node {} not in lock-set, call the programmer", id),
        }
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        match self.guards.iter_mut().find(|(x, _)| *x == id) {
            Some((_, guard)) => &mut **guard,
            None => panic!("node {} not in lock-set, call the programmer", id),
        }
    }

    /// Return the locked node ids, in acquisition order.
    pub fn to_ids(&self) -> Vec<NodeId> {
        self.guards.iter().map(|(id, _)| *id).collect()
    }
}

/// Read latch a parent and child pair in rank order. Return the guards as
/// (parent, child).
pub fn read_pair<K, V>(
    parent: &Ref<K, V>,
    child: &Ref<K, V>,
) -> (ReadGuard<Node<K, V>>, ReadGuard<Node<K, V>>) {
    if Arc::ptr_eq(parent, child) {
        panic!("read_pair on the same node, call the programmer")
    }

    if parent.to_rank() < child.to_rank() {
        let p = parent.read();
        (p, child.read())
    } else {
        let c = child.read();
        (parent.read(), c)
    }
}

#[cfg(test)]
#[path = "lockset_test.rs"]
mod lockset_test;
