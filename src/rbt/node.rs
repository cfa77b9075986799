use std::{borrow::Borrow, cmp::Ordering, fmt, result};

/// Handle to a node in the arena.
pub type NodeId = usize;

/// Sentinel, every absent child/parent link points here.
pub const NIL: NodeId = 0;
/// Pseudo node sitting above the root, its left child is the root.
pub const ANCHOR: NodeId = 1;

/// Color tag for every node in the tree, including the sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Color {
    Red,
    Black,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            Color::Red => write!(f, "red"),
            Color::Black => write!(f, "black"),
        }
    }
}

// Node corresponds to a single entry in the tree. NIL and ANCHOR carry
// no key and no value.
#[derive(Clone)]
pub struct Node<K, V> {
    pub key: Option<K>,   // store: None for NIL and ANCHOR
    pub value: Option<V>, // store: None for NIL and ANCHOR
    pub color: Color,
    pub parent: NodeId,
    pub left: NodeId,
    pub right: NodeId,
}

impl<K, V> Node<K, V> {
    /// Create a fresh red node, detached from the tree.
    pub fn new(key: K, value: V) -> Node<K, V> {
        Node {
            key: Some(key),
            value: Some(value),
            color: Color::Red,
            parent: NIL,
            left: NIL,
            right: NIL,
        }
    }

    /// Create the sentinel or the anchor.
    pub fn new_reserved() -> Node<K, V> {
        Node {
            key: None,
            value: None,
            color: Color::Black,
            parent: NIL,
            left: NIL,
            right: NIL,
        }
    }

    #[inline]
    pub fn set_red(&mut self) {
        self.color = Color::Red
    }

    #[inline]
    pub fn set_black(&mut self) {
        self.color = Color::Black
    }

    #[inline]
    pub fn is_black(&self) -> bool {
        self.color == Color::Black
    }

    #[inline]
    pub fn is_red(&self) -> bool {
        self.color == Color::Red
    }

    #[inline]
    pub fn as_key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    #[inline]
    pub fn as_value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Replace the stored value, return the old one.
    pub fn set_value(&mut self, value: V) -> Option<V> {
        self.value.replace(value)
    }

    /// Compare this node's key with `key`. A node without key, ANCHOR,
    /// sorts after every key.
    pub fn cmp_key<Q>(&self, key: &Q) -> Ordering
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match &self.key {
            Some(k) => k.borrow().cmp(key),
            None => Ordering::Greater,
        }
    }

    /// Return the child link on `key`'s side.
    #[inline]
    pub fn child_towards<Q>(&self, key: &Q) -> NodeId
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.cmp_key(key) {
            Ordering::Greater => self.left,
            _ => self.right,
        }
    }

    /// Point every link to NIL.
    pub fn unlink(&mut self) {
        self.parent = NIL;
        self.left = NIL;
        self.right = NIL;
    }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
