//! Module `tree` implement the red-black algorithms over the node arena.
//!
//! The tree has exactly one mutating thread at any time, serialized by the
//! [Index][crate::rbt::Index] layer. Every pointer update happens inside a
//! [LockSet] covering all the nodes it touches, so a reader coupling its
//! way down the tree never observes a half linked node. Colors are not
//! consulted by readers.
//!
//! Root of the tree hangs as the left child of [ANCHOR], hence replacing
//! the root is an ordinary child-link update on the anchor.

use log::trace;

use std::{
    borrow::Borrow,
    cmp::Ordering,
    fmt,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering::SeqCst},
        Arc,
    },
};

use crate::{
    rbt::{
        arena::Arena,
        lockset::{read_pair, LockSet},
        node::{Color, Node, NodeId, ANCHOR, NIL},
        validate::{self, Report},
    },
    util::spinlock::ReadGuard,
    Result,
};

#[derive(Clone, Copy, PartialEq, Debug)]
enum Dir {
    Left,
    Right,
}

pub struct Tree<K, V> {
    arena: Arena<K, V>,
    n_count: AtomicUsize,
    // bumped every time a node is relocated by erase, coupled readers
    // that miss their key during a relocation retry.
    n_relocs: AtomicU64,
}

impl<K, V> Tree<K, V> {
    pub fn new(spin: bool) -> Tree<K, V> {
        Tree {
            arena: Arena::new(spin),
            n_count: AtomicUsize::new(0),
            n_relocs: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.n_count.load(SeqCst)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn as_arena(&self) -> &Arena<K, V> {
        &self.arena
    }

    #[inline]
    pub fn to_root(&self) -> NodeId {
        self.node(ANCHOR).left
    }

    #[inline]
    fn node(&self, id: NodeId) -> ReadGuard<Node<K, V>> {
        self.arena.get(id).read()
    }

    #[inline]
    fn color(&self, id: NodeId) -> Color {
        self.node(id).color
    }

    #[inline]
    fn is_red(&self, id: NodeId) -> bool {
        self.color(id) == Color::Red
    }

    #[inline]
    fn is_black(&self, id: NodeId) -> bool {
        self.color(id) == Color::Black
    }

    /// Run the invariant checker over the whole tree. Caller shall
    /// exclude writers for the duration.
    pub fn validate(&self) -> Result<Report>
    where
        K: Ord + fmt::Debug,
    {
        validate::validate_tree(&self.arena, self.len())
    }
}

// lookups
impl<K, V> Tree<K, V> {
    /// Search without lock coupling. Caller shall exclude writers.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        V: Clone,
        Q: Ord + ?Sized,
    {
        let mut id = self.to_root();
        while id != NIL {
            let node = self.node(id);
            match node.cmp_key(key) {
                Ordering::Greater => id = node.left,
                Ordering::Less => id = node.right,
                Ordering::Equal => return node.value.clone(),
            }
        }
        None
    }

    /// Search using hand-over-hand read latches, safe to run concurrently
    /// with the writer. Never holds more than two node latches.
    pub fn get_coupled<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        V: Clone,
        Q: Ord + ?Sized,
    {
        'restart: loop {
            let n_relocs = self.n_relocs.load(SeqCst);

            let mut cur_ref = self.arena.get(ANCHOR);
            let mut cur = cur_ref.read();
            loop {
                if cur.cmp_key(key) == Ordering::Equal {
                    return cur.value.clone();
                }
                let next = cur.child_towards(key);
                if next == NIL {
                    if n_relocs == self.n_relocs.load(SeqCst) {
                        return None;
                    }
                    trace!("coupled lookup missed under relocation, restart");
                    continue 'restart;
                }

                let next_ref = self.arena.get(next);
                let guard = if cur.to_rank() < next_ref.to_rank() {
                    next_ref.read()
                } else if let Some(guard) = next_ref.try_read() {
                    guard
                } else {
                    // child is younger than parent and is being written,
                    // let go and re-acquire both in rank order.
                    std::mem::drop(cur);
                    let (parent, guard) = read_pair(&cur_ref, &next_ref);
                    let linked = parent.child_towards(key) == next
                        && Arc::ptr_eq(&self.arena.get(next), &next_ref);
                    if !linked {
                        trace!("coupled lookup lost link to node {}, restart", next);
                        continue 'restart;
                    }
                    guard
                };

                cur = guard;
                cur_ref = next_ref;
            }
        }
    }
}

// mutations
impl<K, V> Tree<K, V>
where
    K: Ord,
{
    /// Insert or overwrite, return the old value if key was present.
    pub fn set(&self, key: K, value: V) -> Option<V> {
        let (mut y, mut guard) = (ANCHOR, self.arena.get(ANCHOR).upgradable());
        let ord = loop {
            let ord = guard.cmp_key(&key);
            let next = match ord {
                Ordering::Greater => guard.left,
                Ordering::Less => guard.right,
                Ordering::Equal => break ord,
            };
            if next == NIL {
                break ord;
            }
            guard = self.arena.get(next).upgradable();
            y = next;
        };

        if ord == Ordering::Equal {
            let mut ls = LockSet::exclusive(&self.arena, &[y], Some((y, guard)));
            return ls.get_mut(y).set_value(value);
        }

        let mut node = Node::new(key, value);
        node.parent = y;
        if y == ANCHOR {
            node.set_black();
        }
        let z = self.arena.alloc(node);
        {
            let mut ls = LockSet::exclusive(&self.arena, &[y], Some((y, guard)));
            match ord {
                Ordering::Greater => ls.get_mut(y).left = z,
                _ => ls.get_mut(y).right = z,
            }
        }
        self.n_count.fetch_add(1, SeqCst);

        if y != ANCHOR {
            self.insert_fixup(z);
        }
        None
    }

    /// Remove the entry for `key`, return its value if it was present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (mut z, mut guard) = (ANCHOR, self.arena.get(ANCHOR).upgradable());
        while guard.cmp_key(key) != Ordering::Equal {
            let next = guard.child_towards(key);
            if next == NIL {
                return None;
            }
            guard = self.arena.get(next).upgradable();
            z = next;
        }

        let (zp, zl, zr, zcolor) = (guard.parent, guard.left, guard.right, guard.color);

        let (x, x_parent, removed_color, value) = if zl == NIL || zr == NIL {
            let x = if zl == NIL { zr } else { zl };

            let mut ls = LockSet::exclusive(&self.arena, &[zp, z, x], Some((z, guard)));
            Self::transplant(&mut ls, z, x);
            let value = ls.get_mut(z).value.take();
            ls.get_mut(z).unlink();
            (x, zp, zcolor, value)
        } else {
            let y = self.minimum(zr);
            let (yp, x, ycolor) = {
                let node = self.node(y);
                (node.parent, node.right, node.color)
            };
            let x_parent = if yp == z { y } else { yp };

            let ids = [zp, z, zl, zr, y, yp, x];
            let mut ls = LockSet::exclusive(&self.arena, &ids, Some((z, guard)));
            if yp != z {
                Self::transplant(&mut ls, y, x);
                ls.get_mut(y).right = zr;
                ls.get_mut(zr).parent = y;
            }
            Self::transplant(&mut ls, z, y);
            ls.get_mut(y).left = zl;
            ls.get_mut(zl).parent = y;
            ls.get_mut(y).color = zcolor;

            let value = ls.get_mut(z).value.take();
            ls.get_mut(z).unlink();
            self.n_relocs.fetch_add(1, SeqCst);
            (x, x_parent, ycolor, value)
        };

        self.arena.free(z);
        self.n_count.fetch_sub(1, SeqCst);

        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }
        value
    }

    fn minimum(&self, mut id: NodeId) -> NodeId {
        loop {
            match self.node(id).left {
                NIL => break id,
                left => id = left,
            }
        }
    }

    fn insert_fixup(&self, mut z: NodeId) {
        loop {
            let zp = self.node(z).parent;
            if zp == ANCHOR || self.is_black(zp) {
                break;
            }
            // zp is red, hence not the root, and zpp is a real node.
            let zpp = self.node(zp).parent;
            let (side, u) = {
                let node = self.node(zpp);
                if node.left == zp {
                    (Dir::Left, node.right)
                } else {
                    (Dir::Right, node.left)
                }
            };

            if self.is_red(u) {
                let mut ls = LockSet::exclusive(&self.arena, &[zp, u, zpp], None);
                ls.get_mut(zp).set_black();
                ls.get_mut(u).set_black();
                ls.get_mut(zpp).set_red();
                z = zpp;
                continue;
            }

            // inner grandchild, rotate towards outer shape.
            let inner = match side {
                Dir::Left => self.node(zp).right == z,
                Dir::Right => self.node(zp).left == z,
            };
            let z = if inner {
                let mut ls = LockSet::exclusive(&self.arena, &self.rotation(zp, side), None);
                Self::rotate(&mut ls, zp, side);
                zp
            } else {
                z
            };

            let zp = self.node(z).parent;
            let rot = match side {
                Dir::Left => Dir::Right,
                Dir::Right => Dir::Left,
            };
            let mut ls = LockSet::exclusive(&self.arena, &self.rotation(zpp, rot), None);
            ls.get_mut(zp).set_black();
            ls.get_mut(zpp).set_red();
            Self::rotate(&mut ls, zpp, rot);
            break;
        }

        let root = self.to_root();
        if self.is_red(root) {
            let mut ls = LockSet::exclusive(&self.arena, &[root], None);
            ls.get_mut(root).set_black();
        }
    }

    fn delete_fixup(&self, mut x: NodeId, mut xp: NodeId) {
        while xp != ANCHOR && self.is_black(x) {
            let side = if self.node(xp).left == x {
                Dir::Left
            } else {
                Dir::Right
            };
            let (near, far) = match side {
                Dir::Left => (Dir::Left, Dir::Right),
                Dir::Right => (Dir::Right, Dir::Left),
            };

            let mut w = self.child(xp, far);
            if w == NIL {
                panic!("missing sibling for {} under {}, call the programmer", x, xp)
            }

            if self.is_red(w) {
                let mut ls = LockSet::exclusive(&self.arena, &self.rotation(xp, near), None);
                ls.get_mut(w).set_black();
                ls.get_mut(xp).set_red();
                Self::rotate(&mut ls, xp, near);
                std::mem::drop(ls);
                w = self.child(xp, far);
            }

            let (w_near, w_far) = (self.child(w, near), self.child(w, far));
            if self.is_black(w_near) && self.is_black(w_far) {
                {
                    let mut ls = LockSet::exclusive(&self.arena, &[w], None);
                    ls.get_mut(w).set_red();
                }
                x = xp;
                xp = self.node(x).parent;
                continue;
            }

            if self.is_black(w_far) {
                let mut ls = LockSet::exclusive(&self.arena, &self.rotation(w, far), None);
                ls.get_mut(w_near).set_black();
                ls.get_mut(w).set_red();
                Self::rotate(&mut ls, w, far);
                std::mem::drop(ls);
                w = self.child(xp, far);
            }

            let w_far = self.child(w, far);
            let mut ids = self.rotation(xp, near).to_vec();
            ids.push(w_far);
            {
                let mut ls = LockSet::exclusive(&self.arena, &ids, None);
                let color = ls.get(xp).color;
                ls.get_mut(w).color = color;
                ls.get_mut(xp).set_black();
                ls.get_mut(w_far).set_black();
                Self::rotate(&mut ls, xp, near);
            }

            x = self.to_root();
            xp = ANCHOR;
        }

        if x != NIL && self.is_red(x) {
            let mut ls = LockSet::exclusive(&self.arena, &[x], None);
            ls.get_mut(x).set_black();
        }
    }

    #[inline]
    fn child(&self, id: NodeId, dir: Dir) -> NodeId {
        let node = self.node(id);
        match dir {
            Dir::Left => node.left,
            Dir::Right => node.right,
        }
    }

    // nodes whose links are touched when rotating `x` in `dir`: x's parent,
    // x, the child moving up and the subtree changing hands.
    fn rotation(&self, x: NodeId, dir: Dir) -> [NodeId; 4] {
        let (p, y) = {
            let node = self.node(x);
            match dir {
                Dir::Left => (node.parent, node.right),
                Dir::Right => (node.parent, node.left),
            }
        };
        let b = match dir {
            Dir::Left => self.child(y, Dir::Left),
            Dir::Right => self.child(y, Dir::Right),
        };
        [p, x, y, b]
    }

    // rotate x in `dir`, its child on the opposite side takes its place.
    // Caller holds `ls` covering `rotation(x, dir)`.
    fn rotate(ls: &mut LockSet<K, V>, x: NodeId, dir: Dir) {
        let y = match dir {
            Dir::Left => ls.get(x).right,
            Dir::Right => ls.get(x).left,
        };
        if y == NIL {
            panic!("rotate {:?} on node {} without child, call the programmer", dir, x)
        }

        let b = match dir {
            Dir::Left => ls.get(y).left,
            Dir::Right => ls.get(y).right,
        };
        match dir {
            Dir::Left => ls.get_mut(x).right = b,
            Dir::Right => ls.get_mut(x).left = b,
        }
        if b != NIL {
            ls.get_mut(b).parent = x;
        }

        Self::transplant(ls, x, y);

        match dir {
            Dir::Left => ls.get_mut(y).left = x,
            Dir::Right => ls.get_mut(y).right = x,
        }
        ls.get_mut(x).parent = y;
    }

    // replace u with v under u's parent, v may be NIL. Caller holds `ls`
    // covering u, u's parent and v.
    fn transplant(ls: &mut LockSet<K, V>, u: NodeId, v: NodeId) {
        let up = ls.get(u).parent;
        let parent = ls.get_mut(up);
        if parent.left == u {
            parent.left = v
        } else if parent.right == u {
            parent.right = v
        } else {
            panic!("node {} not a child of {}, call the programmer", u, up)
        }
        if v != NIL {
            ls.get_mut(v).parent = up;
        }
    }
}

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
