//! Module `validate` check the red-black invariants over the arena.
//!
//! Walks the tree with an explicit stack, so degenerate trees can't blow
//! the thread stack. Rules checked:
//!
//! * Sentinel and anchor are black and carry no key.
//! * Root node is always black and hangs under the anchor.
//! * Make sure there are no consecutive reds.
//! * Make sure number of blacks are same on every path to the sentinel.
//! * Verify the sort order of every node against its ancestors.
//! * Every child points back to its parent.
//! * Make sure that the maximum depth do not exceed [MAX_TREE_DEPTH].
//! * Number of reachable nodes match the entry count.

use std::{cmp::Ordering, fmt};

use crate::{
    err_at,
    rbt::{
        arena::Arena,
        depth::Depth,
        node::{Color, NodeId, ANCHOR, NIL},
    },
    Result,
};

pub const MAX_TREE_DEPTH: usize = 100;

/// Outcome of a successful validation.
pub struct Report {
    pub n_count: usize,
    pub blacks: usize,
    pub depths: Depth,
}

struct Frame {
    id: NodeId,
    blacks: usize,
    depth: usize,
    lo: NodeId, // nearest ancestor this subtree sits right of, NIL for none.
    hi: NodeId, // nearest ancestor this subtree sits left of, NIL for none.
}

pub fn validate_tree<K, V>(arena: &Arena<K, V>, n_count: usize) -> Result<Report>
where
    K: Ord + fmt::Debug,
{
    {
        let nil = arena.get(NIL);
        let nil = nil.read();
        if nil.color != Color::Black || nil.key.is_some() {
            err_at!(Fatal, msg: "sentinel tainted color:{}", nil.color)?;
        }
        let anchor = arena.get(ANCHOR);
        let anchor = anchor.read();
        if anchor.color != Color::Black || anchor.key.is_some() || anchor.right != NIL {
            err_at!(Fatal, msg: "anchor tainted right:{}", anchor.right)?;
        }
    }

    let root = arena.get(ANCHOR).read().left;
    let mut report = Report {
        n_count: 0,
        blacks: 0,
        depths: Depth::default(),
    };
    if root == NIL {
        return match n_count {
            0 => Ok(report),
            n => err_at!(Fatal, msg: "empty tree with n_count:{}", n),
        };
    }

    {
        let node = arena.get(root);
        let node = node.read();
        if node.color != Color::Black {
            err_at!(Fatal, msg: "root {:?} is red", node.key)?;
        }
        if node.parent != ANCHOR {
            err_at!(Fatal, msg: "root {:?} parent:{}", node.key, node.parent)?;
        }
    }

    let mut target: Option<usize> = None;
    let mut stack = vec![Frame {
        id: root,
        blacks: 0,
        depth: 1,
        lo: NIL,
        hi: NIL,
    }];

    while let Some(frame) = stack.pop() {
        let node = arena.get(frame.id);
        let node = node.read();
        report.n_count += 1;

        if frame.depth > MAX_TREE_DEPTH {
            err_at!(Fatal, msg: "tree exceeds max_depth {}", frame.depth)?;
        }
        if report.n_count > n_count {
            err_at!(Fatal, msg: "reachable nodes exceed n_count:{}", n_count)?;
        }

        let key = match node.as_key() {
            Some(key) => key,
            None => err_at!(Fatal, msg: "node {} without key", frame.id)?,
        };

        // confirm sort order against the ancestors bounding this subtree.
        if frame.lo != NIL {
            let lo = arena.get(frame.lo);
            let lo = lo.read();
            if lo.cmp_key(key) != Ordering::Less {
                err_at!(Fatal, msg: "sort order {:?} right of {:?}", key, lo.key)?;
            }
        }
        if frame.hi != NIL {
            let hi = arena.get(frame.hi);
            let hi = hi.read();
            if hi.cmp_key(key) != Ordering::Greater {
                err_at!(Fatal, msg: "sort order {:?} left of {:?}", key, hi.key)?;
            }
        }

        let blacks = match node.color {
            Color::Black => frame.blacks + 1,
            Color::Red => frame.blacks,
        };

        if node.left == NIL || node.right == NIL {
            report.depths.sample(frame.depth);
        }

        for (child, lo, hi) in [
            (node.left, frame.lo, frame.id),
            (node.right, frame.id, frame.hi),
        ]
        .iter()
        .copied()
        {
            if child == NIL {
                match target {
                    Some(n) if n != blacks => {
                        err_at!(Fatal, msg: "unbalanced blacks {} != {} at {:?}", n, blacks, key)?;
                    }
                    Some(_) => (),
                    None => target = Some(blacks),
                }
                continue;
            }

            let cnode = arena.get(child);
            let cnode = cnode.read();
            if node.color == Color::Red && cnode.color == Color::Red {
                err_at!(Fatal, msg: "consecutive reds {:?} {:?}", key, cnode.key)?;
            }
            if cnode.parent != frame.id {
                err_at!(Fatal, msg: "broken parent link {:?} {:?}", key, cnode.key)?;
            }

            stack.push(Frame {
                id: child,
                blacks,
                depth: frame.depth + 1,
                lo,
                hi,
            });
        }
    }

    if report.n_count != n_count {
        err_at!(Fatal, msg: "reachable nodes {} != n_count {}", report.n_count, n_count)?;
    }
    report.blacks = target.unwrap_or(0);

    Ok(report)
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;
