use std::{sync::Arc, thread};

use super::*;

fn new_arena(n: u32) -> (Arena<u32, u32>, Vec<NodeId>) {
    let arena = Arena::new(false);
    let ids = (0..n).map(|k| arena.alloc(Node::new(k, k))).collect();
    (arena, ids)
}

#[test]
fn test_lockset_rank_order() {
    let (arena, ids) = new_arena(6);

    // free and realloc, the recycled slot gets the highest rank.
    arena.free(ids[1]);
    assert_eq!(arena.alloc(Node::new(100, 100)), ids[1]);

    let req = vec![ids[5], NIL, ids[1], ids[0], ids[5], ids[3]];
    let ls = LockSet::exclusive(&arena, &req, None);
    assert_eq!(ls.to_ids(), vec![ids[0], ids[3], ids[5], ids[1]]);
    assert_eq!(ls.get(ids[1]).as_key(), Some(&100));

    for id in ls.to_ids().into_iter() {
        assert!(arena.get(id).try_read().is_none());
    }
    std::mem::drop(ls);
    for id in ids.iter() {
        assert!(arena.get(*id).try_read().is_some());
    }
}

#[test]
fn test_lockset_held() {
    let (arena, ids) = new_arena(4);

    let guard = arena.get(ids[2]).upgradable();
    // readers can still get in.
    assert!(arena.get(ids[2]).try_read().is_some());

    let mut ls = LockSet::exclusive(&arena, &[ids[3], ids[2]], Some((ids[2], guard)));
    assert_eq!(ls.to_ids(), vec![ids[2], ids[3]]);
    ls.get_mut(ids[2]).set_black();
    ls.get_mut(ids[3]).left = ids[2];
    assert!(arena.get(ids[2]).try_read().is_none());
    std::mem::drop(ls);

    assert!(arena.get(ids[2]).read().is_black());
    assert_eq!(arena.get(ids[3]).read().left, ids[2]);
    // upgrade reservation is gone.
    std::mem::drop(arena.get(ids[2]).upgradable());
}

#[test]
#[should_panic]
fn test_lockset_missing() {
    let (arena, ids) = new_arena(3);
    let ls = LockSet::exclusive(&arena, &[ids[0]], None);
    ls.get(ids[1]);
}

#[test]
fn test_lockset_read_pair() {
    let (arena, ids) = new_arena(3);
    let (a, b) = (arena.get(ids[0]), arena.get(ids[2]));

    let (p, c) = read_pair(&b, &a);
    assert_eq!((p.as_key(), c.as_key()), (Some(&2), Some(&0)));
    assert_eq!((p.to_rank(), c.to_rank()), (b.to_rank(), a.to_rank()));
}

#[test]
fn test_lockset_crossing() {
    let (arena, ids) = new_arena(8);
    let arena = Arc::new(arena);
    let n_ops = 10_000;

    let mut handles = vec![];
    for idx in 0..4 {
        let (arena, mut ids) = (Arc::clone(&arena), ids.clone());
        if idx % 2 == 1 {
            ids.reverse()
        }
        handles.push(thread::spawn(move || {
            for i in 0..n_ops {
                let req = [ids[i % 8], ids[(i + 3) % 8], ids[(i + 5) % 8]];
                let mut ls = LockSet::exclusive(&arena, &req, None);
                for id in req.iter() {
                    let node = ls.get_mut(*id);
                    node.value = node.value.map(|v| v + 1);
                }
            }
        }));
    }
    for handle in handles.into_iter() {
        handle.join().unwrap()
    }

    let total: u32 = ids
        .iter()
        .map(|id| arena.get(*id).read().as_value().copied().unwrap())
        .sum();
    assert_eq!(total, (0..8).sum::<u32>() + 4 * 3 * (n_ops as u32));
}
