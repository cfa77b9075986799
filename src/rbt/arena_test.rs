use super::*;

#[test]
fn test_arena_reserved() {
    let arena: Arena<u32, u32> = Arena::new(false);
    assert_eq!(arena.len(), 0);
    assert_eq!(arena.to_capacity(), 0);
    assert!(!arena.is_spin());

    for id in [NIL, ANCHOR].iter() {
        let node = arena.get(*id);
        let node = node.read();
        assert!(node.is_black());
        assert_eq!(node.as_key(), None);
        assert_eq!((node.parent, node.left, node.right), (NIL, NIL, NIL));
    }
    assert!(arena.get(NIL).to_rank() < arena.get(ANCHOR).to_rank());
}

#[test]
fn test_arena_alloc_free() {
    let arena: Arena<u32, u32> = Arena::new(true);

    let ids: Vec<NodeId> = (0..10).map(|k| arena.alloc(Node::new(k, k * 10))).collect();
    assert_eq!(ids, (2..12).collect::<Vec<NodeId>>());
    assert_eq!(arena.len(), 10);
    for (k, id) in ids.iter().enumerate() {
        assert_eq!(arena.get(*id).read().as_value(), Some(&(k as u32 * 10)));
    }

    // a handle resolved before free keeps the node alive.
    let held = arena.get(ids[3]);
    let freed = arena.free(ids[3]);
    assert!(Arc::ptr_eq(&held, &freed));
    assert_eq!(held.read().as_key(), Some(&3));
    assert_eq!(arena.len(), 9);

    // slots are recycled, with a fresh latch and a fresh rank.
    let id = arena.alloc(Node::new(100, 1000));
    assert_eq!(id, ids[3]);
    let fresh = arena.get(id);
    assert!(!Arc::ptr_eq(&held, &fresh));
    assert!(fresh.to_rank() > held.to_rank());
    assert_eq!(arena.len(), 10);
    assert_eq!(arena.to_capacity(), 10);
}

#[test]
#[should_panic]
fn test_arena_free_reserved() {
    let arena: Arena<u32, u32> = Arena::new(false);
    arena.free(ANCHOR);
}

#[test]
#[should_panic]
fn test_arena_dangling() {
    let arena: Arena<u32, u32> = Arena::new(false);
    let id = arena.alloc(Node::new(1, 1));
    arena.free(id);
    arena.get(id);
}
