use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use std::collections::BTreeMap;

use super::*;

fn node_of(tree: &Tree<u64, u64>, id: NodeId) -> (Option<u64>, Color, NodeId, NodeId) {
    let node = tree.as_arena().get(id);
    let node = node.read();
    (node.key, node.color, node.left, node.right)
}

#[test]
fn test_tree_rotation() {
    let tree: Tree<u64, u64> = Tree::new(false);
    for key in [10, 20, 30].iter() {
        assert_eq!(tree.set(*key, key * 10), None);
        tree.validate().unwrap();
    }

    // single left rotation at 10, root 20 with two red children.
    let (key, color, left, right) = node_of(&tree, tree.to_root());
    assert_eq!((key, color), (Some(20), Color::Black));
    assert_eq!(node_of(&tree, left).0, Some(10));
    assert_eq!(node_of(&tree, left).1, Color::Red);
    assert_eq!(node_of(&tree, right).0, Some(30));
    assert_eq!(node_of(&tree, right).1, Color::Red);

    let report = tree.validate().unwrap();
    assert_eq!(report.n_count, 3);
    assert_eq!(report.blacks, 1);
    // root at depth 1, both leaves at depth 2, that is height 1.
    assert_eq!(report.depths.to_max(), 2);
    assert_eq!(report.depths.to_min(), 2);
}

#[test]
fn test_tree_mirror_rotation() {
    let tree: Tree<u64, u64> = Tree::new(false);
    for key in [30, 20, 10].iter() {
        tree.set(*key, key * 10);
    }
    let (key, color, left, right) = node_of(&tree, tree.to_root());
    assert_eq!((key, color), (Some(20), Color::Black));
    assert_eq!(node_of(&tree, left).0, Some(10));
    assert_eq!(node_of(&tree, right).0, Some(30));

    // inner grandchild, double rotation.
    let tree: Tree<u64, u64> = Tree::new(false);
    for key in [10, 30, 20].iter() {
        tree.set(*key, key * 10);
    }
    assert_eq!(node_of(&tree, tree.to_root()).0, Some(20));
    tree.validate().unwrap();
}

#[test]
fn test_tree_delete_repair() {
    let tree: Tree<u64, u64> = Tree::new(false);
    for key in 1..=7 {
        tree.set(key, key * 100);
    }
    tree.validate().unwrap();

    assert_eq!(tree.remove(&1), Some(100));
    tree.validate().unwrap();
    assert_eq!(tree.get(&1), None);
    for key in 2..=7 {
        assert_eq!(tree.get(&key), Some(key * 100));
    }
    assert_eq!(tree.len(), 6);

    assert_eq!(tree.remove(&1), None);
    assert_eq!(tree.len(), 6);
    tree.validate().unwrap();
}

#[test]
fn test_tree_overwrite() {
    let tree: Tree<u64, u64> = Tree::new(false);
    assert_eq!(tree.set(10, 1), None);
    assert_eq!(tree.set(10, 2), Some(1));
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.as_arena().len(), 1);
    assert_eq!(tree.get(&10), Some(2));
    assert_eq!(tree.get_coupled(&10), Some(2));
}

#[test]
fn test_tree_drain() {
    let tree: Tree<u64, u64> = Tree::new(false);
    let n = 1000;
    for key in 0..n {
        tree.set(key, key);
    }
    tree.validate().unwrap();
    assert_eq!(tree.as_arena().len(), n as usize);

    // erase the root over and over, exercises two child relocation.
    while !tree.is_empty() {
        let root = tree.to_root();
        let key = node_of(&tree, root).0.unwrap();
        assert_eq!(tree.remove(&key), Some(key));
        tree.validate().unwrap();
    }
    assert_eq!(tree.to_root(), NIL);
    assert_eq!(tree.as_arena().len(), 0);

    // freed slots are reused.
    for key in 0..n {
        tree.set(key, key);
    }
    assert_eq!(tree.as_arena().to_capacity(), n as usize);
    tree.validate().unwrap();
}

#[test]
fn test_tree_random() {
    let seed: u64 = random();
    println!("test_tree_random seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let tree: Tree<u64, u64> = Tree::new(false);
    let mut model: BTreeMap<u64, u64> = BTreeMap::new();
    let key_range = 1 + rng.gen::<u64>() % 2000;
    let n_ops = 20_000;
    println!("test_tree_random key_range:{} n_ops:{}", key_range, n_ops);

    let (mut n_sets, mut n_removes, mut n_gets) = (0, 0, 0);
    for i in 0..n_ops {
        let key = rng.gen::<u64>() % key_range;
        match rng.gen::<u8>() % 3 {
            0 => {
                let value: u64 = rng.gen();
                assert_eq!(tree.set(key, value), model.insert(key, value));
                n_sets += 1;
            }
            1 => {
                assert_eq!(tree.remove(&key), model.remove(&key));
                n_removes += 1;
            }
            _ => {
                let val = model.get(&key).copied();
                assert_eq!(tree.get(&key), val);
                assert_eq!(tree.get_coupled(&key), val);
                n_gets += 1;
            }
        }
        if i % 100 == 0 {
            let report = tree.validate().unwrap();
            assert_eq!(report.n_count, model.len());
        }
    }
    println!(
        "test_tree_random sets:{} removes:{} gets:{}",
        n_sets, n_removes, n_gets
    );

    let report = tree.validate().unwrap();
    assert_eq!(report.n_count, model.len());
    assert_eq!(tree.len(), model.len());
    for (key, value) in model.iter() {
        assert_eq!(tree.get(key), Some(*value));
    }
}

#[test]
fn test_tree_borrowed_keys() {
    let tree: Tree<String, u64> = Tree::new(false);
    for (i, key) in ["delta", "alpha", "echo", "bravo", "charlie"].iter().enumerate() {
        tree.set(key.to_string(), i as u64);
    }
    tree.validate().unwrap();

    assert_eq!(tree.get("alpha"), Some(1));
    assert_eq!(tree.get_coupled("echo"), Some(2));
    assert_eq!(tree.remove("delta"), Some(0));
    assert_eq!(tree.get("delta"), None);
    assert_eq!(tree.get_coupled("foxtrot"), None);
    tree.validate().unwrap();
}
