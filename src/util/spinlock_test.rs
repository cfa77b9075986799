use rand::prelude::random;

use std::{
    sync::{atomic::AtomicBool, Arc},
    {thread, time},
};

use super::*;

#[test]
fn test_spinlock_rank() {
    let a = Arc::new(Spinlock::new(()));
    let b = Arc::new(Spinlock::with_spin((), true));
    assert!(a.to_rank() < b.to_rank());
    assert!(!a.is_spin());
    assert!(b.is_spin());

    let (r, u) = (a.read(), b.upgradable());
    assert_eq!(r.to_rank(), a.to_rank());
    assert_eq!(u.to_rank(), b.to_rank());
}

#[test]
fn test_spinlock_try_read() {
    let spin = Arc::new(Spinlock::new(10_u64));

    {
        let r1 = spin.try_read().unwrap();
        let r2 = spin.read();
        assert_eq!(*r1 + *r2, 20);
    }
    {
        let mut w = spin.write();
        *w = 20;
        assert!(spin.try_read().is_none());
    }
    assert_eq!(*spin.try_read().unwrap(), 20);
    assert_eq!(spin.to_stats().unwrap().latchlock, 0);
}

#[test]
fn test_spinlock_upgrade() {
    let spin = Arc::new(Spinlock::new(vec![1_u64]));

    // readers can enter a reserved room.
    let u = spin.upgradable();
    {
        let r = spin.try_read().unwrap();
        assert_eq!(r.len(), 1);
    }
    let mut w = u.upgrade();
    w.push(2);
    assert!(spin.try_read().is_none());
    std::mem::drop(w);

    assert_eq!(*spin.read(), vec![1, 2]);
    assert_eq!(spin.to_stats().unwrap().latchlock, 0);

    // dropping the reservation, without upgrade, frees the room.
    std::mem::drop(spin.upgradable());
    let w = spin.write();
    assert_eq!(w.len(), 2);
}

#[test]
fn test_spinlock_upgrade_waits_readers() {
    let spin = Arc::new(Spinlock::new(0_u64));
    let done = Arc::new(AtomicBool::new(false));

    let r = spin.read();
    let handle = {
        let (spin, done) = (Arc::clone(&spin), Arc::clone(&done));
        thread::spawn(move || {
            let mut w = spin.upgradable().upgrade();
            *w += 1;
            done.store(true, SeqCst);
        })
    };

    thread::sleep(time::Duration::from_millis(100));
    assert!(!done.load(SeqCst), "upgrade while a reader is in the room");
    std::mem::drop(r);

    handle.join().unwrap();
    assert!(done.load(SeqCst));
    assert_eq!(*spin.read(), 1);
}

#[test]
fn test_spinlock_upgrade_excludes_writers() {
    let spin = Arc::new(Spinlock::new(0_u64));
    let n_threads = 4;
    let n_ops = 1000;

    let mut handles = vec![];
    for idx in 0..n_threads {
        let spin = Arc::clone(&spin);
        handles.push(thread::spawn(move || {
            for i in 0..n_ops {
                if (idx + i) % 2 == 0 {
                    let u = spin.upgradable();
                    let old = *u;
                    let mut w = u.upgrade();
                    assert_eq!(*w, old);
                    *w += 1;
                } else {
                    *spin.write() += 1;
                }
            }
        }));
    }
    for handle in handles.into_iter() {
        handle.join().unwrap()
    }

    assert_eq!(*spin.read(), (n_threads * n_ops) as u64);
    println!("test_spinlock_upgrade_excludes_writers {}", spin.to_stats().unwrap());
}

#[test]
fn test_spinlock() {
    let spin = Arc::new(Spinlock::new(Data::new(1024)));
    let c = Context { n_readers: 4, n_writers: 4, size: 1024 };

    let writer = |spin: Arc<Spinlock<Data>>, idx: usize, c: Context| {
        let mut res = Vec::with_capacity(c.n_writers);
        res.resize(res.capacity(), 0);

        let start = time::SystemTime::now();
        let value: Vec<u8> =
            ((idx * c.size)..((idx * c.size) + c.size)).map(|x| x as u8).collect();
        while start.elapsed().unwrap().as_secs() < 2 {
            {
                let mut w = spin.write();
                w.idx = idx;
                w.value.copy_from_slice(&value);
                res[idx] += 1;
            }
        }

        Rc::Ws(res)
    };

    let reader = |spin: Arc<Spinlock<Data>>, c: Context| {
        let mut res = Vec::with_capacity(std::cmp::max(c.n_writers, 1));
        res.resize(res.capacity(), 0);

        let mut values = vec![];
        (0..res.len()).for_each(|idx| {
            let value: Vec<u8> =
                ((idx * c.size)..((idx * c.size) + c.size)).map(|x| x as u8).collect();
            values.push(value);
        });

        let start = time::SystemTime::now();
        while start.elapsed().unwrap().as_secs() < 2 {
            {
                let r = spin.read();
                assert_eq!(values[r.idx], r.value);
                res[r.idx] += 1;
                busy_loop(25);
            }
        }

        Rc::Rs(res)
    };

    let mut writers = vec![];
    for idx in 0..c.n_writers {
        let (arg1, arg2, arg3) = (Arc::clone(&spin), idx, c.clone());
        writers.push(thread::spawn(move || writer(arg1, arg2, arg3)));
    }

    let mut readers = vec![];
    for _idx in 0..c.n_readers {
        let (arg1, arg2) = (Arc::clone(&spin), c.clone());
        readers.push(thread::spawn(move || reader(arg1, arg2)));
    }

    print_w_res(writers.into_iter().map(|w| w.join().unwrap()).collect());
    print_r_res(readers.into_iter().map(|r| r.join().unwrap()).collect());
    println!("test_spinlock Spinlock {}", spin.to_stats().unwrap());
}

struct Data {
    idx: usize,
    value: Vec<u8>,
}

impl Data {
    fn new(size: usize) -> Data {
        let value: Vec<u8> = (0..size).map(|x| x as u8).collect();
        Data { idx: 0, value }
    }
}

enum Rc {
    Ws(Vec<usize>),
    Rs(Vec<usize>),
}

#[derive(Clone)]
struct Context {
    n_readers: usize,
    n_writers: usize,
    size: usize,
}

fn print_w_res(w_res: Vec<Rc>) {
    for res in w_res {
        match res {
            Rc::Ws(res) => res,
            _ => unreachable!(),
        }
        .iter()
        .enumerate()
        .filter_map(|(i, n)| if *n > 0 { Some((i, *n)) } else { None })
        .for_each(|(i, n)| println!("writer {} ops {}", i, n));
    }
}

fn print_r_res(r_res: Vec<Rc>) {
    for (r, res) in r_res.into_iter().enumerate() {
        match res {
            Rc::Rs(res) => res,
            _ => unreachable!(),
        }
        .iter()
        .enumerate()
        .filter_map(|(i, n)| if *n > 0 { Some((i, *n)) } else { None })
        .for_each(|(i, n)| println!("reader {} data {} ops {}", r, i, n));
    }
}

fn busy_loop(count: usize) -> u64 {
    let acc: u64 = (0..count).map(|_| random::<u32>() as u64).sum();
    acc
}
