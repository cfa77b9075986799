use rand::{rngs::SmallRng, Rng, SeedableRng};

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
        Arc,
    },
    thread, time,
};

use rbt::{err_at, Config, Index, Result, Strategy};

use crate::{load_profile, Opt};

#[derive(Clone)]
pub struct Profile {
    spin: bool,
    key_range: u64,
    initial: usize,
    readers: usize,
    writers: usize,
    ops: usize,
    insert_ratio: f64,
    duration: time::Duration,
    validate_interval: time::Duration,
}

impl Default for Profile {
    fn default() -> Profile {
        Profile {
            spin: false,
            key_range: 100_000,
            initial: 10_000,
            readers: num_cpus::get(),
            writers: 4,
            ops: 100_000,
            insert_ratio: 0.3,
            duration: time::Duration::from_secs(30),
            validate_interval: time::Duration::from_millis(500),
        }
    }
}

impl Profile {
    fn from_toml(v: toml::Value) -> Result<Profile> {
        let p: Profile = Default::default();

        let p = Profile {
            spin: get_property!(v, "spin", as_bool, p.spin),
            key_range: get_property!(v, "key_range", as_integer, p.key_range as i64) as u64,
            initial: get_property!(v, "initial", as_integer, p.initial as i64) as usize,
            readers: get_property!(v, "readers", as_integer, p.readers as i64) as usize,
            writers: get_property!(v, "writers", as_integer, p.writers as i64) as usize,
            ops: get_property!(v, "ops", as_integer, p.ops as i64) as usize,
            insert_ratio: get_property!(v, "insert_ratio", as_float, p.insert_ratio),
            duration: {
                let secs = p.duration.as_secs() as i64;
                let secs = get_property!(v, "duration", as_integer, secs);
                time::Duration::from_secs(secs as u64)
            },
            validate_interval: {
                let ms = p.validate_interval.as_millis() as i64;
                let ms = get_property!(v, "validate_interval", as_integer, ms);
                time::Duration::from_millis(ms as u64)
            },
        };

        if p.key_range == 0 {
            err_at!(InvalidInput, msg: "key_range must be non-zero")?;
        }
        if !(0.0..=1.0).contains(&p.insert_ratio) {
            err_at!(InvalidInput, msg: "insert_ratio {} not in 0..1", p.insert_ratio)?;
        }
        Ok(p)
    }
}

pub fn perf(opts: Opt, strategy: Strategy) -> Result<()> {
    let p = Profile::from_toml(load_profile(&opts)?)?;

    let mut config = Config::new("rbt-perf");
    config.set_strategy(strategy).set_spin(p.spin);
    let index: Index<u64, u64> = Index::from_config(&config);

    let mut rng = SmallRng::seed_from_u64(opts.seed);
    initial_load(&mut rng, &p, &index);

    let start = time::Instant::now();
    let running = Arc::new(AtomicUsize::new(p.writers));
    let failed = Arc::new(AtomicBool::new(false));

    let mut writers = vec![];
    for j in 0..p.writers {
        let (p, index, running) = (p.clone(), index.clone(), Arc::clone(&running));
        let seed = opts.seed + ((j as u64) * 100);
        writers.push(thread::spawn(move || {
            let n = incr_load(j, seed, &p, &index);
            running.fetch_sub(1, SeqCst);
            n
        }));
    }

    let mut readers = vec![];
    for j in 0..p.readers {
        let (p, index, running) = (p.clone(), index.clone(), Arc::clone(&running));
        let seed = opts.seed + ((j as u64) * 100) + 1;
        readers.push(thread::spawn(move || read_load(seed, &p, &index, &running)));
    }

    let validator = {
        let (p, index) = (p.clone(), index.clone());
        let (running, failed) = (Arc::clone(&running), Arc::clone(&failed));
        thread::spawn(move || {
            let mut n = 0;
            while running.load(SeqCst) > 0 {
                thread::sleep(p.validate_interval);
                let _guard = index.quiesce();
                if !index.validate() {
                    failed.store(true, SeqCst);
                    break;
                }
                n += 1;
            }
            n
        })
    };

    let mut n_writes = 0;
    for handle in writers.into_iter() {
        n_writes += err_at!(ThreadFail, handle.join().map_err(|_| "writer panic"))?;
    }
    let mut n_reads = 0;
    for handle in readers.into_iter() {
        n_reads += err_at!(ThreadFail, handle.join().map_err(|_| "reader panic"))?;
    }
    let n_validates = err_at!(ThreadFail, validator.join().map_err(|_| "validator panic"))?;
    let elapsed = start.elapsed();

    if failed.load(SeqCst) {
        panic!("rbt-perf: {} validation failed", strategy);
    }

    let secs = elapsed.as_secs_f64();
    println!(
        "rbt-perf: {} writes:{} ({:.0}/s) reads:{} ({:.0}/s) validates:{} took {:?}",
        strategy,
        n_writes,
        (n_writes as f64) / secs,
        n_reads,
        (n_reads as f64) / secs,
        n_validates,
        elapsed
    );

    print!("rbt-perf: verifying {} items in index ... ", index.len());
    let stats = index.verify()?;
    println!("ok");
    println!("{}", stats);

    Ok(())
}

fn initial_load(rng: &mut SmallRng, p: &Profile, index: &Index<u64, u64>) {
    let start = time::Instant::now();
    for _i in 0..p.initial {
        let key = rng.gen::<u64>() % p.key_range;
        index.insert(key, rng.gen());
    }

    println!(
        "rbt-perf: {} loaded {} items in {:?}",
        index.to_strategy(),
        index.len(),
        start.elapsed()
    );
}

fn incr_load(j: usize, seed: u64, p: &Profile, index: &Index<u64, u64>) -> usize {
    let mut rng = SmallRng::seed_from_u64(seed);

    let start = time::Instant::now();
    let (mut ins, mut ers) = (0, 0);
    for _i in 0..p.ops {
        if start.elapsed() > p.duration {
            break;
        }
        let key = rng.gen::<u64>() % p.key_range;
        if rng.gen::<f64>() < p.insert_ratio {
            index.insert(key, rng.gen());
            ins += 1;
        } else {
            index.erase(&key);
            ers += 1;
        }
    }

    println!(
        "rbt-perf: writer-{} for (inserts:{} erases:{}) operations took {:?}",
        j,
        ins,
        ers,
        start.elapsed()
    );

    ins + ers
}

fn read_load(seed: u64, p: &Profile, index: &Index<u64, u64>, running: &AtomicUsize) -> usize {
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut n = 0;
    while running.load(SeqCst) > 0 {
        let key = rng.gen::<u64>() % p.key_range;
        index.lookup(&key);
        n += 1;
    }
    n
}
