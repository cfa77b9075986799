// Module `index` implement the public face of the concurrent red-black
// tree.
//
// [Index] type allow concurrent read and write access at API level. How
// readers and writers are kept apart is chosen once, at construction, by
// the [Strategy]:
//
// *Global*, every operation holds one exclusive mutex. No reader
// parallelism, no surprises.
//
// *ReadWrite*, lookups share a global latch while writes hold it
// exclusively. Readers run in parallel with each other, never with a
// writer.
//
// *Coupled*, lookups latch nodes hand-over-hand, down from the root, and
// never hold more than two node latches. Writers are serialized by the
// same mutex used by the Global strategy, the writer permit, and latch
// only the nodes they re-link. Readers run in parallel with each other
// and with the writer.
//
// *spin*, relevant only in multi-threaded context. Configuring spin as
// _true_ will have the calling thread to spin while waiting to acquire a
// latch. Configuring it as _false_ will have the calling thread to yield
// to OS scheduler while waiting.
//
// Validation needs a tree that is not changing underneath, use
// [Index::quiesce] to hold off writers, or [Index::verify] which does that
// by itself.

use log::{debug, error};

use std::{
    borrow::Borrow,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    rbt::{node::Node, tree::Tree, Config, Stats, Strategy},
    util::{spinlock::ReadGuard, Spinlock},
    Result,
};

/// Index type for thread-safe, concurrent reads and serialized writes.
#[derive(Clone)]
pub struct Index<K, V> {
    name: String,
    strategy: Strategy,
    spin: bool,

    mu: Arc<Mutex<()>>,
    latch: Arc<Spinlock<()>>,
    tree: Arc<Tree<K, V>>,
}

/// Guard returned by [Index::quiesce], writers are held off until it is
/// dropped.
pub enum Quiesce<'a> {
    Mutex(MutexGuard<'a, ()>),
    Latch(ReadGuard<()>),
}

impl<K, V> Index<K, V> {
    /// Create an empty index, with default configuration for `strategy`.
    pub fn new(name: &str, strategy: Strategy) -> Index<K, V> {
        let mut config = Config::new(name);
        config.set_strategy(strategy);
        Index::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Index<K, V> {
        debug!(
            "rbt index {:?} strategy:{} spin:{}",
            config.name, config.strategy, config.spin
        );

        Index {
            name: config.name.clone(),
            strategy: config.strategy,
            spin: config.spin,

            mu: Arc::new(Mutex::new(())),
            latch: Arc::new(Spinlock::with_spin((), config.spin)),
            tree: Arc::new(Tree::new(config.spin)),
        }
    }

    /// Return name of the index.
    #[inline]
    pub fn to_name(&self) -> String {
        self.name.clone()
    }

    #[inline]
    pub fn to_strategy(&self) -> Strategy {
        self.strategy
    }

    /// Return whether spin-concurrency is enabled.
    #[inline]
    pub fn is_spin(&self) -> bool {
        self.spin
    }

    /// Return number of entries in this instance.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Return whether index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the mutex serializing all operations for [Strategy::Global]
    /// and serializing writers for [Strategy::Coupled].
    pub fn as_mutex(&self) -> &Mutex<()> {
        &self.mu
    }

    /// Return the shared/exclusive latch used by [Strategy::ReadWrite].
    pub fn as_latch(&self) -> &Arc<Spinlock<()>> {
        &self.latch
    }

    /// Hold off writers, for as long as the returned guard is alive.
    /// Lookups from other threads continue under [Strategy::Coupled], and
    /// under [Strategy::ReadWrite] until a writer queues up on the latch.
    /// Don't call lookup from the thread holding the guard, except for
    /// [Strategy::Coupled].
    pub fn quiesce(&self) -> Quiesce<'_> {
        match self.strategy {
            Strategy::Global | Strategy::Coupled => Quiesce::Mutex(self.lock()),
            Strategy::ReadWrite => Quiesce::Latch(self.latch.read()),
        }
    }

    /// Return index statistics. `blacks` and `depths` are computed only
    /// by [Index::verify].
    pub fn to_stats(&self) -> Result<Stats> {
        use std::mem::size_of;

        let arena = self.tree.as_arena();

        let mut stats = Stats::new(&self.name, self.strategy, self.spin);
        stats.node_size = size_of::<Node<K, V>>();
        stats.n_count = self.tree.len();
        stats.n_slots = arena.to_capacity();
        stats.latch_stats = self.latch.to_stats()?;
        stats.arena_stats = arena.to_spin_stats()?;
        Ok(stats)
    }

    fn lock(&self) -> MutexGuard<()> {
        match self.mu.lock() {
            Ok(guard) => guard,
            Err(err) => panic!("{} poisoned lock {}, call the programmer", self.name, err),
        }
    }
}

impl<K, V> Index<K, V>
where
    K: Ord,
{
    /// Get value for `key`, None if key is not present.
    pub fn lookup<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        V: Clone,
        Q: Ord + ?Sized,
    {
        match self.strategy {
            Strategy::Global => {
                let _guard = self.lock();
                self.tree.get(key)
            }
            Strategy::ReadWrite => {
                let _guard = self.latch.read();
                self.tree.get(key)
            }
            Strategy::Coupled => self.tree.get_coupled(key),
        }
    }

    /// Set {key, value} in index, overwriting the value if key is already
    /// present.
    pub fn insert(&self, key: K, value: V) {
        self.set(key, value);
    }

    /// Same as [Index::insert], return the overwritten value if any.
    pub fn set(&self, key: K, value: V) -> Option<V> {
        match self.strategy {
            Strategy::Global | Strategy::Coupled => {
                let _guard = self.lock();
                self.tree.set(key, value)
            }
            Strategy::ReadWrite => {
                let _guard = self.latch.write();
                self.tree.set(key, value)
            }
        }
    }

    /// Remove entry for `key`, return whether it was present.
    pub fn erase<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.remove(key).is_some()
    }

    /// Same as [Index::erase], return the removed value if any.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.strategy {
            Strategy::Global | Strategy::Coupled => {
                let _guard = self.lock();
                self.tree.remove(key)
            }
            Strategy::ReadWrite => {
                let _guard = self.latch.write();
                self.tree.remove(key)
            }
        }
    }

    /// Validate the tree with following rules:
    ///
    /// * Root node is always black in color.
    /// * Sentinel is always black in color.
    /// * Verify the sort order between a node and its ancestors.
    /// * Make sure there are no consecutive reds.
    /// * Make sure number of blacks are same on every path.
    /// * Make sure that the maximum depth do not exceed the limit.
    ///
    /// Takes no lock, caller shall hold the guard from [Index::quiesce]
    /// or otherwise make sure there is no concurrent writer.
    pub fn validate(&self) -> bool
    where
        K: fmt::Debug,
    {
        match self.tree.validate() {
            Ok(report) => {
                debug!(
                    "{} validated n_count:{} blacks:{}",
                    self.name, report.n_count, report.blacks
                );
                true
            }
            Err(err) => {
                error!("{} validate failed {}", self.name, err);
                false
            }
        }
    }

    /// Self contained [Index::validate], holds off writers while
    /// validating and return statistics, along with black count and
    /// depth histogram.
    pub fn verify(&self) -> Result<Stats>
    where
        K: fmt::Debug,
    {
        let (report, mut stats) = {
            let _guard = self.quiesce();
            (self.tree.validate()?, self.to_stats()?)
        };
        stats.blacks = Some(report.blacks);
        stats.depths = Some(report.depths);
        Ok(stats)
    }
}

#[cfg(test)]
pub fn load_index<K, V>(
    name: &str,
    strategy: Strategy,
    seed: u64,
    n_sets: usize,
    n_erases: usize,
) -> (Index<K, V>, std::collections::BTreeMap<K, V>)
where
    K: Clone + Ord,
    V: Clone,
    rand::distributions::Standard: rand::distributions::Distribution<K>,
    rand::distributions::Standard: rand::distributions::Distribution<V>,
{
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut model = std::collections::BTreeMap::new();
    let index = Index::new(name, strategy);

    let (mut se, mut er) = (n_sets, n_erases);
    while (se + er) > 0 {
        let key: K = rng.gen();
        match rng.gen::<usize>() % (se + er) {
            n if n < se => {
                let value: V = rng.gen();
                index.insert(key.clone(), value.clone());
                model.insert(key, value);
                se -= 1;
            }
            _ => {
                // pick a present key, if any, to make erase count.
                let key = match model.range(key.clone()..).next() {
                    Some((k, _)) => k.clone(),
                    None => key,
                };
                assert_eq!(index.erase(&key), model.remove(&key).is_some());
                er -= 1;
            }
        }
    }

    (index, model)
}

#[cfg(test)]
#[path = "index_test.rs"]
mod index_test;
