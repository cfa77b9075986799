use std::{fmt, result};

#[allow(unused_imports)]
use crate::rbt::Index;
use crate::{
    rbt::{Depth, Strategy},
    util::spinlock,
};

/// Statistic type, for [Index] type.
pub struct Stats {
    pub name: String,
    pub strategy: Strategy,
    pub spin: bool,
    pub node_size: usize,
    pub n_count: usize,
    pub n_slots: usize,
    pub latch_stats: spinlock::Stats,
    pub arena_stats: spinlock::Stats,
    pub blacks: Option<usize>,
    pub depths: Option<Depth>,
}

impl Stats {
    pub(crate) fn new(name: &str, strategy: Strategy, spin: bool) -> Stats {
        Stats {
            name: name.to_string(),
            strategy,
            spin,
            node_size: Default::default(),
            n_count: Default::default(),
            n_slots: Default::default(),
            latch_stats: Default::default(),
            arena_stats: Default::default(),
            blacks: None,
            depths: None,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        let none = "none".to_string();
        let b = self.blacks.as_ref().map_or(none.clone(), |x| x.to_string());
        let d = self.depths.as_ref().map_or(none, |x| x.to_string());
        writeln!(f, "rbt.name = {}", self.name)?;
        writeln!(
            f,
            "rbt = {{ strategy={}, spin={}, n_count={}, n_slots={} node_size={}, blacks={} }}",
            self.strategy, self.spin, self.n_count, self.n_slots, self.node_size, b,
        )?;
        writeln!(f, "rbt.latch_stats = {}", self.latch_stats)?;
        writeln!(f, "rbt.arena_stats = {}", self.arena_stats)?;
        writeln!(f, "rbt.depths = {}", d)
    }
}
