//! Module implement concurrent red-black tree with pluggable locking.

mod arena;
mod config;
mod depth;
mod index;
mod lockset;
mod node;
mod stats;
mod tree;
mod validate;

pub use config::{Config, Strategy};
pub use depth::Depth;
pub use index::{Index, Quiesce};
pub use node::Color;
pub use stats::Stats;
pub use validate::MAX_TREE_DEPTH;
