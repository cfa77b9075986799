//! Module implement common utility functions and types.

pub mod spinlock;

pub use spinlock::Spinlock;
