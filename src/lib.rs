//! Package implement an in-memory, ordered key-value index, as a red-black
//! tree, that can be read and written from many threads.
//!
//! Tree algorithms are written once and the concurrency control is picked
//! when the index is created, refer to [Strategy] for the choices. Every
//! strategy serializes writers. What differs is how much readers can
//! overlap with each other and with the writer:
//!
//! * [Strategy::Global], one exclusive lock for every operation.
//! * [Strategy::ReadWrite], readers share a global latch.
//! * [Strategy::Coupled], readers latch nodes hand-over-hand and run
//!   alongside the writer, while the writer latches only the nodes it
//!   re-links. Multiple latches are always acquired in a global rank
//!   order, so there is no deadlock.
//!
//! ```ignore
//! use rbt::{Index, Strategy};
//!
//! let index: Index<u64, String> = Index::new("sessions", Strategy::Coupled);
//! index.insert(10, "ten".to_string());
//! assert_eq!(index.lookup(&10), Some("ten".to_string()));
//! assert!(index.erase(&10));
//! ```

mod error;
pub mod rbt;
pub mod util;

pub use crate::error::{Error, Result};
pub use crate::rbt::{Config, Depth, Index, Quiesce, Stats, Strategy};
