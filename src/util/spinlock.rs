//! Module `spinlock` implement read-write-spinlock, useful for
//! non-blocking concurrency.
//!
//! Blocking concurrency can have impact on latency. When operations
//! that require [rw-exclusion][rw-lock] is going to be quick and short,
//! we can use non-blocking primitives like latch-and-spin.
//!
//! **What is Latch and spin ?**
//!
//! In typical multi-core processors, concurrent read operations are
//! always safe and consistent. But it becomes unsafe, when there is a
//! writer concurrently modifying data while readers are loading it from
//! memory.
//!
//! Imagine a door leading into a room. This door has some special
//! properties:
//!
//! 1. The door has a latch, a lock and a reservation tag.
//! 2. A **reader** can enter the room only when the door is un-locked
//!    and un-latched.
//! 3. A **writer** can enter the room only when the door is un-locked,
//!    un-latched, un-reserved and, there are no other **reader** in the
//!    room.
//! 4. Once the door is latched by a **writer**, no other **writer**
//!    or **reader** can enter the room because of (2) and (3) properties.
//!    But all **readers** who are already inside the room can finish
//!    their job and then exit.
//! 5. A **writer** can enter the room only after locking the door, which
//!    the **writer** can do only after all the **readers** have exited.
//! 6. An **upgrader** reserves the door and enters the room like a reader,
//!    other readers can still come and go. When it decides to write, it
//!    latches the door without ever leaving the room, waits for the
//!    readers to exit and then locks the door.
//! 7. When trying to acquire any permission, the caller thread shall spin,
//!    or yield, until all the conditions above are met. Once a thread
//!    acquires necessary permission it can continue to finish its job and
//!    then release the permission.
//!
//! Every Spinlock is also stamped with a process-wide unique _rank_, in
//! the order of construction. Code that needs to hold more than one
//! Spinlock can use the rank to acquire them in a global order.
//!
//! [rw-lock]: https://en.wikipedia.org/wiki/Readers–writer_lock
//!

use std::convert::TryFrom;
use std::{
    cell::UnsafeCell,
    fmt, hint, mem,
    ops::{Deref, DerefMut},
    ptr, result,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering::SeqCst},
        Arc,
    },
    thread,
};

use crate::{err_at, Result};

static RANK: AtomicU64 = AtomicU64::new(1);

/// Spinlock implements latch-and-spin mechanism for non-blocking
/// concurrency.
///
/// It uses AtomicU32 for:
/// * ref-count, bits [0-28].
/// * upgrade flag, bit 29.
/// * latch flag, bit 30.
/// * lock flag, bit 31.
///
/// All permissions are handed out as owned guards, hence the receiver
/// for acquire methods is `Arc<Spinlock<T>>`. This allows a thread to
/// hold on to a guard while the reference it was reached by goes away,
/// which is what lock-coupling needs.
pub struct Spinlock<T> {
    latchlock: AtomicU32,
    rank: u64,
    spin: bool,
    read_locks: AtomicU32,
    write_locks: AtomicU32,
    upgrades: AtomicU32,
    conflicts: AtomicU32,

    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send + Sync> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    const UPGRADE_FLAG: u32 = 0x20000000;
    const LATCH_FLAG: u32 = 0x40000000;
    const LOCK_FLAG: u32 = 0x80000000;
    const LATCH_LOCK_FLAG: u32 = 0xC0000000;
    const READERS_FLAG: u32 = 0x1FFFFFFF;

    /// Create a new Spinlock, waiting threads shall yield to the OS.
    pub fn new(value: T) -> Spinlock<T> {
        Self::with_spin(value, false)
    }

    /// Create a new Spinlock. If `spin` is true, waiting threads shall
    /// busy-loop, otherwise yield to the OS scheduler between attempts.
    pub fn with_spin(value: T, spin: bool) -> Spinlock<T> {
        Spinlock {
            latchlock: AtomicU32::new(0),
            rank: RANK.fetch_add(1, SeqCst),
            spin,
            read_locks: AtomicU32::new(0),
            write_locks: AtomicU32::new(0),
            upgrades: AtomicU32::new(0),
            conflicts: AtomicU32::new(0),

            value: UnsafeCell::new(value),
        }
    }

    /// Return the construction rank of this latch. Ranks are unique
    /// across the process and never reused.
    #[inline]
    pub fn to_rank(&self) -> u64 {
        self.rank
    }

    /// Return whether waiters on this latch spin.
    #[inline]
    pub fn is_spin(&self) -> bool {
        self.spin
    }

    /// Acquire latch for read permission.
    pub fn read(self: &Arc<Self>) -> ReadGuard<T> {
        loop {
            match self.try_read() {
                Some(guard) => break guard,
                None => self.backoff(),
            }
        }
    }

    /// Try to acquire latch for read permission, without waiting on a
    /// writer. Return None if the latch is held or latched by a writer.
    pub fn try_read(self: &Arc<Self>) -> Option<ReadGuard<T>> {
        loop {
            let old = self.latchlock.load(SeqCst);
            if (old & Self::LATCH_LOCK_FLAG) != 0 {
                if cfg!(feature = "debug") {
                    self.conflicts.fetch_add(1, SeqCst);
                }
                break None;
            }
            if self
                .latchlock
                .compare_exchange(old, old + 1, SeqCst, SeqCst)
                .is_ok()
            {
                if cfg!(feature = "debug") {
                    self.read_locks.fetch_add(1, SeqCst);
                }
                break Some(ReadGuard {
                    door: Arc::clone(self),
                });
            }
        }
    }

    /// Acquire latch for upgradable-read permission. Readers can still
    /// enter the room, but not writers or other upgraders.
    pub fn upgradable(self: &Arc<Self>) -> UpgradeGuard<T> {
        loop {
            let old = self.latchlock.load(SeqCst);
            let flags = Self::LATCH_LOCK_FLAG | Self::UPGRADE_FLAG;
            if (old & flags) == 0 {
                let new = old | Self::UPGRADE_FLAG;
                if self
                    .latchlock
                    .compare_exchange(old, new, SeqCst, SeqCst)
                    .is_ok()
                {
                    break UpgradeGuard {
                        door: Arc::clone(self),
                    };
                }
            }
            self.backoff()
        }
    }

    /// Acquire latch for write permission.
    pub fn write(self: &Arc<Self>) -> WriteGuard<T> {
        loop {
            let old = self.latchlock.load(SeqCst);
            if (old & (Self::LATCH_FLAG | Self::UPGRADE_FLAG)) == 0 {
                // latch is not acquired by a writer, nor reserved.
                if (old & Self::LOCK_FLAG) != 0 {
                    panic!(concat!(
                        "if latch is flipped-off, lock can't be flipped-on! ",
                        "call the programmer"
                    ));
                }
                let new = old | Self::LATCH_FLAG;
                if self
                    .latchlock
                    .compare_exchange(old, new, SeqCst, SeqCst)
                    .is_ok()
                {
                    break;
                }
            }
            self.backoff()
        }

        self.lock_latched();
        if cfg!(feature = "debug") {
            self.write_locks.fetch_add(1, SeqCst);
        }
        WriteGuard {
            door: Arc::clone(self),
        }
    }

    // caller holds the latch flag, wait for the readers to exit the room
    // and then flip on the lock.
    fn lock_latched(&self) {
        loop {
            let old = self.latchlock.load(SeqCst);
            if (old & Self::READERS_FLAG) == 0 {
                let new = (old | Self::LOCK_FLAG) & !Self::UPGRADE_FLAG;
                if self
                    .latchlock
                    .compare_exchange(old, new, SeqCst, SeqCst)
                    .is_ok()
                {
                    break;
                }
                panic!(concat!(
                    "latch is acquired, ZERO readers, but unable to lock! ",
                    "call the programmer"
                ));
            }
            self.backoff()
        }
    }

    fn backoff(&self) {
        if cfg!(feature = "debug") {
            self.conflicts.fetch_add(1, SeqCst);
        }
        if self.spin {
            hint::spin_loop()
        } else {
            thread::yield_now()
        }
    }

    pub fn to_stats(&self) -> Result<Stats> {
        let rl = err_at!(FailConvert, usize::try_from(self.read_locks.load(SeqCst)))?;
        let wl = err_at!(FailConvert, usize::try_from(self.write_locks.load(SeqCst)))?;
        let ul = err_at!(FailConvert, usize::try_from(self.upgrades.load(SeqCst)))?;
        let cn = err_at!(FailConvert, usize::try_from(self.conflicts.load(SeqCst)))?;
        Ok(Stats {
            latchlock: self.latchlock.load(SeqCst),
            read_locks: rl,
            write_locks: wl,
            upgrades: ul,
            conflicts: cn,
        })
    }
}

/// Type to handle read-latch, when dropped the read permission is released.
pub struct ReadGuard<T> {
    door: Arc<Spinlock<T>>,
}

impl<T> ReadGuard<T> {
    #[inline]
    pub fn to_rank(&self) -> u64 {
        self.door.rank
    }
}

impl<T> Deref for ReadGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.door.value.get() }
    }
}

impl<T> Drop for ReadGuard<T> {
    fn drop(&mut self) {
        self.door.latchlock.fetch_sub(1, SeqCst);
    }
}

/// Type to handle upgradable-read permission. Can be converted to write
/// permission using [UpgradeGuard::upgrade], when dropped the reservation
/// is released.
pub struct UpgradeGuard<T> {
    door: Arc<Spinlock<T>>,
}

impl<T> UpgradeGuard<T> {
    #[inline]
    pub fn to_rank(&self) -> u64 {
        self.door.rank
    }

    /// Convert upgradable-read permission into write permission. The room
    /// is never left unlocked in between: the latch is flipped-on while
    /// the reservation is still held, so no other writer can come in and
    /// no new reader can enter, then we wait for the existing readers to
    /// exit.
    pub fn upgrade(self) -> WriteGuard<T> {
        let this = mem::ManuallyDrop::new(self);
        // moving out the door, `this` is never dropped.
        let door = unsafe { ptr::read(&this.door) };

        let old = door.latchlock.fetch_or(Spinlock::<T>::LATCH_FLAG, SeqCst);
        if (old & Spinlock::<T>::LATCH_LOCK_FLAG) != 0 {
            panic!(concat!(
                "latch flipped-on for a reserved door! ",
                "call the programmer"
            ));
        }
        door.lock_latched();
        if cfg!(feature = "debug") {
            door.upgrades.fetch_add(1, SeqCst);
        }
        WriteGuard { door }
    }
}

impl<T> Deref for UpgradeGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.door.value.get() }
    }
}

impl<T> Drop for UpgradeGuard<T> {
    fn drop(&mut self) {
        self.door
            .latchlock
            .fetch_and(!Spinlock::<T>::UPGRADE_FLAG, SeqCst);
    }
}

/// Type to handle write-latch, when dropped the latch and lock is released.
pub struct WriteGuard<T> {
    door: Arc<Spinlock<T>>,
}

impl<T> WriteGuard<T> {
    #[inline]
    pub fn to_rank(&self) -> u64 {
        self.door.rank
    }
}

impl<T> Deref for WriteGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.door.value.get() }
    }
}

impl<T> DerefMut for WriteGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.door.value.get() }
    }
}

impl<T> Drop for WriteGuard<T> {
    fn drop(&mut self) {
        let old = self.door.latchlock.load(SeqCst);
        if (old & Spinlock::<T>::READERS_FLAG) > 0 {
            panic!(concat!(
                "can't have active readers, when lock is held! ",
                "call the programmer"
            ));
        }
        if self
            .door
            .latchlock
            .compare_exchange(old, 0, SeqCst, SeqCst)
            .is_err()
        {
            panic!(concat!(
                "cant' have readers/writers to modify when locked! ",
                "call the programmer"
            ))
        }
    }
}

/// Statistic type, to capture [Spinlock] metrics.
#[derive(Default)]
pub struct Stats {
    /// Actual 32-bit latchlock of the Spinlock when
    /// [to_stats][Spinlock::to_stats] is called.
    pub latchlock: u32,
    /// Total number of read locks so far.
    pub read_locks: usize,
    /// Total number of write locks so far.
    pub write_locks: usize,
    /// Total number of upgrades from upgradable-read to write so far.
    pub upgrades: usize,
    /// Total number of conflicts so far, while acquire the latch.
    pub conflicts: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(
            f,
            concat!(
                "{{ latchlock = {:X}, read_locks = {}, write_locks = {}, ",
                "upgrades = {}, conflicts = {} }}",
            ),
            self.latchlock, self.read_locks, self.write_locks, self.upgrades, self.conflicts,
        )
    }
}

#[cfg(test)]
#[path = "spinlock_test.rs"]
mod spinlock_test;
