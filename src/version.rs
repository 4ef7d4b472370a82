// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The version lock is a special word sized lock, that contains a single
//! bit to indicate a lock, while using the rest of the bits for versioning.

use std::sync::atomic::{AtomicU64, Ordering};

/// The most significant bit of the lock word marks the variable as locked.
const LOCK_BIT: u64 = 1 << 63;

/// The lower 63 bits of the lock word carry the version.
const VERSION_MASK: u64 = !LOCK_BIT;

/// A [`VersionLock`] combines a one-bit write-lock with a 63 bit version
/// counter inside a single atomic word. A writer owns the word between a
/// successful [`VersionLock::try_acquire`] and the matching
/// [`VersionLock::commit`] or [`VersionLock::release`]; readers sample the
/// word before and after reading the guarded value to detect writers in
/// flight. Use a [`VersionClock`] to produce the versions published here.
///
/// # Example
/// ```
/// use stronghold_stm::VersionLock;
/// let lock = VersionLock::default();
/// assert!(lock.try_acquire());
/// assert!(lock.is_locked());
/// lock.commit(1);
/// assert!(!lock.is_locked());
/// assert_eq!(lock.version(), 1);
/// ```
#[derive(Default)]
pub struct VersionLock {
    atomic: AtomicU64,
}

impl VersionLock {
    /// Creates a new, unlocked [`VersionLock`] with the desired version.
    pub const fn new(version: u64) -> Self {
        Self {
            atomic: AtomicU64::new(version),
        }
    }

    /// Returns the locked flag and the version from one atomic sample.
    pub fn load(&self) -> (bool, u64) {
        let word = self.atomic.load(Ordering::SeqCst);
        (word & LOCK_BIT != 0, word & VERSION_MASK)
    }

    /// Tries to acquire the lock without spinning.
    ///
    /// Fails if the lock is observed held, or if the word changes between
    /// the observation and the swap.
    pub fn try_acquire(&self) -> bool {
        let word = self.atomic.load(Ordering::SeqCst);
        if word & LOCK_BIT != 0 {
            return false;
        }

        self.atomic
            .compare_exchange(word, word | LOCK_BIT, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Publishes `version` and drops the lock in one atomic store. The value
    /// guarded by this lock must be fully written before the call.
    ///
    /// The caller must hold the lock, and `version` must fit into 63 bits.
    pub fn commit(&self, version: u64) {
        let (locked, _) = self.load();
        assert!(locked, "commit on a version lock that is not held");
        assert!(version <= VERSION_MASK, "version overflows the lock word");

        self.atomic.store(version, Ordering::SeqCst);
    }

    /// Drops the lock, keeping the version unchanged. Used when a
    /// transaction backs out after acquisition without publishing anything.
    ///
    /// The caller must hold the lock.
    pub fn release(&self) {
        let (locked, version) = self.load();
        assert!(locked, "release on a version lock that is not held");

        self.atomic.store(version, Ordering::SeqCst);
    }

    /// Returns the stored version.
    pub fn version(&self) -> u64 {
        self.atomic.load(Ordering::SeqCst) & VERSION_MASK
    }

    /// Returns `true`, if the lock bit is set.
    pub fn is_locked(&self) -> bool {
        self.atomic.load(Ordering::SeqCst) & LOCK_BIT != 0
    }
}

/// An atomic version clock shared by a cohort of transactable variables.
///
/// Every read-write commit against the cohort bumps the clock exactly once;
/// the bumped value is the write version stamped into each written variable.
/// Variables and the clock used to commit them must be chosen consistently:
/// committing one variable against two different clocks voids every
/// guarantee of the algorithm.
#[derive(Default)]
pub struct VersionClock {
    atomic: AtomicU64,
}

impl VersionClock {
    /// Creates a new [`VersionClock`] with the desired version.
    pub const fn new(version: u64) -> Self {
        Self {
            atomic: AtomicU64::new(version),
        }
    }

    /// Returns the current version.
    pub fn load(&self) -> u64 {
        self.atomic.load(Ordering::SeqCst)
    }

    /// Atomically increments the clock and returns the incremented value.
    pub fn increment(&self) -> u64 {
        self.atomic.fetch_add(1, Ordering::SeqCst) + 1
    }
}
