// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use crate::{error::TxError, tvar::TVar};
use log::debug;
use std::collections::HashMap;

/// A [`Transaction`] carries the state of one attempt of an atomic block.
///
/// It records every variable read into the read set, buffers every store
/// into the write set and tracks the write-locks held during a commit. The
/// structure is reused across attempts and, through [`run`](crate::run),
/// across invocations: clearing keeps the capacity of the collections, so a
/// warmed up read-only transaction does not allocate.
///
/// A transaction must not be shared between threads.
pub struct Transaction<T>
where
    T: Clone,
{
    /// Snapshot of the version clock at the start of the attempt.
    pub(crate) rv: u64,

    /// Variables read outside the write set. Duplicates are allowed.
    pub(crate) read_set: Vec<TVar<T>>,

    /// Latest speculative value per written variable. Allocated lazily on
    /// the first store.
    pub(crate) write_set: HashMap<TVar<T>, T>,

    /// Write-set variables whose locks are currently held.
    pub(crate) locked: Vec<TVar<T>>,

    /// Set when the attempt has been invalidated.
    pub(crate) retry: bool,
}

impl<T> Transaction<T>
where
    T: Clone,
{
    /// Creates an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the value of `tvar` as seen by this attempt.
    ///
    /// A value buffered in the write set is returned as-is. Otherwise the
    /// variable's payload is read between two samples of its write-lock;
    /// the read is only valid if the lock stayed free and the version
    /// stayed at or below the attempt's read version. An invalid read
    /// aborts the attempt and returns the retry signal, which the block is
    /// expected to hand back to the driver with `?`.
    ///
    /// Returns `None` for a variable that has never been stored to.
    pub fn load(&mut self, tvar: &TVar<T>) -> Result<Option<T>, TxError> {
        if self.retry {
            // the attempt is already doomed, stay away from the locks
            return Err(TxError::Retry);
        }

        if let Some(value) = self.write_set.get(tvar) {
            return Ok(Some(value.clone()));
        }

        let (locked, pre_version) = tvar.lock().load();
        if locked {
            self.abort();
            return Err(TxError::LockPresent);
        }
        if pre_version > self.rv {
            self.abort();
            return Err(TxError::StaleObject);
        }

        let value = tvar.read();

        let (locked, post_version) = tvar.lock().load();
        if locked || post_version != pre_version || post_version > self.rv {
            self.abort();
            return Err(TxError::VersionMismatch);
        }

        self.read_set.push(tvar.clone());
        Ok(value)
    }

    /// Buffers `value` as the new payload of `tvar`.
    ///
    /// The store is speculative: neither the variable nor its lock is
    /// touched before the commit. Storing to the same variable twice keeps
    /// the latest value.
    pub fn store(&mut self, tvar: &TVar<T>, value: T) {
        self.write_set.insert(tvar.clone(), value);
    }

    /// Tries to take the write-lock of every variable in the write set.
    ///
    /// The first lock that cannot be taken aborts the attempt, releasing
    /// everything acquired so far.
    pub(crate) fn lock_write_set(&mut self) -> Result<(), TxError> {
        let mut acquired = true;
        for tvar in self.write_set.keys() {
            if !tvar.lock().try_acquire() {
                acquired = false;
                break;
            }
            self.locked.push(tvar.clone());
        }

        match acquired {
            true => Ok(()),
            false => {
                self.abort();
                Err(TxError::LockPresent)
            }
        }
    }

    /// Validates the read set against the attempt's read version.
    ///
    /// A read is valid iff the variable's version is still at or below `rv`
    /// and its lock is either free or held by this transaction, that is,
    /// the variable is also part of the write set.
    pub(crate) fn validate(&self) -> Result<(), TxError> {
        for tvar in &self.read_set {
            let (locked, version) = tvar.lock().load();
            if locked && !self.write_set.contains_key(tvar) {
                debug!("TX({:?}): READ SET LOCKED BY FOREIGN TX", std::thread::current().id());
                return Err(TxError::LockPresent);
            }
            if version > self.rv {
                debug!("TX({:?}): READ SET STALE", std::thread::current().id());
                return Err(TxError::StaleObject);
            }
        }
        Ok(())
    }

    /// Publishes the write set under the write version `wv` and drops the
    /// locks. Leaves the transaction logically empty.
    pub(crate) fn commit(&mut self, wv: u64) {
        for (tvar, value) in self.write_set.drain() {
            tvar.write(value);
            tvar.lock().commit(wv);
        }
        self.locked.clear();
        self.read_set.clear();
    }

    /// Abandons the attempt: releases every lock taken so far, empties the
    /// buffers without freeing their capacity and flags the retry.
    pub(crate) fn abort(&mut self) {
        self.rv = 0;
        self.read_set.clear();
        for tvar in self.locked.drain(..) {
            tvar.lock().release();
        }
        self.write_set.clear();
        self.retry = true;
    }

    /// Logically empties the transaction for the next attempt or the next
    /// driver invocation.
    pub(crate) fn reset(&mut self) {
        debug_assert!(self.locked.is_empty());
        self.rv = 0;
        self.read_set.clear();
        self.write_set.clear();
        self.retry = false;
    }
}

impl<T> Default for Transaction<T>
where
    T: Clone,
{
    fn default() -> Self {
        Self {
            rv: 0,
            read_set: Vec::new(),
            write_set: HashMap::new(),
            locked: Vec::new(),
            retry: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Transaction;
    use crate::{error::TxError, tvar::TVar};

    #[test]
    fn test_load_prefers_the_write_set() {
        let var = TVar::new(1usize);
        let mut tx = Transaction::new();

        assert_eq!(tx.load(&var), Ok(Some(1)));
        tx.store(&var, 2);
        assert_eq!(tx.load(&var), Ok(Some(2)));

        // the variable itself is untouched until a commit
        assert_eq!(var.read(), Some(1));
    }

    #[test]
    fn test_write_set_hit_skips_the_read_set() {
        let var: TVar<usize> = TVar::default();
        let mut tx = Transaction::new();

        tx.store(&var, 5);
        assert_eq!(tx.load(&var), Ok(Some(5)));
        assert!(tx.read_set.is_empty());
    }

    #[test]
    fn test_load_aborts_on_foreign_lock() {
        let var = TVar::new(7usize);
        assert!(var.lock().try_acquire());

        let mut tx = Transaction::new();
        assert_eq!(tx.load(&var), Err(TxError::LockPresent));
        assert!(tx.retry);

        // once aborted, loads short-circuit without touching the lock
        assert_eq!(tx.load(&var), Err(TxError::Retry));
        var.lock().release();
    }

    #[test]
    fn test_load_aborts_on_stale_version() {
        let var = TVar::new(7usize);
        assert!(var.lock().try_acquire());
        var.lock().commit(10);

        let mut tx = Transaction::new();
        assert_eq!(tx.rv, 0);
        assert_eq!(tx.load(&var), Err(TxError::StaleObject));
        assert!(tx.retry);
    }

    #[test]
    fn test_abort_releases_acquired_locks() {
        let var = TVar::new(3usize);
        let mut tx = Transaction::new();

        tx.store(&var, 4);
        tx.lock_write_set().expect("Failed to lock the write set");
        assert!(var.lock().is_locked());

        tx.abort();
        assert!(!var.lock().is_locked());
        assert!(tx.write_set.is_empty());
        assert!(tx.retry);
    }
}
