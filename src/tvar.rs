// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use crate::version::VersionLock;
use std::{
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
};

/// [`TVar`] is a shared variable managed by the transactional runtime.
///
/// It pairs an opaque payload with the versioned write-lock guarding it.
/// The payload is written exclusively by a committing transaction holding
/// the lock; transactional reads go through
/// [`Transaction::load`](crate::Transaction::load), which brackets the read
/// with two samples of the lock to detect writers in flight.
///
/// Cloning a [`TVar`] yields another handle to the same variable. All
/// handles hash and compare by the identity of the shared variable, so any
/// of them can stand in for the variable inside a transaction's sets.
pub struct TVar<T>
where
    T: Clone,
{
    pub(crate) inner: Arc<InnerVar<T>>,
}

impl<T> std::fmt::Debug for TVar<T>
where
    T: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TVar")
            .field("inner", &(Arc::as_ptr(&self.inner)))
            .finish()
    }
}

pub(crate) struct InnerVar<T>
where
    T: Clone,
{
    /// The versioned write-lock guarding `data`.
    pub(crate) lock: VersionLock,

    /// The payload. `None` until the first committed store.
    data: Mutex<Option<T>>,
}

impl<T> TVar<T>
where
    T: Clone,
{
    /// Creates a variable seeded with `value` at version 0.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(InnerVar {
                lock: VersionLock::default(),
                data: Mutex::new(Some(value)),
            }),
        }
    }

    /// Returns a copy of the payload, `None` if it was never stored to.
    pub(crate) fn read(&self) -> Option<T> {
        self.inner.data.lock().expect("value slot poisoned").clone()
    }

    /// Overwrites the payload. Only called with the variable's lock held.
    pub(crate) fn write(&self, value: T) {
        *self.inner.data.lock().expect("value slot poisoned") = Some(value);
    }

    pub(crate) fn lock(&self) -> &VersionLock {
        &self.inner.lock
    }
}

impl<T> Default for TVar<T>
where
    T: Clone,
{
    /// Creates a variable with no payload: unlocked, version 0. Loading it
    /// before the first committed store yields `None`.
    fn default() -> Self {
        Self {
            inner: Arc::new(InnerVar {
                lock: VersionLock::default(),
                data: Mutex::new(None),
            }),
        }
    }
}

impl<T> Clone for TVar<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Hash for TVar<T>
where
    T: Clone,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        // identity of the shared allocation, not of this handle
        (Arc::as_ptr(&self.inner) as usize).hash(state);
    }
}

impl<T> PartialEq for TVar<T>
where
    T: Clone,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for TVar<T> where T: Clone {}
