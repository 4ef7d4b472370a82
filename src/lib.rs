// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! # Stronghold Software Transactional Memory (STM)
//! ---
//! This crate implements software transactional memory following the
//! Transactional Locking II (TL2) algorithm described by Dice, Shalev and
//! Shavit. Multiple concurrent workers read and modify a set of shared
//! variables as if each of them ran alone; committed outcomes are
//! serializable and conflicting attempts re-execute automatically.
//!
//! ## Objective
//! ---
//! Locks compose badly: protecting two correct critical sections with a
//! third lock invites deadlocks and races. An atomic block over [`TVar`]s
//! composes instead. Reads and writes inside the block go through a
//! transaction log; the block's effects become visible in one step at
//! commit time, or not at all.
//!
//! ## Algorithm
//! ---
//! Every [`TVar`] carries a versioned write-lock: a single atomic word
//! holding a lock bit and a 63 bit version. A cohort of variables shares a
//! [`VersionClock`]. An attempt samples the clock into its read version and
//! runs the block speculatively, validating every read inline against that
//! sample while writes only fill a buffer. Commit then locks the write set,
//! bumps the clock, re-validates the read set and publishes the buffered
//! values under the bumped version. Any conflict along the way aborts the
//! attempt, releases what was acquired and re-executes the block.
//!
//! ## Features
//! ---
//! - [x] serializable transactions over an arbitrary `Clone` payload
//! - [x] read-only fast path with no lock or clock traffic
//! - [x] transaction reuse with allocation-free read-only attempts
//! - [x] independent cohort clocks to split counter contention
//!
//! # Example
//! ```
//! use stronghold_stm::{atomically, TVar};
//!
//! let counter = TVar::new(0usize);
//!
//! let committed = atomically(|tx| {
//!     let value = tx.load(&counter)?.unwrap_or(0);
//!     tx.store(&counter, value + 1);
//!     Ok(value + 1)
//! })
//! .expect("Failed to run transaction");
//!
//! assert_eq!(committed, 1);
//! ```
//!
//! # Sources
//! - [paper](https://www.cs.tau.ac.il/~shanir/nir-pubs-web/Papers/Transactional_Locking.pdf)

pub mod error;
pub mod stm;
pub mod transaction;
pub mod tvar;
pub mod version;

// public re-exports
pub use error::TxError;
pub use stm::{atomically, global_clock, run};
pub use transaction::Transaction;
pub use tvar::TVar;
pub use version::{VersionClock, VersionLock};
