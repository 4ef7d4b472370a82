// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The transaction driver. [`atomically`] runs an atomic block against the
//! process-wide version clock; [`run`] does the same against a caller-owned
//! cohort clock, reusing a caller-owned [`Transaction`]. Both re-execute
//! the block until one attempt commits:
//!
//! 1. Sample the clock into the attempt's read version
//! 2. Run the block speculatively; reads validate inline, writes only fill
//!    the write set
//! 3. A read-only attempt commits here, without locks or clock traffic
//! 4. Lock the write set
//! 5. Increment the clock to obtain the write version
//! 6. Validate the read set, unless the increment proves no foreign commit
//!    intervened
//! 7. Publish the write set and drop the locks

use crate::{error::TxError, transaction::Transaction, version::VersionClock};
use log::debug;

/// The clock used by [`atomically`].
static GLOBAL_CLOCK: VersionClock = VersionClock::new(0);

/// Returns the process-wide version clock.
///
/// Useful to drive [`run`] against the default cohort. A variable must only
/// ever be committed against one clock; mixing clocks on one variable voids
/// every guarantee.
pub fn global_clock() -> &'static VersionClock {
    &GLOBAL_CLOCK
}

/// Runs `speculative` as an atomic block against the process-wide clock,
/// re-executing it until an attempt commits, and returns the committed
/// block's value.
///
/// The block reads and writes [`TVar`](crate::TVar)s through the supplied
/// [`Transaction`]. A load hitting a conflict returns the retry signal,
/// which the block is expected to hand back with `?`; the conflict is
/// resolved internally and never reaches the caller. Any other error
/// aborts the attempt, commits nothing and is returned untouched.
///
/// # Example
/// ```
/// use stronghold_stm::{atomically, TVar};
///
/// let balance = TVar::new(100usize);
///
/// let remaining = atomically(|tx| {
///     let current = tx.load(&balance)?.unwrap_or(0);
///     tx.store(&balance, current - 20);
///     Ok(current - 20)
/// })
/// .expect("Failed to run transaction");
///
/// assert_eq!(remaining, 80);
/// ```
pub fn atomically<T, R, F>(speculative: F) -> Result<R, TxError>
where
    T: Clone,
    F: FnMut(&mut Transaction<T>) -> Result<R, TxError>,
{
    let mut tx = Transaction::new();
    execute(&GLOBAL_CLOCK, &mut tx, speculative)
}

/// Runs `speculative` like [`atomically`], but against the caller's cohort
/// `clock` and reusing the caller's transaction.
///
/// The transaction's buffers are emptied before the first attempt; their
/// capacity is kept, so a warmed up read-only transaction performs no
/// allocation. Separate cohorts of variables may use separate clocks to
/// take contention off a single counter, but each variable must stay with
/// one clock for its whole life.
pub fn run<T, R, F>(clock: &VersionClock, tx: &mut Transaction<T>, speculative: F) -> Result<R, TxError>
where
    T: Clone,
    F: FnMut(&mut Transaction<T>) -> Result<R, TxError>,
{
    tx.reset();
    execute(clock, tx, speculative)
}

fn execute<T, R, F>(clock: &VersionClock, tx: &mut Transaction<T>, mut speculative: F) -> Result<R, TxError>
where
    T: Clone,
    F: FnMut(&mut Transaction<T>) -> Result<R, TxError>,
{
    loop {
        tx.retry = false;
        tx.rv = clock.load();

        let result = speculative(tx);

        if tx.retry {
            // a load aborted mid-block; whatever the block buffered after
            // the abort is junk and gets dropped with the reset
            debug!("TX({:?}): SPECULATION ABORTED. RETRYING", std::thread::current().id());
            tx.reset();
            continue;
        }

        let value = match result {
            Ok(value) => value,
            Err(err) if err.is_retry() => {
                debug!("TX({:?}): BLOCK SIGNALLED RETRY", std::thread::current().id());
                tx.abort();
                continue;
            }
            Err(err) => {
                // non-transactional failure; no lock is held while the
                // block runs, so cleanup is purely local
                tx.reset();
                return Err(err);
            }
        };

        // read-only fast path
        if tx.write_set.is_empty() {
            return Ok(value);
        }

        if tx.lock_write_set().is_err() {
            debug!("TX({:?}): LOCK WRITE SET FAILED", std::thread::current().id());
            continue;
        }

        let wv = clock.increment();

        // wv == rv + 1 proves no foreign commit intervened since the
        // sample, every read is still at a version <= rv
        if wv != tx.rv + 1 && tx.validate().is_err() {
            debug!("TX({:?}): VALIDATING READ SET FAILED", std::thread::current().id());
            tx.abort();
            continue;
        }

        tx.commit(wv);
        return Ok(value);
    }
}

#[cfg(test)]
mod tests {
    use super::{atomically, run};
    use crate::{error::TxError, transaction::Transaction, tvar::TVar, version::VersionClock};

    #[test]
    fn test_stm_basic() {
        let bank_alice = TVar::new(10usize);
        let bank_bob = TVar::new(100usize);

        let result = atomically(|tx| {
            let amt_bob = tx.load(&bank_bob)?.expect("bob is seeded");
            tx.store(&bank_alice, amt_bob - 20);
            tx.store(&bank_bob, amt_bob - 20);
            Ok(())
        });
        assert!(result.is_ok(), "Transaction failed");

        let (alice, bob) = atomically(|tx| Ok((tx.load(&bank_alice)?, tx.load(&bank_bob)?))).expect("Failed to read");
        assert_eq!(alice, Some(80));
        assert_eq!(bob, Some(80));
    }

    #[test]
    fn test_inner_error_propagates_without_commit() {
        let var = TVar::new(1usize);

        let result: Result<(), TxError> = atomically(|tx| {
            tx.store(&var, 2);
            Err(TxError::Inner("rejected".to_string()))
        });
        assert_eq!(result, Err(TxError::Inner("rejected".to_string())));

        let value = atomically(|tx| tx.load(&var)).expect("Failed to read");
        assert_eq!(value, Some(1));
    }

    #[test]
    fn test_run_reuses_transaction_on_cohort_clock() {
        let clock = VersionClock::default();
        let mut tx = Transaction::new();
        let var: TVar<usize> = TVar::default();

        run(&clock, &mut tx, |tx| {
            tx.store(&var, 42);
            Ok(())
        })
        .expect("Failed to run transaction");
        assert_eq!(clock.load(), 1);

        let value = run(&clock, &mut tx, |tx| tx.load(&var)).expect("Failed to run transaction");
        assert_eq!(value, Some(42));

        // read-only attempts leave the clock untouched
        assert_eq!(clock.load(), 1);
    }
}
