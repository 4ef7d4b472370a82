// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! # Transactional memory micro benchmarks
//!
//! Test subjects:
//! - read-only transactions through the reuse form
//! - write + read transactions through the reuse form

use criterion::{criterion_group, criterion_main, Criterion};
use stronghold_stm::{run, TVar, Transaction, VersionClock};

fn bnc_read_only(c: &mut Criterion) {
    let clock = VersionClock::default();
    let mut tx = Transaction::new();
    let var: TVar<usize> = TVar::default();

    run(&clock, &mut tx, |tx| {
        tx.store(&var, 42);
        Ok(())
    })
    .expect("Failed to seed variable");

    c.bench_function("read_only", |b| {
        b.iter(|| run(&clock, &mut tx, |tx| tx.load(&var)).expect("Failed to run transaction"))
    });
}

fn bnc_write_read(c: &mut Criterion) {
    let clock = VersionClock::default();
    let mut tx = Transaction::new();
    let var: TVar<usize> = TVar::default();

    run(&clock, &mut tx, |tx| {
        tx.store(&var, 42);
        Ok(())
    })
    .expect("Failed to seed variable");

    c.bench_function("write_read", |b| {
        b.iter(|| {
            run(&clock, &mut tx, |tx| {
                tx.store(&var, 666);
                tx.load(&var)
            })
            .expect("Failed to run transaction")
        })
    });
}

// all transaction benches
criterion_group!(benches, bnc_read_only, bnc_write_read);

// main
criterion_main!(benches);
