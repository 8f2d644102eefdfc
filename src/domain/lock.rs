//! Pluggable guard around the account's [`Ledger`].
//!
//! The strategy is fixed by the account's type parameter: [`SharedLock`] when
//! several threads may touch the ledger, [`SimulatedLock`] when the account
//! is known to run on a single thread (backtests, simulations). Both release
//! the ledger on every exit path, unwinding included.

use std::cell::RefCell;

use parking_lot::Mutex;

use super::ledger::Ledger;

pub trait LockStrategy {
    /// True when the strategy performs no cross-thread synchronisation.
    const SINGLE_THREADED: bool;

    fn new(ledger: Ledger) -> Self;

    /// Runs `f` with exclusive access to the ledger, blocking until available.
    fn with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R;

    /// Runs `f` only if the ledger is free right now.
    fn try_with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> Option<R>;
}

/// Mutual exclusion for accounts shared between threads.
#[derive(Debug)]
pub struct SharedLock(Mutex<Ledger>);

impl LockStrategy for SharedLock {
    const SINGLE_THREADED: bool = false;

    fn new(ledger: Ledger) -> Self {
        SharedLock(Mutex::new(ledger))
    }

    fn with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        let mut guard = self.0.lock();
        f(&mut guard)
    }

    fn try_with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> Option<R> {
        let mut guard = self.0.try_lock()?;
        Some(f(&mut guard))
    }
}

/// Unsynchronised access for single-threaded accounts. `!Sync`, so the
/// compiler rejects sharing it across threads.
#[derive(Debug)]
pub struct SimulatedLock(RefCell<Ledger>);

impl LockStrategy for SimulatedLock {
    const SINGLE_THREADED: bool = true;

    fn new(ledger: Ledger) -> Self {
        SimulatedLock(RefCell::new(ledger))
    }

    fn with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    fn try_with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> Option<R> {
        let mut ledger = self.0.try_borrow_mut().ok()?;
        Some(f(&mut ledger))
    }
}
