// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Start-or-join coordination for one in-flight async operation.
//!
//! The first caller starts the operation; callers arriving while it runs
//! await the same shared future and receive a clone of its output. The slot
//! is cleared when the operation settles, including on panic, so the next
//! caller starts a fresh attempt.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type Slot<T> = Arc<Mutex<Option<Flight<T>>>>;

struct Flight<T: Clone> {
    id: u64,
    future: Shared<BoxFuture<'static, T>>,
}

/// Single in-flight operation shared by concurrent callers.
pub struct SingleFlight<T: Clone> {
    slot: Slot<T>,
    next_id: AtomicU64,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the running operation, or start one with `start`.
    ///
    /// `start` is only invoked when nothing is in flight.
    pub async fn run<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let future = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(flight) => flight.future.clone(),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let guard = ClearOnSettle {
                        slot: Arc::clone(&self.slot),
                        id,
                    };
                    let operation = start();
                    // The shared future is referenced from the slot, so a panic
                    // must be caught here for the guard to run at all.
                    let future = async move {
                        let outcome = AssertUnwindSafe(operation).catch_unwind().await;
                        drop(guard);
                        match outcome {
                            Ok(value) => value,
                            Err(panic) => std::panic::resume_unwind(panic),
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some(Flight {
                        id,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }

    /// Whether an operation is currently running.
    pub fn is_in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Clears the slot when the wrapped operation finishes or unwinds.
struct ClearOnSettle<T: Clone> {
    slot: Slot<T>,
    id: u64,
}

impl<T: Clone> Drop for ClearOnSettle<T> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        // Only clear our own flight; a later one may already occupy the slot.
        if slot.as_ref().is_some_and(|flight| flight.id == self.id) {
            *slot = None;
        }
    }
}
