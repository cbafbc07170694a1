//! Single-flight coalescing of keyed operations.

use futures::future::{BoxFuture, FutureExt, Shared};
use shoal_api::ShoalResult;
use std::collections::HashMap;
use std::sync::Mutex;

type SharedCall<T> = Shared<BoxFuture<'static, ShoalResult<T>>>;

/// Ensures at most one execution of a keyed operation is in flight at any
/// time, with every concurrent caller sharing its result.
///
/// The first caller for a key installs the operation as a shared future;
/// everyone joins it and receives the same `Ok` or the same `Err` (the
/// crate error type is `Clone` exactly so results can fan out here). The
/// entry is removed as callers observe completion, so a later call starts
/// a fresh execution. If every caller is dropped mid-flight, the pending
/// entry remains joinable and the next caller resumes driving it.
pub(crate) struct RequestGroup<T: Clone> {
    calls: Mutex<HashMap<String, SharedCall<T>>>,
}

impl<T: Clone + Send + Sync + 'static> RequestGroup<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Run `make()` under `key`, or join the execution already in flight.
    pub async fn run<F>(&self, key: &str, make: F) -> ShoalResult<T>
    where
        F: FnOnce() -> BoxFuture<'static, ShoalResult<T>>,
    {
        let call = {
            let mut calls = self.calls.lock().expect("poisoned");
            match calls.get(key) {
                Some(call) => call.clone(),
                None => {
                    let call = make().shared();
                    calls.insert(key.to_string(), call.clone());
                    call
                }
            }
        };

        let out = call.clone().await;

        // drop the entry unless a newer execution replaced it already
        let mut calls = self.calls.lock().expect("poisoned");
        if let Some(existing) = calls.get(key) {
            if Shared::ptr_eq(existing, &call) {
                calls.remove(key);
            }
        }

        out
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.calls.lock().expect("poisoned").len()
    }
}

impl<T: Clone> std::fmt::Debug for RequestGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGroup")
            .field("in_flight", &self.calls.lock().expect("poisoned").len())
            .finish()
    }
}
