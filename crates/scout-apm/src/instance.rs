// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process-wide "active instance" bookkeeping and the uncaught-exception
//! handler, per spec §4.E steps 5-6 and their shutdown-time reversal.
//!
//! Only one [`Engine`](crate::Engine) in a process is ever "active": the
//! first to complete `setup()` claims it and installs the panic hook; every
//! later `Engine` skips both steps, matching spec's "iff none is
//! registered." The panic hook is a well-defined extension point fired at
//! one lifecycle moment, not a general-purpose registry — only one claim is
//! possible at a time, unlike a hook registry that supports many at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use scout_tracing::TracingEngine;

type PanicHook = dyn Fn(&std::panic::PanicHookInfo<'_>) + Send + Sync + 'static;

static ACTIVE_ENGINE: Mutex<Option<u64>> = Mutex::new(None);
static PREVIOUS_HOOK: Mutex<Option<Box<PanicHook>>> = Mutex::new(None);
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Mint a process-unique id for a new [`Engine`](crate::Engine) instance.
pub(crate) fn next_engine_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::SeqCst)
}

/// Claim the process-global active-instance slot for `id` iff it is empty.
/// Returns `true` iff this call claimed it.
pub(crate) fn try_register_active(id: u64) -> bool {
    let mut guard = ACTIVE_ENGINE.lock().unwrap();
    if guard.is_some() {
        return false;
    }
    *guard = Some(id);
    true
}

/// Release the active-instance slot, but only if it is still held by `id` —
/// a stale `shutdown()` from an instance that never became active must not
/// clear a different instance's claim.
pub(crate) fn clear_active(id: u64) {
    let mut guard = ACTIVE_ENGINE.lock().unwrap();
    if *guard == Some(id) {
        *guard = None;
    }
}

/// Install the process-wide panic hook that tags the current request (if
/// any) with `error=true` before chaining to whatever hook was previously
/// installed. No-op if a hook from an earlier active instance is already in
/// place — callers only invoke this after winning [`try_register_active`],
/// so in practice this only guards against a stale double-call.
pub(crate) fn install_exception_handler(tracing: TracingEngine) {
    let mut guard = PREVIOUS_HOOK.lock().unwrap();
    if guard.is_some() {
        return;
    }
    *guard = Some(std::panic::take_hook());
    drop(guard);

    std::panic::set_hook(Box::new(move |info| {
        tracing.add_context_sync("error", true, None);
        if let Some(previous) = PREVIOUS_HOOK.lock().unwrap().as_ref() {
            previous(info);
        }
    }));
}

/// Reverse [`install_exception_handler`]: restore whatever hook preceded it.
pub(crate) fn remove_exception_handler() {
    if let Some(previous) = PREVIOUS_HOOK.lock().unwrap().take() {
        std::panic::set_hook(previous);
    }
}
