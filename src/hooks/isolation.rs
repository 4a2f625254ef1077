//! Panic isolation for hook and plugin calls.
//!
//! Every callback contributed by a plugin runs through one of these wrappers.
//! A panic is caught and converted to an error value so one misbehaving
//! callback cannot take down the request or the remaining callbacks.
//!
//! `catch_unwind` only catches unwinding panics. The release profile must
//! not set `panic = "abort"`.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::HookError;

/// Run a hook callback, converting panics to [`HookError::Panic`].
pub fn call_hook<T, F>(hook_fn: F) -> Result<T, HookError>
where
    F: FnOnce() -> Result<T, HookError>,
{
    call_preserving_error(hook_fn, HookError::Panic)
}

/// Run `f`, keeping its own error type and mapping a panic through
/// `panic_to_error`.
///
/// Callers hand in closures over shared plugin state, so the closure is
/// asserted unwind-safe here; a panicking callback leaves no partially
/// updated registry state behind because callbacks run outside all locks.
pub fn call_preserving_error<F, T, E, PC>(f: F, panic_to_error: PC) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    PC: FnOnce(String) -> E,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic_info) => {
            let msg = panic_message(panic_info.as_ref());
            tracing::error!(message = %msg, "Plugin callback panicked");
            Err(panic_to_error(msg))
        }
    }
}

/// Async counterpart of [`call_preserving_error`].
///
/// Catches panics raised while the future is polled. Panics inside tasks the
/// future spawns are not caught.
pub async fn call_preserving_error_async<Fut, T, E, PC>(future: Fut, panic_to_error: PC) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    PC: FnOnce(String) -> E,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic_info) => {
            let msg = panic_message(panic_info.as_ref());
            tracing::error!(message = %msg, "Plugin callback panicked during async execution");
            Err(panic_to_error(msg))
        }
    }
}

/// Extract a readable message from a panic payload.
pub fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic (non-string payload)".to_string()
    }
}
