//! Shared filesystem and path helpers.

pub(crate) mod fs;
pub(crate) mod path;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if another worker panicked while
/// holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
