//! Common utilities shared across the connector

pub mod error;
pub mod retry;

pub use error::{ConnectorError, ConnectorResult};
pub use retry::{RetryPolicy, RetryTrigger};

pub(crate) use retry::RetryGuard;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
