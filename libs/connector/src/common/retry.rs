use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::lock;

/// Retry configuration for failed connection attempts
///
/// Retries use a fixed delay and never give up: a manager keeps retrying
/// until a connect succeeds or it is shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the fallback timer triggers a retry
    pub delay: Duration,
}

impl RetryPolicy {
    /// Default fallback delay in milliseconds
    pub const DEFAULT_DELAY_MS: u64 = 3000;

    /// Create a retry policy with the default 3000ms delay
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback delay in milliseconds
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(Self::DEFAULT_DELAY_MS),
        }
    }
}

/// What woke an armed retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTrigger {
    /// The fallback timer elapsed
    Timer,
    /// A setting changed before the timer elapsed
    SettingChanged,
    /// [`crate::ConnectionManager::on_retries`] was called directly
    Manual,
}

#[derive(Debug)]
enum RetryState {
    Idle,
    Armed {
        generation: u64,
        waiter: Option<JoinHandle<()>>,
    },
}

/// Single-shot guard for pending retries
///
/// Each failed attempt arms the guard with a fresh generation. Whoever
/// clears the guard first (timer, setting change or a direct call) runs the
/// retry; every other trigger for that generation becomes a no-op.
#[derive(Debug)]
pub(crate) struct RetryGuard {
    state: Mutex<RetryState>,
    generations: AtomicU64,
}

impl RetryGuard {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RetryState::Idle),
            generations: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        matches!(*lock(&self.state), RetryState::Armed { .. })
    }

    /// Arm the guard, returning the new generation.
    ///
    /// Returns `None` when a retry is already armed.
    pub(crate) fn try_arm(&self) -> Option<u64> {
        let mut state = lock(&self.state);
        if matches!(*state, RetryState::Armed { .. }) {
            return None;
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        *state = RetryState::Armed {
            generation,
            waiter: None,
        };
        Some(generation)
    }

    /// Attach the waiter task to the armed generation.
    ///
    /// If the generation was already consumed the task is running the retry
    /// and is left detached.
    pub(crate) fn attach(&self, generation: u64, handle: JoinHandle<()>) {
        let mut state = lock(&self.state);
        if let RetryState::Armed {
            generation: armed,
            waiter,
        } = &mut *state
        {
            if *armed == generation {
                *waiter = Some(handle);
            }
        }
    }

    /// Clear the guard from the waiter task of `generation`.
    ///
    /// Returns `false` for a stale or already consumed generation.
    pub(crate) fn consume(&self, generation: u64) -> bool {
        let mut state = lock(&self.state);
        match &*state {
            RetryState::Armed { generation: armed, .. } if *armed == generation => {
                // the waiter is the caller, so its handle is dropped, not aborted
                *state = RetryState::Idle;
                true
            }
            _ => {
                debug!(generation, "Retry already consumed");
                false
            }
        }
    }

    /// Clear whatever retry is armed and stop its waiter task.
    pub(crate) fn consume_any(&self) -> bool {
        let previous = std::mem::replace(&mut *lock(&self.state), RetryState::Idle);
        match previous {
            RetryState::Armed { waiter, .. } => {
                if let Some(waiter) = waiter {
                    waiter.abort();
                }
                true
            }
            RetryState::Idle => false,
        }
    }
}
