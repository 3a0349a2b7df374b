//! Sliding-window rate limiter for reasoning-provider calls.
//!
//! One instance is built per process and shared by every session. The window remembers the
//! instant of each granted permit; a new permit is granted only while fewer than `max`
//! grants fall inside the trailing window. When the window is full the caller sleeps until
//! the oldest grant ages out and tries again.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use quest_core::{QuestError, Result};

/// Authorization to make one provider call.
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    pub granted_at: Instant,
}

#[derive(Debug)]
struct Window {
    grants: VecDeque<Instant>,
}

impl Window {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.grants.front() {
            if now.duration_since(oldest) >= window {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<Window>>,
    max: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(Window {
                grants: VecDeque::with_capacity(max as usize),
            })),
            max: max.max(1),
            window,
        }
    }

    pub fn max_per_window(&self) -> u32 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Try to take a permit without waiting. Returns Ok(permit) if granted,
    /// or Err(wait) with the time until the oldest grant leaves the window.
    pub fn try_acquire(&self) -> std::result::Result<Permit, Duration> {
        let now = Instant::now();
        // Prune, check and record under one lock so no caller acts on a stale count.
        let mut state = self.state.lock();
        state.prune(now, self.window);
        if (state.grants.len() as u32) < self.max {
            state.grants.push_back(now);
            Ok(Permit { granted_at: now })
        } else {
            let oldest = state.grants.front().copied().unwrap_or(now);
            Err(self.window.saturating_sub(now.duration_since(oldest)))
        }
    }

    /// Wait until a permit is available.
    pub async fn acquire(&self) -> Permit {
        loop {
            match self.try_acquire() {
                Ok(permit) => return permit,
                Err(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "rate window full, waiting");
                    // Zero waits happen when the oldest grant expires on this exact tick.
                    tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
                }
            }
        }
    }

    /// Wait for a permit for at most `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<Permit> {
        tokio::time::timeout(timeout, self.acquire())
            .await
            .map_err(|_| QuestError::ProviderTimeout {
                waited_ms: timeout.as_millis() as u64,
            })
    }

    /// Number of grants currently inside the window.
    pub fn in_window(&self) -> usize {
        let mut state = self.state.lock();
        state.prune(Instant::now(), self.window);
        state.grants.len()
    }
}
