use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use governor::clock::{Clock, DefaultClock, Reference};

use crate::ProviderId;

/// Length of one rate-limit window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Budget applied to providers that were never given one explicitly.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Admission check consulted before every provider call.
pub trait RateGate: Send + Sync {
    /// Returns `true` and consumes one unit of budget if the provider may be
    /// called now.
    fn try_acquire(&self, provider: ProviderId) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Window<I> {
    opened_at: I,
    count: u32,
}

/// Per-provider fixed-window request counter.
///
/// A window opens on the first acquisition. Once more than [`RATE_WINDOW`]
/// has passed since it opened, the next acquisition starts a fresh window
/// with a zero count. Within a window a call is admitted only while the
/// count is below the provider's budget.
pub struct RateLimiter<C: Clock = DefaultClock> {
    clock: C,
    budgets: HashMap<ProviderId, u32>,
    windows: Mutex<HashMap<ProviderId, Window<C::Instant>>>,
}

impl RateLimiter<DefaultClock> {
    pub fn new() -> Self {
        Self::with_clock(DefaultClock::default())
    }
}

impl Default for RateLimiter<DefaultClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            budgets: HashMap::new(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_budget(mut self, provider: ProviderId, requests_per_minute: u32) -> Self {
        self.budgets.insert(provider, requests_per_minute);
        self
    }

    pub fn budget(&self, provider: ProviderId) -> u32 {
        self.budgets
            .get(&provider)
            .copied()
            .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE)
    }

    pub fn try_acquire(&self, provider: ProviderId) -> bool {
        let now = self.clock.now();
        let budget = self.budget(provider);
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let window = windows.entry(provider).or_insert(Window {
            opened_at: now,
            count: 0,
        });

        let elapsed: Duration = now.duration_since(window.opened_at).into();
        if elapsed > RATE_WINDOW {
            window.opened_at = now;
            window.count = 0;
        }

        if window.count < budget {
            window.count += 1;
            true
        } else {
            false
        }
    }

    /// Calls still admissible in the provider's current window.
    pub fn remaining(&self, provider: ProviderId) -> u32 {
        let now = self.clock.now();
        let budget = self.budget(provider);
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        match windows.get(&provider) {
            None => budget,
            Some(window) => {
                let elapsed: Duration = now.duration_since(window.opened_at).into();
                if elapsed > RATE_WINDOW {
                    budget
                } else {
                    budget.saturating_sub(window.count)
                }
            }
        }
    }
}

impl<C> RateGate for RateLimiter<C>
where
    C: Clock + Send + Sync,
    C::Instant: Send,
{
    fn try_acquire(&self, provider: ProviderId) -> bool {
        RateLimiter::try_acquire(self, provider)
    }
}
